use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Identifies which of the two tabular inputs a schema problem belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// The marketplace sales export (CSV).
    Sales,
    /// The article → UID lookup workbook.
    Lookup,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Sales => write!(f, "sales export"),
            InputKind::Lookup => write!(f, "lookup workbook"),
        }
    }
}

/// A required column is absent from one of the inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{input} {path} is missing required column '{column}'")]
pub struct SchemaError {
    pub input: InputKind,
    pub column: String,
    pub path: PathBuf,
}

/// Pipeline stage a fatal error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Config,
    Load,
    Resolve,
    Write,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Load => "load",
            Stage::Resolve => "resolve",
            Stage::Write => "write",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// Error type covering the different failure cases that can occur when the
/// tool ingests sales data, resolves identifiers, or fills the template.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The sales export could not be read or holds no usable rows.
    #[error("failed to load sales export {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// The lookup workbook could not be opened or parsed.
    #[error("failed to load lookup workbook {path}: {reason}")]
    LookupLoad { path: PathBuf, reason: String },

    /// Raised when one of the inputs lacks a required column.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The template workbook could not be opened or does not have the
    /// expected layout.
    #[error("invalid template {path}: {reason}")]
    Template { path: PathBuf, reason: String },

    /// The output workbook could not be produced at the destination.
    #[error("failed to write output {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// Raised when a configuration file cannot be read or holds invalid values.
    #[error("invalid configuration{}: {reason}", config_location(.path))]
    Config {
        path: Option<PathBuf>,
        reason: String,
    },

    /// Raised when the run report cannot be serialised.
    #[error("JSON error: {0}")]
    Report(#[from] serde_json::Error),

    /// Wrapper for IO failures outside the pipeline stages, such as writing the report.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

fn config_location(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!(" {}", path.display()))
        .unwrap_or_default()
}

impl ToolError {
    /// Returns the pipeline stage the error belongs to. Missing sales columns
    /// are a load failure; missing lookup columns are a resolve failure.
    pub fn stage(&self) -> Stage {
        match self {
            ToolError::Load { .. } => Stage::Load,
            ToolError::Schema(SchemaError {
                input: InputKind::Sales,
                ..
            }) => Stage::Load,
            ToolError::Schema(SchemaError {
                input: InputKind::Lookup,
                ..
            })
            | ToolError::LookupLoad { .. } => Stage::Resolve,
            ToolError::Template { .. } | ToolError::Write { .. } => Stage::Write,
            ToolError::Config { .. } | ToolError::Logging(_) => Stage::Config,
            ToolError::Report(_) | ToolError::Io(_) => Stage::Report,
        }
    }

    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        ToolError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn lookup(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        ToolError::LookupLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn template(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        ToolError::Template {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        ToolError::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn config(reason: impl fmt::Display) -> Self {
        ToolError::Config {
            path: None,
            reason: reason.to_string(),
        }
    }
}
