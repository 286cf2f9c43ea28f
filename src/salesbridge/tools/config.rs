use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::salesbridge::tools::error::{Result, ToolError};
use crate::salesbridge::tools::model::RowOrder;

/// Column header naming the seller article in both inputs.
pub const DEFAULT_ARTICLE_COLUMN: &str = "Артикул";
/// Column header naming the quantity in the sales export.
pub const DEFAULT_QUANTITY_COLUMN: &str = "Количество";
/// Column header naming the canonical identifier in the lookup workbook.
pub const DEFAULT_CANONICAL_ID_COLUMN: &str = "UID";

/// Deployment settings for a pipeline run.
///
/// Every field has a default matching the current deployment, so an empty
/// TOML document is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub order: RowOrder,
    pub sales: SalesConfig,
    pub lookup: LookupConfig,
    pub template: TemplateConfig,
}

/// Shape of the marketplace sales export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SalesConfig {
    pub delimiter: char,
    pub article_column: String,
    pub quantity_column: String,
}

impl Default for SalesConfig {
    fn default() -> Self {
        Self {
            delimiter: ';',
            article_column: DEFAULT_ARTICLE_COLUMN.to_string(),
            quantity_column: DEFAULT_QUANTITY_COLUMN.to_string(),
        }
    }
}

/// Shape of the article → UID lookup workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookupConfig {
    /// Lookup workbook used when the caller does not name one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Worksheet to read. The first worksheet is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub article_column: String,
    pub canonical_id_column: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            path: None,
            sheet: None,
            article_column: DEFAULT_ARTICLE_COLUMN.to_string(),
            canonical_id_column: DEFAULT_CANONICAL_ID_COLUMN.to_string(),
        }
    }
}

/// Layout of the accounting template. Rows and columns are 1-based, as
/// shown in spreadsheet applications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateConfig {
    /// Worksheet receiving the data rows. The first worksheet is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub start_row: u32,
    pub id_column: u16,
    pub quantity_column: u16,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            sheet: None,
            start_row: 11,
            id_column: 4,
            quantity_column: 18,
        }
    }
}

/// Largest 1-based row index an xlsx worksheet accepts.
pub(crate) const MAX_ROW: u32 = 1_048_576;
/// Largest 1-based column index an xlsx worksheet accepts.
const MAX_COLUMN: u16 = 16_384;

impl PipelineConfig {
    /// Reads a TOML configuration file and validates it.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|error| ToolError::Config {
            path: Some(path.to_path_buf()),
            reason: error.to_string(),
        })?;
        let config: PipelineConfig = toml::from_str(&source).map_err(|error| ToolError::Config {
            path: Some(path.to_path_buf()),
            reason: error.to_string(),
        })?;
        config.validate().map_err(|error| match error {
            ToolError::Config { reason, .. } => ToolError::Config {
                path: Some(path.to_path_buf()),
                reason,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(ToolError::config)
    }

    /// Picks the lookup workbook: an explicit path wins over `lookup.path`.
    pub fn lookup_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        explicit
            .or(self.lookup.path.as_deref())
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                ToolError::config("no lookup workbook given and lookup.path is not configured")
            })
    }

    /// Checks the values that the pipeline stages rely on.
    pub fn validate(&self) -> Result<()> {
        if !self.sales.delimiter.is_ascii() {
            return Err(ToolError::config(format!(
                "delimiter '{}' must be a single ASCII character",
                self.sales.delimiter
            )));
        }
        if matches!(self.sales.delimiter, '"' | '\n' | '\r') {
            return Err(ToolError::config(format!(
                "delimiter {:?} is reserved",
                self.sales.delimiter
            )));
        }

        for (name, value) in [
            ("sales.article_column", &self.sales.article_column),
            ("sales.quantity_column", &self.sales.quantity_column),
            ("lookup.article_column", &self.lookup.article_column),
            ("lookup.canonical_id_column", &self.lookup.canonical_id_column),
        ] {
            if value.trim().is_empty() {
                return Err(ToolError::config(format!("{name} must not be empty")));
            }
        }
        if self.sales.article_column.trim() == self.sales.quantity_column.trim() {
            return Err(ToolError::config(
                "sales article and quantity columns must differ",
            ));
        }
        if self.lookup.article_column.trim() == self.lookup.canonical_id_column.trim() {
            return Err(ToolError::config(
                "lookup article and canonical id columns must differ",
            ));
        }

        let template = &self.template;
        if !(1..=MAX_ROW).contains(&template.start_row) {
            return Err(ToolError::config(format!(
                "template.start_row must be between 1 and {MAX_ROW}"
            )));
        }
        for (name, value) in [
            ("template.id_column", template.id_column),
            ("template.quantity_column", template.quantity_column),
        ] {
            if !(1..=MAX_COLUMN).contains(&value) {
                return Err(ToolError::config(format!(
                    "{name} must be between 1 and {MAX_COLUMN}"
                )));
            }
        }
        if template.id_column == template.quantity_column {
            return Err(ToolError::config(
                "template id and quantity columns must differ",
            ));
        }
        Ok(())
    }
}
