use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::salesbridge::tools::error::Stage;

/// Notification emitted while a run progresses.
///
/// The pipeline makes no assumptions about presentation; the `Display`
/// implementation is a plain one-line rendering suitable for a log view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    SalesLoaded {
        path: PathBuf,
        articles: usize,
        accepted_rows: usize,
        skipped_rows: usize,
        total_quantity: u64,
    },
    RowSkipped {
        line: u64,
        reason: String,
    },
    LookupLoaded {
        path: PathBuf,
        entries: usize,
        duplicates: usize,
        blank_rows: usize,
    },
    DuplicateLookupArticle {
        article: String,
        kept: String,
        ignored: String,
    },
    UnmatchedArticle {
        article: String,
    },
    Summary {
        loaded: usize,
        matched: usize,
        unmatched: usize,
    },
    Completed {
        output: PathBuf,
        rows_written: usize,
    },
    Failed {
        stage: Stage,
        message: String,
    },
}

impl RunEvent {
    /// Whether the event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::Completed { .. } | RunEvent::Failed { .. })
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::SalesLoaded {
                path,
                articles,
                accepted_rows,
                skipped_rows,
                total_quantity,
            } => write!(
                f,
                "loaded {} ({accepted_rows} rows, {skipped_rows} skipped): {articles} articles, total quantity {total_quantity}",
                path.display()
            ),
            RunEvent::RowSkipped { line, reason } => {
                write!(f, "skipped sales row at line {line}: {reason}")
            }
            RunEvent::LookupLoaded {
                path,
                entries,
                duplicates,
                blank_rows,
            } => write!(
                f,
                "loaded lookup {}: {entries} articles ({duplicates} conflicting duplicates, {blank_rows} blank rows)",
                path.display()
            ),
            RunEvent::DuplicateLookupArticle {
                article,
                kept,
                ignored,
            } => write!(
                f,
                "article {article} is listed more than once in the lookup; using {kept}, ignoring {ignored}"
            ),
            RunEvent::UnmatchedArticle { article } => {
                write!(f, "article {article} not found in the lookup workbook")
            }
            RunEvent::Summary {
                loaded,
                matched,
                unmatched,
            } => write!(f, "{loaded} articles: {matched} matched, {unmatched} unmatched"),
            RunEvent::Completed {
                output,
                rows_written,
            } => write!(f, "saved {} ({rows_written} rows)", output.display()),
            RunEvent::Failed { stage, message } => write!(f, "{stage} failed: {message}"),
        }
    }
}

/// Receiver of run notifications.
pub trait EventSink {
    fn emit(&mut self, event: &RunEvent);
}

impl<F> EventSink for F
where
    F: FnMut(&RunEvent),
{
    fn emit(&mut self, event: &RunEvent) {
        self(event)
    }
}

/// Collects every event, mostly useful for tests and batch callers.
impl EventSink for Vec<RunEvent> {
    fn emit(&mut self, event: &RunEvent) {
        self.push(event.clone());
    }
}
