use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::salesbridge::tools::config::PipelineConfig;
use crate::salesbridge::tools::error::Result;
use crate::salesbridge::tools::events::{EventSink, RunEvent};
use crate::salesbridge::tools::io::lookup_read::load_lookup;
use crate::salesbridge::tools::io::sales_csv::load_sales;
use crate::salesbridge::tools::io::template_write::write_filled_template;
use crate::salesbridge::tools::model::{DuplicateArticle, SkippedRow};
use crate::salesbridge::tools::resolve::resolve;

/// Paths of the artifacts a run reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub sales: PathBuf,
    pub lookup: PathBuf,
    pub template: PathBuf,
    pub output: PathBuf,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub sales: PathBuf,
    pub lookup: PathBuf,
    pub template: PathBuf,
    pub output: PathBuf,
    pub loaded_articles: usize,
    pub accepted_rows: usize,
    pub total_quantity: u64,
    pub matched: usize,
    pub rows_written: usize,
    pub unmatched_articles: Vec<String>,
    pub skipped_rows: Vec<SkippedRow>,
    pub duplicate_lookup_articles: Vec<DuplicateArticle>,
}

/// Runs the sales → lookup → template pipeline once.
///
/// Every fatal error is reported on the sink as [`RunEvent::Failed`] before
/// being returned. Nothing is written to `request.output` unless the run
/// succeeds.
#[instrument(
    level = "info",
    skip_all,
    fields(run_id = tracing::field::Empty, sales = %request.sales.display(), output = %request.output.display())
)]
pub fn run(
    request: &RunRequest,
    config: &PipelineConfig,
    sink: &mut dyn EventSink,
) -> Result<RunReport> {
    let run_id = Uuid::new_v4();
    tracing::Span::current().record("run_id", tracing::field::display(run_id));

    match execute(run_id, request, config, sink) {
        Ok(report) => {
            sink.emit(&RunEvent::Completed {
                output: report.output.clone(),
                rows_written: report.rows_written,
            });
            info!(
                matched = report.matched,
                unmatched = report.unmatched_articles.len(),
                "run completed"
            );
            Ok(report)
        }
        Err(failure) => {
            let stage = failure.stage();
            error!(%stage, error = %failure, "run failed");
            sink.emit(&RunEvent::Failed {
                stage,
                message: failure.to_string(),
            });
            Err(failure)
        }
    }
}

fn execute(
    run_id: Uuid,
    request: &RunRequest,
    config: &PipelineConfig,
    sink: &mut dyn EventSink,
) -> Result<RunReport> {
    config.validate()?;

    let sales = load_sales(&request.sales, &config.sales)?;
    sink.emit(&RunEvent::SalesLoaded {
        path: request.sales.clone(),
        articles: sales.len(),
        accepted_rows: sales.accepted_rows(),
        skipped_rows: sales.skipped().len(),
        total_quantity: sales.total_quantity(),
    });
    for skipped in sales.skipped() {
        sink.emit(&RunEvent::RowSkipped {
            line: skipped.line,
            reason: skipped.reason.clone(),
        });
    }

    let lookup = load_lookup(&request.lookup, &config.lookup)?;
    sink.emit(&RunEvent::LookupLoaded {
        path: request.lookup.clone(),
        entries: lookup.len(),
        duplicates: lookup.duplicates().len(),
        blank_rows: lookup.blank_rows(),
    });
    for duplicate in lookup.duplicates() {
        sink.emit(&RunEvent::DuplicateLookupArticle {
            article: duplicate.article.clone(),
            kept: duplicate.kept.clone(),
            ignored: duplicate.ignored.clone(),
        });
    }

    let resolution = resolve(&sales, &lookup, config.order);
    for article in &resolution.unmatched_articles {
        debug!(%article, "article not found in lookup");
        sink.emit(&RunEvent::UnmatchedArticle {
            article: article.clone(),
        });
    }
    sink.emit(&RunEvent::Summary {
        loaded: sales.len(),
        matched: resolution.matched_count(),
        unmatched: resolution.unmatched_articles.len(),
    });

    let rows = resolution.output_rows();
    let summary = write_filled_template(&request.template, &request.output, &rows, &config.template)?;

    Ok(RunReport {
        run_id,
        sales: request.sales.clone(),
        lookup: request.lookup.clone(),
        template: request.template.clone(),
        output: request.output.clone(),
        loaded_articles: sales.len(),
        accepted_rows: sales.accepted_rows(),
        total_quantity: sales.total_quantity(),
        matched: resolution.matched_count(),
        rows_written: summary.rows_written,
        unmatched_articles: resolution.unmatched_articles,
        skipped_rows: sales.skipped().to_vec(),
        duplicate_lookup_articles: lookup.duplicates().to_vec(),
    })
}

/// Persists a run report as pretty-printed JSON.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}
