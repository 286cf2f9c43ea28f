use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder};
use tracing::{debug, info, instrument, warn};

use crate::salesbridge::tools::config::SalesConfig;
use crate::salesbridge::tools::error::{InputKind, Result, SchemaError, ToolError};
use crate::salesbridge::tools::model::{AggregatedSales, SalesRecord};

/// Loads the marketplace sales export and aggregates quantities per article.
///
/// Structural problems (unreadable file, no header, missing columns, no
/// usable rows) fail the load. Individual malformed rows are recorded on the
/// returned aggregate and skipped.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_sales(path: &Path, config: &SalesConfig) -> Result<AggregatedSales> {
    let file = File::open(path).map_err(|error| ToolError::load(path, error))?;
    let sales = read_sales(file, path, config)?;
    info!(
        articles = sales.len(),
        accepted_rows = sales.accepted_rows(),
        skipped_rows = sales.skipped().len(),
        total_quantity = sales.total_quantity(),
        "aggregated sales export"
    );
    Ok(sales)
}

/// Parses a sales export from any reader. `origin` is only used in errors.
pub fn read_sales<R: Read>(source: R, origin: &Path, config: &SalesConfig) -> Result<AggregatedSales> {
    let mut reader = ReaderBuilder::new()
        .delimiter(config.delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|error| ToolError::load(origin, error))?
        .iter()
        .map(header_name)
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(ToolError::load(origin, "file is empty"));
    }

    let article_idx = column_index(&headers, &config.article_column, origin)?;
    let quantity_idx = column_index(&headers, &config.quantity_column, origin)?;
    debug!(article_idx, quantity_idx, columns = headers.len(), "resolved sales columns");

    let mut sales = AggregatedSales::new();
    let mut record = ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => {
                if let csv::ErrorKind::Io(_) = error.kind() {
                    return Err(ToolError::load(origin, error));
                }
                let line = error.position().map(|pos| pos.line()).unwrap_or_default();
                warn!(line, %error, "skipping unreadable sales row");
                sales.record_skipped(line, error.to_string());
                continue;
            }
        }

        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        if record.iter().all(|field| field.trim_ascii().is_empty()) {
            continue;
        }

        match parse_record(&record, headers.len(), article_idx, quantity_idx) {
            Ok(parsed) => sales.add(parsed),
            Err(reason) => {
                debug!(line, %reason, "skipping malformed sales row");
                sales.record_skipped(line, reason);
            }
        }
    }

    if sales.is_empty() {
        let reason = match sales.skipped().len() {
            0 => "file contains no data rows".to_string(),
            skipped => format!("all {skipped} data rows were malformed"),
        };
        return Err(ToolError::load(origin, reason));
    }

    Ok(sales)
}

fn header_name(field: &[u8]) -> String {
    String::from_utf8_lossy(field)
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}

fn column_index(headers: &[String], name: &str, origin: &Path) -> Result<usize> {
    let name = name.trim();
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| {
            ToolError::from(SchemaError {
                input: InputKind::Sales,
                column: name.to_string(),
                path: origin.to_path_buf(),
            })
        })
}

fn parse_record(
    record: &ByteRecord,
    expected_fields: usize,
    article_idx: usize,
    quantity_idx: usize,
) -> std::result::Result<SalesRecord, String> {
    if record.len() != expected_fields {
        return Err(format!(
            "expected {expected_fields} fields, found {}",
            record.len()
        ));
    }

    let article = field_str(record, article_idx, "article")?.trim();
    if article.is_empty() {
        return Err("article is blank".to_string());
    }

    let quantity = field_str(record, quantity_idx, "quantity")?;
    let quantity = parse_quantity(quantity)?;

    Ok(SalesRecord {
        article: article.to_string(),
        quantity,
    })
}

fn field_str<'r>(record: &'r ByteRecord, idx: usize, name: &str) -> std::result::Result<&'r str, String> {
    let bytes = record
        .get(idx)
        .ok_or_else(|| format!("{name} field is missing"))?;
    std::str::from_utf8(bytes).map_err(|_| format!("{name} field is not valid UTF-8"))
}

/// Parses a quantity cell. Integral decimals such as `3.0` or `3,0` are
/// accepted; fractions, negatives, and text are rejected.
fn parse_quantity(raw: &str) -> std::result::Result<u64, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("quantity is blank".to_string());
    }
    if let Ok(quantity) = value.parse::<u64>() {
        return Ok(quantity);
    }

    let number = value
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| format!("quantity '{value}' is not a number"))?;
    if !number.is_finite() || number.fract() != 0.0 {
        return Err(format!("quantity '{value}' is not a whole number"));
    }
    if number < 0.0 {
        return Err(format!("quantity '{value}' is negative"));
    }
    if number > u64::MAX as f64 {
        return Err(format!("quantity '{value}' is too large"));
    }
    Ok(number as u64)
}
