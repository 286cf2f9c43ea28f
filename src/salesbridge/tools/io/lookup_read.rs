use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};
use tracing::{debug, info, instrument, warn};

use crate::salesbridge::tools::config::LookupConfig;
use crate::salesbridge::tools::error::{InputKind, Result, SchemaError, ToolError};
use crate::salesbridge::tools::io::cells::cell_to_string;
use crate::salesbridge::tools::model::{LookupEntry, LookupTable};

/// Reads the article → UID lookup workbook into memory.
///
/// The first non-empty row of the sheet is the header. When an article is
/// listed more than once the first row wins; later conflicting rows are
/// recorded as duplicates.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_lookup(path: &Path, config: &LookupConfig) -> Result<LookupTable> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|error| ToolError::lookup(path, error))?;
    let range = read_lookup_sheet(&mut workbook, config.sheet.as_deref(), path)?;
    let table = build_table(&range, config, path)?;

    for duplicate in table.duplicates() {
        warn!(
            article = %duplicate.article,
            kept = %duplicate.kept,
            ignored = %duplicate.ignored,
            "duplicate article in lookup workbook; keeping first entry"
        );
    }
    info!(
        entries = table.len(),
        duplicates = table.duplicates().len(),
        blank_rows = table.blank_rows(),
        "loaded lookup workbook"
    );
    Ok(table)
}

fn read_lookup_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    sheet: Option<&str>,
    path: &Path,
) -> Result<Range<DataType>> {
    let range_result = match sheet {
        Some(name) => workbook
            .worksheet_range(name)
            .ok_or_else(|| ToolError::lookup(path, format!("missing sheet '{name}'")))?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ToolError::lookup(path, "workbook has no worksheets"))?,
    };
    range_result.map_err(|error| ToolError::lookup(path, error))
}

fn build_table(range: &Range<DataType>, config: &LookupConfig, path: &Path) -> Result<LookupTable> {
    let mut rows = range
        .rows()
        .skip_while(|row| row.iter().all(|cell| cell_to_string(Some(cell)).is_empty()));

    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_to_string(Some(cell)))
            .collect(),
        None => Vec::new(),
    };

    let article_idx = column_index(&headers, &config.article_column, path)?;
    let id_idx = column_index(&headers, &config.canonical_id_column, path)?;
    debug!(article_idx, id_idx, "resolved lookup columns");

    let mut table = LookupTable::new();
    for row in rows {
        let article = cell_to_string(row.get(article_idx));
        let canonical_id = cell_to_string(row.get(id_idx));
        if article.is_empty() || canonical_id.is_empty() {
            table.record_blank_row();
            continue;
        }
        table.insert(LookupEntry {
            article,
            canonical_id,
        });
    }
    Ok(table)
}

fn column_index(headers: &[String], name: &str, path: &Path) -> Result<usize> {
    let name = name.trim();
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| {
            ToolError::from(SchemaError {
                input: InputKind::Lookup,
                column: name.to_string(),
                path: path.to_path_buf(),
            })
        })
}
