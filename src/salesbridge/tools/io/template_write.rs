use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use umya_spreadsheet::{Spreadsheet, reader, writer};

use crate::salesbridge::tools::config::{MAX_ROW, TemplateConfig};
use crate::salesbridge::tools::error::{Result, ToolError};
use crate::salesbridge::tools::model::OutputRow;

/// Template workbook held in memory with every part of the file intact:
/// styles, merged ranges, column widths, and formulas.
struct TemplateWorkbook {
    path: PathBuf,
    book: Spreadsheet,
    target: usize,
    target_name: String,
}

/// Rows placed into the output workbook. Row numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub rows_written: usize,
    pub first_row: Option<u32>,
    pub last_row: Option<u32>,
}

/// Fills a copy of the template with the given rows and writes it to
/// `destination`. The template file is only read.
#[instrument(
    level = "info",
    skip_all,
    fields(template = %template.display(), destination = %destination.display(), rows = rows.len())
)]
pub fn write_filled_template(
    template: &Path,
    destination: &Path,
    rows: &[OutputRow],
    config: &TemplateConfig,
) -> Result<WriteSummary> {
    if config.start_row == 0 || config.id_column == 0 || config.quantity_column == 0 {
        return Err(ToolError::template(
            template,
            "template rows and columns are 1-based",
        ));
    }
    ensure_distinct(template, destination)?;
    let summary = plan_rows(rows, config, destination)?;

    let mut source = load_template(template, config)?;
    fill_template(&mut source, rows, config)?;
    save_replacing(&source.book, destination)?;
    info!(
        rows_written = summary.rows_written,
        sheet = %source.target_name,
        "output workbook written"
    );
    Ok(summary)
}

/// Computes the rows the data will occupy. Data that would run past the
/// last worksheet row cannot be stored at the destination.
fn plan_rows(rows: &[OutputRow], config: &TemplateConfig, destination: &Path) -> Result<WriteSummary> {
    if rows.is_empty() {
        return Ok(WriteSummary {
            rows_written: 0,
            first_row: None,
            last_row: None,
        });
    }

    let last_row = u64::from(config.start_row) + rows.len() as u64 - 1;
    if last_row > u64::from(MAX_ROW) {
        return Err(ToolError::write(
            destination,
            format!(
                "{} rows starting at row {} exceed the worksheet limit of {MAX_ROW} rows",
                rows.len(),
                config.start_row
            ),
        ));
    }
    Ok(WriteSummary {
        rows_written: rows.len(),
        first_row: Some(config.start_row),
        last_row: Some(last_row as u32),
    })
}

fn load_template(path: &Path, config: &TemplateConfig) -> Result<TemplateWorkbook> {
    let book = reader::xlsx::read(path).map_err(|error| ToolError::template(path, error))?;
    let names: Vec<String> = book
        .get_sheet_collection()
        .iter()
        .map(|sheet| sheet.get_name().to_string())
        .collect();
    if names.is_empty() {
        return Err(ToolError::template(path, "workbook has no worksheets"));
    }

    let target = match &config.sheet {
        Some(name) => names
            .iter()
            .position(|candidate| candidate == name)
            .ok_or_else(|| ToolError::template(path, format!("missing sheet '{name}'")))?,
        None => 0,
    };
    debug!(sheets = names.len(), target, "template loaded");

    Ok(TemplateWorkbook {
        path: path.to_path_buf(),
        book,
        target,
        target_name: names[target].clone(),
    })
}

/// Places the rows on the target sheet. Every other cell, including
/// template cells inside the data region, is left as it was.
fn fill_template(template: &mut TemplateWorkbook, rows: &[OutputRow], config: &TemplateConfig) -> Result<()> {
    let id_col = u32::from(config.id_column);
    let quantity_col = u32::from(config.quantity_column);

    let sheet = template
        .book
        .get_sheet_mut(&template.target)
        .ok_or_else(|| {
            ToolError::template(
                &template.path,
                format!("missing sheet '{}'", template.target_name),
            )
        })?;
    for (offset, row) in rows.iter().enumerate() {
        let row_idx = config.start_row + offset as u32;
        sheet
            .get_cell_mut((id_col, row_idx))
            .set_value_string(row.canonical_id.clone());
        sheet
            .get_cell_mut((quantity_col, row_idx))
            .set_value_number(row.quantity as f64);
    }

    // The modification stamp otherwise differs between runs on the same inputs.
    let properties = template.book.get_properties_mut();
    let created = properties.get_created().to_string();
    properties.set_modified(created);
    Ok(())
}

fn ensure_distinct(template: &Path, destination: &Path) -> Result<()> {
    let same = match (fs::canonicalize(template), fs::canonicalize(destination)) {
        (Ok(lhs), Ok(rhs)) => lhs == rhs,
        _ => template == destination,
    };
    if same {
        return Err(ToolError::write(
            destination,
            "destination is the template itself",
        ));
    }
    Ok(())
}

/// Writes the workbook next to `destination` and moves it into place in one
/// step, so a failed run never leaves a partially written file behind.
fn save_replacing(book: &Spreadsheet, destination: &Path) -> Result<()> {
    let file_name = destination
        .file_name()
        .ok_or_else(|| ToolError::write(destination, "destination has no file name"))?;
    let mut staging_name = std::ffi::OsString::from(".");
    staging_name.push(file_name);
    staging_name.push(".partial");
    let staging = destination.with_file_name(staging_name);

    if let Err(error) = writer::xlsx::write(book, &staging) {
        discard_staging(&staging);
        return Err(ToolError::write(destination, error));
    }
    if let Err(error) = fs::rename(&staging, destination) {
        discard_staging(&staging);
        return Err(ToolError::write(destination, error));
    }
    debug!(staging = %staging.display(), "output workbook persisted");
    Ok(())
}

fn discard_staging(staging: &Path) {
    match fs::remove_file(staging) {
        Ok(()) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => {
            warn!(staging = %staging.display(), %error, "failed to remove staging file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{DataType, Range, Reader, Xlsx, open_workbook};
    use rust_xlsxwriter::{Format, Workbook};
    use tempfile::tempdir;

    fn write_template(path: &Path) {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Документ").expect("sheet named");
        sheet
            .write_string_with_format(0, 0, "Поступление товаров", &bold)
            .expect("title written");
        sheet
            .merge_range(1, 0, 1, 5, "Реквизиты", &bold)
            .expect("range merged");
        sheet
            .write_formula(2, 0, "=SUM(R11:R100)")
            .expect("formula written");
        sheet.set_column_width(3, 30).expect("width set");
        sheet.write_number(2, 1, 2024.0).expect("number written");
        sheet.write_string(9, 3, "UID").expect("header written");
        sheet.write_string(9, 17, "Количество").expect("header written");
        let notes = workbook.add_worksheet();
        notes.set_name("Notes").expect("sheet named");
        notes.write_string(0, 0, "keep me").expect("note written");
        workbook.save(path).expect("template saved");
    }

    fn read_sheet(path: &Path, name: &str) -> Range<DataType> {
        let mut workbook: Xlsx<_> = open_workbook(path).expect("output opened");
        workbook
            .worksheet_range(name)
            .expect("sheet present")
            .expect("sheet readable")
    }

    fn rows() -> Vec<OutputRow> {
        vec![
            OutputRow {
                canonical_id: "UID-100".into(),
                quantity: 5,
            },
            OutputRow {
                canonical_id: "UID-200".into(),
                quantity: 12,
            },
        ]
    }

    #[test]
    fn writes_rows_from_the_start_row_and_keeps_template_cells() {
        let dir = tempdir().expect("temporary directory");
        let template = dir.path().join("template.xlsx");
        let output = dir.path().join("out.xlsx");
        write_template(&template);
        let before = fs::read(&template).expect("template read");

        let summary = write_filled_template(&template, &output, &rows(), &TemplateConfig::default())
            .expect("template filled");

        assert_eq!(
            summary,
            WriteSummary {
                rows_written: 2,
                first_row: Some(11),
                last_row: Some(12),
            }
        );
        let sheet = read_sheet(&output, "Документ");
        assert_eq!(
            sheet.get_value((0, 0)),
            Some(&DataType::String("Поступление товаров".into()))
        );
        assert_eq!(sheet.get_value((2, 1)), Some(&DataType::Float(2024.0)));
        assert_eq!(sheet.get_value((10, 3)), Some(&DataType::String("UID-100".into())));
        assert_eq!(sheet.get_value((10, 17)), Some(&DataType::Float(5.0)));
        assert_eq!(sheet.get_value((11, 3)), Some(&DataType::String("UID-200".into())));
        assert_eq!(sheet.get_value((11, 17)), Some(&DataType::Float(12.0)));

        let notes = read_sheet(&output, "Notes");
        assert_eq!(notes.get_value((0, 0)), Some(&DataType::String("keep me".into())));
        assert_eq!(fs::read(&template).expect("template read"), before);
        assert!(!dir.path().join(".out.xlsx.partial").exists());
    }

    #[test]
    fn keeps_formulas_merged_ranges_and_column_widths() {
        let dir = tempdir().expect("temporary directory");
        let template = dir.path().join("template.xlsx");
        let output = dir.path().join("out.xlsx");
        write_template(&template);

        write_filled_template(&template, &output, &rows(), &TemplateConfig::default())
            .expect("template filled");

        let mut workbook: Xlsx<_> = open_workbook(&output).expect("output opened");
        let formulas = workbook
            .worksheet_formula("Документ")
            .expect("sheet present")
            .expect("formulas readable");
        assert_eq!(
            formulas.get_value((2, 0)).map(|formula| formula.trim_start_matches('=')),
            Some("SUM(R11:R100)")
        );

        let book = reader::xlsx::read(&output).expect("output read");
        let sheet = book.get_sheet(&0).expect("first sheet");
        let merged: Vec<String> = sheet
            .get_merge_cells()
            .iter()
            .map(|range| range.get_range())
            .collect();
        assert_eq!(merged, vec!["A2:F2".to_string()]);
        assert!(sheet.get_column_dimension("D").is_some());
    }

    #[test]
    fn honours_configured_layout_and_sheet() {
        let dir = tempdir().expect("temporary directory");
        let template = dir.path().join("template.xlsx");
        let output = dir.path().join("out.xlsx");
        write_template(&template);
        let config = TemplateConfig {
            sheet: Some("Notes".into()),
            start_row: 3,
            id_column: 1,
            quantity_column: 2,
        };

        write_filled_template(&template, &output, &rows()[..1], &config).expect("template filled");

        let notes = read_sheet(&output, "Notes");
        assert_eq!(notes.get_value((2, 0)), Some(&DataType::String("UID-100".into())));
        assert_eq!(notes.get_value((2, 1)), Some(&DataType::Float(5.0)));
        let main = read_sheet(&output, "Документ");
        assert_eq!(main.get_value((10, 3)), None);
    }

    #[test]
    fn zero_rows_still_produce_an_output() {
        let dir = tempdir().expect("temporary directory");
        let template = dir.path().join("template.xlsx");
        let output = dir.path().join("out.xlsx");
        write_template(&template);

        let summary = write_filled_template(&template, &output, &[], &TemplateConfig::default())
            .expect("template filled");

        assert_eq!(summary.rows_written, 0);
        assert_eq!(summary.first_row, None);
        assert!(output.exists());
    }

    #[test]
    fn unreadable_template_is_a_template_error() {
        let dir = tempdir().expect("temporary directory");
        let output = dir.path().join("out.xlsx");

        let result = write_filled_template(
            &dir.path().join("missing.xlsx"),
            &output,
            &rows(),
            &TemplateConfig::default(),
        );

        assert!(matches!(result, Err(ToolError::Template { .. })));
        assert!(!output.exists());
    }

    #[test]
    fn zero_based_layout_is_a_template_error() {
        let dir = tempdir().expect("temporary directory");
        let template = dir.path().join("template.xlsx");
        let output = dir.path().join("out.xlsx");
        write_template(&template);
        let config = TemplateConfig {
            id_column: 0,
            ..TemplateConfig::default()
        };

        let error = write_filled_template(&template, &output, &rows(), &config)
            .expect_err("column 0 rejected");

        assert!(matches!(error, ToolError::Template { .. }));
        assert_eq!(error.stage(), crate::salesbridge::tools::error::Stage::Write);
        assert!(!output.exists());
    }

    #[test]
    fn rows_past_the_sheet_limit_are_a_write_error() {
        let dir = tempdir().expect("temporary directory");
        let template = dir.path().join("template.xlsx");
        let output = dir.path().join("out.xlsx");
        write_template(&template);
        let config = TemplateConfig {
            start_row: MAX_ROW,
            ..TemplateConfig::default()
        };

        let result = write_filled_template(&template, &output, &rows(), &config);

        assert!(matches!(result, Err(ToolError::Write { .. })));
        assert!(!output.exists());

        let fits = write_filled_template(&template, &output, &rows()[..1], &config)
            .expect("last row is usable");
        assert_eq!(fits.last_row, Some(MAX_ROW));
    }

    #[test]
    fn unwritable_destination_is_a_write_error() {
        let dir = tempdir().expect("temporary directory");
        let template = dir.path().join("template.xlsx");
        write_template(&template);

        let missing_dir = dir.path().join("nope").join("out.xlsx");
        let result = write_filled_template(&template, &missing_dir, &rows(), &TemplateConfig::default());
        assert!(matches!(result, Err(ToolError::Write { .. })));

        let result = write_filled_template(&template, &template, &rows(), &TemplateConfig::default());
        assert!(matches!(result, Err(ToolError::Write { .. })));
    }
}
