use std::path::Path;

use rust_xlsxwriter::{ColNum, Format, RowNum, Workbook, Worksheet, XlsxError};

use crate::error::ExportError;
use crate::records::{Category, ExtractedRecord, RecordSet, Shape, METADATA_KEY};

use super::{field_columns, field_row, table_grid, with_suffix, ExportReport};

/// Longest sheet name a workbook accepts.
pub const SHEET_NAME_LIMIT: usize = 31;

pub fn sheet_name(name: &str) -> String {
    name.chars().take(SHEET_NAME_LIMIT).collect()
}

/// One sheet per non-empty category plus a `_metadata` sheet. A sheet that
/// fails to build is left out; the workbook is only saved if a category made it.
pub fn export(set: &RecordSet, base: &Path) -> Result<ExportReport, ExportError> {
    let path = with_suffix(base, ".xlsx");
    let header = Format::new().set_bold();
    let mut workbook = Workbook::new();
    let mut report = ExportReport::default();

    for (category, records) in set.non_empty() {
        let mut sheet = Worksheet::new();
        let result = fill_sheet(&mut sheet, category, records, &header)
            .map_err(|e| ExportError::write_failed(category.as_str(), e));
        if result.is_ok() {
            workbook.push_worksheet(sheet);
        }
        report.record(category, result);
    }

    if report.written.is_empty() {
        return Ok(report);
    }

    if let Some(meta) = set.metadata() {
        let mut sheet = Worksheet::new();
        let filled = sheet.set_name(METADATA_KEY).and_then(|s| {
            s.write_string(0, 0, "extraction_timestamp")?;
            s.write_string(0, 1, meta.extraction_timestamp.as_str())?;
            s.write_string(1, 0, "pipeline_version")?;
            s.write_string(1, 1, meta.pipeline_version.as_str())
        });
        if filled.is_ok() {
            workbook.push_worksheet(sheet);
        }
    }

    workbook
        .save(&path)
        .map_err(|e| ExportError::write_failed("excel", e))?;
    report.files.push(path);
    Ok(report)
}

fn fill_sheet(
    sheet: &mut Worksheet,
    category: Category,
    records: &[ExtractedRecord],
    header: &Format,
) -> Result<(), XlsxError> {
    sheet.set_name(sheet_name(category.as_str()))?;

    match category.shape() {
        Some(Shape::Text) => {
            sheet.write_string_with_format(0, 0, category.as_str(), header)?;
            for (i, record) in records.iter().enumerate() {
                sheet.write_string(row_num(i + 1), 0, record.as_text().unwrap_or_default())?;
            }
        }
        Some(Shape::Fields) => {
            let columns = field_columns(records);
            for (c, name) in columns.iter().enumerate() {
                sheet.write_string_with_format(0, col_num(c), *name, header)?;
            }
            for (i, record) in records.iter().enumerate() {
                for (c, value) in field_row(record, &columns).into_iter().enumerate() {
                    sheet.write_string(row_num(i + 1), col_num(c), value)?;
                }
            }
        }
        Some(Shape::Table) => {
            for (r, row) in table_grid(records).iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    sheet.write_string(row_num(r), col_num(c), cell.as_str())?;
                }
            }
        }
        None => {}
    }
    Ok(())
}

fn row_num(i: usize) -> RowNum {
    RowNum::try_from(i).unwrap_or(RowNum::MAX)
}

fn col_num(i: usize) -> ColNum {
    ColNum::try_from(i).unwrap_or(ColNum::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::sample_set;

    #[test]
    fn sheet_names_truncated() {
        assert_eq!(sheet_name("Titles"), "Titles");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), SHEET_NAME_LIMIT);
    }

    #[test]
    fn workbook_written() {
        let dir = tempfile::tempdir().unwrap();
        let report = export(&sample_set(), &dir.path().join("w")).unwrap();
        assert_eq!(report.written, vec![Category::Titles, Category::Products, Category::Tables]);
        let path = dir.path().join("w.xlsx");
        assert_eq!(report.files, vec![path.clone()]);
        // xlsx is a zip archive
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn nothing_to_write_means_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = export(&RecordSet::new(), &dir.path().join("e")).unwrap();
        assert!(report.files.is_empty());
        assert!(!dir.path().join("e.xlsx").exists());
    }
}
