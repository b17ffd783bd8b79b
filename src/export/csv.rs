use std::path::Path;

use crate::error::ExportError;
use crate::records::{Category, ExtractedRecord, RecordSet, Shape};

use super::{field_columns, field_row, table_grid, with_suffix, ExportReport};

/// One `<base>_<Category>.csv` per non-empty category. Metadata is not written.
pub fn export(set: &RecordSet, base: &Path) -> ExportReport {
    let mut report = ExportReport::default();
    for (category, records) in set.non_empty() {
        let path = with_suffix(base, &format!("_{}.csv", category));
        let result = write_category(&path, category, records);
        if result.is_ok() {
            report.files.push(path);
        }
        report.record(category, result);
    }
    report
}

fn write_category(
    path: &Path,
    category: Category,
    records: &[ExtractedRecord],
) -> Result<(), ExportError> {
    let fail = |e: csv::Error| ExportError::write_failed(category.as_str(), e);
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(fail)?;

    match category.shape() {
        Some(Shape::Text) => {
            writer.write_record([category.as_str()]).map_err(fail)?;
            for record in records {
                writer
                    .write_record([record.as_text().unwrap_or_default()])
                    .map_err(fail)?;
            }
        }
        Some(Shape::Fields) => {
            let columns = field_columns(records);
            writer.write_record(&columns).map_err(fail)?;
            for record in records {
                writer.write_record(field_row(record, &columns)).map_err(fail)?;
            }
        }
        Some(Shape::Table) => {
            for row in table_grid(records) {
                writer.write_record(&row).map_err(fail)?;
            }
        }
        None => {}
    }

    writer
        .flush()
        .map_err(|e| ExportError::write_failed(category.as_str(), e))
}
