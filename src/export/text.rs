use std::fmt::Write as _;
use std::path::Path;

use crate::error::ExportError;
use crate::records::{ExtractedRecord, RecordSet, Shape, METADATA_KEY};

use super::{with_suffix, ExportReport};

const RULE_WIDTH: usize = 50;

/// Render the human-readable report: one section per non-empty category.
pub fn render(set: &RecordSet) -> String {
    let mut out = String::new();

    if let Some(meta) = set.metadata() {
        section(&mut out, METADATA_KEY);
        let _ = writeln!(out, "extraction_timestamp: {}", meta.extraction_timestamp);
        let _ = writeln!(out, "pipeline_version: {}", meta.pipeline_version);
    }

    for (category, records) in set.non_empty() {
        section(&mut out, category.as_str());
        match category.shape() {
            Some(Shape::Text) | Some(Shape::Fields) => {
                for (i, record) in records.iter().enumerate() {
                    let _ = writeln!(out, "{}. {}", i + 1, line(record));
                }
            }
            Some(Shape::Table) => {
                let tables = records.iter().filter_map(|r| match r {
                    ExtractedRecord::Table { rows } => Some(rows),
                    _ => None,
                });
                for (i, rows) in tables.enumerate() {
                    let _ = writeln!(out, "Table {}:", i + 1);
                    for row in rows {
                        let _ = writeln!(out, "  {}", row.join(", "));
                    }
                    out.push('\n');
                }
            }
            None => {}
        }
    }
    out
}

fn section(out: &mut String, title: &str) {
    let _ = write!(out, "\n{}:\n{}\n", title, "=".repeat(RULE_WIDTH));
}

fn line(record: &ExtractedRecord) -> String {
    match record.as_text() {
        Some(text) => text.to_string(),
        None => record
            .fields()
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

pub fn export(set: &RecordSet, base: &Path) -> Result<ExportReport, ExportError> {
    let path = with_suffix(base, ".txt");
    std::fs::write(&path, render(set)).map_err(|e| ExportError::write_failed("text", e))?;
    Ok(ExportReport {
        files: vec![path],
        written: set.non_empty().map(|(c, _)| c).collect(),
        failed: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::sample_set;

    #[test]
    fn sections_per_shape() {
        let text = render(&sample_set());
        assert!(text.starts_with("\n_metadata:\n"));
        assert!(text.contains("\nTitles:\n==================================================\n1. Coffee gear\n2. Grinders\n"));
        assert!(text.contains("1. title: Espresso Machine, price: €1234.56\n2. image: /img/grinder.jpg\n"));
        assert!(text.contains("Table 1:\n  Model, Price\n  Basic, $1234.56\n\nTable 2:\n  x\n\n"));
        assert!(!text.contains("Paragraphs"));
    }

    #[test]
    fn writes_txt_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = export(&sample_set(), &dir.path().join("r")).unwrap();
        assert_eq!(report.files[0], dir.path().join("r.txt"));
        assert_eq!(report.written.len(), 3);
    }
}
