use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;

use crate::error::ExportError;
use crate::records::RecordSet;

use super::{with_suffix, ExportReport};

/// Every non-empty category plus `_metadata` in one pretty-printed document.
pub fn export(set: &RecordSet, base: &Path) -> Result<ExportReport, ExportError> {
    let path = with_suffix(base, ".json");
    let data = set.without_empty();

    let file = File::create(&path).map_err(|e| ExportError::write_failed("json", e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &data)
        .map_err(|e| ExportError::write_failed("json", e))?;
    writer
        .flush()
        .map_err(|e| ExportError::write_failed("json", e))?;

    Ok(ExportReport {
        files: vec![path],
        written: data.categories(),
        failed: Vec::new(),
    })
}

/// Read a document written by [`export`] back into a record set.
pub fn import(path: &Path) -> anyhow::Result<RecordSet> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    RecordSet::from_json(&value).with_context(|| format!("Failed to load {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::sample_set;
    use crate::records::Category;

    #[test]
    fn round_trip_keeps_keys_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let set = sample_set();
        let report = export(&set, &dir.path().join("scraping_x")).unwrap();

        let back = import(&report.files[0]).unwrap();
        let expected = set.without_empty();
        assert_eq!(back.categories(), expected.categories());
        for (category, records) in expected.iter() {
            assert_eq!(back.get(category).unwrap().len(), records.len(), "{category}");
        }
        assert!(back.get(Category::Paragraphs).is_none());
    }

    #[test]
    fn metadata_first_and_unicode_kept() {
        let dir = tempfile::tempdir().unwrap();
        let report = export(&sample_set(), &dir.path().join("m")).unwrap();
        let raw = std::fs::read_to_string(&report.files[0]).unwrap();
        assert!(raw.trim_start().starts_with("{\n  \"_metadata\""));
        assert!(raw.contains("€1234.56"));
    }
}
