//! Writing a finished record set to CSV, JSON, XLSX or plain text.

pub mod csv;
pub mod json;
pub mod text;
pub mod xlsx;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{error, info};

use crate::error::ExportError;
use crate::records::{Category, ExtractedRecord, RecordSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One delimited file per category.
    Csv,
    /// All categories in one document.
    Json,
    /// One sheet per category.
    Excel,
    /// Human-readable sections.
    Text,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Excel => "excel",
            OutputFormat::Text => "text",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "excel" | "xlsx" => Ok(OutputFormat::Excel),
            "text" | "txt" | "texte" => Ok(OutputFormat::Text),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// What one export produced. Categories missing from both lists were empty.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub files: Vec<PathBuf>,
    pub written: Vec<Category>,
    pub failed: Vec<(Category, String)>,
}

impl ExportReport {
    fn record(&mut self, category: Category, result: Result<(), ExportError>) {
        match result {
            Ok(()) => self.written.push(category),
            Err(e) => {
                error!("Export of {} failed: {}", category, e);
                self.failed.push((category, e.to_string()));
            }
        }
    }
}

pub struct Exporter {
    output_dir: PathBuf,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write `set` in `format`, naming files after `source_url`'s host.
    /// Empty categories are skipped; a failing category does not stop the rest.
    pub fn export(
        &self,
        set: &RecordSet,
        format: OutputFormat,
        source_url: &str,
    ) -> Result<ExportReport, ExportError> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| ExportError::write_failed("output directory", e))?;

        let base = self.output_dir.join(base_filename(source_url));
        let report = match format {
            OutputFormat::Csv => csv::export(set, &base),
            OutputFormat::Json => json::export(set, &base)?,
            OutputFormat::Excel => xlsx::export(set, &base)?,
            OutputFormat::Text => text::export(set, &base)?,
        };

        for file in &report.files {
            info!("Data exported to {}", file.display());
        }
        Ok(report)
    }
}

/// `scraping_<host>_<YYYYmmdd-HHMMSS>`, host without a leading `www.`.
pub fn base_filename(source_url: &str) -> String {
    let host = url::Url::parse(source_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    let host = host.strip_prefix("www.").unwrap_or(&host);
    format!(
        "scraping_{}_{}",
        host,
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    )
}

/// `base` with `suffix` appended to its file name.
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Column names of a field-shaped category: every field seen, first-seen order.
pub(crate) fn field_columns(records: &[ExtractedRecord]) -> Vec<&'static str> {
    let mut columns: Vec<&'static str> = Vec::new();
    for record in records {
        for (name, _) in record.fields() {
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
    }
    columns
}

/// Values of `record` laid out under `columns`; absent fields are empty.
pub(crate) fn field_row<'a>(record: &'a ExtractedRecord, columns: &[&str]) -> Vec<&'a str> {
    let fields = record.fields();
    columns
        .iter()
        .map(|col| {
            fields
                .iter()
                .find(|(name, _)| name == col)
                .map(|(_, v)| *v)
                .unwrap_or("")
        })
        .collect()
}

/// Tables flattened to rows: a `Table N` marker, the rows, then a blank row.
pub(crate) fn table_grid(records: &[ExtractedRecord]) -> Vec<Vec<String>> {
    let mut grid = Vec::new();
    let tables = records.iter().filter_map(|r| match r {
        ExtractedRecord::Table { rows } => Some(rows),
        _ => None,
    });
    for (idx, rows) in tables.enumerate() {
        grid.push(vec![format!("Table {}", idx + 1)]);
        grid.extend(rows.iter().cloned());
        grid.push(Vec::new());
    }
    grid
}

// ── Tests ──

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_set() -> RecordSet {
        let mut set = RecordSet::new();
        set.insert(
            Category::Titles,
            vec![
                ExtractedRecord::Text { text: "Coffee gear".into() },
                ExtractedRecord::Text { text: "Grinders".into() },
            ],
        );
        set.insert(Category::Paragraphs, vec![]);
        set.insert(
            Category::Products,
            vec![
                ExtractedRecord::Product {
                    title: Some("Espresso Machine".into()),
                    price: Some("€1234.56".into()),
                    image: None,
                },
                ExtractedRecord::Product {
                    title: None,
                    price: None,
                    image: Some("/img/grinder.jpg".into()),
                },
            ],
        );
        set.insert(
            Category::Tables,
            vec![
                ExtractedRecord::Table {
                    rows: vec![vec!["Model".into(), "Price".into()], vec!["Basic".into(), "$1234.56".into()]],
                },
                ExtractedRecord::Table { rows: vec![vec!["x".into()]] },
            ],
        );
        set.set_metadata(crate::records::Metadata::now());
        set
    }

    #[test]
    fn format_names() {
        assert_eq!("XLSX".parse::<OutputFormat>().unwrap(), OutputFormat::Excel);
        assert_eq!("Texte".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!(matches!(
            "parquet".parse::<OutputFormat>(),
            Err(ExportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn filename_from_host() {
        let name = base_filename("https://www.example.com/shop?page=2");
        assert!(name.starts_with("scraping_example.com_"));
        assert_eq!(name.len(), "scraping_example.com_".len() + "20240101-120000".len());
    }

    #[test]
    fn field_columns_union_in_first_seen_order() {
        let set = sample_set();
        let products = set.get(Category::Products).unwrap();
        let columns = field_columns(products);
        assert_eq!(columns, vec!["title", "price", "image"]);
        assert_eq!(field_row(&products[1], &columns), vec!["", "", "/img/grinder.jpg"]);
    }

    #[test]
    fn tables_flatten_with_markers() {
        let set = sample_set();
        let grid = table_grid(set.get(Category::Tables).unwrap());
        assert_eq!(grid[0], vec!["Table 1".to_string()]);
        assert_eq!(grid[3], Vec::<String>::new());
        assert_eq!(grid[4], vec!["Table 2".to_string()]);
        assert_eq!(grid.len(), 7);
    }

    #[test]
    fn unwritable_output_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let exporter = Exporter::new(blocker.join("sub"));
        let err = exporter
            .export(&sample_set(), OutputFormat::Json, "https://example.com")
            .unwrap_err();
        assert!(matches!(err, ExportError::WriteFailed { .. }));
    }
}
