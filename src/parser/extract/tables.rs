use std::sync::LazyLock;

use scraper::Selector;

use crate::parser::{element_text, PageDocument};
use crate::records::ExtractedRecord;

static TABLES: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROWS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELLS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());

/// One record per table with at least one non-empty row; rows without
/// any cell are dropped.
pub fn extract(doc: &PageDocument) -> Vec<ExtractedRecord> {
    doc.html()
        .select(&TABLES)
        .filter_map(|table| {
            let rows: Vec<Vec<String>> = table
                .select(&ROWS)
                .map(|tr| tr.select(&CELLS).map(element_text).collect::<Vec<_>>())
                .filter(|row| !row.is_empty())
                .collect();
            (!rows.is_empty()).then_some(ExtractedRecord::Table { rows })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_row_dropped() {
        let doc = PageDocument::parse(
            "<table><tr></tr><tr><td> a </td><th>b</th></tr></table>",
        )
        .unwrap();
        assert_eq!(
            extract(&doc),
            vec![ExtractedRecord::Table {
                rows: vec![vec!["a".into(), "b".into()]]
            }]
        );
    }

    #[test]
    fn table_without_rows_omitted() {
        let doc = PageDocument::parse("<table><tr></tr></table><table></table>").unwrap();
        assert!(extract(&doc).is_empty());
    }

    #[test]
    fn blank_cells_still_form_a_row() {
        let doc = PageDocument::parse("<table><tr><td></td></tr></table>").unwrap();
        assert_eq!(extract(&doc).len(), 1);
    }
}
