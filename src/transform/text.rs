use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::info;

use super::map_strings;
use crate::records::{ExtractedRecord, RecordSet};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip tag-shaped substrings, collapse whitespace, trim.
pub fn clean_text(text: &str) -> String {
    let stripped = TAG_RE.replace_all(text, "");
    SPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Stage 1. Also drops what cleaning empties: blank text records, tables
/// rows with only blank cells (and tables left without rows), blank
/// product fields and products left without any field.
pub fn clean_text_fields(set: &RecordSet) -> Result<RecordSet> {
    info!("Cleaning text fields");
    let mut out = map_strings(set, clean_text);
    for (_, records) in out.iter_mut() {
        records.retain_mut(prune);
    }
    Ok(out)
}

fn prune(record: &mut ExtractedRecord) -> bool {
    match record {
        ExtractedRecord::Text { text } | ExtractedRecord::Price { text } => !text.is_empty(),
        ExtractedRecord::Table { rows } => {
            rows.retain(|row| row.iter().any(|cell| !cell.is_empty()));
            !rows.is_empty()
        }
        ExtractedRecord::Product {
            title,
            price,
            image,
        } => {
            for field in [&mut *title, &mut *price, &mut *image] {
                if field.as_deref().is_some_and(str::is_empty) {
                    *field = None;
                }
            }
            title.is_some() || price.is_some() || image.is_some()
        }
        ExtractedRecord::Link { .. } | ExtractedRecord::Image { .. } => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Category;

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        assert_eq!(clean_text("<b>Hello</b>   world"), "Hello world");
        assert_eq!(clean_text("  a\n\t b  "), "a b");
        assert_eq!(clean_text("<p>a</p>\n\n<br/>b"), "a b");
    }

    #[test]
    fn drops_records_emptied_by_cleaning() {
        let mut set = RecordSet::new();
        set.insert(
            Category::Titles,
            vec![
                ExtractedRecord::Text { text: "<span></span>".into() },
                ExtractedRecord::Text { text: " Kept ".into() },
            ],
        );
        set.insert(
            Category::Tables,
            vec![
                ExtractedRecord::Table {
                    rows: vec![vec!["".into(), " ".into()], vec!["a".into(), "".into()]],
                },
                ExtractedRecord::Table { rows: vec![vec!["<br>".into()]] },
            ],
        );
        set.insert(
            Category::Products,
            vec![
                ExtractedRecord::Product { title: Some("<i></i>".into()), price: None, image: None },
                ExtractedRecord::Product { title: Some(" ".into()), price: Some("$1".into()), image: None },
            ],
        );

        let out = clean_text_fields(&set).unwrap();
        assert_eq!(out.get(Category::Titles).unwrap(), &[ExtractedRecord::Text { text: "Kept".into() }]);
        assert_eq!(
            out.get(Category::Tables).unwrap(),
            &[ExtractedRecord::Table { rows: vec![vec!["a".into(), "".into()]] }]
        );
        assert_eq!(
            out.get(Category::Products).unwrap(),
            &[ExtractedRecord::Product { title: None, price: Some("$1".into()), image: None }]
        );
    }

    #[test]
    fn links_keep_their_shape() {
        let mut set = RecordSet::new();
        set.insert(
            Category::Links,
            vec![ExtractedRecord::Link { text: " Home\n page ".into(), url: " / ".into() }],
        );
        let out = clean_text_fields(&set).unwrap();
        assert_eq!(
            out.get(Category::Links).unwrap(),
            &[ExtractedRecord::Link { text: "Home page".into(), url: "/".into() }]
        );
    }
}
