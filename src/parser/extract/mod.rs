pub mod images;
pub mod links;
pub mod prices;
pub mod products;
pub mod tables;
pub mod text;

use tracing::debug;

use super::PageDocument;
use crate::error::ParseError;
use crate::records::{Category, ExtractedRecord, RecordSet};

/// Extract the requested categories from one page. Only a blank document
/// fails; missing sub-fields are absent fields or omitted records.
pub fn extract(html: &str, categories: &[Category]) -> Result<RecordSet, ParseError> {
    let doc = PageDocument::parse(html)?;
    let mut set = RecordSet::new();

    for &category in categories {
        if set.get(category).is_some() {
            continue;
        }
        match extract_category(&doc, category) {
            Some(records) => set.insert(category, records),
            None => debug!("{} is counted but not extracted, skipping", category),
        }
    }

    Ok(set)
}

fn extract_category(doc: &PageDocument, category: Category) -> Option<Vec<ExtractedRecord>> {
    let records = match category {
        Category::Titles => text::titles(doc),
        Category::Paragraphs => text::paragraphs(doc),
        Category::Links => links::extract(doc),
        Category::Images => images::extract(doc),
        Category::Tables => tables::extract(doc),
        Category::Prices => prices::extract(doc),
        Category::Products => products::extract(doc),
        Category::Lists | Category::Forms => return None,
    };
    Some(records)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn only_requested_categories_populated() {
        let set = extract(&fixture("shop"), &[Category::Links, Category::Prices]).unwrap();
        assert_eq!(set.categories(), vec![Category::Links, Category::Prices]);
        assert!(set.get(Category::Titles).is_none());
    }

    #[test]
    fn duplicate_and_unextracted_categories_ignored() {
        let set = extract(
            "<ul><li>a</li></ul><h1>T</h1>",
            &[Category::Titles, Category::Lists, Category::Titles],
        )
        .unwrap();
        assert_eq!(set.categories(), vec![Category::Titles]);
        assert_eq!(set.total_records(), 1);
    }

    #[test]
    fn blank_html_fails() {
        assert!(extract("", &[Category::Titles]).is_err());
    }

    #[test]
    fn shop_fixture_products() {
        let set = extract(&fixture("shop"), &[Category::Products]).unwrap();
        let products = set.get(Category::Products).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(
            products[0],
            ExtractedRecord::Product {
                title: Some("Espresso Machine".into()),
                price: Some("€1.234,56".into()),
                image: Some("/img/espresso.jpg".into()),
            }
        );
        assert_eq!(
            products[1],
            ExtractedRecord::Product {
                title: None,
                price: None,
                image: Some("/img/grinder.jpg".into()),
            }
        );
    }

    #[test]
    fn shop_fixture_tables() {
        let set = extract(&fixture("shop"), &[Category::Tables]).unwrap();
        let tables = set.get(Category::Tables).unwrap();
        assert_eq!(tables.len(), 1);
        assert!(matches!(&tables[0], ExtractedRecord::Table { rows } if rows.len() == 2));
    }

    #[test]
    fn blog_fixture_text() {
        let set = extract(&fixture("blog"), &[Category::Titles, Category::Paragraphs, Category::Links])
            .unwrap();
        let titles: Vec<_> = set
            .get(Category::Titles)
            .unwrap()
            .iter()
            .filter_map(|r| r.as_text())
            .collect();
        assert_eq!(titles, vec!["Release notes", "Version 2.0", ""]);
        assert_eq!(set.get(Category::Paragraphs).unwrap().len(), 3);
        assert_eq!(set.get(Category::Links).unwrap().len(), 2);
    }
}
