use std::fmt;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::{class_matches, descendant_elements, price_nodes, PRODUCT_CLASS_RE};
use crate::records::Category;

static HEADINGS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1, h2, h3").unwrap());
static PARAGRAPHS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static LINKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static IMAGES: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").unwrap());
static TABLES: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static LISTS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("ul, ol").unwrap());
static FORMS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());

/// Advisory occurrence counts per category for one document.
///
/// The seven element categories are always present (possibly zero);
/// Products and Prices appear only when something matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryCount {
    counts: Vec<(Category, usize)>,
}

impl CategoryCount {
    pub fn get(&self, category: Category) -> usize {
        self.counts
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, usize)> + '_ {
        self.counts.iter().copied()
    }

    /// Categories with at least one occurrence, in report order.
    pub fn available(&self) -> Vec<Category> {
        self.counts
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(c, _)| *c)
            .collect()
    }
}

impl fmt::Display for CategoryCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (category, n) in self.counts.iter().filter(|(_, n)| *n > 0) {
            writeln!(f, "- {} ({} found)", category, n)?;
        }
        Ok(())
    }
}

impl Serialize for CategoryCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (category, n) in &self.counts {
            map.serialize_entry(category.as_str(), n)?;
        }
        map.end()
    }
}

/// Classify a document's addressable categories.
pub fn analyze(html: &str) -> CategoryCount {
    let doc = Html::parse_document(html);
    let count = |sel: &Selector| doc.select(sel).count();

    let mut counts = vec![
        (Category::Titles, count(&HEADINGS)),
        (Category::Paragraphs, count(&PARAGRAPHS)),
        (Category::Links, count(&LINKS)),
        (Category::Images, count(&IMAGES)),
        (Category::Tables, count(&TABLES)),
        (Category::Lists, count(&LISTS)),
        (Category::Forms, count(&FORMS)),
    ];

    let root = doc.root_element();
    let products = std::iter::once(root)
        .chain(descendant_elements(root))
        .filter(|el| class_matches(*el, &PRODUCT_CLASS_RE))
        .count();
    if products > 0 {
        counts.push((Category::Products, products));
    }

    let prices = price_nodes(root).count();
    if prices > 0 {
        counts.push((Category::Prices, prices));
    }

    CategoryCount { counts }
}

// ── Tests ──
