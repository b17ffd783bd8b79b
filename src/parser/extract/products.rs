use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

use crate::parser::{
    class_matches, descendant_elements, element_text, price_nodes, PageDocument, PRODUCT_CLASS_RE,
};
use crate::records::ExtractedRecord;

static TITLE_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)title|name").unwrap());

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5"];

/// One record per product-like container that yields at least one field.
/// Nested containers are each considered on their own.
pub fn extract(doc: &PageDocument) -> Vec<ExtractedRecord> {
    let root = doc.root();
    std::iter::once(root)
        .chain(descendant_elements(root))
        .filter(|el| class_matches(*el, &PRODUCT_CLASS_RE))
        .filter_map(product)
        .collect()
}

fn product(item: ElementRef<'_>) -> Option<ExtractedRecord> {
    let title = find_title(item);

    let price = price_nodes(item)
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string);

    // Only the first image counts, even when it has no usable src.
    let image = descendant_elements(item)
        .find(|el| el.value().name() == "img")
        .and_then(|img| img.value().attr("src"))
        .filter(|src| !src.is_empty())
        .map(str::to_string);

    if title.is_none() && price.is_none() && image.is_none() {
        return None;
    }
    Some(ExtractedRecord::Product {
        title,
        price,
        image,
    })
}

/// Text of the first heading. An empty heading falls back to the first
/// title/name-classed element.
fn find_title(item: ElementRef<'_>) -> Option<String> {
    let heading = descendant_elements(item).find(|el| HEADING_TAGS.contains(&el.value().name()));
    non_empty_text(heading).or_else(|| {
        non_empty_text(descendant_elements(item).find(|el| class_matches(*el, &TITLE_CLASS_RE)))
    })
}

fn non_empty_text(el: Option<ElementRef<'_>>) -> Option<String> {
    el.map(element_text).filter(|t| !t.is_empty())
}
