use std::sync::LazyLock;

use scraper::Selector;

use crate::parser::{element_text, PageDocument};
use crate::records::ExtractedRecord;

static HEADINGS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1, h2, h3").unwrap());
static PARAGRAPHS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

/// Level 1-3 headings. Empty headings are kept; text cleanup drops them.
pub fn titles(doc: &PageDocument) -> Vec<ExtractedRecord> {
    collect(doc, &HEADINGS)
}

pub fn paragraphs(doc: &PageDocument) -> Vec<ExtractedRecord> {
    collect(doc, &PARAGRAPHS)
}

fn collect(doc: &PageDocument, selector: &Selector) -> Vec<ExtractedRecord> {
    doc.html()
        .select(selector)
        .map(|el| ExtractedRecord::Text {
            text: element_text(el),
        })
        .collect()
}
