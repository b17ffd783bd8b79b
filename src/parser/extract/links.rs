use std::sync::LazyLock;

use scraper::Selector;

use crate::parser::{element_text, PageDocument};
use crate::records::ExtractedRecord;

static ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Anchors with both visible text and a destination.
pub fn extract(doc: &PageDocument) -> Vec<ExtractedRecord> {
    doc.html()
        .select(&ANCHORS)
        .filter_map(|a| {
            let url = a.value().attr("href")?;
            let text = element_text(a);
            if text.is_empty() || url.is_empty() {
                return None;
            }
            Some(ExtractedRecord::Link {
                text,
                url: url.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_links_without_text_or_href() {
        let doc = PageDocument::parse(
            r#"<a href="/a"> About </a><a href="/icon"><img src="i.png"></a><a href="">Empty</a><a>None</a>"#,
        )
        .unwrap();
        assert_eq!(
            extract(&doc),
            vec![ExtractedRecord::Link {
                text: "About".into(),
                url: "/a".into()
            }]
        );
    }
}
