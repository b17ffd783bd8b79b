use std::sync::LazyLock;

use scraper::Selector;

use crate::parser::PageDocument;
use crate::records::ExtractedRecord;

static IMAGES: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").unwrap());

pub fn extract(doc: &PageDocument) -> Vec<ExtractedRecord> {
    doc.html()
        .select(&IMAGES)
        .filter_map(|img| {
            let src = img.value().attr("src").filter(|s| !s.is_empty())?;
            Some(ExtractedRecord::Image {
                src: src.to_string(),
                alt: img.value().attr("alt").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alt_defaults_to_empty() {
        let doc = PageDocument::parse(r#"<img src="a.png" alt="A"><img src="b.png"><img src="">"#).unwrap();
        assert_eq!(
            extract(&doc),
            vec![
                ExtractedRecord::Image { src: "a.png".into(), alt: "A".into() },
                ExtractedRecord::Image { src: "b.png".into(), alt: String::new() },
            ]
        );
    }
}
