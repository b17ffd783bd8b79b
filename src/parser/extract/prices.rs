use crate::parser::{price_nodes, PageDocument};
use crate::records::ExtractedRecord;

/// Every content text node matching the price pattern, trimmed.
pub fn extract(doc: &PageDocument) -> Vec<ExtractedRecord> {
    price_nodes(doc.root())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| ExtractedRecord::Price { text: t.to_string() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_matching_text_node_is_a_record() {
        let doc = PageDocument::parse("<p>Now <b> $12 </b> was 15,00 EUR</p><p>free</p>").unwrap();
        let got: Vec<_> = extract(&doc)
            .into_iter()
            .map(|r| r.as_text().unwrap().to_string())
            .collect();
        assert_eq!(got, vec!["$12", "was 15,00 EUR"]);
    }
}
