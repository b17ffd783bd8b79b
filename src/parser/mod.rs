pub mod analyze;
pub mod extract;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};

use crate::error::ParseError;

/// Currency symbol, or digits with a two-digit decimal suffix.
pub static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$|€|\d+[,.]\d{2}").unwrap());
/// Class attribute of a product-like container.
pub static PRODUCT_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)product|item|card").unwrap());

/// Elements whose text is never page content.
const NON_CONTENT: &[&str] = &["script", "style", "noscript", "template"];

/// Parsed HTML for one fetched page. Dropped once extraction is done.
pub struct PageDocument {
    html: Html,
}

impl PageDocument {
    /// Parse `text`. Blank input is the only thing that cannot be parsed;
    /// the HTML5 parser recovers from any malformed markup.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError {
                reason: "empty document".into(),
            });
        }
        Ok(Self {
            html: Html::parse_document(text),
        })
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }
}

/// Trimmed text content of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Whether the element's class attribute matches `re`.
pub fn class_matches(el: ElementRef<'_>, re: &Regex) -> bool {
    el.value().attr("class").is_some_and(|c| re.is_match(c))
}

/// Content text nodes under `scope`, in document order.
pub fn text_nodes<'a>(scope: ElementRef<'a>) -> impl Iterator<Item = &'a str> + 'a {
    scope.descendants().filter_map(|node| {
        let Node::Text(text) = node.value() else {
            return None;
        };
        let parent = node.parent().and_then(ElementRef::wrap);
        if parent.is_some_and(|p| NON_CONTENT.contains(&p.value().name())) {
            return None;
        }
        Some(&**text)
    })
}

/// Text nodes that look like a price.
pub fn price_nodes<'a>(scope: ElementRef<'a>) -> impl Iterator<Item = &'a str> + 'a {
    text_nodes(scope).filter(|t| PRICE_RE.is_match(t))
}

/// Elements strictly below `scope`, in document order.
pub fn descendant_elements<'a>(scope: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    scope.descendants().skip(1).filter_map(ElementRef::wrap)
}
