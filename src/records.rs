use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved key for the enrichment entry; never a data category.
pub const METADATA_KEY: &str = "_metadata";
pub const PIPELINE_VERSION: &str = "1.1.0";

// ── Categories ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Titles,
    Paragraphs,
    Links,
    Images,
    Tables,
    Lists,
    Forms,
    Products,
    Prices,
}

/// How a category's records are laid out on export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One string per record.
    Text,
    /// Named fields per record.
    Fields,
    /// A grid of cells per record.
    Table,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Titles,
        Category::Paragraphs,
        Category::Links,
        Category::Images,
        Category::Tables,
        Category::Lists,
        Category::Forms,
        Category::Products,
        Category::Prices,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Titles => "Titles",
            Category::Paragraphs => "Paragraphs",
            Category::Links => "Links",
            Category::Images => "Images",
            Category::Tables => "Tables",
            Category::Lists => "Lists",
            Category::Forms => "Forms",
            Category::Products => "Products",
            Category::Prices => "Prices",
        }
    }

    /// Record shape, or `None` for categories that are counted but not extracted.
    pub fn shape(self) -> Option<Shape> {
        match self {
            Category::Titles | Category::Paragraphs | Category::Prices => Some(Shape::Text),
            Category::Links | Category::Images | Category::Products => Some(Shape::Fields),
            Category::Tables => Some(Shape::Table),
            Category::Lists | Category::Forms => None,
        }
    }

    /// Whether `record` is the variant this category holds.
    pub fn accepts(self, record: &ExtractedRecord) -> bool {
        matches!(
            (self, record),
            (Category::Titles | Category::Paragraphs, ExtractedRecord::Text { .. })
                | (Category::Links, ExtractedRecord::Link { .. })
                | (Category::Images, ExtractedRecord::Image { .. })
                | (Category::Tables, ExtractedRecord::Table { .. })
                | (Category::Prices, ExtractedRecord::Price { .. })
                | (Category::Products, ExtractedRecord::Product { .. })
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| anyhow!("unknown category: {wanted:?}"))
    }
}

// ── Records ──

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedRecord {
    Text {
        text: String,
    },
    Link {
        text: String,
        url: String,
    },
    Image {
        src: String,
        alt: String,
    },
    Table {
        rows: Vec<Vec<String>>,
    },
    Price {
        text: String,
    },
    Product {
        title: Option<String>,
        price: Option<String>,
        image: Option<String>,
    },
}

impl ExtractedRecord {
    /// Every string the record carries, in field order.
    pub fn text_fields_mut(&mut self) -> Vec<&mut String> {
        match self {
            ExtractedRecord::Text { text } | ExtractedRecord::Price { text } => vec![text],
            ExtractedRecord::Link { text, url } => vec![text, url],
            ExtractedRecord::Image { src, alt } => vec![src, alt],
            ExtractedRecord::Table { rows } => rows.iter_mut().flatten().collect(),
            ExtractedRecord::Product {
                title,
                price,
                image,
            } => title
                .iter_mut()
                .chain(price.iter_mut())
                .chain(image.iter_mut())
                .collect(),
        }
    }

    /// Named fields of a field-shaped record. Products list populated fields only.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            ExtractedRecord::Text { text } | ExtractedRecord::Price { text } => {
                vec![("value", text.as_str())]
            }
            ExtractedRecord::Link { text, url } => {
                vec![("text", text.as_str()), ("url", url.as_str())]
            }
            ExtractedRecord::Image { src, alt } => vec![("src", src.as_str()), ("alt", alt.as_str())],
            ExtractedRecord::Table { .. } => Vec::new(),
            ExtractedRecord::Product {
                title,
                price,
                image,
            } => [("title", title), ("price", price), ("image", image)]
                .into_iter()
                .filter_map(|(k, v)| v.as_deref().map(|v| (k, v)))
                .collect(),
        }
    }

    /// Flat text of a text-shaped record.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ExtractedRecord::Text { text } | ExtractedRecord::Price { text } => Some(text),
            _ => None,
        }
    }

    /// Rebuild a record from its exported JSON form; the category picks the variant.
    pub fn from_json(category: Category, value: &Value) -> Result<Self> {
        let as_string = |v: &Value| -> Result<String> {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("{category}: expected a string, got {v}"))
        };
        let field = |key: &str| -> Result<String> {
            value
                .get(key)
                .map(&as_string)
                .unwrap_or_else(|| Ok(String::new()))
        };
        let optional = |key: &str| -> Result<Option<String>> {
            value.get(key).map(&as_string).transpose()
        };

        Ok(match category {
            Category::Titles | Category::Paragraphs => ExtractedRecord::Text {
                text: as_string(value)?,
            },
            Category::Prices => ExtractedRecord::Price {
                text: as_string(value)?,
            },
            Category::Links => ExtractedRecord::Link {
                text: field("text")?,
                url: field("url")?,
            },
            Category::Images => ExtractedRecord::Image {
                src: field("src")?,
                alt: field("alt")?,
            },
            Category::Products => ExtractedRecord::Product {
                title: optional("title")?,
                price: optional("price")?,
                image: optional("image")?,
            },
            Category::Tables => {
                let rows = value
                    .as_array()
                    .ok_or_else(|| anyhow!("Tables: expected an array of rows"))?;
                let rows = rows
                    .iter()
                    .map(|row| {
                        row.as_array()
                            .ok_or_else(|| anyhow!("Tables: expected a row array"))?
                            .iter()
                            .map(&as_string)
                            .collect::<Result<Vec<_>>>()
                    })
                    .collect::<Result<Vec<_>>>()?;
                ExtractedRecord::Table { rows }
            }
            Category::Lists | Category::Forms => bail!("{category} records are not extracted"),
        })
    }
}

impl Serialize for ExtractedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExtractedRecord::Text { text } | ExtractedRecord::Price { text } => {
                serializer.serialize_str(text)
            }
            ExtractedRecord::Table { rows } => rows.serialize(serializer),
            other => {
                let fields = other.fields();
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

// ── Metadata ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub extraction_timestamp: String,
    pub pipeline_version: String,
}

impl Metadata {
    pub fn now() -> Self {
        Self {
            extraction_timestamp: chrono::Local::now().to_rfc3339(),
            pipeline_version: PIPELINE_VERSION.to_string(),
        }
    }
}

// ── RecordSet ──

/// Category -> records, in insertion order. Metadata lives beside the data
/// categories so it can never overwrite one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    metadata: Option<Metadata>,
    entries: Vec<(Category, Vec<ExtractedRecord>)>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a category's records, replacing any existing ones in place.
    pub fn insert(&mut self, category: Category, records: Vec<ExtractedRecord>) {
        debug_assert!(records.iter().all(|r| category.accepts(r)));
        match self.entries.iter_mut().find(|(c, _)| *c == category) {
            Some((_, existing)) => *existing = records,
            None => self.entries.push((category, records)),
        }
    }

    /// Append records after any already held for the category.
    pub fn append(&mut self, category: Category, records: Vec<ExtractedRecord>) {
        debug_assert!(records.iter().all(|r| category.accepts(r)));
        match self.entries.iter_mut().find(|(c, _)| *c == category) {
            Some((_, existing)) => existing.extend(records),
            None => self.entries.push((category, records)),
        }
    }

    /// Append every category of `other` (page order, then URL order when
    /// called in sequence). Metadata of `other` is ignored.
    pub fn merge(&mut self, other: RecordSet) {
        for (category, records) in other.entries {
            self.append(category, records);
        }
    }

    pub fn get(&self, category: Category) -> Option<&[ExtractedRecord]> {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, r)| r.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[ExtractedRecord])> {
        self.entries.iter().map(|(c, r)| (*c, r.as_slice()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Category, &mut Vec<ExtractedRecord>)> {
        self.entries.iter_mut().map(|(c, r)| (*c, r))
    }

    /// Categories that hold at least one record.
    pub fn non_empty(&self) -> impl Iterator<Item = (Category, &[ExtractedRecord])> {
        self.iter().filter(|(_, r)| !r.is_empty())
    }

    pub fn categories(&self) -> Vec<Category> {
        self.entries.iter().map(|(c, _)| *c).collect()
    }

    pub fn total_records(&self) -> usize {
        self.entries.iter().map(|(_, r)| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = Some(metadata);
    }

    /// Copy without categories that hold no records.
    pub fn without_empty(&self) -> RecordSet {
        RecordSet {
            metadata: self.metadata.clone(),
            entries: self
                .entries
                .iter()
                .filter(|(_, r)| !r.is_empty())
                .cloned()
                .collect(),
        }
    }

    /// Parse the structured-document export back into a record set.
    /// Rebuild a set from an exported document. Categories keep the
    /// document's key order.
    pub fn from_json(value: &Value) -> Result<Self> {
        let map: &Map<String, Value> = value
            .as_object()
            .ok_or_else(|| anyhow!("record set must be a JSON object"))?;

        let mut set = RecordSet::new();
        for (key, v) in map {
            if key == METADATA_KEY {
                let metadata = serde_json::from_value(v.clone()).context("invalid _metadata")?;
                set.set_metadata(metadata);
                continue;
            }
            let category: Category = key.parse()?;
            let items = v
                .as_array()
                .ok_or_else(|| anyhow!("{category}: expected an array of records"))?;
            let records = items
                .iter()
                .map(|item| ExtractedRecord::from_json(category, item))
                .collect::<Result<Vec<_>>>()?;
            set.insert(category, records);
        }
        Ok(set)
    }
}

impl Serialize for RecordSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.entries.len() + usize::from(self.metadata.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(meta) = &self.metadata {
            map.serialize_entry(METADATA_KEY, meta)?;
        }
        for (category, records) in &self.entries {
            map.serialize_entry(category.as_str(), records)?;
        }
        map.end()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> ExtractedRecord {
        ExtractedRecord::Text { text: s.into() }
    }

    #[test]
    fn category_names_parse_case_insensitively() {
        assert_eq!("titles".parse::<Category>().unwrap(), Category::Titles);
        assert_eq!(" PRICES ".parse::<Category>().unwrap(), Category::Prices);
        assert!("Widgets".parse::<Category>().is_err());
    }

    #[test]
    fn append_merges_in_order() {
        let mut set = RecordSet::new();
        set.append(Category::Titles, vec![text("a")]);
        set.append(Category::Links, vec![]);
        set.append(Category::Titles, vec![text("b")]);
        assert_eq!(set.get(Category::Titles).unwrap(), &[text("a"), text("b")]);
        assert_eq!(set.categories(), vec![Category::Titles, Category::Links]);
    }

    #[test]
    fn metadata_serialized_first() {
        let mut set = RecordSet::new();
        set.insert(Category::Titles, vec![text("Hello")]);
        set.set_metadata(Metadata::now());
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.starts_with("{\"_metadata\""));
        assert!(json.contains("\"Titles\":[\"Hello\"]"));
    }

    #[test]
    fn product_serializes_populated_fields_only() {
        let p = ExtractedRecord::Product {
            title: None,
            price: None,
            image: Some("a.png".into()),
        };
        assert_eq!(serde_json::to_value(&p).unwrap(), serde_json::json!({"image": "a.png"}));
    }

    #[test]
    fn from_json_uses_category_for_shape() {
        let value = serde_json::json!({
            "_metadata": {"extraction_timestamp": "t", "pipeline_version": "1.1.0"},
            "Prices": ["$1.00"],
            "Tables": [[["a", "b"], ["c"]]],
            "Links": [{"text": "Home", "url": "/"}]
        });
        let set = RecordSet::from_json(&value).unwrap();
        assert_eq!(set.metadata().unwrap().pipeline_version, "1.1.0");
        assert_eq!(
            set.get(Category::Prices).unwrap(),
            &[ExtractedRecord::Price { text: "$1.00".into() }]
        );
        assert!(matches!(&set.get(Category::Tables).unwrap()[0], ExtractedRecord::Table { rows } if rows.len() == 2));
        assert_eq!(set.total_records(), 3);
        assert_eq!(set.categories(), vec![Category::Prices, Category::Tables, Category::Links]);
    }

    #[test]
    fn text_fields_cover_table_cells() {
        let mut t = ExtractedRecord::Table {
            rows: vec![vec!["a".into(), "b".into()], vec!["c".into()]],
        };
        assert_eq!(t.text_fields_mut().len(), 3);
    }
}
