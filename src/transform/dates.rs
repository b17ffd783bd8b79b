use std::sync::LazyLock;

use anyhow::Result;
use chrono::NaiveDate;
use regex::Regex;
use tracing::info;

use super::map_strings;
use crate::records::RecordSet;

/// Legacy date shapes and their chrono formats, tried in order.
static DATE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\d{2}/\d{2}/\d{4}", "%d/%m/%Y"),
        (r"\d{2}-\d{2}-\d{4}", "%d-%m-%Y"),
        (r"\d{4}/\d{2}/\d{2}", "%Y/%m/%d"),
        (r"\d{4}-\d{2}-\d{2}", "%Y-%m-%d"),
    ]
    .into_iter()
    .map(|(re, fmt)| (Regex::new(re).unwrap(), fmt))
    .collect()
});

/// Rewrite the first recognised date in `text` as `YYYY-MM-DD`.
///
/// A pattern wins only if its first match is a real calendar date; every
/// occurrence of that exact substring is rewritten.
pub fn normalize_date(text: &str) -> String {
    for (re, fmt) in DATE_PATTERNS.iter() {
        let Some(m) = re.find(text) else {
            continue;
        };
        if let Ok(date) = NaiveDate::parse_from_str(m.as_str(), fmt) {
            return text.replace(m.as_str(), &date.format("%Y-%m-%d").to_string());
        }
    }
    text.to_string()
}

/// Stage 2.
pub fn normalize_dates(set: &RecordSet) -> Result<RecordSet> {
    info!("Normalising dates");
    Ok(map_strings(set, normalize_date))
}
