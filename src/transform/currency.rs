use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::info;

use super::map_strings;
use crate::records::RecordSet;

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([€$£¥])\s*(\d{1,3}(?:[.,]\d{3})*(?:[.,]\d{2}))").unwrap()
});
static COMMA_DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\d{2}$").unwrap());

/// Canonical `1234.56` form of a separator-laden amount, if it parses.
fn parse_amount(raw: &str) -> Option<f64> {
    let canonical = match (raw.rfind(','), raw.rfind('.')) {
        // The later separator is the decimal one.
        (Some(comma), Some(dot)) if comma > dot => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (Some(_), None) if COMMA_DECIMAL_RE.is_match(raw) => raw.replace(',', "."),
        (Some(_), None) => raw.replace(',', ""),
        (None, _) => raw.to_string(),
    };
    canonical.parse().ok()
}

/// Rewrite the first symbol+amount in `text` as `{symbol}{amount:.2}`.
/// Plain `1234.56` amounts never match, so the rewrite is stable.
pub fn normalize_amount(text: &str) -> String {
    let Some(caps) = AMOUNT_RE.captures(text) else {
        return text.to_string();
    };
    let Some(amount) = parse_amount(&caps[2]) else {
        return text.to_string();
    };
    text.replace(&caps[0], &format!("{}{:.2}", &caps[1], amount))
}

/// Stage 3.
pub fn normalize_currency(set: &RecordSet) -> Result<RecordSet> {
    info!("Normalising currency amounts");
    Ok(map_strings(set, normalize_amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_separator_is_decimal() {
        assert_eq!(normalize_amount("$1,234.56"), "$1234.56");
        assert_eq!(normalize_amount("€1.234,56"), "€1234.56");
        assert_eq!(normalize_amount("£ 12.345.678,90 total"), "£12345678.90 total");
    }

    #[test]
    fn lone_comma_with_two_digits_is_decimal() {
        assert_eq!(normalize_amount("$12,34"), "$12.34");
        assert_eq!(normalize_amount("¥1.50"), "¥1.50");
    }

    #[test]
    fn normalised_amounts_are_stable() {
        let once = normalize_amount("€1.234,56");
        assert_eq!(once, "€1234.56");
        assert_eq!(normalize_amount(&once), once);
    }

    #[test]
    fn only_first_amount_rewritten() {
        assert_eq!(normalize_amount("was €1.000,00 now €899,99"), "was €1000.00 now €899,99");
    }

    #[test]
    fn unmatched_text_untouched() {
        assert_eq!(normalize_amount("Call 555-1234"), "Call 555-1234");
        assert_eq!(normalize_amount("$5"), "$5");
    }
}
