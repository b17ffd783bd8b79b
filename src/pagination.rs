//! Sequential walk over `?page=N` style listings.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::fetcher::Fetcher;

/// Query parameters recognised as a page counter, matched case-insensitively.
pub const PAGE_PARAMS: [&str; 6] = ["page", "p", "pg", "pagina", "pagenum", "offset"];

static ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static NEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)next|suivant|prochain|>>").unwrap());
static DISABLED_NEXT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)next|suivant").unwrap());
static PAGE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static DISABLED_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"disabled|inactive").unwrap());

/// The page parameter already present in `url`'s query, or `page`.
pub fn detect_page_param(url: &str) -> String {
    let query = url::Url::parse(url)
        .ok()
        .and_then(|u| u.query().map(str::to_string))
        .unwrap_or_default();

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, _)| name)
        .find(|name| PAGE_PARAMS.contains(&name.to_lowercase().as_str()))
        .unwrap_or("page")
        .to_string()
}

/// URL of page `n`: `<param>=<n>` joined with `&` when `base` already has a
/// query string, `?` otherwise.
pub fn page_url(base: &str, param: &str, n: u32) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}{param}={n}")
}

/// Best-effort guess whether a page after `current` exists.
pub fn has_next_page(html: &str, current: u32) -> bool {
    let doc = Html::parse_document(html);
    let anchors: Vec<(String, Option<&str>, bool)> = doc
        .select(&ANCHORS)
        .map(|a| {
            (
                a.text().collect::<String>().trim().to_string(),
                a.value().attr("class"),
                a.value().attr("href").is_some(),
            )
        })
        .collect();

    if anchors.iter().any(|(text, _, _)| NEXT_RE.is_match(text)) {
        debug!("Next-page link found on page {}", current);
        return true;
    }

    let highest = anchors
        .iter()
        .filter(|(text, _, has_href)| *has_href && PAGE_NUMBER_RE.is_match(text))
        .filter_map(|(text, _, _)| text.parse::<u32>().ok())
        .max();
    if highest.is_some_and(|n| n > current) {
        debug!("Higher page number link found on page {}", current);
        return true;
    }

    let disabled_next = anchors.iter().any(|(text, class, _)| {
        class.is_some_and(|c| DISABLED_CLASS_RE.is_match(c)) && DISABLED_NEXT_RE.is_match(text)
    });
    if disabled_next {
        debug!("Disabled next control on page {}", current);
    }
    false
}

/// Fetches consecutive pages of one listing. Never parallel: whether page
/// `n + 1` exists depends on page `n`.
pub struct PaginationWalker<'a> {
    fetcher: &'a Fetcher,
    page_delay: Duration,
}

impl<'a> PaginationWalker<'a> {
    pub fn new(fetcher: &'a Fetcher, page_delay: Duration) -> Self {
        Self { fetcher, page_delay }
    }

    /// Bodies of pages `1..=max_pages`, stopping at the first failed fetch
    /// (excluded) or the first page without a next-page signal (included).
    pub async fn walk(&self, base: &str, max_pages: u32) -> Vec<String> {
        info!("Handling pagination for {} (max {} pages)", base, max_pages);
        let param = detect_page_param(base);
        let mut pages = Vec::new();

        for n in 1..=max_pages {
            let url = page_url(base, &param, n);
            info!("Extracting page {}: {}", n, url);

            let body = match self.fetcher.fetch(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Stopping pagination at page {}: {}", n, e);
                    break;
                }
            };
            let more = has_next_page(&body, n);
            pages.push(body);

            if !more {
                info!("No more pages detected after page {}", n);
                break;
            }
            if n < max_pages {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        pages
    }
}

// ── Tests ──
