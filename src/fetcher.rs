//! HTTP page retrieval with user-agent rotation, exponential backoff and a
//! bounded worker pool for multi-URL runs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::FetchError;

pub const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.212 Safari/537.36",
];

/// One entry of the pool, picked per attempt.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Whether `raw` parses as an absolute URL with both a scheme and a host.
pub fn is_valid_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|u| !u.scheme().is_empty() && u.has_host())
}

/// Outcome of a multi-URL fetch, both lists in input order.
#[derive(Debug, Default)]
pub struct FetchBatch {
    pub pages: Vec<(String, String)>,
    pub failed: Vec<(String, FetchError)>,
}

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_retries: u32,
    backoff_base: Duration,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            max_retries: settings.max_retries,
            backoff_base: settings.backoff_base,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch with the configured retry budget.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.fetch_with(url, self.max_retries, self.backoff_base).await
    }

    /// Up to `max_retries` attempts (at least one), sleeping
    /// `backoff_base * 2^i` between attempt `i` and `i + 1`.
    pub async fn fetch_with(
        &self,
        url: &str,
        max_retries: u32,
        backoff_base: Duration,
    ) -> Result<String, FetchError> {
        let attempts = max_retries.max(1);
        let mut attempt = 0u32;
        loop {
            let err = match self.fetch_once(url, random_user_agent()).await {
                Ok(body) => {
                    info!("Fetched {} ({} bytes)", url, body.len());
                    return Ok(body);
                }
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= attempts {
                error!("Failed to fetch {} after {} attempts: {}", url, attempts, err);
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts,
                    last: Box::new(err),
                });
            }

            let backoff = backoff_base * 2u32.pow(attempt - 1);
            warn!(
                "Attempt {}/{} for {} failed: {}, retrying in {:.1}s",
                attempt,
                attempts,
                url,
                err,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
        }
    }

    async fn fetch_once(&self, url: &str, agent: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, agent)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }
        response.text().await.map_err(|e| classify(url, e))
    }

    /// Fetch every URL through a pool of `workers` concurrent tasks.
    /// A failing URL never affects the others.
    pub async fn fetch_many(&self, urls: &[String], workers: usize) -> FetchBatch {
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let (tx, mut rx) =
            tokio::sync::mpsc::channel::<(usize, String, Result<String, FetchError>)>(workers.max(1) * 2);

        for (idx, url) in urls.iter().cloned().enumerate() {
            let fetcher = self.clone();
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return;
                };
                let result = fetcher.fetch(&url).await;
                let _ = tx.send((idx, url, result)).await;
            });
        }

        // rx closes once every worker has sent
        drop(tx);

        let mut results = Vec::with_capacity(urls.len());
        while let Some(done) = rx.recv().await {
            results.push(done);
        }

        let batch = collect_batch(urls, results);
        info!(
            "Fetched {} URLs ({} ok, {} failed)",
            urls.len(),
            batch.pages.len(),
            batch.failed.len()
        );
        batch
    }
}

/// Order worker results by input index. A URL whose worker never reported
/// (it panicked) is recorded as failed, so every input is accounted for.
fn collect_batch(
    urls: &[String],
    mut results: Vec<(usize, String, Result<String, FetchError>)>,
) -> FetchBatch {
    results.sort_by_key(|(idx, _, _)| *idx);
    let mut reported = results.into_iter().peekable();

    let mut batch = FetchBatch::default();
    for (idx, url) in urls.iter().enumerate() {
        let result = match reported.next_if(|(i, _, _)| *i == idx) {
            Some((_, _, result)) => result,
            None => {
                error!("Worker for {} stopped without a result", url);
                Err(FetchError::WorkerLost { url: url.clone() })
            }
        };
        match result {
            Ok(body) => batch.pages.push((url.clone(), body)),
            Err(e) => batch.failed.push((url.clone(), e)),
        }
    }
    batch
}

fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::ConnectionFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick_settings() -> Settings {
        Settings {
            max_retries: 2,
            backoff_base: Duration::from_millis(10),
            request_timeout: Duration::from_millis(300),
            ..Settings::default()
        }
    }

    #[test]
    fn url_validation_needs_scheme_and_host() {
        assert!(is_valid_url("https://example.com/shop?page=1"));
        assert!(!is_valid_url("example.com"));
        assert!(!is_valid_url("mailto:someone@example.com"));
        assert!(!is_valid_url(""));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>ok</p>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&quick_settings()).unwrap();
        let body = fetcher.fetch(&format!("{}/flaky", server.uri())).await.unwrap();
        assert_eq!(body, "<p>ok</p>");
    }

    #[tokio::test]
    async fn exhaustion_reports_last_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&quick_settings()).unwrap();
        let err = fetcher
            .fetch_with(&format!("{}/gone", server.uri()), 3, Duration::from_millis(5))
            .await
            .unwrap_err();
        match err {
            FetchError::Exhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, FetchError::HttpStatus { code: 404, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unreported_url_counts_as_failed() {
        let urls: Vec<String> = ["a", "b", "c"].iter().map(|u| u.to_string()).collect();
        let results = vec![
            (2, "c".to_string(), Ok("C".to_string())),
            (0, "a".to_string(), Ok("A".to_string())),
        ];
        let batch = collect_batch(&urls, results);
        assert_eq!(
            batch.pages,
            vec![("a".to_string(), "A".to_string()), ("c".to_string(), "C".to_string())]
        );
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].0, "b");
        assert!(matches!(&batch.failed[0].1, FetchError::WorkerLost { url } if url == "b"));
    }

    #[tokio::test]
    async fn partial_batch_keeps_successes_in_order() {
        let server = MockServer::start().await;
        for page in ["/a", "/c"] {
            Mock::given(method("GET"))
                .and(path(page))
                .respond_with(ResponseTemplate::new(200).set_body_string(page))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let urls: Vec<String> = ["/a", "/slow", "/c"]
            .iter()
            .map(|p| format!("{}{}", server.uri(), p))
            .collect();
        let fetcher = Fetcher::new(&quick_settings()).unwrap();
        let batch = fetcher.fetch_many(&urls, 3).await;

        let bodies: Vec<_> = batch.pages.iter().map(|(_, b)| b.as_str()).collect();
        assert_eq!(bodies, vec!["/a", "/c"]);
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].0, urls[1]);
        assert!(matches!(
            &batch.failed[0].1,
            FetchError::Exhausted { last, .. } if matches!(**last, FetchError::Timeout { .. })
        ));
    }
}
