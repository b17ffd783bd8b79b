//! Script-executing page retrieval through a headless Chromium binary.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::RenderError;
use crate::fetcher::random_user_agent;

const CHROMIUM_PATH_ENV: &str = "SCRAPE_ETL_CHROMIUM_PATH";
/// Virtual time the page gets to run its scripts before the DOM is dumped.
const VIRTUAL_TIME_BUDGET_MS: u64 = 3000;
const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Produces the post-script HTML of a page.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String, RenderError>;
}

/// Locate a Chromium binary: `SCRAPE_ETL_CHROMIUM_PATH`, then the PATH.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
        warn!("{} points at missing file {}", CHROMIUM_PATH_ENV, p);
    }

    ["google-chrome", "chromium", "chromium-browser"]
        .into_iter()
        .find_map(|name| which::which(name).ok())
}

/// Runs `chromium --headless --dump-dom` once per page.
pub struct HeadlessChrome {
    binary: PathBuf,
    timeout: Duration,
}

impl HeadlessChrome {
    pub fn locate() -> Result<Self, RenderError> {
        let binary = find_chromium().ok_or_else(|| {
            RenderError::Unavailable(format!(
                "no Chromium found; set {} or install google-chrome/chromium",
                CHROMIUM_PATH_ENV
            ))
        })?;
        info!("Using headless browser at {}", binary.display());
        Ok(Self::with_binary(binary))
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args(url: &str) -> Vec<String> {
        vec![
            "--headless".into(),
            "--disable-gpu".into(),
            "--no-sandbox".into(),
            "--disable-dev-shm-usage".into(),
            format!("--user-agent={}", random_user_agent()),
            format!("--virtual-time-budget={}", VIRTUAL_TIME_BUDGET_MS),
            "--dump-dom".into(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl Renderer for HeadlessChrome {
    async fn render(&self, url: &str) -> Result<String, RenderError> {
        info!("Rendering {} with headless browser", url);
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::args(url)).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| RenderError::Timeout {
                url: url.to_string(),
            })?
            .map_err(|e| RenderError::Failed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                url: url.to_string(),
                reason: format!(
                    "browser exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            return Err(RenderError::Failed {
                url: url.to_string(),
                reason: "browser returned an empty DOM".into(),
            });
        }
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_dom_arguments() {
        let args = HeadlessChrome::args("https://example.com");
        assert_eq!(args.last().map(String::as_str), Some("https://example.com"));
        assert!(args.contains(&"--virtual-time-budget=3000".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--user-agent=Mozilla/5.0")));
    }

    #[test]
    fn timeout_overrides_default() {
        let chrome = HeadlessChrome::with_binary("chromium");
        assert_eq!(chrome.timeout, DEFAULT_RENDER_TIMEOUT);
        let chrome = chrome.timeout(Duration::from_secs(5));
        assert_eq!(chrome.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_binary_fails() {
        let chrome = HeadlessChrome::with_binary("/nonexistent/chromium");
        let err = chrome.render("https://example.com").await.unwrap_err();
        assert!(matches!(err, RenderError::Failed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_is_the_rendered_page() {
        // `echo` stands in for the browser: it prints its arguments.
        let Ok(echo) = which::which("echo") else {
            return;
        };
        let html = HeadlessChrome::with_binary(echo)
            .render("https://example.com/app")
            .await
            .unwrap();
        assert!(html.contains("--dump-dom https://example.com/app"));
    }
}
