use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

const ENV_PREFIX: &str = "SCRAPE_ETL_";

/// Runtime knobs for fetching, pagination and export.
#[derive(Debug, Clone)]
pub struct Settings {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub request_timeout: Duration,
    /// Upper bound on one headless browser run.
    pub render_timeout: Duration,
    pub page_delay: Duration,
    pub max_pages: u32,
    /// Worker pool size is `worker_multiplier * cores`, capped at the URL count.
    pub worker_multiplier: usize,
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
            render_timeout: Duration::from_secs(30),
            page_delay: Duration::from_secs(2),
            max_pages: 5,
            worker_multiplier: 2,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Defaults overridden by `SCRAPE_ETL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut s = Self::default();
        if let Some(n) = env_parse::<u32>("MAX_RETRIES")? {
            s.max_retries = n;
        }
        if let Some(secs) = env_parse::<f64>("BACKOFF_SECS")? {
            s.backoff_base = secs_to_duration(secs, "BACKOFF_SECS")?;
        }
        if let Some(secs) = env_parse::<f64>("TIMEOUT_SECS")? {
            s.request_timeout = secs_to_duration(secs, "TIMEOUT_SECS")?;
        }
        if let Some(secs) = env_parse::<f64>("RENDER_TIMEOUT_SECS")? {
            s.render_timeout = secs_to_duration(secs, "RENDER_TIMEOUT_SECS")?;
        }
        if let Some(secs) = env_parse::<f64>("PAGE_DELAY_SECS")? {
            s.page_delay = secs_to_duration(secs, "PAGE_DELAY_SECS")?;
        }
        if let Some(n) = env_parse::<u32>("MAX_PAGES")? {
            s.max_pages = n;
        }
        if let Some(n) = env_parse::<usize>("WORKER_MULTIPLIER")? {
            s.worker_multiplier = n.max(1);
        }
        if let Ok(dir) = std::env::var(format!("{ENV_PREFIX}OUTPUT_DIR")) {
            s.output_dir = PathBuf::from(dir);
        }
        Ok(s)
    }

    /// Pool size for `urls` concurrent fetches.
    pub fn worker_count(&self, urls: usize) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (cores * self.worker_multiplier).min(urls).max(1)
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let name = format!("{ENV_PREFIX}{key}");
    match std::env::var(&name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        Err(_) => Ok(None),
    }
}

fn secs_to_duration(secs: f64, key: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("{ENV_PREFIX}{key} must be a non-negative number of seconds"))
}
