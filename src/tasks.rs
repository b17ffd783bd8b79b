//! Task tracking and the end-to-end extraction run.
//!
//! [`Pipeline::run`] drives one request through validate, robots, download,
//! analyse, select, extract, transform and export, reporting progress to a
//! [`ProgressReporter`] between steps. [`TaskRegistry`] is the owned store of
//! task states a serving layer or CLI holds; the pipeline never keeps one.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::db;
use crate::export::{ExportReport, Exporter, OutputFormat};
use crate::fetcher::{is_valid_url, Fetcher};
use crate::pagination::PaginationWalker;
use crate::parser::analyze::{analyze, CategoryCount};
use crate::parser::extract::extract;
use crate::records::{Category, RecordSet};
use crate::renderer::Renderer;
use crate::robots;
use crate::transform::transform;

// ── Progress ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// One progress notification.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub task_id: Uuid,
    /// 0 to 100.
    pub progress: u8,
    pub message: String,
    pub result: Option<RecordSet>,
    pub output_files: Vec<PathBuf>,
}

impl ProgressUpdate {
    fn step(task_id: Uuid, progress: u8, message: impl Into<String>) -> Self {
        Self {
            task_id,
            progress,
            message: message.into(),
            result: None,
            output_files: Vec::new(),
        }
    }
}

/// Receives progress from a running pipeline and may ask it to stop.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);

    /// Polled between pipeline steps only.
    fn is_cancelled(&self, _task_id: Uuid) -> bool {
        false
    }
}

/// Reporter that drops every update.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Returned (inside `anyhow::Error`) when a run stops on a cancellation request.
#[derive(Debug, thiserror::Error)]
#[error("task {0} was cancelled")]
pub struct Cancelled(pub Uuid);

// ── Registry ──

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub task_id: Uuid,
    pub state: TaskState,
    pub progress: u8,
    pub message: String,
    pub result: Option<RecordSet>,
    pub error: Option<String>,
    pub output_files: Vec<PathBuf>,
    pub started_at: String,
}

/// Task id -> status. Entries live from [`TaskRegistry::start`] until
/// [`TaskRegistry::remove`].
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<Uuid, TaskStatus>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) -> Uuid {
        let task_id = Uuid::new_v4();
        let status = TaskStatus {
            task_id,
            state: TaskState::Running,
            progress: 0,
            message: "queued".into(),
            result: None,
            error: None,
            output_files: Vec::new(),
            started_at: chrono::Local::now().to_rfc3339(),
        };
        self.write().insert(task_id, status);
        task_id
    }

    pub fn get(&self, task_id: Uuid) -> Option<TaskStatus> {
        self.read().get(&task_id).cloned()
    }

    pub fn remove(&self, task_id: Uuid) -> Option<TaskStatus> {
        self.write().remove(&task_id)
    }

    /// Mark a running task failed. A cancelled task stays cancelled.
    pub fn fail(&self, task_id: Uuid, error: &anyhow::Error) {
        if let Some(task) = self.write().get_mut(&task_id) {
            if task.state == TaskState::Running {
                task.state = TaskState::Failed;
                task.progress = 0;
                task.error = Some(format!("{:#}", error));
            }
        }
    }

    /// Request cancellation. Returns false if the task is unknown or finished.
    pub fn cancel(&self, task_id: Uuid) -> bool {
        match self.write().get_mut(&task_id) {
            Some(task) if task.state == TaskState::Running => {
                task.state = TaskState::Cancelled;
                task.message = "cancelled".into();
                true
            }
            _ => false,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, TaskStatus>> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, TaskStatus>> {
        self.tasks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProgressReporter for TaskRegistry {
    fn report(&self, update: ProgressUpdate) {
        let mut tasks = self.write();
        let Some(task) = tasks.get_mut(&update.task_id) else {
            return;
        };
        if task.state != TaskState::Running {
            return;
        }
        task.progress = update.progress;
        task.message = update.message;
        if update.progress >= 100 {
            task.state = TaskState::Completed;
            task.result = update.result;
            task.output_files = update.output_files;
        }
    }

    fn is_cancelled(&self, task_id: Uuid) -> bool {
        self.read()
            .get(&task_id)
            .is_some_and(|t| t.state == TaskState::Cancelled)
    }
}

// ── Pipeline ──

#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub urls: Vec<String>,
    /// Empty means every category the analysis found.
    pub categories: Vec<Category>,
    pub format: OutputFormat,
    pub paginate: bool,
    pub max_pages: u32,
    pub render: bool,
    pub respect_robots: bool,
    pub db_path: Option<PathBuf>,
}

impl Default for ScrapeRequest {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            categories: Vec::new(),
            format: OutputFormat::Json,
            paginate: false,
            max_pages: Settings::default().max_pages,
            render: false,
            respect_robots: true,
            db_path: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunOutcome {
    pub data: RecordSet,
    pub counts: CategoryCount,
    pub pages: usize,
    /// URLs that were invalid or could not be retrieved, with the reason.
    pub failed_urls: Vec<(String, String)>,
    /// URLs skipped because robots.txt disallows them.
    pub skipped_urls: Vec<String>,
    pub export: Option<ExportReport>,
    pub db_rows: Vec<(Category, usize)>,
}

pub struct Pipeline {
    fetcher: Fetcher,
    renderer: Option<Arc<dyn Renderer>>,
    exporter: Exporter,
    settings: Settings,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(&settings)?,
            renderer: None,
            exporter: Exporter::new(settings.output_dir.clone()),
            settings,
        })
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Register a task in `registry`, run it, and record a failure there.
    pub async fn run_tracked(
        &self,
        registry: &TaskRegistry,
        request: &ScrapeRequest,
    ) -> (Uuid, Result<RunOutcome>) {
        let task_id = registry.start();
        let result = self.run(task_id, request, registry).await;
        if let Err(e) = &result {
            registry.fail(task_id, e);
        }
        (task_id, result)
    }

    pub async fn run(
        &self,
        task_id: Uuid,
        request: &ScrapeRequest,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunOutcome> {
        let step = |progress: u8, message: &str| -> Result<()> {
            if reporter.is_cancelled(task_id) {
                bail!(Cancelled(task_id));
            }
            info!("[{}%] {}", progress, message);
            reporter.report(ProgressUpdate::step(task_id, progress, message));
            Ok(())
        };
        let mut outcome = RunOutcome::default();

        step(10, "Initialising extraction")?;
        let mut urls = Vec::new();
        for url in &request.urls {
            if is_valid_url(url) {
                urls.push(url.clone());
            } else {
                warn!("Invalid URL skipped: {}", url);
                outcome.failed_urls.push((url.clone(), "invalid URL".into()));
            }
        }
        if urls.is_empty() {
            bail!("no valid URL to extract from");
        }

        step(20, "Checking robots.txt")?;
        if request.respect_robots {
            let mut allowed = Vec::with_capacity(urls.len());
            for url in urls {
                if robots::is_allowed(self.fetcher.client(), &url).await {
                    allowed.push(url);
                } else {
                    outcome.skipped_urls.push(url);
                }
            }
            urls = allowed;
            if urls.is_empty() {
                bail!("robots.txt disallows every requested URL");
            }
        }

        step(30, "Downloading pages")?;
        let downloaded = self.download(&urls, request, &mut outcome).await;
        let Some((source_url, first_page)) = downloaded
            .first()
            .and_then(|(url, pages)| pages.first().map(|p| (url.clone(), p.clone())))
        else {
            bail!("could not retrieve any page");
        };
        let bodies: Vec<String> = downloaded.into_iter().flat_map(|(_, pages)| pages).collect();
        outcome.pages = bodies.len();

        step(50, "Analysing page structure")?;
        outcome.counts = analyze(&first_page);
        let categories = if request.categories.is_empty() {
            outcome.counts.available()
        } else {
            request.categories.clone()
        };
        if categories.is_empty() {
            bail!("no extractable elements found on {}", source_url);
        }

        step(70, "Extracting data")?;
        let extracted = tokio::task::spawn_blocking(move || {
            bodies
                .par_iter()
                .map(|body| extract(body, &categories))
                .collect::<Vec<_>>()
        })
        .await
        .context("extraction worker panicked")?;

        let mut merged = RecordSet::new();
        for (idx, page) in extracted.into_iter().enumerate() {
            match page {
                Ok(set) => merged.merge(set),
                Err(e) => warn!("Page {} skipped: {}", idx + 1, e),
            }
        }

        step(80, "Transforming data")?;
        outcome.data = transform(merged);

        step(90, "Exporting data")?;
        let report = self
            .exporter
            .export(&outcome.data, request.format, &source_url)
            .context("export failed")?;
        if let Some(path) = &request.db_path {
            let conn = db::connect(path)?;
            outcome.db_rows = db::save_record_set(&conn, &outcome.data)?;
        }

        if reporter.is_cancelled(task_id) {
            bail!(Cancelled(task_id));
        }
        reporter.report(ProgressUpdate {
            task_id,
            progress: 100,
            message: "Extraction completed".into(),
            result: Some(outcome.data.clone()),
            output_files: report.files.clone(),
        });
        outcome.export = Some(report);
        Ok(outcome)
    }

    /// Pages per URL in input order; URLs that yield nothing go to `failed_urls`.
    async fn download(
        &self,
        urls: &[String],
        request: &ScrapeRequest,
        outcome: &mut RunOutcome,
    ) -> Vec<(String, Vec<String>)> {
        let mut downloaded = Vec::new();

        let renderer = match (&self.renderer, request.render) {
            (Some(r), true) => Some(r),
            (None, true) => {
                warn!("Rendering requested but no headless browser configured, fetching instead");
                None
            }
            _ => None,
        };

        if let Some(renderer) = renderer {
            for url in urls {
                match renderer.render(url).await {
                    Ok(html) => downloaded.push((url.clone(), vec![html])),
                    Err(e) => outcome.failed_urls.push((url.clone(), e.to_string())),
                }
            }
        } else if request.paginate {
            let walker = PaginationWalker::new(&self.fetcher, self.settings.page_delay);
            for url in urls {
                let pages = walker.walk(url, request.max_pages).await;
                if pages.is_empty() {
                    outcome
                        .failed_urls
                        .push((url.clone(), "first page could not be fetched".into()));
                } else {
                    downloaded.push((url.clone(), pages));
                }
            }
        } else {
            let workers = self.settings.worker_count(urls.len());
            let batch = self.fetcher.fetch_many(urls, workers).await;
            downloaded.extend(batch.pages.into_iter().map(|(url, body)| (url, vec![body])));
            outcome
                .failed_urls
                .extend(batch.failed.into_iter().map(|(url, e)| (url, e.to_string())));
        }

        downloaded
    }
}

// ── Tests ──
