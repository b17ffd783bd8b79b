use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use uuid::Uuid;

use scrape_etl::config::Settings;
use scrape_etl::export::OutputFormat;
use scrape_etl::fetcher::Fetcher;
use scrape_etl::parser::analyze::analyze;
use scrape_etl::records::{Category, ExtractedRecord, RecordSet, Shape};
use scrape_etl::renderer::{HeadlessChrome, Renderer};
use scrape_etl::tasks::{
    Cancelled, Pipeline, ProgressReporter, ProgressUpdate, ScrapeRequest, TaskRegistry,
};

#[derive(Parser)]
#[command(name = "scrape_etl", about = "Extract, normalise and export structured data from web pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count the extractable categories on a page
    Analyze {
        url: String,
        /// Render with a headless browser before analysing
        #[arg(long)]
        render: bool,
    },
    /// Extract, transform and export data from one or more pages
    Extract {
        #[arg(required = true)]
        urls: Vec<String>,
        /// Comma-separated categories (default: everything found)
        #[arg(short, long, value_delimiter = ',')]
        categories: Vec<String>,
        /// csv, json, excel or text
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Follow ?page=N style pagination
        #[arg(long)]
        paginate: bool,
        #[arg(long)]
        max_pages: Option<u32>,
        /// Render with a headless browser instead of plain HTTP
        #[arg(long)]
        render: bool,
        /// Also load the result into this SQLite database
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Fetch even where robots.txt disallows it
        #[arg(long)]
        ignore_robots: bool,
        #[arg(long)]
        no_preview: bool,
    },
    /// Fetch several pages concurrently and summarise the results
    Fetch {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Load a JSON export into a SQLite database
    Load {
        file: PathBuf,
        #[arg(long)]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;

    let result = match cli.command {
        Commands::Analyze { url, render } => {
            let html = if render {
                HeadlessChrome::locate()?
                    .timeout(settings.render_timeout)
                    .render(&url)
                    .await?
            } else {
                Fetcher::new(&settings)?.fetch(&url).await?
            };
            let counts = analyze(&html);
            if counts.available().is_empty() {
                println!("No extractable elements found on {}", url);
            } else {
                println!("Elements found on {}:", url);
                print!("{}", counts);
            }
            Ok(())
        }
        Commands::Extract {
            urls,
            categories,
            format,
            paginate,
            max_pages,
            render,
            db,
            output_dir,
            ignore_robots,
            no_preview,
        } => {
            let categories = categories
                .iter()
                .map(|c| c.parse::<Category>())
                .collect::<Result<Vec<_>>>()?;
            let format: OutputFormat = format.parse()?;
            if let Some(dir) = output_dir {
                settings.output_dir = dir;
            }
            if let Some(n) = max_pages {
                settings.max_pages = n;
            }

            let request = ScrapeRequest {
                urls,
                categories,
                format,
                paginate,
                max_pages: settings.max_pages,
                render,
                respect_robots: !ignore_robots,
                db_path: db,
            };

            let render_timeout = settings.render_timeout;
            let mut pipeline = Pipeline::new(settings)?;
            if render {
                let chrome = HeadlessChrome::locate()?.timeout(render_timeout);
                pipeline = pipeline.with_renderer(Arc::new(chrome));
            }
            run_extract(&pipeline, &request, !no_preview).await
        }
        Commands::Fetch { urls } => {
            let fetcher = Fetcher::new(&settings)?;
            let workers = settings.worker_count(urls.len());
            println!("Fetching {} URLs with {} workers...", urls.len(), workers);
            let batch = fetcher.fetch_many(&urls, workers).await;

            for (url, body) in &batch.pages {
                println!("  ok    {} ({} bytes)", url, body.len());
            }
            for (url, e) in &batch.failed {
                println!("  fail  {}: {}", url, e);
            }
            println!("{} ok, {} failed", batch.pages.len(), batch.failed.len());
            if batch.pages.is_empty() {
                bail!("no URL could be fetched");
            }
            Ok(())
        }
        Commands::Load { file, db } => {
            let data = scrape_etl::export::json::import(&file)?;
            let conn = scrape_etl::db::connect(&db)?;
            let saved = scrape_etl::db::save_record_set(&conn, &data)?;
            for (category, rows) in &saved {
                println!("  {:<12} {:>6} rows", category.as_str(), rows);
            }
            println!("Loaded {} into {}", file.display(), db.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_extract(pipeline: &Pipeline, request: &ScrapeRequest, preview: bool) -> Result<()> {
    let registry = Arc::new(TaskRegistry::new());
    let task_id = registry.start();

    // Ctrl-C cancels at the next step boundary.
    let on_interrupt = Arc::clone(&registry);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel(task_id);
        }
    });

    let reporter = ConsoleReporter::new(Arc::clone(&registry))?;
    let result = pipeline.run(task_id, request, &reporter).await;
    reporter.bar.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) if e.downcast_ref::<Cancelled>().is_some() => {
            println!("Extraction cancelled.");
            return Ok(());
        }
        Err(e) => {
            registry.fail(task_id, &e);
            return Err(e).context("extraction failed");
        }
    };

    for url in &outcome.skipped_urls {
        println!("Skipped (robots.txt): {}", url);
    }
    for (url, reason) in &outcome.failed_urls {
        println!("Failed: {} ({})", url, reason);
    }

    if preview {
        print_preview(&outcome.data);
    }

    if let Some(report) = &outcome.export {
        for file in &report.files {
            println!("Exported {}", file.display());
        }
        for (category, reason) in &report.failed {
            println!("Could not export {}: {}", category, reason);
        }
    }
    if !outcome.db_rows.is_empty() {
        let total: usize = outcome.db_rows.iter().map(|(_, n)| n).sum();
        println!("Loaded {} rows into {} tables", total, outcome.db_rows.len());
    }

    println!(
        "{} pages, {} records extracted.",
        outcome.pages,
        outcome.data.total_records()
    );
    registry.remove(task_id);
    Ok(())
}

/// Drives a progress bar and keeps the registry entry current.
struct ConsoleReporter {
    bar: ProgressBar,
    registry: Arc<TaskRegistry>,
}

impl ConsoleReporter {
    fn new(registry: Arc<TaskRegistry>) -> Result<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")?
                .progress_chars("#>-"),
        );
        Ok(Self { bar, registry })
    }
}

impl ProgressReporter for ConsoleReporter {
    fn report(&self, update: ProgressUpdate) {
        self.bar.set_position(u64::from(update.progress));
        self.bar.set_message(update.message.clone());
        self.registry.report(update);
    }

    fn is_cancelled(&self, task_id: Uuid) -> bool {
        self.registry.is_cancelled(task_id)
    }
}

fn print_preview(data: &RecordSet) {
    println!("\nPreview:");
    for (category, records) in data.iter() {
        println!("\n{}:", category);
        if records.is_empty() {
            println!("  No data found");
            continue;
        }

        match category.shape() {
            Some(Shape::Text) | Some(Shape::Fields) => {
                for (i, record) in records.iter().take(3).enumerate() {
                    println!("  {}. {}", i + 1, preview_line(record));
                }
                if records.len() > 3 {
                    println!("  ... and {} more", records.len() - 3);
                }
            }
            Some(Shape::Table) => {
                for (t, record) in records.iter().take(2).enumerate() {
                    let ExtractedRecord::Table { rows } = record else {
                        continue;
                    };
                    println!("  Table {}:", t + 1);
                    for (r, row) in rows.iter().take(3).enumerate() {
                        println!("    Row {}: [{}]", r + 1, truncate(&row.join(", "), 60));
                    }
                    if rows.len() > 3 {
                        println!("    ... and {} more rows", rows.len() - 3);
                    }
                }
                if records.len() > 2 {
                    println!("  ... and {} more tables", records.len() - 2);
                }
            }
            None => {}
        }
    }
    println!();
}

fn preview_line(record: &ExtractedRecord) -> String {
    match record.as_text() {
        Some(text) => truncate(text, 50),
        None => record
            .fields()
            .iter()
            .map(|(k, v)| format!("{}: {}", k, truncate(v, 30)))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
