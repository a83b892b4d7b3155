//! CLI entry point for mangadl.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mangadl_core::library::{KomgaNotifier, LibraryNotifier, NoopNotifier};
use mangadl_core::{
    ApiClient, DownloadManager, JobQueue, JobRequest, JobStatus, JobStore, RateLimiter, Settings,
};
use serde::Serialize;
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, Command, DownloadArgs};

/// Exit code for a job stopped by Ctrl-C.
const EXIT_ABORTED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let mut settings = Settings::from_env().context("invalid configuration")?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > LOG_LEVEL > info
    let default_level = if args.quiet {
        "error".to_string()
    } else {
        match args.verbose {
            0 => settings
                .log_level
                .as_deref()
                .map_or_else(|| "info".to_string(), str::to_ascii_lowercase),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let limiter = Arc::new(RateLimiter::default());
    let client = Arc::new(
        ApiClient::new(settings.client.clone(), limiter).context("failed to build API client")?,
    );

    match args.command {
        Command::Search { title } => search(&client, &title).await,
        Command::Download(download_args) => {
            apply_overrides(&mut settings, &download_args);
            download(client, settings, download_args).await
        }
    }
}

fn apply_overrides(settings: &mut Settings, args: &DownloadArgs) {
    if let Some(root) = &args.library_root {
        settings.pipeline.library_root.clone_from(root);
    }
    if let Some(work_dir) = &args.work_dir {
        settings.pipeline.work_dir.clone_from(work_dir);
    }
    if args.data_saver {
        settings.pipeline.fetch.prefer_reduced = true;
    }
    if args.no_auto_scan {
        settings.pipeline.auto_scan = false;
    }
}

#[derive(Serialize)]
struct SearchHit<'a> {
    id: &'a str,
    title: &'a str,
    status: Option<&'a str>,
    year: Option<i32>,
}

async fn search(client: &ApiClient, title: &str) -> Result<ExitCode> {
    let list = client
        .search_manga(title)
        .await
        .with_context(|| format!("search for {title:?} failed"))?;
    info!(matches = list.total, "search complete");

    let hits: Vec<SearchHit<'_>> = list
        .data
        .iter()
        .map(|manga| SearchHit {
            id: &manga.id,
            title: manga.display_title().unwrap_or(""),
            status: manga.attributes.status.as_deref(),
            year: manga.attributes.year,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(ExitCode::SUCCESS)
}

async fn download(
    client: Arc<ApiClient>,
    settings: Settings,
    args: DownloadArgs,
) -> Result<ExitCode> {
    let notifier: Arc<dyn LibraryNotifier> = if settings.komga.is_complete() {
        let http = reqwest::Client::builder()
            .user_agent(settings.client.user_agent.clone())
            .build()
            .context("failed to build library HTTP client")?;
        Arc::new(KomgaNotifier::new(http, settings.komga.clone()))
    } else {
        debug!("library server not configured, scans disabled");
        Arc::new(NoopNotifier)
    };

    let manager = Arc::new(DownloadManager::new(client, settings.pipeline, notifier));
    let store = Arc::new(JobStore::new());
    let (queue, worker) = JobQueue::new(Arc::clone(&store), manager);

    let job = queue.submit(JobRequest {
        manga_id: args.manga_id,
        language: args.language,
        volumes: args.volumes,
        chapters: args.chapters,
    })?;
    let job_id = job.id.clone();
    drop(queue);

    // Ctrl-C aborts cooperatively; the current chapter still finishes.
    let abort_store = Arc::clone(&store);
    let abort_id = job_id.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, aborting after the current chapter");
            if let Err(error) = abort_store.abort(&abort_id) {
                debug!(error = %error, "abort ignored");
            }
        }
    });

    worker.run().await;
    interrupt.abort();

    let job = store
        .get(&job_id)
        .with_context(|| format!("job {job_id} vanished from the store"))?;
    println!("{}", serde_json::to_string_pretty(&job)?);

    Ok(match job.status {
        JobStatus::Completed => ExitCode::SUCCESS,
        JobStatus::Aborted => ExitCode::from(EXIT_ABORTED),
        _ => ExitCode::FAILURE,
    })
}
