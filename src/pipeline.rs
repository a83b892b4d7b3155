//! Per-job download pipeline.
//!
//! [`DownloadManager`] turns a [`JobRequest`] into archives on disk:
//! title lookup, chapter discovery, filtering, then for every selected
//! chapter image acquisition and packaging. Per-chapter problems are
//! absorbed into [`JobResult`] counters; only unexpected failures (an
//! archive that cannot be written, a crashed blocking task) end the job with
//! an error.
//!
//! The cancellation token is checked once per chapter boundary, so an abort
//! takes effect after the chapter in flight has been packaged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::api::ApiClient;
use crate::api::constants::DEFAULT_UPLOADS_BASE_URL;
use crate::api::types::Manga;
use crate::archive::{ArchivePackager, ComicInfo, chapter_file_name, series_dir_name};
use crate::catalog::{Chapter, ChapterLister};
use crate::download::{ChapterFetch, FetchSettings, ImageFetcher};
use crate::job::{JobHandler, JobRequest, JobResult};
use crate::library::{LibraryNotifier, SeriesAssets};

/// Language used when a request does not name one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Filesystem and behavior settings for [`DownloadManager`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Root under which one directory per title is created.
    pub library_root: PathBuf,
    /// Staging directory for archives under construction.
    pub work_dir: PathBuf,
    /// Language for requests without one.
    pub default_language: String,
    /// Host serving cover images.
    pub uploads_base_url: String,
    /// Image acquisition tunables.
    pub fetch: FetchSettings,
    /// Trigger a library scan when a job finishes.
    pub auto_scan: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            library_root: PathBuf::from("/library"),
            work_dir: PathBuf::from("/app/data"),
            default_language: DEFAULT_LANGUAGE.to_string(),
            uploads_base_url: DEFAULT_UPLOADS_BASE_URL.to_string(),
            fetch: FetchSettings::default(),
            auto_scan: false,
        }
    }
}

/// Runs download jobs.
pub struct DownloadManager {
    client: Arc<ApiClient>,
    lister: ChapterLister,
    fetcher: ImageFetcher,
    packager: ArchivePackager,
    assets: SeriesAssets,
    notifier: Arc<dyn LibraryNotifier>,
    library_root: PathBuf,
    default_language: String,
    auto_scan: bool,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("library_root", &self.library_root)
            .field("work_dir", &self.packager.work_dir())
            .field("default_language", &self.default_language)
            .field("auto_scan", &self.auto_scan)
            .finish_non_exhaustive()
    }
}

/// What happened to one chapter.
#[derive(Debug)]
enum ChapterOutcome {
    Packaged(PathBuf),
    NoId,
    External,
    NoImages,
}

/// Mutable state carried across the chapters of one job.
struct JobRun<'a> {
    manga_id: &'a str,
    manga: Option<&'a Manga>,
    series_dir: PathBuf,
    assets_done: bool,
    result: JobResult,
}

impl DownloadManager {
    /// Wires the pipeline around a shared client.
    #[must_use]
    pub fn new(
        client: Arc<ApiClient>,
        options: PipelineOptions,
        notifier: Arc<dyn LibraryNotifier>,
    ) -> Self {
        Self {
            lister: ChapterLister::new(Arc::clone(&client)),
            fetcher: ImageFetcher::new(Arc::clone(&client), options.fetch),
            packager: ArchivePackager::new(options.work_dir),
            assets: SeriesAssets::new(Arc::clone(&client), options.uploads_base_url),
            client,
            notifier,
            library_root: options.library_root,
            default_language: options.default_language,
            auto_scan: options.auto_scan,
        }
    }

    /// Replaces the chapter lister (page sizes are tunable there).
    #[must_use]
    pub fn with_lister(mut self, lister: ChapterLister) -> Self {
        self.lister = lister;
        self
    }

    /// Root directory for series folders.
    #[must_use]
    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    /// Runs one job until every selected chapter has been handled or
    /// `cancel` fires.
    ///
    /// # Errors
    ///
    /// Fails when an archive cannot be written. Chapters packaged before the
    /// failure stay on disk.
    #[instrument(skip(self, request, cancel), fields(manga_id = %request.manga_id))]
    pub async fn download(
        &self,
        request: &JobRequest,
        cancel: &CancellationToken,
    ) -> anyhow::Result<JobResult> {
        let language = request
            .language
            .as_deref()
            .filter(|language| !language.trim().is_empty())
            .unwrap_or(&self.default_language);

        let manga = match self.client.get_manga(&request.manga_id).await {
            Ok(manga) => Some(manga),
            Err(error) => {
                warn!(error = %error, "title lookup failed, continuing without metadata");
                None
            }
        };
        let series_dir = self
            .library_root
            .join(series_dir_name(manga.as_ref(), &request.manga_id));

        let listed = self.lister.list_chapters(&request.manga_id, language).await;
        let listed_count = listed.len();
        let filter = request.filter();
        let chapters = filter.select(listed);
        if filter.is_empty() {
            info!(chapters = chapters.len(), "no filter applied");
        } else {
            info!(
                volumes = ?request.volumes,
                chapters_filter = ?request.chapters,
                count = chapters.len(),
                from = listed_count,
                "filter applied"
            );
        }

        let mut run = JobRun {
            manga_id: &request.manga_id,
            manga: manga.as_ref(),
            series_dir,
            assets_done: false,
            result: JobResult {
                chapters_processed: chapters.len(),
                ..JobResult::default()
            },
        };

        for chapter in &chapters {
            if cancel.is_cancelled() {
                info!(
                    packaged = run.result.chapters_packaged,
                    "abort observed, stopping before next chapter"
                );
                break;
            }

            match self.process_chapter(&mut run, chapter).await? {
                ChapterOutcome::Packaged(path) => {
                    run.result.chapters_packaged += 1;
                    run.result.files_created.push(path);
                }
                ChapterOutcome::NoId => {
                    run.result.skipped_no_id += 1;
                    run.result.skipped_chapters += 1;
                }
                ChapterOutcome::External => {
                    run.result.skipped_external += 1;
                    run.result.skipped_chapters += 1;
                }
                ChapterOutcome::NoImages => {
                    run.result.skipped_no_images += 1;
                    run.result.skipped_chapters += 1;
                }
            }
        }

        if self.auto_scan {
            let outcome = self.notifier.trigger_scan().await;
            debug!(?outcome, "end-of-job library scan");
        }

        let result = run.result;
        info!(
            chapters_processed = result.chapters_processed,
            chapters_packaged = result.chapters_packaged,
            skipped_chapters = result.skipped_chapters,
            skipped_external = result.skipped_external,
            skipped_no_images = result.skipped_no_images,
            errors = result.errors,
            "job summary"
        );
        Ok(result)
    }

    #[instrument(skip_all, fields(chapter_id = chapter.id.as_deref().unwrap_or("-"), number = chapter.number.as_deref().unwrap_or("-")))]
    async fn process_chapter(
        &self,
        run: &mut JobRun<'_>,
        chapter: &Chapter,
    ) -> anyhow::Result<ChapterOutcome> {
        let Some(chapter_id) = chapter.id.as_deref() else {
            debug!("chapter has no id, skipping");
            return Ok(ChapterOutcome::NoId);
        };
        if chapter.external {
            debug!("chapter is hosted externally, skipping");
            return Ok(ChapterOutcome::External);
        }

        let fetch = self.fetcher.fetch_chapter(chapter_id).await;
        run.result.errors += fetch.errors();
        let ChapterFetch::Images { tier, images, .. } = fetch else {
            info!("no images for chapter, skipping");
            return Ok(ChapterOutcome::NoImages);
        };
        debug!(%tier, images = images.len(), "images fetched");

        if !run.assets_done
            && let Some(manga) = run.manga
        {
            run.assets_done = true;
            let assets = self.assets.ensure(&run.series_dir, manga).await;
            debug!(?assets, "series assets checked");
            let outcome = self.notifier.trigger_scan().await;
            debug!(?outcome, "library scan after first chapter");
        }

        let comic_info = run.manga.map(|manga| ComicInfo::new(manga, chapter));
        let destination = run.series_dir.join(chapter_file_name(chapter));
        let packager = self.packager.clone();
        let chapter_id = chapter_id.to_string();
        let path = tokio::task::spawn_blocking(move || {
            packager.package(&chapter_id, comic_info.as_ref(), images, &destination)
        })
        .await
        .context("packaging task failed")?
        .with_context(|| format!("failed to package chapter of {}", run.manga_id))?;

        info!(path = %path.display(), "packaged chapter");
        Ok(ChapterOutcome::Packaged(path))
    }
}

#[async_trait]
impl JobHandler for DownloadManager {
    async fn run(
        &self,
        request: JobRequest,
        cancel: CancellationToken,
    ) -> anyhow::Result<JobResult> {
        self.download(&request, &cancel).await
    }
}
