//! Per-title assets: `cover.jpg` and `series.json`.
//!
//! Each file is written at most once and never overwritten. Failures are
//! logged and reported in [`AssetsOutcome`]; they never fail a job.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::api::ApiClient;
use crate::api::types::Manga;
use crate::archive::normalize_to_jpeg;

/// Cover image file name inside a series directory.
pub const COVER_FILE: &str = "cover.jpg";

/// Metadata document file name inside a series directory.
pub const SERIES_METADATA_FILE: &str = "series.json";

/// Contents of `series.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesMetadata {
    /// Display title.
    pub title: String,
    /// Synopsis (empty when unknown).
    pub description: String,
    /// Publication status (empty when unknown).
    pub status: String,
    /// Year of first publication.
    pub year: Option<i32>,
    /// English tag names.
    pub tags: Vec<String>,
    /// Story credits.
    pub authors: Vec<String>,
    /// Art credits.
    pub artists: Vec<String>,
    /// Upstream title id.
    pub mangadex_id: String,
}

impl SeriesMetadata {
    /// Builds the document from a title record.
    #[must_use]
    pub fn from_manga(manga: &Manga) -> Self {
        Self {
            title: manga.display_title().unwrap_or("Unknown").to_string(),
            description: manga.description().unwrap_or_default().to_string(),
            status: manga.attributes.status.clone().unwrap_or_default(),
            year: manga.attributes.year,
            tags: manga.tag_names(),
            authors: manga.authors(),
            artists: manga.artists(),
            mangadex_id: manga.id.clone(),
        }
    }
}

/// Which assets were written by one [`SeriesAssets::ensure`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetsOutcome {
    /// `cover.jpg` was created.
    pub cover_written: bool,
    /// `series.json` was created.
    pub metadata_written: bool,
}

/// Writes series assets, fetching covers through the shared client.
#[derive(Debug, Clone)]
pub struct SeriesAssets {
    client: Arc<ApiClient>,
    uploads_base_url: String,
}

impl SeriesAssets {
    /// Creates the writer. `uploads_base_url` hosts `covers/{id}/{file}`.
    #[must_use]
    pub fn new(client: Arc<ApiClient>, uploads_base_url: impl Into<String>) -> Self {
        Self {
            client,
            uploads_base_url: uploads_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Cover URL for a title, when its cover relationship was expanded.
    #[must_use]
    pub fn cover_url(&self, manga: &Manga) -> Option<String> {
        manga
            .cover_file_name()
            .map(|file| format!("{}/covers/{}/{file}", self.uploads_base_url, manga.id))
    }

    /// Creates `cover.jpg` and `series.json` in `series_dir` if absent.
    #[instrument(skip(self, manga), fields(series_dir = %series_dir.display(), manga_id = %manga.id))]
    pub async fn ensure(&self, series_dir: &Path, manga: &Manga) -> AssetsOutcome {
        if let Err(error) = tokio::fs::create_dir_all(series_dir).await {
            warn!(error = %error, "cannot create series directory");
            return AssetsOutcome::default();
        }

        AssetsOutcome {
            cover_written: self.ensure_cover(series_dir, manga).await,
            metadata_written: ensure_metadata(series_dir, manga).await,
        }
    }

    async fn ensure_cover(&self, series_dir: &Path, manga: &Manga) -> bool {
        let path = series_dir.join(COVER_FILE);
        if exists(&path).await {
            return false;
        }
        let Some(url) = self.cover_url(manga) else {
            info!("title has no cover art");
            return false;
        };

        let bytes = match self.client.fetch_asset(&url).await {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(error = %error, "failed to download cover");
                return false;
            }
        };
        let jpeg = tokio::task::spawn_blocking(move || normalize_to_jpeg(bytes)).await;
        let Ok(jpeg) = jpeg else {
            warn!("cover conversion task failed");
            return false;
        };

        match tokio::fs::write(&path, jpeg).await {
            Ok(()) => {
                info!(path = %path.display(), "downloaded cover image");
                true
            }
            Err(error) => {
                warn!(error = %error, "failed to write cover");
                false
            }
        }
    }
}

async fn ensure_metadata(series_dir: &Path, manga: &Manga) -> bool {
    let path = series_dir.join(SERIES_METADATA_FILE);
    if exists(&path).await {
        return false;
    }

    let document = match serde_json::to_vec_pretty(&SeriesMetadata::from_manga(manga)) {
        Ok(document) => document,
        Err(error) => {
            warn!(error = %error, "failed to serialize series metadata");
            return false;
        }
    };
    match tokio::fs::write(&path, document).await {
        Ok(()) => {
            info!(path = %path.display(), "created series metadata file");
            true
        }
        Err(error) => {
            warn!(error = %error, "failed to write series metadata");
            false
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
