//! Adaptive-pagination chapter listing.
//!
//! Some titles make the listing endpoint reject large pages with a 400. The
//! lister then drops to a smaller page size once and re-requests the same
//! offset. Any other failure ends the listing early: the chapters gathered so
//! far are returned as a normal, partial result.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::Chapter;
use crate::api::ApiClient;

/// Page size used for the first request.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Page size used after the server rejects the default one.
pub const DEGRADED_PAGE_SIZE: u32 = 100;

/// Lists every chapter of a title in one language.
#[derive(Debug, Clone)]
pub struct ChapterLister {
    client: Arc<ApiClient>,
    page_size: u32,
    degraded_page_size: u32,
}

impl ChapterLister {
    /// Creates a lister with the default 500/100 page sizes.
    #[must_use]
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self::with_page_sizes(client, DEFAULT_PAGE_SIZE, DEGRADED_PAGE_SIZE)
    }

    /// Creates a lister with explicit page sizes.
    #[must_use]
    pub fn with_page_sizes(client: Arc<ApiClient>, page_size: u32, degraded_page_size: u32) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
            degraded_page_size: degraded_page_size.max(1),
        }
    }

    /// Returns all chapters in upstream order (ascending chapter number).
    ///
    /// Never fails: on an unrecoverable error the chapters accumulated so far
    /// are returned and the failure is logged.
    #[instrument(skip(self), fields(page_size = self.page_size))]
    pub async fn list_chapters(&self, manga_id: &str, language: &str) -> Vec<Chapter> {
        let mut chapters: Vec<Chapter> = Vec::new();
        let mut page_size = self.page_size;
        let mut offset: u64 = 0;

        loop {
            let page = match self
                .client
                .get_chapter_page(manga_id, language, page_size, offset)
                .await
            {
                Ok(page) => page,
                Err(error)
                    if error.http_status() == Some(400) && page_size != self.degraded_page_size =>
                {
                    warn!(
                        offset,
                        from = page_size,
                        to = self.degraded_page_size,
                        "chapter listing rejected page size, degrading"
                    );
                    page_size = self.degraded_page_size;
                    continue;
                }
                Err(error) => {
                    warn!(
                        error = %error,
                        offset,
                        collected = chapters.len(),
                        "chapter listing failed, proceeding with partial list"
                    );
                    break;
                }
            };

            if page.data.is_empty() {
                break;
            }

            let returned = page.data.len() as u64;
            offset += returned;
            chapters.extend(page.data.into_iter().map(Chapter::from));
            debug!(batch = returned, offset, total = page.total, "chapter page fetched");

            if offset >= page.total {
                break;
            }
        }

        info!(count = chapters.len(), "chapter listing complete");
        chapters
    }
}
