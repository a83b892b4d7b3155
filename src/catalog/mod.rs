//! Chapter listing and selection.
//!
//! [`ChapterLister`] pages through a title's chapters for one language, and
//! [`ChapterFilter`] narrows the list to the volumes and chapters a job asked
//! for. Both work on the immutable [`Chapter`] descriptor.

mod discovery;
mod filter;

pub use discovery::{ChapterLister, DEFAULT_PAGE_SIZE, DEGRADED_PAGE_SIZE};
pub use filter::{ChapterFilter, ChapterSelector};

use crate::api::types::ChapterData;

/// A chapter as listed by the content API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chapter {
    /// Chapter identifier; absent on malformed upstream records.
    pub id: Option<String>,
    /// Volume label (`"3"`, `"Special"`).
    pub volume: Option<String>,
    /// Chapter number label (`"12"`, `"12.5"`, `"Extra"`).
    pub number: Option<String>,
    /// Human title.
    pub title: Option<String>,
    /// Translation language tag.
    pub language: Option<String>,
    /// Hosted on a third-party site; no images are available here.
    pub external: bool,
}

impl From<ChapterData> for Chapter {
    fn from(data: ChapterData) -> Self {
        let attributes = data.attributes;
        Self {
            id: data.id.filter(|id| !id.is_empty()),
            volume: attributes.volume,
            number: attributes.chapter,
            title: attributes.title.filter(|title| !title.trim().is_empty()),
            language: attributes.translated_language,
            external: attributes
                .external_url
                .is_some_and(|url| !url.trim().is_empty()),
        }
    }
}
