//! Image source descriptors and quality-tier selection.

use std::fmt;

use crate::api::types::AtHome;

/// One of the two parallel image-quality variants offered per chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTier {
    /// Original-quality images (`data`).
    Full,
    /// Recompressed, smaller images (`data-saver`).
    Reduced,
}

impl ImageTier {
    /// Path segment used by delivery hosts for this tier.
    #[must_use]
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Full => "data",
            Self::Reduced => "data-saver",
        }
    }

    /// The opposite tier.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Full => Self::Reduced,
            Self::Reduced => Self::Full,
        }
    }
}

impl fmt::Display for ImageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Where a chapter's images live: delivery host, content hash, and the file
/// lists of both tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    /// Delivery host base URL (no trailing slash).
    pub base_url: String,
    /// Chapter content hash.
    pub hash: String,
    /// Full-quality file names, in page order.
    pub full: Vec<String>,
    /// Reduced-quality file names, in page order.
    pub reduced: Vec<String>,
}

impl ImageSource {
    /// Builds a source from a resolution response. `None` when the host or
    /// hash is missing.
    #[must_use]
    pub fn from_at_home(at_home: AtHome) -> Option<Self> {
        let base_url = at_home
            .base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())?;
        let hash = at_home.chapter.hash.filter(|hash| !hash.is_empty())?;
        Some(Self {
            base_url,
            hash,
            full: at_home.chapter.data,
            reduced: at_home.chapter.data_saver,
        })
    }

    /// File names for a tier.
    #[must_use]
    pub fn files(&self, tier: ImageTier) -> &[String] {
        match tier {
            ImageTier::Full => &self.full,
            ImageTier::Reduced => &self.reduced,
        }
    }

    /// Picks the preferred tier, substituting the other one when the
    /// preferred list is empty. `None` when both are empty.
    #[must_use]
    pub fn select(&self, preferred: ImageTier) -> Option<ImageTier> {
        [preferred, preferred.other()]
            .into_iter()
            .find(|tier| !self.files(*tier).is_empty())
    }

    /// URL of one image: `{base}/{tier}/{hash}/{file}`.
    #[must_use]
    pub fn image_url(&self, tier: ImageTier, file: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            tier.path_segment(),
            self.hash,
            file
        )
    }
}
