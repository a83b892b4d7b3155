//! `ComicInfo.xml` metadata document embedded in every archive.
//!
//! Library servers (Komga, Kavita) read series, numbering, credits and genre
//! from this entry. It is only produced when title metadata is available;
//! an archive without it is preferable to one with a hollow document.

use crate::api::types::Manga;
use crate::catalog::Chapter;

/// Entry name inside the archive.
pub const COMIC_INFO_ENTRY: &str = "ComicInfo.xml";

/// Genre tags carried into the document.
const MAX_GENRES: usize = 5;

/// Metadata for one packaged chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComicInfo {
    /// Series title.
    pub series: String,
    /// Chapter number label (or chapter id when unnumbered).
    pub number: String,
    /// Chapter title.
    pub title: Option<String>,
    /// Series synopsis.
    pub summary: Option<String>,
    /// Year of first publication.
    pub year: Option<i32>,
    /// Story credits.
    pub writers: Vec<String>,
    /// Art credits.
    pub pencillers: Vec<String>,
    /// Up to five genre tags.
    pub genres: Vec<String>,
    /// Translation language tag.
    pub language: String,
}

impl ComicInfo {
    /// Builds the document for a chapter of a title.
    #[must_use]
    pub fn new(manga: &Manga, chapter: &Chapter) -> Self {
        let number = chapter
            .number
            .clone()
            .or_else(|| chapter.id.clone())
            .unwrap_or_default();
        Self {
            series: manga.display_title().unwrap_or("Unknown").to_string(),
            number,
            title: chapter.title.clone(),
            summary: manga.description().map(str::to_string),
            year: manga.attributes.year,
            writers: manga.authors(),
            pencillers: manga.artists(),
            genres: manga
                .tag_names()
                .into_iter()
                .take(MAX_GENRES)
                .filter(|tag| !tag.is_empty())
                .collect(),
            language: chapter
                .language
                .clone()
                .filter(|lang| !lang.is_empty())
                .unwrap_or_else(|| "en".to_string()),
        }
    }

    /// Renders the UTF-8 XML document.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<ComicInfo>\n");
        push_element(&mut xml, "Series", &self.series);
        push_element(&mut xml, "Number", &self.number);
        if let Some(title) = &self.title {
            push_element(&mut xml, "Title", title);
        }
        if let Some(summary) = &self.summary {
            push_element(&mut xml, "Summary", summary);
        }
        if let Some(year) = self.year {
            push_element(&mut xml, "Year", &year.to_string());
        }
        if !self.writers.is_empty() {
            push_element(&mut xml, "Writer", &self.writers.join(", "));
        }
        if !self.pencillers.is_empty() {
            push_element(&mut xml, "Penciller", &self.pencillers.join(", "));
        }
        if !self.genres.is_empty() {
            push_element(&mut xml, "Genre", &self.genres.join(", "));
        }
        push_element(&mut xml, "Manga", "Yes");
        push_element(&mut xml, "LanguageISO", &self.language);
        xml.push_str("</ComicInfo>\n");
        xml
    }
}

fn push_element(xml: &mut String, name: &str, value: &str) {
    xml.push_str("  <");
    xml.push_str(name);
    xml.push('>');
    xml.push_str(&xml_escape(value));
    xml.push_str("</");
    xml.push_str(name);
    xml.push_str(">\n");
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
