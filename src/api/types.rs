//! Wire models for the content API.
//!
//! Only the fields the pipeline reads are modeled; everything else in the
//! upstream payloads is ignored. Localized strings arrive as
//! `{ "en": "...", "ja-ro": "..." }` maps, and the upstream serializes an
//! empty map as `[]`, so those fields go through [`lenient_map`].

use serde::{Deserialize, Deserializer};

/// Localized strings keyed by language tag, in document order.
///
/// Order matters: when no preferred language is present, the first entry
/// the server sent is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedString(Vec<(String, String)>);

impl LocalizedString {
    /// Text for one language tag.
    #[must_use]
    pub fn get(&self, language: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(tag, _)| tag == language)
            .map(|(_, text)| text.as_str())
    }

    /// First text in document order.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(|(_, text)| text.as_str())
    }

    /// Whether no language is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for LocalizedString {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `GET /manga?title=` response.
#[derive(Debug, Clone, Deserialize)]
pub struct MangaList {
    /// Matching titles.
    #[serde(default)]
    pub data: Vec<Manga>,
    /// Total matches reported by the server.
    #[serde(default)]
    pub total: u64,
}

/// `GET /manga/{id}` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct MangaEnvelope {
    /// The title record.
    pub data: Manga,
}

/// A title record with its expanded relationships.
#[derive(Debug, Clone, Deserialize)]
pub struct Manga {
    /// Title identifier.
    pub id: String,
    /// Title attributes.
    #[serde(default)]
    pub attributes: MangaAttributes,
    /// Related records (cover art, authors, artists).
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Descriptive attributes of a title.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaAttributes {
    /// Title in one or more languages.
    #[serde(default, deserialize_with = "lenient_map")]
    pub title: LocalizedString,
    /// Synopsis in one or more languages.
    #[serde(default, deserialize_with = "lenient_map")]
    pub description: LocalizedString,
    /// Publication status (`ongoing`, `completed`, ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Year of first publication.
    #[serde(default)]
    pub year: Option<i32>,
    /// Genre and theme tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A genre/theme tag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tag {
    /// Tag attributes.
    #[serde(default)]
    pub attributes: TagAttributes,
}

/// Attributes of a tag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagAttributes {
    /// Localized tag name.
    #[serde(default, deserialize_with = "lenient_map")]
    pub name: LocalizedString,
}

/// A relationship entry on a title. `attributes` is present only when the
/// request asked for the relationship to be expanded (`includes[]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Related record id.
    pub id: String,
    /// Relationship type (`cover_art`, `author`, `artist`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Expanded attributes.
    #[serde(default)]
    pub attributes: Option<RelationshipAttributes>,
}

/// Expanded relationship attributes; which fields are set depends on the kind.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipAttributes {
    /// Person name for author/artist relationships.
    #[serde(default)]
    pub name: Option<String>,
    /// Cover file name for `cover_art` relationships.
    #[serde(default)]
    pub file_name: Option<String>,
}

impl Manga {
    /// Preferred display title: English, then romanized Japanese, then
    /// Japanese, then whichever language comes first.
    #[must_use]
    pub fn display_title(&self) -> Option<&str> {
        let titles = &self.attributes.title;
        ["en", "ja-ro", "ja"]
            .iter()
            .find_map(|lang| titles.get(lang))
            .or_else(|| titles.first())
            .filter(|title| !title.trim().is_empty())
    }

    /// English synopsis, or the first available one.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        let descriptions = &self.attributes.description;
        descriptions
            .get("en")
            .or_else(|| descriptions.first())
            .filter(|text| !text.trim().is_empty())
    }

    /// English tag names in upstream order (empty strings for untranslated tags).
    #[must_use]
    pub fn tag_names(&self) -> Vec<String> {
        self.attributes
            .tags
            .iter()
            .map(|tag| tag.attributes.name.get("en").unwrap_or_default().to_string())
            .collect()
    }

    /// Names of `author` relationships.
    #[must_use]
    pub fn authors(&self) -> Vec<String> {
        self.related_names("author")
    }

    /// Names of `artist` relationships.
    #[must_use]
    pub fn artists(&self) -> Vec<String> {
        self.related_names("artist")
    }

    /// File name of the expanded `cover_art` relationship.
    #[must_use]
    pub fn cover_file_name(&self) -> Option<&str> {
        self.relationships
            .iter()
            .filter(|rel| rel.kind == "cover_art")
            .find_map(|rel| rel.attributes.as_ref()?.file_name.as_deref())
    }

    fn related_names(&self, kind: &str) -> Vec<String> {
        self.relationships
            .iter()
            .filter(|rel| rel.kind == kind)
            .filter_map(|rel| rel.attributes.as_ref()?.name.clone())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// `GET /chapter` response page.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterPage {
    /// Chapters on this page.
    #[serde(default)]
    pub data: Vec<ChapterData>,
    /// Total chapters matching the query.
    #[serde(default)]
    pub total: u64,
}

/// One chapter record as listed by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterData {
    /// Chapter identifier (absent on malformed records).
    #[serde(default)]
    pub id: Option<String>,
    /// Chapter attributes.
    #[serde(default)]
    pub attributes: ChapterAttributes,
}

/// Chapter attributes. Volume and chapter labels arrive as either JSON
/// strings or numbers and are normalized to strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterAttributes {
    /// Volume label.
    #[serde(default, deserialize_with = "label")]
    pub volume: Option<String>,
    /// Chapter number label (`"12"`, `"12.5"`, `"Extra"`).
    #[serde(default, deserialize_with = "label")]
    pub chapter: Option<String>,
    /// Human chapter title.
    #[serde(default)]
    pub title: Option<String>,
    /// Translation language tag.
    #[serde(default)]
    pub translated_language: Option<String>,
    /// Set when the chapter is hosted on a third-party site.
    #[serde(default)]
    pub external_url: Option<String>,
}

/// `GET /at-home/server/{id}` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtHome {
    /// Delivery host for this chapter.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Content hash and per-tier file lists.
    #[serde(default)]
    pub chapter: AtHomeChapter,
}

/// Image listing inside an [`AtHome`] response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeChapter {
    /// Content hash used in image paths.
    #[serde(default)]
    pub hash: Option<String>,
    /// Full-quality file names.
    #[serde(default)]
    pub data: Vec<String>,
    /// Reduced-quality file names.
    #[serde(default)]
    pub data_saver: Vec<String>,
}

/// OAuth token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for API requests.
    pub access_token: String,
    /// Refresh token (omitted on some refresh responses).
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Text(String),
    Integer(i64),
    Float(f64),
}

fn label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawLabel>::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| {
        let text = match raw {
            RawLabel::Text(text) => text,
            RawLabel::Integer(n) => n.to_string(),
            RawLabel::Float(n) => n.to_string(),
        };
        let text = text.trim().to_string();
        (!text.is_empty()).then_some(text)
    }))
}

/// Accepts a string map, and treats any other JSON shape (`[]`, `null`) as empty.
fn lenient_map<'de, D>(deserializer: D) -> Result<LocalizedString, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Object(map) = value else {
        return Ok(LocalizedString::default());
    };
    Ok(map
        .into_iter()
        .filter_map(|(lang, text)| match text {
            serde_json::Value::String(text) => Some((lang, text)),
            _ => None,
        })
        .collect())
}
