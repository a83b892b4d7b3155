//! Filesystem-safe names for series directories and chapter archives.
//!
//! Both use allowlists: anything outside the allowed characters is dropped
//! rather than replaced, matching how library servers display the names.

use crate::api::types::Manga;
use crate::catalog::Chapter;

/// Punctuation kept in chapter titles and numbers.
const CHAPTER_PUNCTUATION: &[char] = &[' ', '-', '_', '.'];

/// Punctuation kept in series directory names.
const SERIES_PUNCTUATION: &[char] = &[' ', '-', '_', '.', ',', '(', ')', '[', ']'];

/// Drops every character that is neither alphanumeric nor in `allowed`,
/// then trims surrounding whitespace.
fn keep_allowed(value: &str, allowed: &[char]) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric() || allowed.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Rejects names that would resolve to the current or parent directory.
fn is_usable(name: &str) -> bool {
    !name.is_empty() && !name.chars().all(|c| c == '.')
}

/// Sanitizes a chapter title for use in a file name.
#[must_use]
pub fn sanitize_chapter_title(title: &str) -> String {
    keep_allowed(title, CHAPTER_PUNCTUATION)
}

/// Sanitizes a series title for use as a directory name.
#[must_use]
pub fn sanitize_series_name(title: &str) -> String {
    keep_allowed(title, SERIES_PUNCTUATION)
}

/// Archive file name for a chapter: `c{number} {title}.cbz`, or
/// `c{number}.cbz` when the title is empty after sanitization. The number
/// falls back to the chapter id.
#[must_use]
pub fn chapter_file_name(chapter: &Chapter) -> String {
    let number = [chapter.number.as_deref(), chapter.id.as_deref()]
        .into_iter()
        .flatten()
        .map(|label| keep_allowed(label, CHAPTER_PUNCTUATION))
        .find(|label| is_usable(label))
        .unwrap_or_else(|| "unknown".to_string());

    let title = chapter
        .title
        .as_deref()
        .map(sanitize_chapter_title)
        .unwrap_or_default();

    if title.is_empty() {
        format!("c{number}.cbz")
    } else {
        format!("c{number} {title}.cbz")
    }
}

/// Directory name for a title: the preferred display title, sanitized, or
/// the title id when no usable title is known.
#[must_use]
pub fn series_dir_name(manga: Option<&Manga>, manga_id: &str) -> String {
    manga
        .and_then(Manga::display_title)
        .map(sanitize_series_name)
        .filter(|name| is_usable(name))
        .unwrap_or_else(|| {
            let id = sanitize_series_name(manga_id);
            if is_usable(&id) { id } else { "unknown".to_string() }
        })
}

/// Temp-file stem for a chapter id: ASCII alphanumerics, `-` and `_` only.
#[must_use]
pub fn temp_stem(chapter_id: &str) -> String {
    let stem: String = chapter_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    if stem.is_empty() {
        "chapter".to_string()
    } else {
        stem
    }
}
