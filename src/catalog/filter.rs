//! Volume and chapter selection.
//!
//! A chapter selector given as exactly two labels that both parse as finite
//! numbers (surrounding whitespace ignored) is an inclusive numeric range; any
//! other list is a set of labels matched verbatim. Volume and chapter
//! constraints combine with AND, and a chapter missing the constrained field
//! is excluded.

use std::collections::BTreeSet;

/// Chapter-number constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum ChapterSelector {
    /// Inclusive numeric range. Chapters with non-numeric labels never match.
    Range {
        /// Lower bound.
        start: f64,
        /// Upper bound.
        end: f64,
    },
    /// Explicit labels compared verbatim.
    Set(BTreeSet<String>),
}

impl ChapterSelector {
    /// Builds a selector from user-supplied labels. Empty input means no
    /// constraint and yields `None`.
    ///
    /// Exactly two labels that both parse as numbers form a range; any other
    /// list, blank entries included, is a set matched verbatim.
    #[must_use]
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Option<Self> {
        if labels.is_empty() {
            return None;
        }

        if let [first, second] = labels
            && let (Some(start), Some(end)) =
                (parse_number(first.as_ref()), parse_number(second.as_ref()))
        {
            return Some(Self::Range { start, end });
        }

        Some(Self::Set(
            labels.iter().map(|label| label.as_ref().to_string()).collect(),
        ))
    }

    /// Whether a chapter number label satisfies this selector.
    #[must_use]
    pub fn matches(&self, number: Option<&str>) -> bool {
        match self {
            Self::Range { start, end } => number
                .and_then(parse_number)
                .is_some_and(|n| *start <= n && n <= *end),
            Self::Set(labels) => number.is_some_and(|label| labels.contains(label)),
        }
    }
}

/// Selection predicate applied to a discovered chapter list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterFilter {
    /// Volume labels to keep; `None` keeps every volume.
    pub volumes: Option<BTreeSet<String>>,
    /// Chapter constraint; `None` keeps every chapter.
    pub chapters: Option<ChapterSelector>,
}

impl ChapterFilter {
    /// Builds a filter from raw request lists. Empty lists mean "no filter".
    #[must_use]
    pub fn new<V: AsRef<str>, C: AsRef<str>>(volumes: &[V], chapters: &[C]) -> Self {
        let volumes: BTreeSet<String> = volumes
            .iter()
            .map(|v| v.as_ref().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        Self {
            volumes: (!volumes.is_empty()).then_some(volumes),
            chapters: ChapterSelector::from_labels(chapters),
        }
    }

    /// Whether no constraint is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volumes.is_none() && self.chapters.is_none()
    }

    /// Whether a chapter passes every configured constraint.
    #[must_use]
    pub fn matches(&self, chapter: &super::Chapter) -> bool {
        let volume_ok = self.volumes.as_ref().is_none_or(|volumes| {
            chapter
                .volume
                .as_deref()
                .is_some_and(|volume| volumes.contains(volume))
        });
        let chapter_ok = self
            .chapters
            .as_ref()
            .is_none_or(|selector| selector.matches(chapter.number.as_deref()));
        volume_ok && chapter_ok
    }

    /// Keeps the matching chapters, preserving their order.
    #[must_use]
    pub fn select(&self, chapters: Vec<super::Chapter>) -> Vec<super::Chapter> {
        if self.is_empty() {
            return chapters;
        }
        chapters.into_iter().filter(|c| self.matches(c)).collect()
    }
}

fn parse_number(label: &str) -> Option<f64> {
    label.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::super::Chapter;
    use super::*;

    fn chapter(volume: Option<&str>, number: Option<&str>) -> Chapter {
        Chapter {
            id: Some(format!("{volume:?}-{number:?}")),
            volume: volume.map(str::to_string),
            number: number.map(str::to_string),
            ..Chapter::default()
        }
    }

    fn sample() -> Vec<Chapter> {
        vec![
            chapter(Some("1"), Some("1")),
            chapter(Some("1"), Some("2")),
            chapter(Some("1"), Some("2.5")),
            chapter(Some("2"), Some("3")),
            chapter(None, Some("Extra")),
            chapter(Some("2"), None),
            chapter(Some("3"), Some("10")),
        ]
    }

    #[test]
    fn test_empty_filter_is_identity() {
        let filter = ChapterFilter::new::<&str, &str>(&[], &[]);
        assert!(filter.is_empty());
        assert_eq!(filter.select(sample()), sample());
    }

    #[test]
    fn test_two_numeric_labels_form_inclusive_range() {
        let filter = ChapterFilter::new::<&str, &str>(&[], &["2", "3"]);
        assert_eq!(
            filter.chapters,
            Some(ChapterSelector::Range {
                start: 2.0,
                end: 3.0
            })
        );

        let kept = filter.select(sample());
        let numbers: Vec<_> = kept.iter().filter_map(|c| c.number.as_deref()).collect();
        assert_eq!(numbers, vec!["2", "2.5", "3"]);
        for c in &kept {
            let n: f64 = c.number.as_deref().and_then(|s| s.parse().ok()).unwrap_or(f64::NAN);
            assert!((2.0..=3.0).contains(&n));
        }
    }

    #[test]
    fn test_range_excludes_non_numeric_and_missing_labels() {
        let filter = ChapterFilter::new::<&str, &str>(&[], &["0", "100"]);
        let kept = filter.select(sample());
        assert!(kept.iter().all(|c| c.number.as_deref() != Some("Extra")));
        assert!(kept.iter().all(|c| c.number.is_some()));
        assert_eq!(kept.len(), 5);
    }

    #[test]
    fn test_inverted_range_keeps_nothing() {
        let filter = ChapterFilter::new::<&str, &str>(&[], &["5", "1"]);
        assert!(filter.select(sample()).is_empty());
    }

    #[test]
    fn test_non_numeric_pair_is_a_set() {
        let filter = ChapterFilter::new::<&str, &str>(&[], &["1", "Extra"]);
        assert!(matches!(filter.chapters, Some(ChapterSelector::Set(_))));

        let kept = filter.select(sample());
        let numbers: Vec<_> = kept.iter().filter_map(|c| c.number.as_deref()).collect();
        assert_eq!(numbers, vec!["1", "Extra"]);
    }

    #[test]
    fn test_set_matches_labels_verbatim() {
        // Three labels, so never a range; "2.50" must not match "2.5"
        let filter = ChapterFilter::new::<&str, &str>(&[], &["1", "2.50", "10"]);
        let kept = filter.select(sample());
        let numbers: Vec<_> = kept.iter().filter_map(|c| c.number.as_deref()).collect();
        assert_eq!(numbers, vec!["1", "10"]);
    }

    #[test]
    fn test_blank_entry_still_counts_toward_list_length() {
        let selector = ChapterSelector::from_labels(&["1", "", "5"]);
        let Some(ChapterSelector::Set(labels)) = &selector else {
            panic!("three labels must form a set, got {selector:?}");
        };
        assert_eq!(labels.len(), 3);

        let filter = ChapterFilter::new::<&str, &str>(&[], &["1", "", "5"]);
        let numbers: Vec<_> = filter
            .select(sample())
            .into_iter()
            .filter_map(|c| c.number)
            .collect();
        assert_eq!(numbers, vec!["1"]);
    }

    #[test]
    fn test_set_entries_are_not_trimmed() {
        let filter = ChapterFilter::new::<&str, &str>(&[], &[" 2", "Extra", "10"]);
        let numbers: Vec<_> = filter
            .select(sample())
            .into_iter()
            .filter_map(|c| c.number)
            .collect();
        assert_eq!(numbers, vec!["Extra", "10"]);
    }

    #[test]
    fn test_padded_range_endpoints_still_parse() {
        assert_eq!(
            ChapterSelector::from_labels(&[" 2", "3 "]),
            Some(ChapterSelector::Range {
                start: 2.0,
                end: 3.0
            })
        );
    }

    #[test]
    fn test_infinite_endpoint_is_not_numeric() {
        let selector = ChapterSelector::from_labels(&["1", "inf"]);
        assert!(matches!(selector, Some(ChapterSelector::Set(_))));
    }

    #[test]
    fn test_volume_and_chapter_combine_conjunctively() {
        let filter = ChapterFilter::new(&["1"], &["2", "3"]);
        let kept = filter.select(sample());
        let numbers: Vec<_> = kept.iter().filter_map(|c| c.number.as_deref()).collect();
        assert_eq!(numbers, vec!["2", "2.5"]);
    }

    #[test]
    fn test_volume_filter_excludes_missing_volume() {
        let filter = ChapterFilter::new::<&str, &str>(&["2"], &[]);
        let kept = filter.select(sample());
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|c| c.volume.as_deref() == Some("2")));
    }
}
