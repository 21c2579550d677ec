//! Attribute histograms.
//!
//! [`get_attributes`] tallies every (attribute, value) pair across a song
//! list and then trims the result down to attributes that can actually
//! discriminate between songs. The outcome is a map from attribute name to
//! observed values with their occurrence counts, handy for discovering
//! candidate filter expressions before reaching for
//! [`filter_by_attribute`](crate::filter::filter_by_attribute).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::library::SongList;

/// Default minimum occurrence count for a value to be retained.
pub const DEFAULT_MIN_SONGS: usize = 2;

/// Frequency histogram of song attributes.
///
/// After trimming, every retained attribute has at least two distinct values
/// and every retained value reached the caller's occurrence threshold;
/// anything weaker carries no filtering power and is dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeHistogram {
    attributes: BTreeMap<String, BTreeMap<String, usize>>,
}

impl AttributeHistogram {
    /// Number of retained attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether no attribute survived trimming.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Names of the retained attributes, in sorted order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// The value counts for one attribute, if it was retained.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&BTreeMap<String, usize>> {
        self.attributes.get(attribute)
    }

    /// Occurrence count for one (attribute, value) pair, zero if absent.
    #[must_use]
    pub fn count(&self, attribute: &str, value: &str) -> usize {
        self.attributes
            .get(attribute)
            .and_then(|values| values.get(value))
            .copied()
            .unwrap_or(0)
    }

    /// Iterate over retained attributes and their value counts.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, usize>)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Build the trimmed attribute histogram for a song list.
///
/// Every attribute carried by every song contributes one count to
/// `histogram[name][value]`. Trimming then removes values observed on fewer
/// than `min_songs` songs and drops any attribute left with fewer than two
/// distinct values.
#[must_use]
pub fn get_attributes(list: &SongList, min_songs: usize) -> AttributeHistogram {
    let mut attributes: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

    for song in list {
        for (name, value) in song.attributes() {
            *attributes
                .entry(name.to_string())
                .or_default()
                .entry(value.to_string())
                .or_insert(0) += 1;
        }
    }
    let observed = attributes.len();

    attributes.retain(|_, values| {
        if values.len() < 2 {
            return false;
        }
        values.retain(|_, count| *count >= min_songs);
        values.len() >= 2
    });

    debug!(
        "attribute histogram for {} songs: {} of {} attributes retained",
        list.len(),
        attributes.len(),
        observed
    );
    AttributeHistogram { attributes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{ATTR_FILE_TYPE, ATTR_GENRE, ATTR_USER_RATING, Song, SongList};
    use std::sync::Arc;

    fn rated(url: &str, rating: &str, genre: &str) -> Arc<Song> {
        Arc::new(
            Song::new(url)
                .with_attribute(ATTR_USER_RATING, rating)
                .with_attribute(ATTR_GENRE, genre),
        )
    }

    fn sample_list() -> SongList {
        SongList::from_songs(
            "sample",
            vec![
                rated("/m/a.mp3", "50", "Rock"),
                rated("/m/b.mp3", "50", "Rock"),
                rated("/m/c.mp3", "75", "Jazz"),
                rated("/m/d.mp3", "75", "Jazz"),
                rated("/m/e.mp3", "100", "Blues"),
            ],
        )
    }

    #[test]
    fn test_histogram_counts() {
        let histogram = get_attributes(&sample_list(), 1);
        assert_eq!(histogram.count(ATTR_USER_RATING, "50"), 2);
        assert_eq!(histogram.count(ATTR_USER_RATING, "100"), 1);
        assert_eq!(histogram.count(ATTR_GENRE, "Jazz"), 2);
    }

    #[test]
    fn test_threshold_drops_rare_values() {
        let histogram = get_attributes(&sample_list(), 2);
        // "100" and "Blues" appear once and fall under the threshold.
        assert_eq!(histogram.count(ATTR_USER_RATING, "100"), 0);
        assert_eq!(histogram.count(ATTR_GENRE, "Blues"), 0);
        assert_eq!(histogram.count(ATTR_USER_RATING, "50"), 2);
    }

    #[test]
    fn test_single_valued_attribute_dropped() {
        let list = SongList::from_songs(
            "uniform",
            vec![
                Arc::new(Song::new("/m/a.mp3").with_attribute(ATTR_FILE_TYPE, "mp3")),
                Arc::new(Song::new("/m/b.mp3").with_attribute(ATTR_FILE_TYPE, "mp3")),
            ],
        );
        let histogram = get_attributes(&list, 1);
        // One distinct value cannot discriminate anything.
        assert!(histogram.values(ATTR_FILE_TYPE).is_none());
    }

    #[test]
    fn test_attribute_dropped_when_trimming_leaves_one_value() {
        let list = SongList::from_songs(
            "skewed",
            vec![
                rated("/m/a.mp3", "50", "Rock"),
                rated("/m/b.mp3", "50", "Rock"),
                rated("/m/c.mp3", "75", "Rock"),
            ],
        );
        let histogram = get_attributes(&list, 2);
        // "75" falls below the threshold, leaving UserRating single-valued.
        assert!(histogram.values(ATTR_USER_RATING).is_none());
        // Genre was single-valued from the start.
        assert!(histogram.values(ATTR_GENRE).is_none());
        assert!(histogram.is_empty());
    }

    #[test]
    fn test_trimming_invariant() {
        let histogram = get_attributes(&sample_list(), 2);
        for (_, values) in histogram.iter() {
            assert!(values.len() >= 2);
            assert!(values.values().all(|count| *count >= 2));
        }
    }

    #[test]
    fn test_empty_list() {
        let histogram = get_attributes(&SongList::new("empty"), 1);
        assert!(histogram.is_empty());
        assert_eq!(histogram.len(), 0);
    }

    #[test]
    fn test_histogram_serialization_round_trip() {
        let histogram = get_attributes(&sample_list(), 1);
        let json = serde_json::to_string(&histogram).expect("serialize");
        let back: AttributeHistogram = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(histogram, back);
    }
}
