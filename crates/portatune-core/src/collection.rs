//! Playlist collection.
//!
//! [`PlaylistCollection`] is a snapshot of the library's playlists, keyed by
//! name, together with the library handle used to propagate deletions.
//! Mutating operations go through the library and then re-query it, so the
//! snapshot never drifts from the collaborator's state by side effect.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, PlaylistError, Result};
use crate::export::ExportEngine;
use crate::library::{MediaLibrary, SongList, broken_songs};

/// Summary of a bulk playlist export.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportSummary {
    /// Names of playlists that were exported.
    pub exported: Vec<String>,

    /// Names of playlists skipped (empty or configured as player defaults).
    pub skipped: Vec<String>,

    /// Total failed playlist entries across all exports.
    pub total_entries_failed: usize,

    /// Names of playlists whose export logged at least one entry failure.
    pub failed_playlists: Vec<String>,
}

impl ExportSummary {
    /// Whether every exported playlist was written without entry failures.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.total_entries_failed == 0
    }
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exported {} playlists, skipped {}",
            self.exported.len(),
            self.skipped.len()
        )?;
        if self.failed_playlists.is_empty() {
            f.write_str(", no errors")
        } else {
            write!(
                f,
                ", {} entry failures in: {}",
                self.total_entries_failed,
                self.failed_playlists.join(", ")
            )
        }
    }
}

/// The library's playlists, keyed by name.
///
/// Invariant: each key equals the name of the list stored under it.
pub struct PlaylistCollection<L: MediaLibrary> {
    library: L,
    playlists: BTreeMap<String, SongList>,
}

impl<L: MediaLibrary> PlaylistCollection<L> {
    /// Load the collection by querying the library.
    ///
    /// # Errors
    ///
    /// Returns an error when the library cannot enumerate its playlists.
    pub fn load(library: L) -> Result<Self> {
        let mut collection = Self {
            library,
            playlists: BTreeMap::new(),
        };
        collection.refresh()?;
        Ok(collection)
    }

    /// Re-query the library and replace the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the library cannot enumerate its playlists.
    pub fn refresh(&mut self) -> Result<()> {
        let lists = self.library.playlists()?;
        self.playlists = lists
            .into_iter()
            .map(|list| (list.name().to_string(), list))
            .collect();
        debug!("collection refreshed: {} playlists", self.playlists.len());
        Ok(())
    }

    /// Number of playlists in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    /// Whether the snapshot holds no playlists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    /// Playlist names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.playlists.keys().map(String::as_str)
    }

    /// One playlist by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SongList> {
        self.playlists.get(name)
    }

    /// Iterate over (name, playlist) pairs, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SongList)> {
        self.playlists.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The underlying library handle.
    pub fn library(&self) -> &L {
        &self.library
    }

    /// Delete a playlist from the library, then re-query.
    ///
    /// The underlying media files are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`PlaylistError::NotFound`] when the playlist is not in the
    /// snapshot, or the library's error when deletion or re-query fails.
    pub fn delete_and_refresh(&mut self, name: &str) -> Result<()> {
        if !self.playlists.contains_key(name) {
            return Err(Error::Playlist(PlaylistError::NotFound {
                name: name.to_string(),
            }));
        }
        self.library.remove_playlist(name)?;
        info!("deleted playlist {name}");
        self.refresh()
    }

    /// Delete every playlist with fewer than `min_songs` songs.
    ///
    /// Returns the names of the deleted playlists.
    ///
    /// # Errors
    ///
    /// Returns the library's error when a deletion or the re-query fails.
    pub fn remove_short_playlists(&mut self, min_songs: usize) -> Result<Vec<String>> {
        let doomed: Vec<String> = self
            .playlists
            .iter()
            .filter(|(_, list)| list.len() < min_songs)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &doomed {
            self.library.remove_playlist(name)?;
            info!(
                "deleted playlist {name} ({} songs)",
                self.playlists.get(name).map_or(0, SongList::len)
            );
        }
        self.refresh()?;
        Ok(doomed)
    }

    /// Find songs whose source file no longer exists, in one playlist or in
    /// the whole library, optionally removing them.
    ///
    /// Returns the broken songs that were found.
    ///
    /// # Errors
    ///
    /// Returns [`PlaylistError::NotFound`] for an unknown playlist name, or
    /// the library's error when removal or the re-query fails.
    pub fn remove_broken(&mut self, playlist: Option<&str>, remove: bool) -> Result<SongList> {
        let target = match playlist {
            Some(name) => self.playlists.get(name).cloned().ok_or_else(|| {
                Error::Playlist(PlaylistError::NotFound {
                    name: name.to_string(),
                })
            })?,
            None => self.library.all_songs()?,
        };

        let broken = broken_songs(&target);
        if broken.is_empty() {
            return Ok(broken);
        }
        warn!(
            "{} of {} songs in {:?} have missing files",
            broken.len(),
            target.len(),
            target.name()
        );

        if remove {
            for song in &broken {
                self.library.remove_song(song, playlist)?;
            }
            self.refresh()?;
        }
        Ok(broken)
    }

    /// Export every playlist into `dir`.
    ///
    /// Playlists with zero songs and playlists named in `skip_names` (the
    /// player-generated defaults, usually taken from
    /// [`AppConfig::skip_playlists`](crate::config::AppConfig)) are skipped.
    /// Per-playlist entry failures are aggregated; a playlist file that
    /// cannot be produced at all aborts the whole call.
    ///
    /// # Errors
    ///
    /// Returns an error when a playlist file or its error log cannot be
    /// created.
    pub fn export_playlists(
        &self,
        engine: &ExportEngine,
        dir: &Path,
        skip_names: &BTreeSet<String>,
    ) -> Result<ExportSummary> {
        let mut summary = ExportSummary::default();

        for (name, list) in &self.playlists {
            if list.is_empty() || skip_names.contains(name) {
                debug!("skipping playlist {name:?}");
                summary.skipped.push(name.clone());
                continue;
            }

            let report = engine.export_playlist(list, &dir.join(name), None, None)?;
            if report.entries_failed > 0 {
                summary.total_entries_failed += report.entries_failed;
                summary.failed_playlists.push(name.clone());
            }
            summary.exported.push(name.clone());
        }

        info!("{summary}");
        Ok(summary)
    }
}

impl<L: MediaLibrary> fmt::Display for PlaylistCollection<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .playlists
            .keys()
            .map(String::len)
            .max()
            .unwrap_or_default();
        writeln!(f, "-- Playlists --")?;
        for (name, list) in &self.playlists {
            writeln!(f, " {name:width$} : {list}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{ATTR_TITLE, MemoryLibrary, MockMediaLibrary, Song};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn library_with_playlists() -> MemoryLibrary {
        let mut lib = MemoryLibrary::new();
        let a = lib.add_song(Song::new("/m/a.mp3").with_attribute(ATTR_TITLE, "A"));
        let b = lib.add_song(Song::new("/m/b.mp3").with_attribute(ATTR_TITLE, "B"));
        let c = lib.add_song(Song::new("/m/c.mp3").with_attribute(ATTR_TITLE, "C"));

        lib.add_playlist(SongList::from_songs(
            "Favorites",
            vec![Arc::clone(&a), Arc::clone(&b), c],
        ));
        lib.add_playlist(SongList::from_songs("Short", vec![a]));
        lib.add_playlist(SongList::new("Empty"));
        lib
    }

    #[test]
    fn test_load_keys_match_names() {
        let collection = PlaylistCollection::load(library_with_playlists()).expect("load");
        assert_eq!(collection.len(), 3);
        for (key, list) in collection.iter() {
            assert_eq!(key, list.name());
        }
    }

    #[test]
    fn test_delete_and_refresh_requeries_library() {
        let mut mock = MockMediaLibrary::new();
        let mut calls = 0;
        mock.expect_playlists().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(vec![SongList::new("Doomed"), SongList::new("Kept")])
            } else {
                Ok(vec![SongList::new("Kept")])
            }
        });
        mock.expect_remove_playlist()
            .withf(|name| name == "Doomed")
            .times(1)
            .returning(|_| Ok(()));

        let mut collection = PlaylistCollection::load(mock).expect("load");
        assert_eq!(collection.len(), 2);

        collection.delete_and_refresh("Doomed").expect("delete");
        assert_eq!(collection.len(), 1);
        assert!(collection.get("Doomed").is_none());
        assert!(collection.get("Kept").is_some());
    }

    #[test]
    fn test_delete_unknown_playlist_fails_without_library_call() {
        let mut mock = MockMediaLibrary::new();
        mock.expect_playlists().returning(|| Ok(Vec::new()));
        // No expect_remove_playlist: calling it would panic the mock.

        let mut collection = PlaylistCollection::load(mock).expect("load");
        assert!(collection.delete_and_refresh("Nope").is_err());
    }

    #[test]
    fn test_remove_short_playlists() {
        let mut collection = PlaylistCollection::load(library_with_playlists()).expect("load");
        let deleted = collection.remove_short_playlists(2).expect("prune");

        assert_eq!(deleted, vec!["Empty".to_string(), "Short".to_string()]);
        assert_eq!(collection.len(), 1);
        assert!(collection.get("Favorites").is_some());
    }

    #[test]
    fn test_remove_broken_global() {
        let dir = TempDir::new().expect("create temp dir");
        let real = dir.path().join("real.mp3");
        fs::write(&real, b"audio").expect("write file");

        let mut lib = MemoryLibrary::new();
        lib.add_song(Song::new(&real));
        lib.add_song(Song::new("/gone/a.mp3"));
        lib.add_song(Song::new("/gone/b.mp3"));

        let mut collection = PlaylistCollection::load(lib).expect("load");
        let broken = collection.remove_broken(None, true).expect("remove broken");

        assert_eq!(broken.len(), 2);
        let remaining = collection.library().all_songs().expect("all songs");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining.get(0).expect("song").source_url(), real.as_path());
    }

    #[test]
    fn test_remove_broken_list_only_reports_without_remove() {
        let mut lib = MemoryLibrary::new();
        let gone = lib.add_song(Song::new("/gone/a.mp3"));
        lib.add_playlist(SongList::from_songs("Mix", vec![gone]));

        let mut collection = PlaylistCollection::load(lib).expect("load");
        let broken = collection.remove_broken(Some("Mix"), false).expect("list");
        assert_eq!(broken.len(), 1);
        // Nothing was removed.
        assert_eq!(collection.get("Mix").expect("playlist").len(), 1);
    }

    #[test]
    fn test_export_playlists_skips_empty_and_defaults() {
        let out = TempDir::new().expect("create out dir");
        let collection = PlaylistCollection::load(library_with_playlists()).expect("load");

        let engine = ExportEngine::with_export_root(out.path());
        let skip: BTreeSet<String> = ["Short".to_string()].into();
        let summary = collection
            .export_playlists(&engine, out.path(), &skip)
            .expect("export");

        assert_eq!(summary.exported, vec!["Favorites".to_string()]);
        assert_eq!(
            summary.skipped,
            vec!["Empty".to_string(), "Short".to_string()]
        );
        assert!(summary.is_clean());

        assert!(out.path().join("Favorites.m3u").exists());
        assert!(!out.path().join("Short.m3u").exists());
        assert!(!out.path().join("Empty.m3u").exists());

        let content = fs::read_to_string(out.path().join("Favorites.m3u")).expect("read");
        assert_eq!(content.lines().count(), 1 + 2 * 3);
    }

    #[test]
    fn test_export_summary_display_names_offenders() {
        let summary = ExportSummary {
            exported: vec!["A".to_string(), "B".to_string()],
            skipped: vec!["C".to_string()],
            total_entries_failed: 4,
            failed_playlists: vec!["A".to_string(), "B".to_string()],
        };
        let text = summary.to_string();
        assert!(text.contains("exported 2"));
        assert!(text.contains("4 entry failures"));
        assert!(text.contains("A, B"));

        let clean = ExportSummary::default();
        assert!(clean.to_string().contains("no errors"));
    }
}
