//! Removal engine: the inverse of export.
//!
//! Deletes previously exported files and the playlist file for songs that are
//! no longer wanted in the destination tree. Because this is destructive, the
//! destination directory is never guessed: it must be supplied and must
//! already exist, or the call fails before touching anything.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, FileSystemError, RemovalError, Result};
use crate::filter::filter_unique;
use crate::library::SongList;
use crate::m3u;
use crate::paths;

/// Outcome counts for one removal call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemovalReport {
    /// Files deleted from the destination tree.
    pub files_removed: usize,

    /// Songs whose computed destination path was already gone.
    pub files_missing: usize,

    /// Whether a playlist file existed and was deleted.
    pub playlist_removed: bool,
}

/// Engine deleting exported songs and playlists from a destination tree.
#[derive(Debug, Clone, Default)]
pub struct RemovalEngine;

impl RemovalEngine {
    /// Create a removal engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Delete `list`'s exported files and playlist from `dest_dir`.
    ///
    /// The removal set is every song of `list` whose base file name is
    /// currently present under `dest_dir`; each one's destination path is
    /// computed exactly as the export engine computes it (relative to
    /// `source_dir`, which defaults to the majority common root of the
    /// list's song paths). A computed path that no longer exists is skipped
    /// silently, so re-running a removal is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`RemovalError::InvalidTarget`] when `dest_dir` does not exist
    /// or is not a directory, and a filesystem error when a delete fails.
    pub fn remove_songs(
        &self,
        list: &SongList,
        dest_dir: &Path,
        source_dir: Option<&Path>,
    ) -> Result<RemovalReport> {
        if !dest_dir.exists() {
            return Err(Error::Removal(RemovalError::InvalidTarget {
                path: dest_dir.to_path_buf(),
                reason: "destination directory does not exist".to_string(),
            }));
        }
        if !dest_dir.is_dir() {
            return Err(Error::Removal(RemovalError::InvalidTarget {
                path: dest_dir.to_path_buf(),
                reason: "destination is not a directory".to_string(),
            }));
        }

        info!(
            "removing {:?} ({} songs) from {}",
            list.name(),
            list.len(),
            dest_dir.display()
        );

        let mut report = RemovalReport::default();

        let playlist_path = m3u::playlist_path(dest_dir, list.name());
        if playlist_path.exists() {
            fs::remove_file(&playlist_path).map_err(|e| {
                Error::FileSystem(FileSystemError::DeleteFailed {
                    path: playlist_path.clone(),
                    reason: e.to_string(),
                })
            })?;
            report.playlist_removed = true;
            debug!("deleted playlist {}", playlist_path.display());
        }

        let source_dir =
            source_dir.map_or_else(|| paths::common_path(&list.source_urls()), Path::to_path_buf);

        let removal_set = filter_unique(list, Some(dest_dir), true);
        for song in &removal_set {
            let relative = paths::relative_destination(song.source_url(), &source_dir);
            let destination = dest_dir.join(&relative);
            if !destination.exists() {
                debug!("already gone: {}", destination.display());
                report.files_missing += 1;
                continue;
            }

            fs::remove_file(&destination).map_err(|e| {
                Error::FileSystem(FileSystemError::DeleteFailed {
                    path: destination.clone(),
                    reason: e.to_string(),
                })
            })?;
            debug!("deleted {}", destination.display());
            report.files_removed += 1;
        }

        info!(
            "removal of {:?} done: {} deleted, {} already gone",
            list.name(),
            report.files_removed,
            report.files_missing
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportEngine;
    use crate::library::{ATTR_TITLE, Song, SongRef};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_source_song(root: &Path, relative: &str) -> SongRef {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create source dirs");
        }
        fs::write(&path, b"audio").expect("write source file");
        Arc::new(Song::new(&path).with_attribute(ATTR_TITLE, relative))
    }

    #[test]
    fn test_remove_requires_existing_destination() {
        let engine = RemovalEngine::new();
        let list = SongList::new("Mix");
        let result = engine.remove_songs(&list, Path::new("/no/such/dir"), None);
        assert!(matches!(
            result,
            Err(Error::Removal(RemovalError::InvalidTarget { .. }))
        ));
    }

    #[test]
    fn test_remove_rejects_file_destination() {
        let dir = TempDir::new().expect("create temp dir");
        let file = dir.path().join("not_a_dir");
        fs::write(&file, b"x").expect("write file");

        let engine = RemovalEngine::new();
        let result = engine.remove_songs(&SongList::new("Mix"), &file, None);
        assert!(matches!(
            result,
            Err(Error::Removal(RemovalError::InvalidTarget { .. }))
        ));
    }

    #[test]
    fn test_remove_inverts_export() {
        let source = TempDir::new().expect("create source dir");
        let dest = TempDir::new().expect("create dest dir");

        let list = SongList::from_songs(
            "Road Trip",
            vec![
                create_source_song(source.path(), "band/one.mp3"),
                create_source_song(source.path(), "band/two.mp3"),
            ],
        );

        let exporter = ExportEngine::with_export_root(dest.path());
        exporter
            .export_songs(&list, None, Some(dest.path()), Some(source.path()))
            .expect("export");
        assert!(dest.path().join("band/one.mp3").exists());
        assert!(dest.path().join("Road Trip.m3u").exists());

        // An unrelated file in the destination tree must survive removal.
        fs::write(dest.path().join("keep.txt"), b"keep").expect("write unrelated");

        let remover = RemovalEngine::new();
        let report = remover
            .remove_songs(&list, dest.path(), Some(source.path()))
            .expect("remove");

        assert_eq!(report.files_removed, 2);
        assert_eq!(report.files_missing, 0);
        assert!(report.playlist_removed);
        assert!(!dest.path().join("band/one.mp3").exists());
        assert!(!dest.path().join("band/two.mp3").exists());
        assert!(!dest.path().join("Road Trip.m3u").exists());
        assert!(dest.path().join("keep.txt").exists());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let source = TempDir::new().expect("create source dir");
        let dest = TempDir::new().expect("create dest dir");

        let list = SongList::from_songs(
            "Mix",
            vec![create_source_song(source.path(), "band/one.mp3")],
        );

        let exporter = ExportEngine::with_export_root(dest.path());
        exporter
            .export_songs(&list, None, Some(dest.path()), Some(source.path()))
            .expect("export");

        let remover = RemovalEngine::new();
        let first = remover
            .remove_songs(&list, dest.path(), Some(source.path()))
            .expect("remove");
        assert_eq!(first.files_removed, 1);

        // Second pass finds nothing present under the destination.
        let second = remover
            .remove_songs(&list, dest.path(), Some(source.path()))
            .expect("remove again");
        assert_eq!(second.files_removed, 0);
        assert!(!second.playlist_removed);
    }

    #[test]
    fn test_remove_skips_songs_not_present_at_destination() {
        let source = TempDir::new().expect("create source dir");
        let dest = TempDir::new().expect("create dest dir");

        let exported = create_source_song(source.path(), "band/one.mp3");
        let never_exported = create_source_song(source.path(), "band/two.mp3");

        let exporter = ExportEngine::with_export_root(dest.path());
        exporter
            .export_songs(
                &SongList::from_songs("Mix", vec![Arc::clone(&exported)]),
                None,
                Some(dest.path()),
                Some(source.path()),
            )
            .expect("export");

        let both = SongList::from_songs("Mix", vec![exported, never_exported]);
        let remover = RemovalEngine::new();
        let report = remover
            .remove_songs(&both, dest.path(), Some(source.path()))
            .expect("remove");

        // Only the exported song is in the removal set at all.
        assert_eq!(report.files_removed, 1);
        assert_eq!(report.files_missing, 0);
    }
}
