//! Export engine: copies songs to a destination tree and writes playlists.
//!
//! Exporting is additive and idempotent. Songs already present at the
//! destination (matched by base file name, then by exact destination path)
//! are never copied again and never overwritten; the playlist file is always
//! rewritten so it reflects the current list. A missing source file is an
//! expected condition in long-lived libraries and is skipped silently.
//!
//! Per-entry playlist write failures are caught, appended to an error log
//! beside the playlist, and counted in the returned [`ExportReport`]; only
//! conditions that invalidate the whole run (directory creation, a failing
//! copy, the playlist file itself) surface as errors.

use std::collections::HashSet;
use std::env;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, FileSystemError, Result};
use crate::filter::filter_unique;
use crate::library::SongList;
use crate::m3u;
use crate::paths;

/// Default destination subdirectory, resolved under the working directory.
pub const DEFAULT_EXPORT_SUBDIR: &str = "SongExport";

/// The default destination root: `<cwd>/SongExport`.
#[must_use]
pub fn default_export_root() -> PathBuf {
    env::current_dir().map_or_else(
        |_| PathBuf::from(DEFAULT_EXPORT_SUBDIR),
        |cwd| cwd.join(DEFAULT_EXPORT_SUBDIR),
    )
}

// =============================================================================
// Export report
// =============================================================================

/// Outcome counts for one export call.
///
/// `entries_failed` is the run's error count: zero means a clean run. All
/// other failure modes are either expected skips (tracked separately) or
/// fatal errors raised from the call itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportReport {
    /// The playlist file that was written.
    pub playlist_path: PathBuf,

    /// Playlist entries successfully written.
    pub entries_written: usize,

    /// Playlist entries that failed to write and were logged.
    pub entries_failed: usize,

    /// Files newly copied to the destination.
    pub files_copied: usize,

    /// Files skipped because the destination path already existed.
    pub files_skipped_existing: usize,

    /// Files skipped because the source no longer exists.
    pub files_skipped_missing: usize,

    /// Bytes copied to the destination.
    pub bytes_copied: u64,
}

impl ExportReport {
    /// Whether the run finished without logged entry failures.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.entries_failed == 0
    }
}

// =============================================================================
// Export engine
// =============================================================================

/// Engine performing playlist writes and song copies.
#[derive(Debug, Clone)]
pub struct ExportEngine {
    /// Destination used when neither a playlist path nor a destination
    /// directory is supplied.
    export_root: PathBuf,
}

impl Default for ExportEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportEngine {
    /// Create an engine with the default destination root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            export_root: default_export_root(),
        }
    }

    /// Create an engine with an explicit fallback destination root.
    #[must_use]
    pub fn with_export_root(export_root: impl Into<PathBuf>) -> Self {
        Self {
            export_root: export_root.into(),
        }
    }

    /// The fallback destination root.
    #[must_use]
    pub fn export_root(&self) -> &Path {
        &self.export_root
    }

    /// Write a playlist file for `list` at `base_path` + `.m3u`.
    ///
    /// When both `source_dir` and `dest_dir` are given, each entry has the
    /// source prefix textually replaced by the destination prefix, rebasing
    /// the playlist for a portable device.
    ///
    /// The playlist file is always produced, even for an empty list or a run
    /// with entry failures; a failing entry is logged and counted, never
    /// raised.
    ///
    /// # Errors
    ///
    /// Returns an error only when the playlist file or its error log cannot
    /// be created at all.
    pub fn export_playlist(
        &self,
        list: &SongList,
        base_path: &Path,
        source_dir: Option<&Path>,
        dest_dir: Option<&Path>,
    ) -> Result<ExportReport> {
        info!(
            "creating M3U playlist for {:?} ({} songs) at {}.m3u",
            list.name(),
            list.len(),
            base_path.display()
        );

        let from = source_dir.map(|p| p.display().to_string());
        let to = dest_dir.map(|p| p.display().to_string());
        let rewrite = match (&from, &to) {
            (Some(f), Some(t)) => Some((f.as_str(), t.as_str())),
            _ => None,
        };

        let (playlist_path, entries_written, entries_failed) =
            self.write_playlist_file(list, base_path, rewrite)?;

        Ok(ExportReport {
            playlist_path,
            entries_written,
            entries_failed,
            ..ExportReport::default()
        })
    }

    /// Copy a list's songs to a destination tree and write the matching
    /// playlist.
    ///
    /// Defaults are resolved in order: `source_dir` falls back to the
    /// majority common root of the list's song paths; `dest_dir` falls back
    /// to the playlist path's parent directory, then to the engine's export
    /// root; `playlist_path` falls back to the list name inside `dest_dir`.
    ///
    /// Only songs not already present at the destination (by base file name)
    /// are copied; a file already sitting at the computed destination path is
    /// reported as a duplicate and left untouched. The playlist is written
    /// from the full original list, suppressing repeated source paths, with
    /// entries rebased relative to `source_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error when the destination tree cannot be created, a copy
    /// fails mid-transfer, or the playlist file cannot be produced.
    pub fn export_songs(
        &self,
        list: &SongList,
        playlist_path: Option<&Path>,
        dest_dir: Option<&Path>,
        source_dir: Option<&Path>,
    ) -> Result<ExportReport> {
        let source_dir =
            source_dir.map_or_else(|| paths::common_path(&list.source_urls()), Path::to_path_buf);

        let dest_dir: PathBuf = match (dest_dir, playlist_path) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(path)) => match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => self.export_root.clone(),
            },
            (None, None) => self.export_root.clone(),
        };

        let base_path: PathBuf =
            playlist_path.map_or_else(|| dest_dir.join(list.name()), Path::to_path_buf);

        fs::create_dir_all(&dest_dir).map_err(|e| {
            Error::FileSystem(FileSystemError::CreateDirFailed {
                path: dest_dir.clone(),
                reason: e.to_string(),
            })
        })?;

        info!(
            "exporting {:?} ({} songs) to {} (source root {})",
            list.name(),
            list.len(),
            dest_dir.display(),
            source_dir.display()
        );

        let copy_set = filter_unique(list, Some(&dest_dir), false);
        let mut files_copied = 0;
        let mut files_skipped_existing = 0;
        let mut files_skipped_missing = 0;
        let mut bytes_copied = 0;

        for song in &copy_set {
            let source = song.source_url();
            if !source.exists() {
                debug!("source gone, skipping {}", source.display());
                files_skipped_missing += 1;
                continue;
            }

            let relative = paths::relative_destination(source, &source_dir);
            let destination = dest_dir.join(&relative);
            if destination.exists() {
                info!("duplicate song: {}", relative.display());
                files_skipped_existing += 1;
                continue;
            }

            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::FileSystem(FileSystemError::CreateDirFailed {
                        path: parent.to_path_buf(),
                        reason: e.to_string(),
                    })
                })?;
            }

            bytes_copied += fs::copy(source, &destination).map_err(|e| {
                Error::FileSystem(FileSystemError::CopyFailed {
                    source_path: source.to_path_buf(),
                    destination: destination.clone(),
                    reason: e.to_string(),
                })
            })?;

            if let Ok(meta) = fs::metadata(source)
                && let Ok(modified) = meta.modified()
            {
                let _ = filetime::set_file_mtime(
                    &destination,
                    filetime::FileTime::from_system_time(modified),
                );
            }

            debug!("copied {} -> {}", source.display(), destination.display());
            files_copied += 1;
        }

        // The playlist covers the whole original list, not just the copy set,
        // rebased to paths relative to the source root.
        let prefix = format!("{}{}", source_dir.display(), std::path::MAIN_SEPARATOR);
        let rewrite = if source_dir.as_os_str().is_empty() {
            None
        } else {
            Some((prefix.as_str(), ""))
        };
        let (playlist_path, entries_written, entries_failed) =
            self.write_playlist_file(list, &base_path, rewrite)?;

        let report = ExportReport {
            playlist_path,
            entries_written,
            entries_failed,
            files_copied,
            files_skipped_existing,
            files_skipped_missing,
            bytes_copied,
        };
        info!(
            "export of {:?} done: {} copied, {} duplicate, {} missing, {} entry failures",
            list.name(),
            report.files_copied,
            report.files_skipped_existing,
            report.files_skipped_missing,
            report.entries_failed
        );
        Ok(report)
    }

    /// Write the playlist file and its per-run error log.
    ///
    /// Repeated source paths are suppressed (first occurrence wins) so a song
    /// listed twice yields a single entry. Returns the playlist path and the
    /// written/failed entry counts.
    fn write_playlist_file(
        &self,
        list: &SongList,
        base_path: &Path,
        rewrite: Option<(&str, &str)>,
    ) -> Result<(PathBuf, usize, usize)> {
        let playlist_path = m3u::with_m3u_extension(base_path);
        let log_path = m3u::error_log_path(base_path);

        let file = File::create(&playlist_path).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: playlist_path.clone(),
                reason: e.to_string(),
            })
        })?;
        let mut writer = BufWriter::new(file);

        // The log is reset on every run so it only ever describes this one.
        let mut log = File::create(&log_path).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: log_path.clone(),
                reason: e.to_string(),
            })
        })?;

        writeln!(writer, "{}", m3u::M3U_HEADER).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: playlist_path.clone(),
                reason: e.to_string(),
            })
        })?;

        let mut seen: HashSet<&Path> = HashSet::new();
        let mut entries_written = 0;
        let mut entries_failed = 0;

        for song in list {
            if !seen.insert(song.source_url()) {
                debug!("suppressing repeated entry {}", song.source_url().display());
                continue;
            }

            let mut entry = m3u::playlist_entry(song, None);
            if let Some((from, to)) = rewrite {
                entry = entry.replace(from, to);
            }

            match writer.write_all(entry.as_bytes()) {
                Ok(()) => entries_written += 1,
                Err(e) => {
                    entries_failed += 1;
                    warn!("failed on {entry:?}: {e}");
                    let _ = writeln!(log, "Failed on {entry:?}");
                    let _ = writeln!(log, "{e:?}");
                }
            }
        }

        writer.flush().map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: playlist_path.clone(),
                reason: e.to_string(),
            })
        })?;

        Ok((playlist_path, entries_written, entries_failed))
    }
}
