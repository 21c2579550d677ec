//! M3U playlist entries.
//!
//! One song renders to an `#EXTINF` block:
//!
//! ```text
//! #EXTINF:<integer seconds>,<Artist> - <Title>
//! <file path>
//! ```
//!
//! Missing metadata falls back to values synthesized from the song's path:
//! the artist from the parent directory name, the title from the file stem,
//! both with underscores replaced by spaces and Title Case applied, and a
//! two-minute default duration.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, FileSystemError, Result};
use crate::library::{ATTR_AUTHOR, ATTR_TITLE, Song};

/// First line of every playlist file.
pub const M3U_HEADER: &str = "#EXTM3U";

/// Playlist file extension, without the dot.
pub const M3U_EXTENSION: &str = "m3u";

/// Duration assumed for songs that do not report one.
pub const DEFAULT_DURATION_SECS: u64 = 120;

/// Suffix appended to a playlist's base path to name its error log.
pub const ERROR_LOG_SUFFIX: &str = "_errors.log";

/// Render one song as an M3U entry, including the trailing newline.
///
/// The URL line is `override_url` when given, otherwise the song's own
/// source path.
#[must_use]
pub fn playlist_entry(song: &Song, override_url: Option<&Path>) -> String {
    let duration = song
        .duration_secs()
        .map_or(DEFAULT_DURATION_SECS, |d| d.floor() as u64);

    let author = song.attribute(ATTR_AUTHOR);
    let artist = if author.is_empty() {
        derive_artist(song.source_url())
    } else {
        author.to_string()
    };

    let titled = song.attribute(ATTR_TITLE);
    let title = if titled.is_empty() {
        derive_title(song.source_url())
    } else {
        titled.to_string()
    };

    let url = override_url.unwrap_or_else(|| song.source_url());
    format!("#EXTINF:{duration},{artist} - {title}\n{}\n", url.display())
}

/// Path of the playlist file for `name` inside `dir`.
#[must_use]
pub fn playlist_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{M3U_EXTENSION}"))
}

/// Append the `.m3u` extension to a base path.
///
/// Unlike [`Path::with_extension`] this never replaces part of a name that
/// happens to contain a dot.
#[must_use]
pub fn with_m3u_extension(base: &Path) -> PathBuf {
    let mut os = base.as_os_str().to_os_string();
    os.push(".");
    os.push(M3U_EXTENSION);
    PathBuf::from(os)
}

/// Path of the error log written beside the playlist at `base`.
#[must_use]
pub fn error_log_path(base: &Path) -> PathBuf {
    let mut os = base.as_os_str().to_os_string();
    os.push(ERROR_LOG_SUFFIX);
    PathBuf::from(os)
}

/// Read the file paths referenced by an M3U playlist.
///
/// Comment and directive lines are skipped; relative entries are resolved
/// against the playlist's own directory. Entries are returned in file order
/// whether or not the referenced files exist.
///
/// # Errors
///
/// Returns an error if the playlist file cannot be read.
pub fn read_playlist(path: &Path) -> Result<Vec<PathBuf>> {
    let file = fs::File::open(path).map_err(|e| {
        Error::FileSystem(FileSystemError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            debug!("skipping playlist line {line:?}");
            continue;
        }

        let entry = Path::new(line);
        if entry.is_absolute() {
            entries.push(entry.to_path_buf());
        } else {
            entries.push(base_dir.join(entry));
        }
    }
    Ok(entries)
}

fn derive_artist(source_url: &Path) -> String {
    source_url
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .map_or_else(|| "Unknown Artist".to_string(), humanize)
}

fn derive_title(source_url: &Path) -> String {
    source_url
        .file_stem()
        .and_then(|n| n.to_str())
        .map_or_else(|| "Unknown Title".to_string(), humanize)
}

/// Turn a path segment into display text: underscores become spaces and each
/// word gets Title Case.
fn humanize(segment: &str) -> String {
    segment
        .replace('_', " ")
        .split(' ')
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
    })
}
