//! Song and library model.
//!
//! A [`Song`] is a lightweight handle to one media item: its source path plus
//! an enumerable bag of named string attributes, mirroring what desktop media
//! players expose over their automation interfaces. Attribute values are
//! strings even when they carry numbers (`Duration` is seconds, `FileSize` is
//! bytes); an absent attribute reads as the empty string.
//!
//! The [`MediaLibrary`] trait models the external collaborator that owns the
//! songs. Two backends ship with the crate:
//! - [`MemoryLibrary`]: plain in-memory storage for tests and embedders that
//!   fetch data from an automation layer themselves.
//! - [`LocalLibrary`]: a directory-rooted library that scans for audio files
//!   and builds attribute bags from ID3 tags and file metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use id3::{Tag, TagLike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, FileSystemError, LibraryError, PlaylistError, Result};
use crate::m3u;

/// Title attribute name.
pub const ATTR_TITLE: &str = "Title";
/// Artist attribute name.
pub const ATTR_AUTHOR: &str = "Author";
/// Duration attribute name (seconds, possibly fractional, as a string).
pub const ATTR_DURATION: &str = "Duration";
/// File size attribute name (bytes as a string).
pub const ATTR_FILE_SIZE: &str = "FileSize";
/// User rating attribute name (0-100 as a string).
pub const ATTR_USER_RATING: &str = "UserRating";
/// Acquisition date attribute name (month/day/year).
pub const ATTR_ACQUIRED: &str = "AcquisitionTimeYearMonthDay";
/// Media type attribute name.
pub const ATTR_MEDIA_TYPE: &str = "MediaType";
/// File type attribute name (lowercase extension).
pub const ATTR_FILE_TYPE: &str = "FileType";
/// Genre attribute name.
pub const ATTR_GENRE: &str = "WM/Genre";
/// Album title attribute name.
pub const ATTR_ALBUM: &str = "WM/AlbumTitle";
/// Release year attribute name.
pub const ATTR_YEAR: &str = "WM/Year";

/// Name of the synthetic list holding every audio song in the library.
pub const ALL_MUSIC: &str = "All Music";

/// Audio file extensions recognized by default.
pub const DEFAULT_AUDIO_EXTENSIONS: [&str; 7] =
    ["mp3", "m4a", "wav", "wma", "flac", "ogg", "aac"];

// =============================================================================
// Song
// =============================================================================

/// A handle to one media item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Song {
    source_url: PathBuf,
    attributes: BTreeMap<String, String>,
}

impl Song {
    /// Create a song handle for the given source path, with no attributes.
    #[must_use]
    pub fn new(source_url: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attach an attribute, returning the modified song.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// The absolute source path identifying this song.
    ///
    /// Within a well-formed library this is unique, but consumers treat it as
    /// the deduplication key rather than assuming enforcement.
    #[must_use]
    pub fn source_url(&self) -> &Path {
        &self.source_url
    }

    /// The song's file name, if its path has one.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.source_url.file_name().and_then(|n| n.to_str())
    }

    /// An attribute value, or the empty string when absent or unset.
    #[must_use]
    pub fn attribute(&self, name: &str) -> &str {
        self.attributes.get(name).map_or("", String::as_str)
    }

    /// Whether the song carries the named attribute at all.
    ///
    /// A carried attribute may still hold an empty value.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Names of all attributes this song carries.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// All (name, value) attribute pairs this song carries.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The duration in seconds, when present and numeric.
    #[must_use]
    pub fn duration_secs(&self) -> Option<f64> {
        self.attribute(ATTR_DURATION).parse().ok()
    }

    /// The file size in bytes, when present and numeric.
    #[must_use]
    pub fn file_size_bytes(&self) -> Option<u64> {
        self.attribute(ATTR_FILE_SIZE).parse().ok()
    }
}

/// Shared song handle.
///
/// Lists reference songs rather than owning their data, so filtering never
/// copies attribute bags.
pub type SongRef = Arc<Song>;

// =============================================================================
// Song list
// =============================================================================

/// A named, ordered sequence of song references.
///
/// Lists are produced by library queries or by filter operations; filters
/// always return a new list and leave their input untouched.
#[derive(Debug, Clone, Default)]
pub struct SongList {
    name: String,
    songs: Vec<SongRef>,
}

impl SongList {
    /// Create an empty list with the given label.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            songs: Vec::new(),
        }
    }

    /// Create a list from existing song references.
    #[must_use]
    pub fn from_songs(name: impl Into<String>, songs: Vec<SongRef>) -> Self {
        Self {
            name: name.into(),
            songs,
        }
    }

    /// The list's label (playlist name or a synthetic label).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a song reference.
    pub fn push(&mut self, song: SongRef) {
        self.songs.push(song);
    }

    /// Number of songs in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    /// Whether the list holds no songs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// The song at the given position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SongRef> {
        self.songs.get(index)
    }

    /// Iterate over the songs in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, SongRef> {
        self.songs.iter()
    }

    /// The source paths of all songs, in list order.
    #[must_use]
    pub fn source_urls(&self) -> Vec<&Path> {
        self.songs.iter().map(|s| s.source_url()).collect()
    }

    /// Sum of the durations of all songs carrying one, in seconds.
    #[must_use]
    pub fn total_duration_secs(&self) -> f64 {
        self.songs.iter().filter_map(|s| s.duration_secs()).sum()
    }

    /// Sum of the file sizes of all songs carrying one, in bytes.
    #[must_use]
    pub fn total_size_bytes(&self) -> u64 {
        self.songs.iter().filter_map(|s| s.file_size_bytes()).sum()
    }
}

impl<'a> IntoIterator for &'a SongList {
    type Item = &'a SongRef;
    type IntoIter = std::slice::Iter<'a, SongRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.songs.iter()
    }
}

impl fmt::Display for SongList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:4} songs  {:>9}  {:>7}",
            self.len(),
            format_duration(self.total_duration_secs() as u64),
            format_size(self.total_size_bytes())
        )
    }
}

/// Format a duration in seconds as `H:MM:SS`.
#[must_use]
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}

/// Format a byte count at megabyte granularity.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 * 1000 {
        "< 1 MB".to_string()
    } else {
        format!("{} MB", bytes / (1024 * 1024))
    }
}

/// Songs in `list` whose source file no longer exists on disk.
///
/// Stale entries are expected in long-lived libraries; callers decide whether
/// to remove them via [`MediaLibrary::remove_song`].
#[must_use]
pub fn broken_songs(list: &SongList) -> SongList {
    let broken: Vec<SongRef> = list
        .iter()
        .filter(|s| !s.source_url().exists())
        .cloned()
        .collect();
    SongList::from_songs(format!("{} broken", list.name()), broken)
}

/// Check whether a file has one of the default audio extensions.
#[must_use]
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_lowercase();
            DEFAULT_AUDIO_EXTENSIONS.contains(&lower.as_str())
        })
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_lowercase();
            extensions.iter().any(|e| e == &lower)
        })
}

// =============================================================================
// Media library contract
// =============================================================================

/// The external collaborator that owns songs and playlists.
///
/// Implementations are free to fetch data however they like; the engine only
/// relies on this contract. All operations are synchronous and assume a
/// single caller.
#[cfg_attr(test, mockall::automock)]
pub trait MediaLibrary {
    /// Every audio song in the library, as the synthetic [`ALL_MUSIC`] list.
    fn all_songs(&self) -> Result<SongList>;

    /// All playlists, in library order.
    fn playlists(&self) -> Result<Vec<SongList>>;

    /// One playlist by name.
    ///
    /// # Errors
    ///
    /// Returns [`PlaylistError::NotFound`] when no such playlist exists.
    fn playlist(&self, name: &str) -> Result<SongList>;

    /// Remove a playlist from the library.
    ///
    /// The underlying media files are left alone.
    fn remove_playlist(&mut self, name: &str) -> Result<()>;

    /// Remove a song from one playlist, or from the whole library when
    /// `playlist` is `None`.
    fn remove_song<'a>(&mut self, song: &Song, playlist: Option<&'a str>) -> Result<()>;

    /// Register a media file with the library.
    fn add_path(&mut self, path: &Path) -> Result<()>;
}

// =============================================================================
// In-memory backend
// =============================================================================

/// A [`MediaLibrary`] over plain vectors, for tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryLibrary {
    songs: Vec<SongRef>,
    playlists: Vec<SongList>,
}

impl MemoryLibrary {
    /// Create an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a song to the library, returning its shared handle.
    pub fn add_song(&mut self, song: Song) -> SongRef {
        let song = Arc::new(song);
        self.songs.push(Arc::clone(&song));
        song
    }

    /// Add a playlist.
    pub fn add_playlist(&mut self, playlist: SongList) {
        self.playlists.push(playlist);
    }
}

impl MediaLibrary for MemoryLibrary {
    fn all_songs(&self) -> Result<SongList> {
        Ok(SongList::from_songs(ALL_MUSIC, self.songs.clone()))
    }

    fn playlists(&self) -> Result<Vec<SongList>> {
        Ok(self.playlists.clone())
    }

    fn playlist(&self, name: &str) -> Result<SongList> {
        self.playlists
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| {
                Error::Playlist(PlaylistError::NotFound {
                    name: name.to_string(),
                })
            })
    }

    fn remove_playlist(&mut self, name: &str) -> Result<()> {
        let before = self.playlists.len();
        self.playlists.retain(|p| p.name() != name);
        if self.playlists.len() == before {
            return Err(Error::Playlist(PlaylistError::NotFound {
                name: name.to_string(),
            }));
        }
        Ok(())
    }

    fn remove_song(&mut self, song: &Song, playlist: Option<&str>) -> Result<()> {
        if let Some(name) = playlist {
            let list = self
                .playlists
                .iter_mut()
                .find(|p| p.name() == name)
                .ok_or_else(|| {
                    Error::Playlist(PlaylistError::NotFound {
                        name: name.to_string(),
                    })
                })?;
            let before = list.len();
            list.songs.retain(|s| s.source_url() != song.source_url());
            if list.len() == before {
                return Err(Error::Library(LibraryError::SongNotFound {
                    path: song.source_url().to_path_buf(),
                }));
            }
            return Ok(());
        }

        let before = self.songs.len();
        self.songs.retain(|s| s.source_url() != song.source_url());
        if self.songs.len() == before {
            return Err(Error::Library(LibraryError::SongNotFound {
                path: song.source_url().to_path_buf(),
            }));
        }
        for list in &mut self.playlists {
            list.songs.retain(|s| s.source_url() != song.source_url());
        }
        Ok(())
    }

    fn add_path(&mut self, path: &Path) -> Result<()> {
        self.add_song(Song::new(path));
        Ok(())
    }
}

// =============================================================================
// Directory-backed backend
// =============================================================================

/// A [`MediaLibrary`] rooted at a directory on disk.
///
/// Songs are discovered by a recursive scan for audio files; attribute bags
/// are built from ID3 tags and file metadata. Playlists are `.m3u` files
/// sitting directly in the library root.
#[derive(Debug, Clone)]
pub struct LocalLibrary {
    root: PathBuf,
    extensions: Vec<String>,
}

impl LocalLibrary {
    /// Open a library rooted at an existing directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist or is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            return Err(Error::FileSystem(FileSystemError::NotFound { path: root }));
        }
        if !root.is_dir() {
            return Err(Error::FileSystem(FileSystemError::InvalidPath {
                path: root,
                reason: "library root is not a directory".to_string(),
            }));
        }
        Ok(Self {
            root,
            extensions: DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
    }

    /// Replace the recognized audio extensions (lowercase, no dot).
    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// The library root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build a song handle from a file on disk.
    fn song_from_path(&self, path: &Path) -> Song {
        let mut song = Song::new(path).with_attribute(ATTR_MEDIA_TYPE, "audio");

        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            song = song.with_attribute(ATTR_FILE_TYPE, ext.to_lowercase());
        }

        if let Ok(meta) = fs::metadata(path) {
            song = song.with_attribute(ATTR_FILE_SIZE, meta.len().to_string());
            if let Ok(modified) = meta.modified() {
                let acquired: DateTime<Local> = modified.into();
                song = song.with_attribute(
                    ATTR_ACQUIRED,
                    acquired.format("%-m/%-d/%Y").to_string(),
                );
            }
        }

        match Tag::read_from_path(path) {
            Ok(tag) => {
                if let Some(title) = tag.title() {
                    song = song.with_attribute(ATTR_TITLE, title);
                }
                if let Some(artist) = tag.artist() {
                    song = song.with_attribute(ATTR_AUTHOR, artist);
                }
                if let Some(album) = tag.album() {
                    song = song.with_attribute(ATTR_ALBUM, album);
                }
                if let Some(genre) = tag.genre_parsed() {
                    song = song.with_attribute(ATTR_GENRE, genre.to_string());
                }
                if let Some(duration) = tag.duration() {
                    song = song.with_attribute(ATTR_DURATION, duration.to_string());
                }
                if let Some(year) = tag.year() {
                    song = song.with_attribute(ATTR_YEAR, year.to_string());
                }
            }
            Err(id3::Error {
                kind: id3::ErrorKind::NoTag,
                ..
            }) => {
                debug!("no ID3 tag in {}", path.display());
            }
            Err(e) => {
                warn!("failed to read ID3 tag from {}: {}", path.display(), e);
            }
        }

        song
    }

    fn songs_for_paths(&self, paths: &[PathBuf]) -> Vec<SongRef> {
        let mut songs = Vec::with_capacity(paths.len());
        for path in paths {
            if path.exists() {
                songs.push(Arc::new(self.song_from_path(path)));
            } else {
                warn!("playlist references missing file {}", path.display());
            }
        }
        songs
    }
}

impl MediaLibrary for LocalLibrary {
    fn all_songs(&self) -> Result<SongList> {
        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().is_file() && has_extension(e.path(), &self.extensions))
            .map(|e| e.path().to_path_buf())
            .collect();
        paths.sort();

        let songs: Vec<SongRef> = paths
            .iter()
            .map(|p| Arc::new(self.song_from_path(p)))
            .collect();
        info!("scanned {} songs under {}", songs.len(), self.root.display());
        Ok(SongList::from_songs(ALL_MUSIC, songs))
    }

    fn playlists(&self) -> Result<Vec<SongList>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: self.root.clone(),
                reason: e.to_string(),
            })
        })?;

        let mut lists = Vec::new();
        for entry in entries.filter_map(std::result::Result::ok) {
            let path = entry.path();
            let is_m3u = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(m3u::M3U_EXTENSION));
            if !path.is_file() || !is_m3u {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let paths = m3u::read_playlist(&path)?;
            lists.push(SongList::from_songs(name, self.songs_for_paths(&paths)));
        }

        lists.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(lists)
    }

    fn playlist(&self, name: &str) -> Result<SongList> {
        let path = m3u::playlist_path(&self.root, name);
        if !path.exists() {
            return Err(Error::Playlist(PlaylistError::NotFound {
                name: name.to_string(),
            }));
        }
        let paths = m3u::read_playlist(&path)?;
        Ok(SongList::from_songs(name, self.songs_for_paths(&paths)))
    }

    fn remove_playlist(&mut self, name: &str) -> Result<()> {
        let path = m3u::playlist_path(&self.root, name);
        if !path.exists() {
            return Err(Error::Playlist(PlaylistError::NotFound {
                name: name.to_string(),
            }));
        }
        fs::remove_file(&path).map_err(|e| {
            Error::FileSystem(FileSystemError::DeleteFailed {
                path,
                reason: e.to_string(),
            })
        })?;
        info!("removed playlist {name}");
        Ok(())
    }

    fn remove_song(&mut self, song: &Song, playlist: Option<&str>) -> Result<()> {
        let Some(name) = playlist else {
            return Err(Error::Library(LibraryError::Unsupported {
                operation: "remove_song".to_string(),
                reason: "a directory-backed library cannot unregister a song \
                         without deleting its file"
                    .to_string(),
            }));
        };

        let path = m3u::playlist_path(&self.root, name);
        if !path.exists() {
            return Err(Error::Playlist(PlaylistError::NotFound {
                name: name.to_string(),
            }));
        }

        let paths = m3u::read_playlist(&path)?;
        let remaining: Vec<PathBuf> = paths
            .iter()
            .filter(|p| p.as_path() != song.source_url())
            .cloned()
            .collect();
        if remaining.len() == paths.len() {
            return Err(Error::Library(LibraryError::SongNotFound {
                path: song.source_url().to_path_buf(),
            }));
        }

        let mut content = String::from(m3u::M3U_HEADER);
        content.push('\n');
        for p in &remaining {
            if p.exists() {
                content.push_str(&m3u::playlist_entry(&self.song_from_path(p), None));
            } else {
                content.push_str(&p.display().to_string());
                content.push('\n');
            }
        }
        fs::write(&path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path,
                reason: e.to_string(),
            })
        })?;
        Ok(())
    }

    fn add_path(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::FileSystem(FileSystemError::NotFound {
                path: path.to_path_buf(),
            }));
        }
        if !has_extension(path, &self.extensions) {
            return Err(Error::Library(LibraryError::UnsupportedFile {
                path: path.to_path_buf(),
                reason: "not a recognized audio extension".to_string(),
            }));
        }
        if !path.starts_with(&self.root) {
            return Err(Error::Library(LibraryError::Unsupported {
                operation: "add_path".to_string(),
                reason: "file is outside the library root".to_string(),
            }));
        }
        // Files under the root are picked up by the next scan.
        debug!("registered {}", path.display());
        Ok(())
    }
}
