//! `Portatune` Core Library
//!
//! This crate exports songs and playlists from a personal media library into
//! portable M3U playlist files and mirrors the referenced media into a
//! destination directory tree, deduplicating against what already exists
//! there:
//! - Song and playlist modeling over a pluggable library backend
//! - Majority-vote common-root detection for rebasing paths
//! - Attribute histograms and attribute/recency/uniqueness filters
//! - M3U generation with metadata fallbacks derived from file paths
//! - Idempotent, error-tolerant export and its destructive inverse
//!
//! Everything is synchronous and single-caller by design: the engine is a
//! stateless pass over data fetched fresh from the library each run, and
//! idempotence comes from duplicate detection rather than locking.
//!
//! # Error Handling
//!
//! This crate uses typed errors per domain. See the [`error`] module for
//! details.
//!
//! ```rust,ignore
//! use portatune_core::{ExportEngine, MediaLibrary, PlaylistCollection};
//!
//! let collection = PlaylistCollection::load(library)?;
//! let engine = ExportEngine::new();
//! let summary = collection.export_playlists(&engine, dest, &skip)?;
//! println!("{summary}");
//! ```

pub mod attributes;
pub mod collection;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod library;
pub mod m3u;
pub mod paths;
pub mod removal;

pub use attributes::{AttributeHistogram, DEFAULT_MIN_SONGS, get_attributes};
pub use collection::{ExportSummary, PlaylistCollection};
pub use config::{
    APP_DIR_NAME, AppConfig, CONFIG_FILE_NAME, default_export_directory, default_skip_playlists,
};
pub use error::{
    Error, FileSystemError, FilterError, LibraryError, PlaylistError, RemovalError, Result,
};
pub use export::{DEFAULT_EXPORT_SUBDIR, ExportEngine, ExportReport, default_export_root};
pub use filter::{
    ACQUIRED_DATE_FORMAT, AttributeTest, FilterExpr, filter_by_attribute, filter_recent,
    filter_recent_as_of, filter_unique,
};
pub use library::{
    ALL_MUSIC, ATTR_ACQUIRED, ATTR_AUTHOR, ATTR_DURATION, ATTR_FILE_SIZE, ATTR_TITLE,
    ATTR_USER_RATING, DEFAULT_AUDIO_EXTENSIONS, LocalLibrary, MediaLibrary, MemoryLibrary, Song,
    SongList, SongRef, broken_songs, format_duration, format_size, is_audio_file,
};
pub use m3u::{
    DEFAULT_DURATION_SECS, M3U_EXTENSION, M3U_HEADER, playlist_entry, playlist_path,
    read_playlist,
};
pub use paths::{common_path, relative_destination};
pub use removal::{RemovalEngine, RemovalReport};
