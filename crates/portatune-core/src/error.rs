//! Typed error handling for the export engine.
//!
//! Each domain gets its own error enum; the top-level [`Error`] wraps them so
//! callers can match on the domain without losing the detail. Fatal
//! conditions are surfaced as errors, while per-item recoverable failures
//! (a playlist entry that could not be written, a source file that went
//! missing) are counted inside the operation reports instead.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem-level failure.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// Playlist lookup or naming failure.
    #[error(transparent)]
    Playlist(#[from] PlaylistError),

    /// Song filtering failure.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Removal-engine failure.
    #[error(transparent)]
    Removal(#[from] RemovalError),

    /// Media-library backend failure.
    #[error(transparent)]
    Library(#[from] LibraryError),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Filesystem operation errors.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// A path that was expected to exist does not.
    #[error("path not found: {path}")]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// Reading a file or directory failed.
    #[error("failed to read {path}: {reason}")]
    ReadFailed {
        /// The path being read.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// Writing a file failed.
    #[error("failed to write {path}: {reason}")]
    WriteFailed {
        /// The path being written.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// Creating a directory (recursively) failed.
    #[error("failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// The directory being created.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// Deleting a file failed.
    #[error("failed to delete {path}: {reason}")]
    DeleteFailed {
        /// The path being deleted.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// Copying a file failed.
    #[error("failed to copy {source_path} to {destination}: {reason}")]
    CopyFailed {
        /// The file being copied.
        source_path: PathBuf,
        /// The intended destination.
        destination: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// A path is structurally unusable for the requested operation.
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: PathBuf,
        /// Why it is unusable.
        reason: String,
    },
}

/// Playlist-level errors.
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// No playlist with the given name exists in the library.
    #[error("playlist not found: {name}")]
    NotFound {
        /// The requested playlist name.
        name: String,
    },

    /// The playlist name cannot be used.
    #[error("invalid playlist name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why it is invalid.
        reason: String,
    },
}

/// Song-filtering errors.
///
/// These are fatal to the filter invocation that raised them: once the
/// predicate itself is broken, the remaining output cannot be trusted, so
/// the loop aborts instead of silently dropping songs.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The textual filter expression could not be parsed.
    #[error("invalid filter expression {expression:?}: {reason}")]
    InvalidExpression {
        /// The raw expression text.
        expression: String,
        /// Parse failure detail.
        reason: String,
    },

    /// The expression parsed but could not be evaluated against a song.
    #[error("failed to evaluate {expression:?} against {value:?} for {song}: {reason}")]
    EvaluationFailed {
        /// The raw expression text.
        expression: String,
        /// The attribute value it was applied to.
        value: String,
        /// The song whose attribute broke the evaluation.
        song: PathBuf,
        /// Evaluation failure detail.
        reason: String,
    },

    /// A song's acquisition date could not be parsed.
    #[error("invalid acquisition date {value:?} for {song}: {reason}")]
    InvalidDate {
        /// The raw attribute value.
        value: String,
        /// The song carrying the bad date.
        song: PathBuf,
        /// Parse failure detail.
        reason: String,
    },
}

/// Removal-engine errors.
#[derive(Debug, Error)]
pub enum RemovalError {
    /// The destination directory is unset, missing, or not a directory.
    ///
    /// Removal is destructive, so the target is never guessed.
    #[error("refusing to remove songs under {path}: {reason}")]
    InvalidTarget {
        /// The rejected destination.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },
}

/// Media-library backend errors.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Scanning the library root failed.
    #[error("library scan failed at {path}: {reason}")]
    ScanFailed {
        /// The path being scanned.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// The song is not present in the library.
    #[error("song not in library: {path}")]
    SongNotFound {
        /// The song's source path.
        path: PathBuf,
    },

    /// The file cannot be added to the library.
    #[error("unsupported media file {path}: {reason}")]
    UnsupportedFile {
        /// The rejected file.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// The backend cannot perform the requested operation.
    #[error("unsupported library operation {operation:?}: {reason}")]
    Unsupported {
        /// The operation that was requested.
        operation: String,
        /// Why the backend cannot do it.
        reason: String,
    },
}
