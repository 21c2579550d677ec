//! Application configuration.
//!
//! Settings are stored as JSON under the platform configuration directory.
//! Missing files are not an error: [`AppConfig::load`] falls back to
//! defaults, and the file is only created when [`AppConfig::save`] is called.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, FileSystemError, Result};
use crate::library::DEFAULT_AUDIO_EXTENSIONS;

/// Directory name used under the platform config and audio directories.
pub const APP_DIR_NAME: &str = "portatune";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Playlist names generated by desktop players rather than users.
///
/// These are skipped by bulk exports by default; they are views over the
/// library, not user content.
pub fn default_skip_playlists() -> BTreeSet<String> {
    [
        "All Music",
        "All Video",
        "All Pictures",
        "Other Media",
        "Sync Results",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// The default destination for exports: a subdirectory of the user's audio
/// directory, falling back to the home directory.
#[must_use]
pub fn default_export_directory() -> PathBuf {
    dirs::audio_dir()
        .or_else(dirs::home_dir)
        .map_or_else(|| PathBuf::from(APP_DIR_NAME), |dir| dir.join(APP_DIR_NAME))
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Destination root used when an export is not given one explicitly.
    pub export_root: PathBuf,

    /// Root of the local media library, when one is used.
    #[serde(default)]
    pub library_root: Option<PathBuf>,

    /// Playlist names excluded from bulk exports.
    #[serde(default = "default_skip_playlists")]
    pub skip_playlists: BTreeSet<String>,

    /// Audio file extensions recognized by library scans (lowercase, no dot).
    #[serde(default = "AppConfig::default_extensions")]
    pub audio_extensions: Vec<String>,

    /// Playlists with fewer songs than this are candidates for pruning.
    #[serde(default = "AppConfig::default_min_playlist_songs")]
    pub min_playlist_songs: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            export_root: default_export_directory(),
            library_root: None,
            skip_playlists: default_skip_playlists(),
            audio_extensions: Self::default_extensions(),
            min_playlist_songs: Self::default_min_playlist_songs(),
        }
    }
}

impl AppConfig {
    fn default_extensions() -> Vec<String> {
        DEFAULT_AUDIO_EXTENSIONS
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    const fn default_min_playlist_songs() -> usize {
        1
    }

    /// The configuration file location, when a config directory exists.
    #[must_use]
    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the configuration from the default location, or defaults when no
    /// file exists.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        match Self::config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("no configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load the configuration from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        let config = serde_json::from_str(&content)?;
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save the configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error when no config directory is available or the file
    /// cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path().ok_or_else(|| {
            Error::Configuration("no configuration directory available".to_string())
        })?;
        self.save_to(&path)
    }

    /// Save the configuration to an explicit path, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the directories or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::FileSystem(FileSystemError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                })
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        info!("saved configuration to {}", path.display());
        Ok(())
    }
}
