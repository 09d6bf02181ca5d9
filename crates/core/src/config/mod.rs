use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{album::DEFAULT_ROOT_TITLE, Result, ShutdownMode};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub library: LibraryConfig,
    pub playback: PlaybackConfig,
}

impl AppConfig {
    /// Parses a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

/// Configuration of the album library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub root_title: String,
    /// File extensions, without the dot, treated as sound clips when
    /// scanning a directory.
    pub extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root_title: DEFAULT_ROOT_TITLE.to_string(),
            extensions: ["wav", "mp3", "aiff", "au", "flac", "ogg"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl LibraryConfig {
    /// Whether `path` has one of the configured extensions, ignoring case.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
    }
}

/// Configuration specific to the playback worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub shutdown: ShutdownMode,
}
