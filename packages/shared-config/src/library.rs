//! Music library configuration

use std::path::PathBuf;

use crate::get_env_or_default;

/// Default location of the track directory, relative to the working directory
pub const DEFAULT_LIBRARY_PATH: &str = "./music";

/// Where the playable tracks live on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Directory scanned for tracks and used as the file-serving root
    pub path: PathBuf,
}

impl LibraryConfig {
    /// Load from `MUSIC_LIBRARY_PATH`
    pub fn from_env() -> Self {
        Self {
            path: PathBuf::from(get_env_or_default(
                "MUSIC_LIBRARY_PATH",
                DEFAULT_LIBRARY_PATH,
            )),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self::with_path(DEFAULT_LIBRARY_PATH)
    }
}
