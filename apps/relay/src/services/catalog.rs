//! Track catalog
//!
//! Lists the playable tracks in the library directory. The scan is flat: only
//! regular files directly inside the directory whose name ends in `.mp3`.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Extension a file needs to be listed
pub const TRACK_EXTENSION: &str = ".mp3";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read library directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Catalog rooted at a fixed directory
#[derive(Debug, Clone)]
pub struct TrackCatalog {
    root: PathBuf,
}

impl TrackCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Track file names, sorted by name
    pub async fn list_tracks(&self) -> Result<Vec<String>, CatalogError> {
        let unreadable = |source| CatalogError::Unreadable {
            path: self.root.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(unreadable)?;
        let mut songs = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    tracing::debug!(error = %e, path = %entry.path().display(), "Skipping unreadable entry");
                    continue;
                }
            };
            if !file_type.is_file() {
                continue;
            }

            // Names that are not valid UTF-8 cannot travel in the JSON handshake
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.ends_with(TRACK_EXTENSION) {
                songs.push(name);
            }
        }

        songs.sort();
        Ok(songs)
    }

    /// Whether the library directory can currently be listed
    pub async fn is_readable(&self) -> bool {
        tokio::fs::read_dir(&self.root).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library_with(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in files {
            std::fs::write(dir.path().join(name), b"ID3").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_lists_only_mp3_files_sorted() {
        let dir = library_with(&["b.mp3", "a.mp3", "cover.jpg", "notes.txt", "c.flac"]);
        let catalog = TrackCatalog::new(dir.path());

        let songs = catalog.list_tracks().await.unwrap();

        assert_eq!(songs, vec!["a.mp3", "b.mp3"]);
    }

    #[tokio::test]
    async fn test_scan_is_not_recursive() {
        let dir = library_with(&["top.mp3"]);
        let nested = dir.path().join("album");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("deep.mp3"), b"ID3").unwrap();
        // A directory named like a track is not a track
        std::fs::create_dir(dir.path().join("folder.mp3")).unwrap();

        let songs = TrackCatalog::new(dir.path()).list_tracks().await.unwrap();

        assert_eq!(songs, vec!["top.mp3"]);
    }

    #[tokio::test]
    async fn test_extension_match_is_case_sensitive() {
        let dir = library_with(&["loud.MP3", "quiet.mp3"]);
        let songs = TrackCatalog::new(dir.path()).list_tracks().await.unwrap();
        assert_eq!(songs, vec!["quiet.mp3"]);
    }

    #[tokio::test]
    async fn test_empty_library() {
        let dir = TempDir::new().unwrap();
        let songs = TrackCatalog::new(dir.path()).list_tracks().await.unwrap();
        assert!(songs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let catalog = TrackCatalog::new(dir.path().join("does-not-exist"));

        let err = catalog.list_tracks().await.unwrap_err();

        assert!(matches!(err, CatalogError::Unreadable { .. }));
        assert!(err.to_string().contains("does-not-exist"));
        assert!(!catalog.is_readable().await);
    }
}
