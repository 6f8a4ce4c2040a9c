//! Discovery of media files under a directory tree.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::model::MediaItem;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scan root not found: {0}")]
    NotFound(PathBuf),

    #[error("Scan root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Walks a tree and keeps files with a known media extension.
#[derive(Debug, Clone)]
pub struct MediaScanner {
    extensions: Vec<String>,
    follow_links: bool,
}

impl MediaScanner {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            follow_links: false,
        }
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Extension match is case-insensitive.
    pub fn is_media_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }

    /// Returns matching files in file-name order, numbered from zero.
    pub fn scan(&self, root: &Path) -> Result<Vec<MediaItem>, ScanError> {
        if !root.exists() {
            return Err(ScanError::NotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }
            if self.is_media_file(entry.path()) {
                paths.push(entry.into_path());
            }
        }

        debug!(root = %root.display(), count = paths.len(), "Scan finished");
        Ok(MediaItem::from_paths(paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_extension_matching() {
        let scanner = MediaScanner::new(["mp3", ".FLAC"]);
        assert!(scanner.is_media_file(Path::new("a.mp3")));
        assert!(scanner.is_media_file(Path::new("a.MP3")));
        assert!(scanner.is_media_file(Path::new("dir/b.flac")));
        assert!(!scanner.is_media_file(Path::new("cover.jpg")));
        assert!(!scanner.is_media_file(Path::new("mp3")));
    }

    #[test]
    fn test_scan_orders_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("b_album")).unwrap();
        fs::create_dir(dir.path().join("a_album")).unwrap();
        fs::write(dir.path().join("b_album/02.mp3"), b"").unwrap();
        fs::write(dir.path().join("b_album/01.mp3"), b"").unwrap();
        fs::write(dir.path().join("a_album/track.ogg"), b"").unwrap();
        fs::write(dir.path().join("a_album/notes.txt"), b"").unwrap();

        let items = MediaScanner::new(["mp3", "ogg"]).scan(dir.path()).unwrap();
        let names: Vec<_> = items
            .iter()
            .map(|item| item.path.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("a_album/track.ogg"),
                PathBuf::from("b_album/01.mp3"),
                PathBuf::from("b_album/02.mp3"),
            ]
        );
        assert_eq!(
            items.iter().map(|i| i.ordinal).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_scan_rejects_bad_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.mp3");
        fs::write(&file, b"").unwrap();
        let scanner = MediaScanner::new(["mp3"]);

        assert!(matches!(scanner.scan(&file), Err(ScanError::NotADirectory(_))));
        assert!(matches!(
            scanner.scan(&dir.path().join("missing")),
            Err(ScanError::NotFound(_))
        ));
    }
}
