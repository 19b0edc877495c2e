use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key-value persistence for last-read pages, injected into the viewer.
pub trait BookmarkStore: Send {
    /// Last saved page for a document, 1-based. `Ok(None)` when never bookmarked.
    fn page_for(&self, document_id: &str) -> Result<Option<usize>, BookmarkError>;

    fn save_page(&mut self, document_id: &str, page: usize) -> Result<(), BookmarkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BookmarkError {
    #[error("bookmark file: {0}")]
    Io(#[from] std::io::Error),

    #[error("bookmark format: {0}")]
    Format(#[from] serde_json::Error),

    #[error("invalid page {page} for {document_id}")]
    InvalidPage { document_id: String, page: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub page: usize,
    pub last_read: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Bookmarks {
    documents: HashMap<String, Bookmark>,
    #[serde(skip)]
    file_path: Option<PathBuf>,
}

impl Bookmarks {
    pub fn ephemeral() -> Self {
        Self {
            documents: HashMap::new(),
            file_path: None,
        }
    }

    pub fn with_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            documents: HashMap::new(),
            file_path: Some(file_path.into()),
        }
    }

    pub fn load_or_ephemeral(file_path: Option<&Path>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load bookmarks from {}: {}", path.display(), e);
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &Path) -> Result<Self, BookmarkError> {
        if file_path.exists() {
            let content = fs::read_to_string(file_path)?;
            let mut bookmarks: Self = serde_json::from_str(&content)?;
            bookmarks.file_path = Some(file_path.to_path_buf());
            Ok(bookmarks)
        } else {
            Ok(Self::with_file(file_path))
        }
    }

    pub fn save(&self) -> Result<(), BookmarkError> {
        match &self.file_path {
            Some(path) => {
                let content = serde_json::to_string_pretty(self)?;
                fs::write(path, content)?;
                Ok(())
            }
            None => {
                // Ephemeral bookmarks don't save to disk
                Ok(())
            }
        }
    }

    pub fn get_most_recent(&self) -> Option<(String, &Bookmark)> {
        self.documents
            .iter()
            .max_by_key(|(_, bookmark)| bookmark.last_read)
            .map(|(id, bookmark)| (id.clone(), bookmark))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bookmark)> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl BookmarkStore for Bookmarks {
    fn page_for(&self, document_id: &str) -> Result<Option<usize>, BookmarkError> {
        Ok(self.documents.get(document_id).map(|b| b.page))
    }

    fn save_page(&mut self, document_id: &str, page: usize) -> Result<(), BookmarkError> {
        if page == 0 {
            return Err(BookmarkError::InvalidPage {
                document_id: document_id.to_string(),
                page,
            });
        }

        let previous = self.documents.insert(
            document_id.to_string(),
            Bookmark {
                page,
                last_read: chrono::Utc::now(),
            },
        );
        if let Err(e) = self.save() {
            // Keep memory in step with what is on disk.
            match previous {
                Some(bookmark) => self.documents.insert(document_id.to_string(), bookmark),
                None => self.documents.remove(document_id),
            };
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ephemeral_store_remembers_pages() {
        let mut bookmarks = Bookmarks::ephemeral();
        assert_eq!(bookmarks.page_for("a.pdf").unwrap(), None);

        bookmarks.save_page("a.pdf", 7).unwrap();
        assert_eq!(bookmarks.page_for("a.pdf").unwrap(), Some(7));

        bookmarks.save_page("a.pdf", 3).unwrap();
        assert_eq!(bookmarks.page_for("a.pdf").unwrap(), Some(3));
        assert_eq!(bookmarks.len(), 1);
    }

    #[test]
    fn file_store_survives_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bookmarks.json");

        let mut bookmarks = Bookmarks::load_or_ephemeral(Some(&path));
        bookmarks.save_page("reports/q3.pdf", 12).unwrap();
        bookmarks.save_page("b.pdf", 2).unwrap();

        let reloaded = Bookmarks::load_from_file(&path).unwrap();
        assert_eq!(reloaded.page_for("reports/q3.pdf").unwrap(), Some(12));
        assert_eq!(reloaded.page_for("b.pdf").unwrap(), Some(2));
    }

    #[test]
    fn corrupt_file_falls_back_to_empty_store() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bookmarks.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(Bookmarks::load_from_file(&path).is_err());
        let bookmarks = Bookmarks::load_or_ephemeral(Some(&path));
        assert!(bookmarks.is_empty());
    }

    #[test]
    fn save_into_missing_directory_reports_failure() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("bookmarks.json");

        let mut bookmarks = Bookmarks::with_file(&path);
        let err = bookmarks.save_page("a.pdf", 4).unwrap_err();
        assert!(matches!(err, BookmarkError::Io(_)));
        assert_eq!(bookmarks.page_for("a.pdf").unwrap(), None);
        assert!(bookmarks.is_empty());
    }

    #[test]
    fn failed_save_keeps_the_previous_page() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("data");
        fs::create_dir(&dir).unwrap();
        let path = dir.join("bookmarks.json");

        let mut bookmarks = Bookmarks::with_file(&path);
        bookmarks.save_page("a.pdf", 2).unwrap();

        fs::remove_file(&path).unwrap();
        fs::remove_dir(&dir).unwrap();
        assert!(bookmarks.save_page("a.pdf", 9).is_err());
        assert_eq!(bookmarks.page_for("a.pdf").unwrap(), Some(2));
    }

    #[test]
    fn page_zero_is_rejected() {
        let mut bookmarks = Bookmarks::ephemeral();
        assert!(bookmarks.save_page("a.pdf", 0).is_err());
        assert!(bookmarks.is_empty());
    }

    #[test]
    fn most_recent_is_last_saved() {
        let mut bookmarks = Bookmarks::ephemeral();
        bookmarks.save_page("old.pdf", 1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        bookmarks.save_page("new.pdf", 9).unwrap();

        let (id, bookmark) = bookmarks.get_most_recent().unwrap();
        assert_eq!(id, "new.pdf");
        assert_eq!(bookmark.page, 9);
    }
}
