//! Listing of the PDF documents in the store

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, error};

use crate::Error;
use crate::store::{self, ObjectEntry, ObjectStore};
use crate::thumbnail::{Thumbnail, ThumbnailResult, ThumbnailService};

pub const EMPTY_LIST_MESSAGE: &str = "No PDFs found. Upload one to get started.";

/// A selected document, handed to the viewer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentDescriptor {
    pub key: String,
    /// Signed, time-limited retrieval URL
    pub url: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

impl DocumentDescriptor {
    #[must_use]
    pub fn title(&self) -> String {
        display_title(&self.key)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListStatus {
    /// Entries are available
    Ready(usize),
    /// The store holds no PDFs
    Empty,
    /// Enumeration failed; holds the user message
    Failed(&'static str),
}

/// Snapshot of the store's PDF documents, newest first
#[derive(Debug, Default)]
pub struct DocumentList {
    entries: Vec<ObjectEntry>,
    thumbnails: HashMap<String, Thumbnail>,
    load_error: Option<&'static str>,
    selection_error: Option<&'static str>,
}

impl DocumentList {
    /// Enumerate the store. A failure is recorded on the list, not returned.
    pub fn load(store: &dyn ObjectStore, prefix: &str) -> Self {
        match Self::try_load(store, prefix) {
            Ok(list) => list,
            Err(e) => {
                error!("Failed to list documents: {e}");
                Self {
                    load_error: Some(e.user_message()),
                    ..Self::default()
                }
            }
        }
    }

    pub fn try_load(store: &dyn ObjectStore, prefix: &str) -> Result<Self, Error> {
        let mut entries = store::list_pdfs(store, prefix).map_err(Error::List)?;
        entries.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.key.cmp(&b.key))
        });
        debug!("Document list has {} entries", entries.len());
        Ok(Self {
            entries,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn entries(&self) -> &[ObjectEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, key: &str) -> Option<&ObjectEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    #[must_use]
    pub fn status(&self) -> ListStatus {
        match self.load_error {
            Some(message) => ListStatus::Failed(message),
            None if self.entries.is_empty() => ListStatus::Empty,
            None => ListStatus::Ready(self.entries.len()),
        }
    }

    /// Message to show in place of (or above) the entries, if any
    #[must_use]
    pub fn message(&self) -> Option<&'static str> {
        match self.status() {
            ListStatus::Failed(message) => Some(message),
            ListStatus::Empty => Some(EMPTY_LIST_MESSAGE),
            ListStatus::Ready(_) => self.selection_error,
        }
    }

    /// Sign a retrieval URL for `key` and build its descriptor.
    pub fn select(
        &mut self,
        store: &dyn ObjectStore,
        key: &str,
    ) -> Result<DocumentDescriptor, Error> {
        let result = self.describe(store, key);
        self.selection_error = match &result {
            Ok(_) => None,
            Err(e) => {
                error!("Failed to open {key}: {e}");
                Some(e.user_message())
            }
        };
        result
    }

    fn describe(&self, store: &dyn ObjectStore, key: &str) -> Result<DocumentDescriptor, Error> {
        let entry = self
            .entry(key)
            .ok_or_else(|| Error::NotListed(key.to_string()))?;
        let url = store::signed_url(store, key).map_err(|source| Error::SignUrl {
            key: key.to_string(),
            source,
        })?;
        Ok(DocumentDescriptor {
            key: entry.key.clone(),
            url,
            size: entry.size,
            last_modified: entry.last_modified,
        })
    }

    /// Thumbnail of an entry; placeholder until one has been derived
    #[must_use]
    pub fn thumbnail(&self, key: &str) -> &Thumbnail {
        self.thumbnails.get(key).unwrap_or(&Thumbnail::Placeholder)
    }

    /// Queue a thumbnail job for every entry
    pub fn request_thumbnails(&self, service: &mut ThumbnailService) {
        for entry in &self.entries {
            service.request(&entry.key);
        }
    }

    /// Attach finished thumbnails. Results for unknown keys are dropped.
    pub fn apply_thumbnails(&mut self, results: impl IntoIterator<Item = ThumbnailResult>) {
        for result in results {
            if self.entry(&result.key).is_some() {
                self.thumbnails.insert(result.key, result.thumbnail);
            }
        }
    }
}

/// Document key without a trailing `.pdf` (any case)
#[must_use]
pub fn display_title(key: &str) -> String {
    let split = key.len().saturating_sub(4);
    match (key.get(..split), key.get(split..)) {
        (Some(stem), Some(ext)) if ext.eq_ignore_ascii_case(".pdf") => stem.to_string(),
        _ => key.to_string(),
    }
}

/// Secondary line of a list entry
#[must_use]
pub fn entry_summary(entry: &ObjectEntry) -> String {
    format!(
        "Size: {:.2} KB • Last modified: {}",
        entry.size as f64 / 1024.0,
        entry.last_modified.format("%Y-%m-%d")
    )
}
