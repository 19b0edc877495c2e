//! Upload of local PDF files into the store

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::Error;
use crate::store::{self, ObjectStore, PDF_CONTENT_TYPE, UploadReceipt};

/// How often the progress indicator advances while the store call runs
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);
pub const PROGRESS_STEP: u32 = 5;
/// Progress never passes this until the store call returns
pub const PROGRESS_CAP: u32 = 95;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Upload successful!";

/// Media type of a local file, from its extension
#[must_use]
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => PDF_CONTENT_TYPE,
        Some("txt" | "md") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("epub") => "application/epub+zip",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// A file chosen for upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    /// File name, used as the object key
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("No usable file name in {path:?}"))?
            .to_string();
        let bytes = fs::read(path).with_context(|| format!("Failed to read {path:?}"))?;
        Ok(Self::new(name, media_type_for(path), bytes))
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// `name (12.3 KB)`
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} ({:.1} KB)", self.name, self.size() as f64 / 1024.0)
    }
}

/// Shared view of the upload progress, readable from other threads
#[derive(Clone, Debug, Default)]
pub struct UploadProgress(Arc<AtomicU32>);

impl UploadProgress {
    #[must_use]
    pub fn percent(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    /// One simulated step, never past [`PROGRESS_CAP`]
    pub fn advance(&self) -> u32 {
        let next = (self.percent() + PROGRESS_STEP).min(PROGRESS_CAP).max(self.percent());
        self.0.store(next, Ordering::SeqCst);
        next
    }

    fn complete(&self) {
        self.0.store(100, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

/// Outcome message of the last action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadMessage {
    Success,
    Error(&'static str),
}

impl UploadMessage {
    #[must_use]
    pub fn text(self) -> &'static str {
        match self {
            Self::Success => UPLOAD_SUCCESS_MESSAGE,
            Self::Error(message) => message,
        }
    }
}

/// File selection, validation and upload with a progress indicator
#[derive(Debug, Default)]
pub struct UploadControl {
    selected: Option<UploadFile>,
    message: Option<UploadMessage>,
    progress: UploadProgress,
}

impl UploadControl {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selected(&self) -> Option<&UploadFile> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn message(&self) -> Option<UploadMessage> {
        self.message
    }

    #[must_use]
    pub fn progress(&self) -> UploadProgress {
        self.progress.clone()
    }

    /// Choose a file. Anything other than a PDF clears the selection.
    pub fn select_file(&mut self, file: UploadFile) -> Result<(), Error> {
        if file.media_type != PDF_CONTENT_TYPE {
            warn!("Rejected {} ({})", file.name, file.media_type);
            let err = Error::InvalidMediaType {
                media_type: file.media_type,
            };
            self.selected = None;
            self.message = Some(UploadMessage::Error(err.user_message()));
            return Err(err);
        }
        self.selected = Some(file);
        self.message = None;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.message = None;
    }

    pub fn reset_progress(&mut self) {
        self.progress.reset();
    }

    /// Upload the selected file, keyed by its name.
    ///
    /// Blocks until the store answers; progress advances meanwhile.
    pub fn upload(&mut self, store: &dyn ObjectStore) -> Result<UploadReceipt, Error> {
        let Some(file) = &self.selected else {
            let err = Error::NoFileSelected;
            self.message = Some(UploadMessage::Error(err.user_message()));
            return Err(err);
        };
        self.message = None;
        self.progress.reset();

        let key = file.name.clone();
        let body = file.bytes.clone();
        let progress = self.progress.clone();
        let (done_tx, done_rx) = flume::bounded::<()>(1);

        let result = std::thread::scope(|scope| {
            scope.spawn(move || {
                while let Err(flume::RecvTimeoutError::Timeout) =
                    done_rx.recv_timeout(PROGRESS_INTERVAL)
                {
                    progress.advance();
                }
            });
            let result = store::upload_pdf(store, &key, body);
            drop(done_tx);
            result
        });
        self.progress.complete();

        match result {
            Ok(receipt) => {
                info!("Upload of {} finished", receipt.key);
                self.selected = None;
                self.message = Some(UploadMessage::Success);
                Ok(receipt)
            }
            Err(source) => {
                let err = Error::Upload { key, source };
                error!("{err}");
                self.message = Some(UploadMessage::Error(err.user_message()));
                Err(err)
            }
        }
    }
}
