//! Object store gateway
//!
//! Thin request/response wrappers over the remote store: enumerate PDF
//! objects, mint signed retrieval URLs, upload new documents. No retry,
//! batching or caching happens at this layer.

mod s3;

use std::time::Duration;

use chrono::{DateTime, Utc};

pub use s3::S3Gateway;

/// Lifetime of a signed retrieval URL
pub const PRESIGN_TTL: Duration = Duration::from_secs(3600);

/// Content type attached to every upload
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// One object as reported by the store enumeration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Acknowledgement of a successful upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadReceipt {
    pub key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{operation} request failed: {detail}")]
    Request {
        operation: &'static str,
        detail: String,
    },

    #[error("object store is not configured: {0}")]
    Config(String),

    #[error("async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl StoreError {
    pub fn request(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Request {
            operation,
            detail: detail.into(),
        }
    }
}

/// Remote object store collaborator.
///
/// Calls block the calling thread until the store answers. Implementations
/// must be shareable across the thumbnail workers.
pub trait ObjectStore: Send + Sync {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError>;

    fn presign(&self, key: &str, ttl: Duration) -> Result<String, StoreError>;

    fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError>;
}

/// Case-insensitive `.pdf` suffix check
#[must_use]
pub fn is_pdf_key(key: &str) -> bool {
    key.to_lowercase().ends_with(".pdf")
}

/// Enumerate objects under `prefix`, keeping only PDF documents.
pub fn list_pdfs(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError> {
    let entries = store.list(prefix)?;
    let total = entries.len();
    let pdfs: Vec<ObjectEntry> = entries.into_iter().filter(|e| is_pdf_key(&e.key)).collect();
    log::debug!("Listed {total} objects under {prefix:?}, {} are PDFs", pdfs.len());
    Ok(pdfs)
}

/// Signed retrieval URL valid for [`PRESIGN_TTL`]
pub fn signed_url(store: &dyn ObjectStore, key: &str) -> Result<String, StoreError> {
    store.presign(key, PRESIGN_TTL)
}

pub fn upload_pdf(
    store: &dyn ObjectStore,
    key: &str,
    body: Vec<u8>,
) -> Result<UploadReceipt, StoreError> {
    let size = body.len();
    store.put(key, body, PDF_CONTENT_TYPE)?;
    log::info!("Uploaded {key} ({size} bytes)");
    Ok(UploadReceipt {
        key: key.to_string(),
    })
}
