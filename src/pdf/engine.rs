//! Rendering engine seam

use super::{CancelToken, PageSize, Raster};

/// Errors from the rendering engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("fetching document: {0}")]
    Fetch(String),

    #[error("PDF engine: {0}")]
    Pdf(String),

    #[error("page {page} is outside 1..={page_count}")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("image encoding: {0}")]
    Encode(String),

    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Opens documents from retrieval URLs.
///
/// Engines are shared between threads; the documents they open are not and
/// stay on the thread that opened them.
pub trait RenderEngine: Send + Sync + 'static {
    type Document: LoadedDocument;

    /// Fetch and parse the document behind `url`.
    fn open(&self, url: &str, cancel: &CancelToken) -> Result<Self::Document, EngineError>;
}

/// An opened document. Page numbers are 1-based.
pub trait LoadedDocument {
    fn page_count(&self) -> usize;

    fn page_size(&self, page: usize) -> Result<PageSize, EngineError>;

    /// Rasterize `page` at `scale` (1.0 = one pixel per PDF point).
    ///
    /// Implementations should return [`EngineError::Cancelled`] when they
    /// notice `cancel` has fired.
    fn render_page(
        &self,
        page: usize,
        scale: f32,
        cancel: &CancelToken,
    ) -> Result<Raster, EngineError>;
}
