//! MuPDF-backed rendering engine
//!
//! Documents are fetched over HTTP(S) from their signed URL (or read from a
//! `file://` URL) and parsed from memory.

use std::io::Read;
use std::time::Duration;

use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::{CancelToken, EngineError, LoadedDocument, PageSize, Raster, RenderEngine};

const PDF_MAGIC: &str = "application/pdf";
/// Upper bound on a fetched document
const MAX_DOCUMENT_BYTES: u64 = 512 * 1024 * 1024;
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

impl From<mupdf::error::Error> for EngineError {
    fn from(e: mupdf::error::Error) -> Self {
        Self::Pdf(e.to_string())
    }
}

pub struct MupdfEngine {
    agent: ureq::Agent,
}

impl Default for MupdfEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MupdfEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(FETCH_TIMEOUT).build(),
        }
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, EngineError> {
        if let Some(path) = url.strip_prefix("file://") {
            return std::fs::read(path).map_err(|e| EngineError::Fetch(format!("{path}: {e}")));
        }

        // Signed URLs carry credentials, keep them out of error messages
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => EngineError::Fetch(format!("HTTP status {code}")),
            ureq::Error::Transport(t) => EngineError::Fetch(t.kind().to_string()),
        })?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_DOCUMENT_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| EngineError::Fetch(e.to_string()))?;
        Ok(bytes)
    }
}

impl RenderEngine for MupdfEngine {
    type Document = MupdfDocument;

    fn open(&self, url: &str, cancel: &CancelToken) -> Result<MupdfDocument, EngineError> {
        let bytes = self.fetch(url)?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let doc = Document::from_bytes(&bytes, PDF_MAGIC)?;
        let page_count = usize::try_from(doc.page_count()?).unwrap_or(0);
        Ok(MupdfDocument { doc, page_count })
    }
}

pub struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl MupdfDocument {
    fn load_page(&self, page: usize) -> Result<mupdf::Page, EngineError> {
        if page == 0 || page > self.page_count {
            return Err(EngineError::PageOutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        Ok(self.doc.load_page((page - 1) as i32)?)
    }
}

impl LoadedDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> Result<PageSize, EngineError> {
        let bounds = self.load_page(page)?.bounds()?;
        Ok(PageSize {
            width: bounds.x1 - bounds.x0,
            height: bounds.y1 - bounds.y0,
        })
    }

    fn render_page(
        &self,
        page: usize,
        scale: f32,
        cancel: &CancelToken,
    ) -> Result<Raster, EngineError> {
        let page = self.load_page(page)?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let transform = Matrix::new_scale(scale, scale);
        let pixmap = page.to_pixmap(&transform, &Colorspace::device_rgb(), false, true)?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let pixels = pixmap_to_rgb(&pixmap)?;
        Raster::new(pixmap.width(), pixmap.height(), pixels)
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, EngineError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(EngineError::Pdf(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    let expected_min = stride.saturating_mul(height);
    if samples.len() < expected_min || row_bytes > stride {
        return Err(EngineError::Pdf("Pixmap buffer size mismatch".into()));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_local_file_is_a_fetch_error() {
        let engine = MupdfEngine::new();
        let err = engine
            .open("file:///definitely/not/here.pdf", &CancelToken::new())
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::Fetch(_)));
    }
}
