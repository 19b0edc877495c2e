//! Thumbnail derivation - page 1 of each listed document at low resolution
//!
//! Jobs are spread over a small worker pool. Entries are independent: a
//! failure for one only leaves that entry on its placeholder.

use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use log::{debug, warn};

use crate::Error;
use crate::pdf::{CancelToken, LoadedDocument, RenderEngine};
use crate::store::{self, ObjectStore};

/// Scale page 1 is rendered at
pub const THUMBNAIL_SCALE: f32 = 0.3;

/// What a list entry shows as its preview
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Thumbnail {
    /// PNG data URI
    Image(String),
    /// Generic document icon
    Placeholder,
}

#[derive(Debug)]
enum ThumbnailRequest {
    Derive(String),
    Shutdown,
}

/// Outcome of one thumbnail job
#[derive(Debug)]
pub struct ThumbnailResult {
    pub key: String,
    pub thumbnail: Thumbnail,
}

/// Sign, open and render page 1 of `key` as a data URI.
pub fn derive_thumbnail<E: RenderEngine>(
    store: &dyn ObjectStore,
    engine: &E,
    key: &str,
    cancel: &CancelToken,
) -> Result<String, Error> {
    let url = store::signed_url(store, key).map_err(|source| Error::SignUrl {
        key: key.to_string(),
        source,
    })?;
    let doc = engine
        .open(&url, cancel)
        .map_err(|source| Error::Load {
            attempts: 1,
            source,
        })?;
    let render_error = |source| Error::Render { page: 1, source };
    let raster = doc
        .render_page(1, THUMBNAIL_SCALE, cancel)
        .map_err(render_error)?;
    raster.to_data_uri().map_err(render_error)
}

fn thumbnail_worker<E: RenderEngine>(
    store: Arc<dyn ObjectStore>,
    engine: Arc<E>,
    cancel: CancelToken,
    requests: Receiver<ThumbnailRequest>,
    responses: Sender<ThumbnailResult>,
) {
    for request in requests {
        let key = match request {
            ThumbnailRequest::Derive(key) => key,
            ThumbnailRequest::Shutdown => break,
        };
        if cancel.is_cancelled() {
            break;
        }

        let thumbnail = match derive_thumbnail(store.as_ref(), engine.as_ref(), &key, &cancel) {
            Ok(uri) => Thumbnail::Image(uri),
            Err(e) => {
                warn!("Thumbnail for {key} unavailable: {e}");
                Thumbnail::Placeholder
            }
        };
        let _ = responses.send(ThumbnailResult { key, thumbnail });
    }
}

/// Pool of thumbnail workers
pub struct ThumbnailService {
    request_tx: Sender<ThumbnailRequest>,
    response_rx: Receiver<ThumbnailResult>,
    cancel: CancelToken,
    num_workers: usize,
    pending: usize,
}

impl ThumbnailService {
    pub fn new<E: RenderEngine>(
        store: Arc<dyn ObjectStore>,
        engine: Arc<E>,
        num_workers: usize,
    ) -> Self {
        // Workers share one request queue, so the receiver must be cloneable
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let cancel = CancelToken::new();

        for _ in 0..num_workers.max(1) {
            let store = Arc::clone(&store);
            let engine = Arc::clone(&engine);
            let cancel = cancel.clone();
            let rx = request_rx.clone();
            let tx = response_tx.clone();

            std::thread::spawn(move || thumbnail_worker(store, engine, cancel, rx, tx));
        }

        Self {
            request_tx,
            response_rx,
            cancel,
            num_workers: num_workers.max(1),
            pending: 0,
        }
    }

    pub fn request(&mut self, key: &str) {
        if self
            .request_tx
            .send(ThumbnailRequest::Derive(key.to_string()))
            .is_ok()
        {
            self.pending += 1;
        }
    }

    /// Jobs requested but not yet collected
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Collect finished jobs without blocking
    pub fn poll(&mut self) -> Vec<ThumbnailResult> {
        let results: Vec<ThumbnailResult> = self.response_rx.try_iter().collect();
        self.pending = self.pending.saturating_sub(results.len());
        results
    }

    /// Collect results until every job is done or `timeout` passes
    pub fn wait_all(&mut self, timeout: Duration) -> Vec<ThumbnailResult> {
        let deadline = Instant::now() + timeout;
        let mut results = Vec::new();

        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(result) => {
                    self.pending -= 1;
                    results.push(result);
                }
                Err(_) => {
                    debug!("{} thumbnail(s) still pending", self.pending);
                    break;
                }
            }
        }

        results
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(ThumbnailRequest::Shutdown);
        }
    }
}

impl Drop for ThumbnailService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
