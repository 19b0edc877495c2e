//! In-memory collaborators for tests: an object store and a scripted
//! rendering engine.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use flume::{Receiver, Sender};

use crate::pdf::{CancelToken, EngineError, LoadedDocument, PageSize, Raster, RenderEngine};
use crate::store::{ObjectEntry, ObjectStore, StoreError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Calls observed by [`MemoryStore`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    List(String),
    Presign(String),
    Put(String),
}

#[derive(Clone, Debug)]
struct StoredObject {
    body: Vec<u8>,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

/// Object store backed by a map. Presigned URLs look like
/// `mem://<key>?expires=<ttl secs>`.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    calls: Mutex<Vec<StoreCall>>,
    fail_list: AtomicBool,
    fail_put: AtomicBool,
    fail_presign: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object last modified `modified_secs` after the epoch
    pub fn insert(&self, key: &str, body: Vec<u8>, modified_secs: i64) {
        let last_modified = DateTime::from_timestamp(modified_secs, 0).unwrap_or_default();
        lock(&self.objects).insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: None,
                last_modified,
            },
        );
    }

    pub fn body(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(key).map(|o| o.body.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        lock(&self.objects)
            .get(key)
            .and_then(|o| o.content_type.clone())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn fail_presign(&self, key: &str) {
        lock(&self.fail_presign).insert(key.to_string());
    }
}

impl ObjectStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        lock(&self.calls).push(StoreCall::List(prefix.to_string()));
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::request("list", "access denied"));
        }

        Ok(lock(&self.objects)
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectEntry {
                key: key.clone(),
                size: object.body.len() as u64,
                last_modified: object.last_modified,
            })
            .collect())
    }

    fn presign(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        lock(&self.calls).push(StoreCall::Presign(key.to_string()));
        if lock(&self.fail_presign).contains(key) {
            return Err(StoreError::request("presign", "signing failed"));
        }
        Ok(format!("mem://{key}?expires={}", ttl.as_secs()))
    }

    fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        lock(&self.calls).push(StoreCall::Put(key.to_string()));
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StoreError::request("put", "connection reset"));
        }
        lock(&self.objects).insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: Some(content_type.to_string()),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }
}

/// Script for a document served by [`FakeEngine`]
#[derive(Clone, Debug)]
pub struct FakeDocument {
    page_count: usize,
    page_size: PageSize,
    failing_pages: HashSet<usize>,
}

impl FakeDocument {
    /// Pages are 100x140 points unless changed
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            page_size: PageSize {
                width: 100.0,
                height: 140.0,
            },
            failing_pages: HashSet::new(),
        }
    }

    pub fn with_page_size(mut self, width: f32, height: f32) -> Self {
        self.page_size = PageSize { width, height };
        self
    }

    pub fn failing_page(mut self, page: usize) -> Self {
        self.failing_pages.insert(page);
        self
    }
}

/// A finished render: page and scale
pub type RenderLog = Arc<Mutex<Vec<(usize, f32)>>>;

/// Holds one render of a page until released
pub struct RenderGate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl RenderGate {
    /// Block until the held render has started
    pub fn wait_until_rendering(&self, timeout: Duration) -> bool {
        self.entered.recv_timeout(timeout).is_ok()
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

struct HeldRender {
    entered: Sender<()>,
    release: Receiver<()>,
}

#[derive(Default)]
struct FakeEngineState {
    documents: Mutex<HashMap<String, FakeDocument>>,
    open_failures: Mutex<HashMap<String, u32>>,
    open_calls: Mutex<HashMap<String, u32>>,
    held: Mutex<HashMap<usize, HeldRender>>,
    renders: RenderLog,
}

/// Rendering engine driven by a script. Clones share state, so a test can
/// keep a handle after giving the engine away.
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<FakeEngineState>,
}

/// URLs are matched without their query string
fn document_key(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&self, url: &str, document: FakeDocument) {
        lock(&self.state.documents).insert(document_key(url).to_string(), document);
    }

    /// Fail the next `times` opens of `url`
    pub fn fail_opens(&self, url: &str, times: u32) {
        lock(&self.state.open_failures).insert(document_key(url).to_string(), times);
    }

    pub fn open_calls(&self, url: &str) -> u32 {
        lock(&self.state.open_calls)
            .get(document_key(url))
            .copied()
            .unwrap_or(0)
    }

    /// Renders that ran to completion, in order
    pub fn render_log(&self) -> RenderLog {
        Arc::clone(&self.state.renders)
    }

    /// Make the next render of `page` wait for [`RenderGate::release`]
    pub fn hold_page(&self, page: usize) -> RenderGate {
        let (entered_tx, entered_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded();
        lock(&self.state.held).insert(
            page,
            HeldRender {
                entered: entered_tx,
                release: release_rx,
            },
        );
        RenderGate {
            entered: entered_rx,
            release: release_tx,
        }
    }
}

impl RenderEngine for FakeEngine {
    type Document = FakeLoadedDocument;

    fn open(&self, url: &str, _cancel: &CancelToken) -> Result<FakeLoadedDocument, EngineError> {
        let key = document_key(url).to_string();
        *lock(&self.state.open_calls).entry(key.clone()).or_insert(0) += 1;

        if let Some(remaining) = lock(&self.state.open_failures).get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(EngineError::Fetch("HTTP status 404".into()));
            }
        }

        let document = lock(&self.state.documents)
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::Fetch("HTTP status 404".into()))?;

        Ok(FakeLoadedDocument {
            document,
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeLoadedDocument {
    document: FakeDocument,
    state: Arc<FakeEngineState>,
}

impl LoadedDocument for FakeLoadedDocument {
    fn page_count(&self) -> usize {
        self.document.page_count
    }

    fn page_size(&self, page: usize) -> Result<PageSize, EngineError> {
        if page == 0 || page > self.document.page_count {
            return Err(EngineError::PageOutOfRange {
                page,
                page_count: self.document.page_count,
            });
        }
        Ok(self.document.page_size)
    }

    fn render_page(
        &self,
        page: usize,
        scale: f32,
        cancel: &CancelToken,
    ) -> Result<Raster, EngineError> {
        let size = self.page_size(page)?;

        let held = lock(&self.state.held).remove(&page);
        if let Some(held) = held {
            let _ = held.entered.send(());
            let _ = held.release.recv_timeout(Duration::from_secs(10));
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if self.document.failing_pages.contains(&page) {
            return Err(EngineError::Pdf(format!("cannot draw page {page}")));
        }

        lock(&self.state.renders).push((page, scale));

        let width = ((size.width * scale).round() as u32).max(1);
        let height = ((size.height * scale).round() as u32).max(1);
        Ok(Raster::filled(width, height, [page as u8, 0, 0]))
    }
}
