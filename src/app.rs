//! Top-level screen: document list, upload control and viewer side by side

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

use crate::Error;
use crate::bookmark::BookmarkStore;
use crate::document_list::DocumentList;
use crate::pdf::RenderEngine;
use crate::settings::Settings;
use crate::store::{ObjectStore, UploadReceipt};
use crate::thumbnail::ThumbnailService;
use crate::upload::{UploadControl, UploadFile};
use crate::viewer::Viewer;

pub struct App<E: RenderEngine> {
    store: Arc<dyn ObjectStore>,
    engine: Arc<E>,
    prefix: String,
    thumbnail_workers: usize,
    list: DocumentList,
    thumbnails: Option<ThumbnailService>,
    upload: UploadControl,
    viewer: Viewer,
    refresh_counter: u64,
}

impl<E: RenderEngine> App<E> {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        engine: Arc<E>,
        bookmarks: Box<dyn BookmarkStore>,
        settings: &Settings,
    ) -> Self {
        let viewer = Viewer::new(Arc::clone(&engine), bookmarks, &settings.viewer);
        let mut app = Self {
            store,
            engine,
            prefix: settings.store.prefix.clone(),
            thumbnail_workers: settings.thumbnail_workers,
            list: DocumentList::default(),
            thumbnails: None,
            upload: UploadControl::new(),
            viewer,
            refresh_counter: 0,
        };
        app.reload_list();
        app
    }

    #[must_use]
    pub fn list(&self) -> &DocumentList {
        &self.list
    }

    #[must_use]
    pub fn upload_control(&self) -> &UploadControl {
        &self.upload
    }

    pub fn upload_control_mut(&mut self) -> &mut UploadControl {
        &mut self.upload
    }

    #[must_use]
    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut Viewer {
        &mut self.viewer
    }

    /// Bumped after every successful upload
    #[must_use]
    pub fn refresh_counter(&self) -> u64 {
        self.refresh_counter
    }

    /// Re-create the list, abandoning thumbnails still in progress
    pub fn refresh(&mut self) {
        self.refresh_counter += 1;
        self.reload_list();
    }

    fn reload_list(&mut self) {
        self.thumbnails = None;
        self.list = DocumentList::load(self.store.as_ref(), &self.prefix);

        if !self.list.entries().is_empty() {
            let mut service = ThumbnailService::new(
                Arc::clone(&self.store),
                Arc::clone(&self.engine),
                self.thumbnail_workers,
            );
            self.list.request_thumbnails(&mut service);
            self.thumbnails = Some(service);
        }
    }

    /// Open a listed document in the viewer
    pub fn select(&mut self, key: &str) -> Result<(), Error> {
        let descriptor = self.list.select(self.store.as_ref(), key)?;
        self.viewer.select_document(descriptor);
        Ok(())
    }

    /// Choose and upload a file; on success the list is refreshed
    pub fn upload(&mut self, file: UploadFile) -> Result<UploadReceipt, Error> {
        self.upload.select_file(file)?;
        let receipt = self.upload.upload(self.store.as_ref())?;
        info!("Refreshing list after upload of {}", receipt.key);
        self.refresh();
        Ok(receipt)
    }

    /// Collect finished background work. Returns true if anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        if let Some(service) = &mut self.thumbnails {
            let results = service.poll();
            changed |= !results.is_empty();
            self.list.apply_thumbnails(results);
        }
        changed |= self.viewer.poll();
        changed |= self.viewer.tick(Instant::now());
        changed
    }

    /// Block until every requested thumbnail is in, or `timeout` passes
    pub fn wait_for_thumbnails(&mut self, timeout: Duration) {
        if let Some(service) = &mut self.thumbnails {
            let results = service.wait_all(timeout);
            self.list.apply_thumbnails(results);
        }
    }
}
