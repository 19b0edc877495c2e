//! Document viewer - load, fit, render and navigate one document at a time
//!
//! The [`Viewer`] lives on the host thread and owns all view state. Engine
//! work happens on a dedicated worker thread; results come back through
//! [`Viewer::poll`]. Every selection starts a new session and every render
//! gets its own request id and cancel token, so a result that arrives after
//! it was superseded is dropped instead of overwriting newer state.

mod state;
mod zoom;

use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use log::{debug, error, info, warn};

pub use state::{Command, Effect, PageTarget, Phase, ViewState};
pub use zoom::{Zoom, fit_scale, should_adopt_fit};

use crate::Error;
use crate::bookmark::BookmarkStore;
use crate::document_list::DocumentDescriptor;
use crate::notification::NotificationManager;
use crate::pdf::{
    CancelToken, EngineRequest, EngineResponse, Raster, RenderEngine, RequestId, SessionId,
    engine_worker,
};
use crate::settings::ViewerSettings;

/// Quiet period before a container resize is acted on
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(200);

/// Requests for the platform that hosts the viewer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformRequest {
    EnterFullscreen,
    ExitFullscreen,
}

/// Keys the viewer reacts to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerKey {
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
}

/// The page currently on screen
#[derive(Clone, Debug)]
pub struct DisplayedPage {
    pub page: usize,
    pub scale: f32,
    pub raster: Arc<Raster>,
}

#[derive(Debug)]
struct PendingRender {
    id: RequestId,
    page: usize,
    cancel: CancelToken,
}

/// Single-document viewer
pub struct Viewer {
    state: ViewState,
    document: Option<DocumentDescriptor>,
    session: SessionId,
    session_cancel: CancelToken,
    render: Option<PendingRender>,
    next_request_id: u64,
    displayed: Option<DisplayedPage>,
    pending_resize: Option<(f32, Instant)>,
    bookmarks: Box<dyn BookmarkStore>,
    notifications: NotificationManager,
    platform_requests: Vec<PlatformRequest>,
    request_tx: Sender<EngineRequest>,
    response_rx: Receiver<EngineResponse>,
}

impl Viewer {
    /// Create a viewer and start its engine worker
    pub fn new<E: RenderEngine>(
        engine: Arc<E>,
        bookmarks: Box<dyn BookmarkStore>,
        settings: &ViewerSettings,
    ) -> Self {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let retry = settings.retry_policy();

        std::thread::spawn(move || engine_worker(engine, retry, request_rx, response_tx));

        Self {
            state: ViewState::new(settings.container_width),
            document: None,
            session: SessionId::default(),
            session_cancel: CancelToken::new(),
            render: None,
            next_request_id: 1,
            displayed: None,
            pending_resize: None,
            bookmarks,
            notifications: NotificationManager::new(),
            platform_requests: Vec::new(),
            request_tx,
            response_rx,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    #[must_use]
    pub fn document(&self) -> Option<&DocumentDescriptor> {
        self.document.as_ref()
    }

    /// Display title of the open document
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.document.as_ref().map(DocumentDescriptor::title)
    }

    #[must_use]
    pub fn current_page(&self) -> Option<usize> {
        self.state.current_page
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.state.page_count
    }

    #[must_use]
    pub fn displayed_page(&self) -> Option<&DisplayedPage> {
        self.displayed.as_ref()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&Error> {
        self.state.last_error.as_ref()
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    /// Replace the active document, abandoning everything from the previous one
    pub fn select_document(&mut self, descriptor: DocumentDescriptor) {
        self.abandon_session();
        info!("Opening {} (session {})", descriptor.key, self.session.0);

        self.apply_command(Command::BeginLoad);
        let _ = self.request_tx.send(EngineRequest::Open {
            session: self.session,
            url: descriptor.url.clone(),
            cancel: self.session_cancel.clone(),
        });
        self.document = Some(descriptor);
    }

    /// Drop the active document and return to idle
    pub fn close(&mut self) {
        if self.document.is_none() {
            return;
        }
        self.abandon_session();
        self.apply_command(Command::Close);
    }

    fn abandon_session(&mut self) {
        self.session_cancel.cancel();
        if let Some(render) = self.render.take() {
            render.cancel.cancel();
        }
        let _ = self.request_tx.send(EngineRequest::Release(self.session));

        self.session = self.session.next();
        self.session_cancel = CancelToken::new();
        self.document = None;
        self.displayed = None;
    }

    pub fn go_to_page(&mut self, target: PageTarget) {
        self.apply_command(Command::GoToPage(target));
    }

    pub fn next_page(&mut self) {
        self.go_to_page(PageTarget::Delta(1));
    }

    pub fn prev_page(&mut self) {
        self.go_to_page(PageTarget::Delta(-1));
    }

    /// Handle a navigation key. Returns true if the page changed.
    pub fn handle_key(&mut self, key: ViewerKey) -> bool {
        let target = match key {
            ViewerKey::Left | ViewerKey::PageUp => PageTarget::Delta(-1),
            ViewerKey::Right | ViewerKey::PageDown => PageTarget::Delta(1),
            ViewerKey::Home => PageTarget::First,
            ViewerKey::End => PageTarget::Last,
        };
        let before = self.state.current_page;
        self.go_to_page(target);
        self.state.current_page != before
    }

    pub fn set_zoom(&mut self, percent: u32) {
        self.apply_command(Command::SetZoom(percent));
    }

    pub fn zoom_in(&mut self) {
        self.apply_command(Command::ZoomIn);
    }

    pub fn zoom_out(&mut self) {
        self.apply_command(Command::ZoomOut);
    }

    /// Record a new container width. Acted on by [`Viewer::tick`] once the
    /// width has been stable for [`RESIZE_DEBOUNCE`].
    pub fn resize(&mut self, container_width: f32) {
        self.pending_resize = Some((container_width, Instant::now()));
    }

    /// Drive time-based work: debounced resize and notification expiry.
    /// Returns true if anything visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.notifications.update();

        if let Some((width, at)) = self.pending_resize {
            if now.saturating_duration_since(at) >= RESIZE_DEBOUNCE {
                self.pending_resize = None;
                debug!("Container resized to {width}");
                self.apply_command(Command::Resize(width));
                changed = true;
            }
        }

        changed
    }

    /// Save the current page for the open document.
    ///
    /// Returns the saved page, or `None` when no document is loaded.
    pub fn save_bookmark(&mut self) -> Result<Option<usize>, Error> {
        let (Some(document), Some(page)) = (&self.document, self.state.current_page) else {
            return Ok(None);
        };

        match self.bookmarks.save_page(&document.key, page) {
            Ok(()) => {
                info!("Bookmarked {} at page {page}", document.key);
                self.notifications
                    .success(format!("Bookmark saved at page {page}"));
                Ok(Some(page))
            }
            Err(e) => {
                let err = Error::from(e);
                error!("Failed to save bookmark for {}: {err}", document.key);
                self.notifications.error(err.user_message());
                Err(err)
            }
        }
    }

    /// Ask the platform to enter or leave fullscreen.
    ///
    /// The flag itself only changes through [`Viewer::fullscreen_changed`].
    pub fn toggle_fullscreen(&mut self) {
        self.apply_command(Command::ToggleFullscreen);
    }

    pub fn fullscreen_changed(&mut self, active: bool) {
        self.apply_command(Command::FullscreenChanged(active));
    }

    #[must_use]
    pub fn is_fullscreen(&self) -> bool {
        self.state.fullscreen
    }

    /// Requests for the platform queued since the last call
    pub fn take_platform_requests(&mut self) -> Vec<PlatformRequest> {
        std::mem::take(&mut self.platform_requests)
    }

    /// Apply a command to the view state
    pub fn apply_command(&mut self, cmd: Command) {
        let effects = self.state.apply(cmd);
        self.execute_effects(effects);
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::RenderCurrentPage => self.request_render(),
                Effect::RequestFullscreen(enter) => {
                    self.platform_requests.push(if enter {
                        PlatformRequest::EnterFullscreen
                    } else {
                        PlatformRequest::ExitFullscreen
                    });
                }
            }
        }
    }

    /// Render the current page, superseding any render still in flight
    fn request_render(&mut self) {
        let Some(page) = self.state.current_page else {
            return;
        };
        if let Some(previous) = self.render.take() {
            debug!("Superseding render of page {}", previous.page);
            previous.cancel.cancel();
        }

        let id = self.next_id();
        let cancel = CancelToken::new();
        let scale = self.state.effective_scale();
        let _ = self.request_tx.send(EngineRequest::Render {
            id,
            session: self.session,
            page,
            scale,
            cancel: cancel.clone(),
        });
        self.render = Some(PendingRender { id, page, cancel });
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }

    /// Handle completed engine work without blocking. Returns true if the
    /// view changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(response) = self.response_rx.try_recv() {
            changed |= self.handle_response(response);
        }
        changed
    }

    /// Block until one engine response arrives (or `timeout` passes), then
    /// drain whatever else is ready.
    pub fn wait_for_response(&mut self, timeout: Duration) -> bool {
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => {
                let changed = self.handle_response(response);
                self.poll() || changed
            }
            Err(_) => false,
        }
    }

    /// Process responses and pending resizes until nothing is in flight or
    /// `timeout` passes. Returns true if the viewer settled.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            self.tick(Instant::now());
            if !self.is_busy() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.wait_for_response(remaining.min(RESIZE_DEBOUNCE / 4));
        }
    }

    fn is_busy(&self) -> bool {
        self.state.is_loading() || self.render.is_some() || self.pending_resize.is_some()
    }

    fn handle_response(&mut self, response: EngineResponse) -> bool {
        match response {
            EngineResponse::Opened {
                session,
                info,
                attempts,
            } => {
                if session != self.session {
                    debug!("Dropping document of stale session {}", session.0);
                    return false;
                }
                info!(
                    "Loaded {} pages after {attempts} attempt(s)",
                    info.page_count
                );
                let bookmarked = self.read_bookmark();
                self.apply_command(Command::Loaded { info, bookmarked });
                true
            }

            EngineResponse::OpenFailed {
                session,
                attempts,
                error,
            } => {
                if session != self.session {
                    return false;
                }
                let err = Error::Load {
                    attempts,
                    source: error,
                };
                error!("{err}");
                self.apply_command(Command::LoadFailed(err));
                true
            }

            EngineResponse::OpenCancelled(session) => {
                debug!("Load of session {} cancelled", session.0);
                false
            }

            EngineResponse::Rendered {
                id,
                session,
                page,
                scale,
                raster,
            } => {
                if session != self.session || !self.is_current_render(id) {
                    debug!("Dropping stale render of page {page}");
                    return false;
                }
                self.render = None;
                self.displayed = Some(DisplayedPage {
                    page,
                    scale,
                    raster,
                });
                self.apply_command(Command::RenderFinished);
                true
            }

            EngineResponse::RenderFailed { id, page, error } => {
                if !self.is_current_render(id) {
                    return false;
                }
                self.render = None;
                let err = Error::Render {
                    page,
                    source: error,
                };
                error!("{err}");
                self.apply_command(Command::RenderFailed(err));
                true
            }

            EngineResponse::RenderCancelled(id) => {
                if !self.is_current_render(id) {
                    return false;
                }
                self.render = None;
                self.apply_command(Command::RenderCancelled);
                true
            }
        }
    }

    fn is_current_render(&self, id: RequestId) -> bool {
        self.render.as_ref().is_some_and(|render| render.id == id)
    }

    fn read_bookmark(&self) -> Option<usize> {
        let document = self.document.as_ref()?;
        match self.bookmarks.page_for(&document.key) {
            Ok(page) => page,
            Err(e) => {
                warn!("Could not read bookmark for {}: {e}", document.key);
                None
            }
        }
    }

    fn shutdown(&self) {
        self.session_cancel.cancel();
        if let Some(render) = &self.render {
            render.cancel.cancel();
        }
        let _ = self.request_tx.send(EngineRequest::Shutdown);
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmark::{BookmarkError, Bookmarks};
    use crate::test_utils::{FakeDocument, FakeEngine};
    use chrono::Utc;

    const WAIT: Duration = Duration::from_secs(5);

    fn settings() -> ViewerSettings {
        ViewerSettings {
            container_width: 1000.0,
            load_attempts: 3,
            load_retry_delay_ms: 1,
        }
    }

    fn descriptor(key: &str) -> DocumentDescriptor {
        DocumentDescriptor {
            key: key.to_string(),
            url: format!("mem://{key}?expires=3600"),
            size: 1024,
            last_modified: Utc::now(),
        }
    }

    fn viewer_with(engine: &FakeEngine, bookmarks: Bookmarks) -> Viewer {
        Viewer::new(Arc::new(engine.clone()), Box::new(bookmarks), &settings())
    }

    struct BrokenBookmarks;

    impl BookmarkStore for BrokenBookmarks {
        fn page_for(&self, _: &str) -> Result<Option<usize>, BookmarkError> {
            Err(BookmarkError::Io(std::io::Error::other("disk gone")))
        }

        fn save_page(&mut self, _: &str, _: usize) -> Result<(), BookmarkError> {
            Err(BookmarkError::Io(std::io::Error::other("disk gone")))
        }
    }

    #[test]
    fn load_renders_first_page() {
        let engine = FakeEngine::new();
        engine.add_document("mem://a.pdf", FakeDocument::new(3));
        let mut viewer = viewer_with(&engine, Bookmarks::ephemeral());

        viewer.select_document(descriptor("a.pdf"));
        assert_eq!(viewer.phase(), Phase::Loading);
        assert!(viewer.settle(WAIT));

        assert_eq!(viewer.phase(), Phase::Ready);
        assert_eq!(viewer.page_count(), 3);
        assert_eq!(viewer.current_page(), Some(1));
        let shown = viewer.displayed_page().unwrap();
        assert_eq!(shown.page, 1);
        assert_eq!(shown.scale, viewer.state().effective_scale());
        assert_eq!(viewer.title().as_deref(), Some("a"));
    }

    #[test]
    fn exhausted_retries_surface_load_error() {
        let engine = FakeEngine::new();
        let mut viewer = viewer_with(&engine, Bookmarks::ephemeral());

        viewer.select_document(descriptor("missing.pdf"));
        assert!(viewer.settle(WAIT));

        assert_eq!(viewer.phase(), Phase::LoadError);
        assert_eq!(engine.open_calls("mem://missing.pdf"), 3);
        assert!(matches!(
            viewer.last_error(),
            Some(Error::Load { attempts: 3, .. })
        ));

        viewer.next_page();
        assert_eq!(viewer.phase(), Phase::LoadError);
    }

    #[test]
    fn bookmark_read_failure_starts_on_page_one() {
        let engine = FakeEngine::new();
        engine.add_document("mem://a.pdf", FakeDocument::new(3));
        let mut viewer = Viewer::new(
            Arc::new(engine.clone()),
            Box::new(BrokenBookmarks),
            &settings(),
        );

        viewer.select_document(descriptor("a.pdf"));
        assert!(viewer.settle(WAIT));
        assert_eq!(viewer.current_page(), Some(1));

        assert!(viewer.save_bookmark().is_err());
        assert_eq!(
            viewer.notifications().current().unwrap().message,
            "Failed to save bookmark"
        );
    }

    #[test]
    fn save_bookmark_notifies() {
        let engine = FakeEngine::new();
        engine.add_document("mem://a.pdf", FakeDocument::new(5));
        let mut viewer = viewer_with(&engine, Bookmarks::ephemeral());

        assert_eq!(viewer.save_bookmark().unwrap(), None);

        viewer.select_document(descriptor("a.pdf"));
        assert!(viewer.settle(WAIT));
        viewer.go_to_page(PageTarget::Absolute(4));
        assert!(viewer.settle(WAIT));

        assert_eq!(viewer.save_bookmark().unwrap(), Some(4));
        assert_eq!(
            viewer.notifications().current().unwrap().message,
            "Bookmark saved at page 4"
        );
    }

    #[test]
    fn keys_navigate() {
        let engine = FakeEngine::new();
        engine.add_document("mem://a.pdf", FakeDocument::new(4));
        let mut viewer = viewer_with(&engine, Bookmarks::ephemeral());
        viewer.select_document(descriptor("a.pdf"));
        assert!(viewer.settle(WAIT));

        viewer.handle_key(ViewerKey::End);
        assert_eq!(viewer.current_page(), Some(4));
        viewer.handle_key(ViewerKey::PageUp);
        assert_eq!(viewer.current_page(), Some(3));
        viewer.handle_key(ViewerKey::Home);
        viewer.handle_key(ViewerKey::Left);
        assert_eq!(viewer.current_page(), Some(1));
        viewer.handle_key(ViewerKey::Right);
        assert!(viewer.settle(WAIT));
        assert_eq!(viewer.displayed_page().unwrap().page, 2);
    }

    #[test]
    fn resize_is_debounced() {
        let engine = FakeEngine::new();
        engine.add_document("mem://a.pdf", FakeDocument::new(2).with_page_size(600.0, 800.0));
        let mut viewer = viewer_with(&engine, Bookmarks::ephemeral());
        viewer.select_document(descriptor("a.pdf"));
        assert!(viewer.settle(WAIT));
        let fit = viewer.state().fit_scale.unwrap();

        viewer.resize(500.0);
        assert!(!viewer.tick(Instant::now()));
        assert_eq!(viewer.state().fit_scale, Some(fit));

        assert!(viewer.tick(Instant::now() + RESIZE_DEBOUNCE));
        let refit = viewer.state().fit_scale.unwrap();
        assert!((refit - 460.0 / 600.0 * 0.98).abs() < 1e-6);
        assert!(viewer.settle(WAIT));
        assert_eq!(viewer.displayed_page().unwrap().scale, refit);
    }

    #[test]
    fn fullscreen_waits_for_platform() {
        let engine = FakeEngine::new();
        let mut viewer = viewer_with(&engine, Bookmarks::ephemeral());

        viewer.toggle_fullscreen();
        assert_eq!(
            viewer.take_platform_requests(),
            vec![PlatformRequest::EnterFullscreen]
        );
        assert!(!viewer.is_fullscreen());
        assert!(viewer.take_platform_requests().is_empty());

        viewer.fullscreen_changed(true);
        viewer.toggle_fullscreen();
        assert_eq!(
            viewer.take_platform_requests(),
            vec![PlatformRequest::ExitFullscreen]
        );
    }

    #[test]
    fn close_returns_to_idle() {
        let engine = FakeEngine::new();
        engine.add_document("mem://a.pdf", FakeDocument::new(2));
        let mut viewer = viewer_with(&engine, Bookmarks::ephemeral());
        viewer.select_document(descriptor("a.pdf"));
        assert!(viewer.settle(WAIT));

        viewer.close();
        assert_eq!(viewer.phase(), Phase::Idle);
        assert!(viewer.document().is_none());
        assert!(viewer.displayed_page().is_none());
        assert_eq!(viewer.current_page(), None);
    }

    #[test]
    fn render_failure_is_not_retried() {
        let engine = FakeEngine::new();
        engine.add_document("mem://a.pdf", FakeDocument::new(3).failing_page(2));
        let renders = engine.render_log();
        let mut viewer = viewer_with(&engine, Bookmarks::ephemeral());
        viewer.select_document(descriptor("a.pdf"));
        assert!(viewer.settle(WAIT));

        viewer.next_page();
        assert!(viewer.settle(WAIT));
        assert_eq!(viewer.phase(), Phase::RenderError);
        assert_eq!(
            viewer.last_error().unwrap().user_message(),
            "Failed to render page. Please try again."
        );
        assert_eq!(renders.lock().unwrap().len(), 1);

        viewer.next_page();
        assert!(viewer.settle(WAIT));
        assert_eq!(viewer.phase(), Phase::Ready);
        assert_eq!(viewer.displayed_page().unwrap().page, 3);
    }
}
