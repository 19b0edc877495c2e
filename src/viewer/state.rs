//! View state management

use super::zoom::{Zoom, fit_scale, should_adopt_fit};
use crate::Error;
use crate::pdf::{DocumentInfo, PageSize};

/// Where the viewer is in its load/render lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No document selected
    Idle,
    /// Fetching and parsing the selected document
    Loading,
    /// The current page is displayed
    Ready,
    /// A render of the current page is in flight
    RenderingPage,
    /// The document could not be loaded; only a new selection leaves this
    LoadError,
    /// The last render failed
    RenderError,
}

/// Navigation target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageTarget {
    /// Move by a number of pages, negative for backwards
    Delta(i64),
    /// 1-based page number
    Absolute(usize),
    First,
    Last,
}

/// State of the current viewing session
#[derive(Debug)]
pub struct ViewState {
    pub phase: Phase,

    /// Total page count, 0 until loaded
    pub page_count: usize,

    /// Current page (1-based), `None` until the document is loaded
    pub current_page: Option<usize>,

    /// Scale fitting the first page into the container
    pub fit_scale: Option<f32>,

    pub zoom: Zoom,

    /// Mirrors the platform's fullscreen state
    pub fullscreen: bool,

    /// Width in pixels of the area the page is drawn into
    pub container_width: f32,

    pub first_page: Option<PageSize>,

    pub last_error: Option<Error>,
}

impl ViewState {
    #[must_use]
    pub fn new(container_width: f32) -> Self {
        Self {
            phase: Phase::Idle,
            page_count: 0,
            current_page: None,
            fit_scale: None,
            zoom: Zoom::default(),
            fullscreen: false,
            container_width,
            first_page: None,
            last_error: None,
        }
    }

    /// Scale the current page is rendered at
    #[must_use]
    pub fn effective_scale(&self) -> f32 {
        self.zoom.effective_scale(self.fit_scale.unwrap_or(1.0))
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.phase == Phase::RenderingPage
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.current_page.is_some()
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::BeginLoad => {
                self.reset_session();
                self.phase = Phase::Loading;
                vec![]
            }

            Command::Loaded { info, bookmarked } => {
                self.page_count = info.page_count;
                self.first_page = Some(info.first_page);
                self.current_page = Some(match bookmarked {
                    Some(page) if (1..=info.page_count).contains(&page) => page,
                    _ => 1,
                });
                self.phase = Phase::Ready;
                self.last_error = None;
                self.refit();
                self.render()
            }

            Command::LoadFailed(error) => {
                self.phase = Phase::LoadError;
                self.last_error = Some(error);
                vec![]
            }

            Command::Resize(width) => {
                self.container_width = width;
                if self.is_loaded() && self.refit() {
                    self.render()
                } else {
                    vec![]
                }
            }

            Command::GoToPage(target) => {
                let Some(current) = self.current_page else {
                    return vec![];
                };
                let target = self.resolve(current, target);
                if target != current {
                    self.current_page = Some(target);
                    self.render()
                } else {
                    vec![]
                }
            }

            Command::SetZoom(percent) => self.zoom_changed(|zoom| zoom.set(percent)),
            Command::ZoomIn => self.zoom_changed(Zoom::step_in),
            Command::ZoomOut => self.zoom_changed(Zoom::step_out),

            Command::RenderFinished => {
                self.phase = Phase::Ready;
                self.last_error = None;
                vec![]
            }

            Command::RenderFailed(error) => {
                self.phase = Phase::RenderError;
                self.last_error = Some(error);
                vec![]
            }

            Command::RenderCancelled => {
                if self.phase == Phase::RenderingPage {
                    self.phase = Phase::Ready;
                }
                vec![]
            }

            Command::ToggleFullscreen => vec![Effect::RequestFullscreen(!self.fullscreen)],

            Command::FullscreenChanged(active) => {
                self.fullscreen = active;
                vec![]
            }

            Command::Close => {
                self.reset_session();
                vec![]
            }
        }
    }

    fn reset_session(&mut self) {
        self.phase = Phase::Idle;
        self.page_count = 0;
        self.current_page = None;
        self.fit_scale = None;
        self.zoom.reset();
        self.first_page = None;
        self.last_error = None;
    }

    fn render(&mut self) -> Vec<Effect> {
        self.phase = Phase::RenderingPage;
        vec![Effect::RenderCurrentPage]
    }

    fn zoom_changed(&mut self, change: impl FnOnce(&mut Zoom) -> bool) -> Vec<Effect> {
        if change(&mut self.zoom) && self.is_loaded() {
            self.render()
        } else {
            vec![]
        }
    }

    /// Recompute the fit for the current container. Returns true if adopted.
    fn refit(&mut self) -> bool {
        let Some(candidate) = self
            .first_page
            .and_then(|page| fit_scale(self.container_width, page.width))
        else {
            return false;
        };

        if should_adopt_fit(self.fit_scale, candidate) {
            log::debug!(
                "Fit scale {:?} -> {candidate:.3} for width {}",
                self.fit_scale,
                self.container_width
            );
            self.fit_scale = Some(candidate);
            self.zoom.reset();
            true
        } else {
            false
        }
    }

    fn resolve(&self, current: usize, target: PageTarget) -> usize {
        let last = self.page_count.max(1);
        match target {
            PageTarget::Delta(delta) => {
                let moved = if delta < 0 {
                    current.saturating_sub(delta.unsigned_abs() as usize)
                } else {
                    current.saturating_add(delta as usize)
                };
                moved.clamp(1, last)
            }
            PageTarget::Absolute(page) => page.clamp(1, last),
            PageTarget::First => 1,
            PageTarget::Last => last,
        }
    }
}

/// Commands that modify view state
#[derive(Debug)]
pub enum Command {
    /// A new document was selected
    BeginLoad,
    /// The engine opened the document
    Loaded {
        info: DocumentInfo,
        bookmarked: Option<usize>,
    },
    LoadFailed(Error),
    /// The container was resized (after debouncing)
    Resize(f32),
    GoToPage(PageTarget),
    SetZoom(u32),
    ZoomIn,
    ZoomOut,
    RenderFinished,
    RenderFailed(Error),
    RenderCancelled,
    ToggleFullscreen,
    /// The platform reported a fullscreen change
    FullscreenChanged(bool),
    Close,
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Render the current page at the effective scale
    RenderCurrentPage,
    /// Ask the platform to enter (true) or exit fullscreen
    RequestFullscreen(bool),
}
