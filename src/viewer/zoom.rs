//! Fit-to-width scale and zoom percentage
//!
//! The effective render scale is the fit scale (first page width fitted into
//! the container) multiplied by the user's zoom percentage.

/// Horizontal space reserved around the page inside the container
pub const CONTAINER_PADDING: f32 = 40.0;
/// Pages are never fitted wider than this, in pixels
pub const MAX_FIT_WIDTH: f32 = 800.0;
/// Slack so the page does not touch the container edges
pub const FIT_MARGIN: f32 = 0.98;
/// A recomputed fit smaller than this difference is ignored
pub const REFIT_THRESHOLD: f32 = 0.05;

/// Scale at which a page `page_width` points wide fits `container_width` pixels.
///
/// Returns `None` for degenerate page widths.
#[must_use]
pub fn fit_scale(container_width: f32, page_width: f32) -> Option<f32> {
    if !page_width.is_finite() || page_width <= 0.0 || !container_width.is_finite() {
        return None;
    }
    let available = (container_width - CONTAINER_PADDING).min(MAX_FIT_WIDTH).max(1.0);
    Some(available / page_width * FIT_MARGIN)
}

/// Whether a freshly computed fit should replace the current one
#[must_use]
pub fn should_adopt_fit(current: Option<f32>, candidate: f32) -> bool {
    match current {
        None => true,
        Some(current) => (candidate - current).abs() > REFIT_THRESHOLD,
    }
}

/// User zoom in whole percent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zoom {
    percent: u32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            percent: Self::DEFAULT_PERCENT,
        }
    }
}

impl Zoom {
    pub const DEFAULT_PERCENT: u32 = 100;
    pub const MIN_PERCENT: u32 = 50;
    pub const MAX_PERCENT: u32 = 200;
    pub const STEP: u32 = 10;

    #[must_use]
    pub fn percent(self) -> u32 {
        self.percent
    }

    /// Set the zoom, clamped to the allowed range. Returns true if it changed.
    pub fn set(&mut self, percent: u32) -> bool {
        let clamped = percent.clamp(Self::MIN_PERCENT, Self::MAX_PERCENT);
        let changed = clamped != self.percent;
        self.percent = clamped;
        changed
    }

    pub fn step_in(&mut self) -> bool {
        self.set(self.percent.saturating_add(Self::STEP))
    }

    pub fn step_out(&mut self) -> bool {
        self.set(self.percent.saturating_sub(Self::STEP))
    }

    pub fn reset(&mut self) {
        self.percent = Self::DEFAULT_PERCENT;
    }

    /// Render scale for this zoom applied on top of `fit`
    #[must_use]
    pub fn effective_scale(self, fit: f32) -> f32 {
        fit * (self.percent as f32 / 100.0)
    }
}
