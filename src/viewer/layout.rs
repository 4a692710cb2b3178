//! Page layout from viewport size
//!
//! Chooses between mobile, single-page and two-page spreads by viewport width
//! and sizes pages to a fixed paper aspect ratio.

use super::types::SpreadMode;

/// Height / width of a page (ISO 216 paper)
pub const PAGE_ASPECT_RATIO: f32 = 1.414;
/// Viewports narrower than this use the mobile layout
pub const MOBILE_BREAKPOINT: f32 = 768.0;
/// Viewports at least this wide may show two pages
pub const TWO_PAGE_BREAKPOINT: f32 = 1024.0;
/// Share of the viewport height a mobile page may fill
pub const MOBILE_HEIGHT_FILL: f32 = 0.9;
pub const DEFAULT_PAGE_PADDING: f32 = 24.0;

/// Computed page dimensions.
///
/// Always produced whole by [`LayoutCalculator::recompute`]; width and height
/// come from the same breakpoint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutSpec {
    /// Logical page width
    pub page_width: f32,
    /// Logical page height
    pub page_height: f32,
    /// Width in device pixels to render at
    pub render_width: u32,
    /// Height in device pixels to render at
    pub render_height: u32,
    pub spread_mode: SpreadMode,
}

impl LayoutSpec {
    /// Combined logical width of the whole spread including gaps
    #[must_use]
    pub fn spread_width(&self, padding: f32) -> f32 {
        match self.spread_mode {
            SpreadMode::Single => self.page_width,
            SpreadMode::TwoPage => self.page_width * 2.0 + padding,
        }
    }
}

/// Zoom factor applied on top of the fitted layout
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zoom {
    factor: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl Zoom {
    pub const MIN_SCALE: f32 = 0.25;
    pub const MAX_SCALE: f32 = 4.0;
    /// Zoom step multiplier - 10%
    pub const STEP_RATE: f32 = 1.1;

    #[must_use]
    pub fn new(factor: f32) -> Self {
        Self {
            factor: Self::clamp_factor(factor),
        }
    }

    #[must_use]
    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn step_in(&mut self) {
        self.factor = Self::clamp_factor(self.factor * Self::STEP_RATE);
    }

    pub fn step_out(&mut self) {
        self.factor = Self::clamp_factor(self.factor / Self::STEP_RATE);
    }

    /// Clamp factor to valid range, handling NaN/Inf
    #[must_use]
    pub fn clamp_factor(factor: f32) -> f32 {
        if !factor.is_finite() {
            1.0
        } else {
            factor.clamp(Self::MIN_SCALE, Self::MAX_SCALE)
        }
    }
}

/// Derives page dimensions from viewport size and breakpoints
#[derive(Clone, Debug)]
pub struct LayoutCalculator {
    padding: f32,
    device_pixel_ratio: f32,
    zoom: Zoom,
}

impl Default for LayoutCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_PADDING, 1.0)
    }
}

impl LayoutCalculator {
    #[must_use]
    pub fn new(padding: f32, device_pixel_ratio: f32) -> Self {
        Self {
            padding: if padding.is_finite() { padding.max(0.0) } else { 0.0 },
            device_pixel_ratio: if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
                device_pixel_ratio
            } else {
                1.0
            },
            zoom: Zoom::default(),
        }
    }

    #[must_use]
    pub fn padding(&self) -> f32 {
        self.padding
    }

    #[must_use]
    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: Zoom) {
        self.zoom = zoom;
    }

    /// Fit pages into the viewport.
    ///
    /// `requested` is the preferred spread; two pages are only laid out when
    /// the viewport is wide enough.
    #[must_use]
    pub fn recompute(
        &self,
        viewport_width: f32,
        viewport_height: f32,
        requested: SpreadMode,
    ) -> LayoutSpec {
        let vw = viewport_width.max(0.0);
        let vh = viewport_height.max(0.0);
        let pad = self.padding;

        let (spread_mode, max_width, max_height) = if vw < MOBILE_BREAKPOINT {
            (SpreadMode::Single, vw - pad, vh * MOBILE_HEIGHT_FILL)
        } else if vw >= TWO_PAGE_BREAKPOINT && requested == SpreadMode::TwoPage {
            (SpreadMode::TwoPage, (vw - 3.0 * pad) / 2.0, vh - 2.0 * pad)
        } else {
            (SpreadMode::Single, vw - 2.0 * pad, vh - 2.0 * pad)
        };

        let (page_width, page_height) = fit_to_aspect(max_width.max(0.0), max_height.max(0.0));
        let scale = self.device_pixel_ratio * self.zoom.factor();

        LayoutSpec {
            page_width,
            page_height,
            render_width: (page_width * scale).round() as u32,
            render_height: (page_height * scale).round() as u32,
            spread_mode,
        }
    }
}

/// Largest page of [`PAGE_ASPECT_RATIO`] within the box.
///
/// Width drives the size unless the box is too short for it, in which case
/// the height does.
fn fit_to_aspect(max_width: f32, max_height: f32) -> (f32, f32) {
    let height = max_width * PAGE_ASPECT_RATIO;
    if height <= max_height {
        (max_width, height)
    } else {
        (max_height / PAGE_ASPECT_RATIO, max_height)
    }
}
