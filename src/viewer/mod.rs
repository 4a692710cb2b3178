//! Paginated document viewer core
//!
//! Page cache, prefetch scheduling, layout and navigation for a viewer that
//! shows one or two pages at a time. [`Viewer`] is the entry point for UI
//! code; everything it needs from the outside world comes through a
//! [`PageSource`] and a [`Storage`].

mod cache;
mod layout;
mod navigation;
mod request;
mod scheduler;
mod session;
mod source;
mod types;
mod worker;

use std::sync::Arc;
use std::time::{Duration, Instant};

pub use cache::PageCache;
pub use layout::{
    DEFAULT_PAGE_PADDING, LayoutCalculator, LayoutSpec, MOBILE_BREAKPOINT, PAGE_ASPECT_RATIO,
    TWO_PAGE_BREAKPOINT, Zoom,
};
pub use navigation::{
    Command, DEFAULT_COMMIT_DELAY, DEFAULT_SETTLE_DELAY, Effect, NavState, Navigator, Phase,
};
pub use request::{FetchKind, FetchRequest, FetchResponse, RequestId};
pub use scheduler::{FetchStats, FetchTicket, LoadingProgress, PrefetchScheduler, prefetch_targets};
pub use session::{DocumentSession, SessionConfig};
pub use source::{PageSource, SourceError};
pub use types::{Direction, PageContent, SpreadMode, spread_pages};

use crate::clock::Clock;
use crate::debounce::Debouncer;
use crate::positions::{PositionStore, Storage};

/// Pages kept decoded per document
pub const DEFAULT_CACHE_SIZE: usize = 10;
/// Spreads warmed ahead of the reader
pub const DEFAULT_LOOKAHEAD: usize = 2;
pub const DEFAULT_WORKERS: usize = 2;
/// Window in which viewport resizes are coalesced
pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(150);

/// Snapshot of what the UI needs to draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewerState {
    pub current_page: usize,
    pub total_pages: Option<usize>,
    pub nav_state: NavState,
    pub loading_progress: u8,
}

/// Viewer configuration
#[derive(Clone, Debug)]
pub struct ViewerOptions {
    pub session: SessionConfig,
    pub resize_debounce: Duration,
    pub page_padding: f32,
    pub device_pixel_ratio: f32,
    /// Preferred spread; two pages only appear when the viewport allows it
    pub spread: SpreadMode,
    pub initial_viewport: (f32, f32),
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
            page_padding: DEFAULT_PAGE_PADDING,
            device_pixel_ratio: 1.0,
            spread: SpreadMode::TwoPage,
            initial_viewport: (1280.0, 800.0),
        }
    }
}

/// Document viewer with at most one open document.
///
/// Single-threaded: every method runs on the caller's thread. Page fetches
/// happen on worker threads and are picked up by [`tick`](Self::tick).
pub struct Viewer<S: Storage> {
    options: ViewerOptions,
    positions: PositionStore<S>,
    clock: Arc<dyn Clock>,
    session: Option<DocumentSession>,
    bookmarks: Vec<usize>,
    layout_calc: LayoutCalculator,
    layout: LayoutSpec,
    viewport: (f32, f32),
    resize: Debouncer<(f32, f32)>,
}

impl<S: Storage> Viewer<S> {
    #[must_use]
    pub fn new(options: ViewerOptions, storage: S, clock: Arc<dyn Clock>) -> Self {
        let layout_calc = LayoutCalculator::new(options.page_padding, options.device_pixel_ratio);
        let viewport = options.initial_viewport;
        let layout = layout_calc.recompute(viewport.0, viewport.1, options.spread);

        Self {
            resize: Debouncer::new(options.resize_debounce),
            options,
            positions: PositionStore::new(storage),
            clock,
            session: None,
            bookmarks: Vec::new(),
            layout_calc,
            layout,
            viewport,
        }
    }

    /// Open a document, replacing (and dropping) any open one.
    ///
    /// Resumes at the last saved page for `document_key`.
    pub fn open(&mut self, document_key: &str, source: Arc<dyn PageSource>) -> &DocumentSession {
        // Drop first so the old workers shut down before new ones start
        self.session = None;

        let start_page = self.positions.load(document_key);
        self.bookmarks = self.positions.load_bookmarks(document_key);

        self.session.insert(DocumentSession::open(
            document_key,
            source,
            start_page,
            self.layout.spread_mode.step(),
            &self.options.session,
            Arc::clone(&self.clock),
        ))
    }

    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("Closed {}", session.document_key());
        }
        self.bookmarks.clear();
    }

    #[must_use]
    pub fn session(&self) -> Option<&DocumentSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn positions(&self) -> &PositionStore<S> {
        &self.positions
    }

    #[must_use]
    pub fn state(&self) -> Option<ViewerState> {
        self.session.as_ref().map(|session| ViewerState {
            current_page: session.current_page(),
            total_pages: session.total_pages(),
            nav_state: session.nav_state(),
            loading_progress: session.loading_progress(),
        })
    }

    /// Start a forward page turn. Returns false if it was rejected.
    pub fn request_next(&mut self) -> bool {
        self.command(Command::RequestNext)
    }

    /// Start a backward page turn. Returns false if it was rejected.
    pub fn request_prev(&mut self) -> bool {
        self.command(Command::RequestPrev)
    }

    /// Jump to a page without animation. Returns false if it was rejected.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        self.command(Command::GoToPage(page))
    }

    fn command(&mut self, cmd: Command) -> bool {
        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        let before = session.nav_state();
        let effects = session.apply(cmd, now);
        let accepted = !effects.is_empty() || session.nav_state() != before;
        self.handle_effects(effects);
        accepted
    }

    /// Advance timers and pick up finished fetches.
    ///
    /// Call this from the UI loop; nothing moves between calls.
    pub fn tick(&mut self) {
        let now = self.clock.now();

        if let Some((width, height)) = self.resize.poll(now) {
            self.apply_viewport(width, height, now);
        }

        let effects = match self.session.as_mut() {
            Some(session) => session.tick(now),
            None => return,
        };
        self.handle_effects(effects);
    }

    /// Block until the open document has no fetch in flight
    pub fn wait_until_settled(&mut self, timeout: Duration) -> bool {
        match self.session.as_mut() {
            Some(session) => session.wait_until_settled(timeout),
            None => true,
        }
    }

    /// Earliest time at which [`tick`](Self::tick) has timed work to do
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let nav = self.session.as_ref().and_then(DocumentSession::next_deadline);
        match (nav, self.resize.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn handle_effects(&mut self, effects: Vec<Effect>) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        for effect in effects {
            if let Effect::SavePosition(page) = effect {
                self.positions.save(session.document_key(), page);
            }
        }
    }

    /// Viewport changed; the layout follows once resizing calms down
    pub fn on_resize(&mut self, viewport_width: f32, viewport_height: f32) {
        let now = self.clock.now();
        self.resize.call((viewport_width, viewport_height), now);
    }

    #[must_use]
    pub fn layout(&self) -> LayoutSpec {
        self.layout
    }

    #[must_use]
    pub fn spread_preference(&self) -> SpreadMode {
        self.options.spread
    }

    /// Change the preferred spread and relayout right away
    pub fn set_spread_preference(&mut self, spread: SpreadMode) {
        self.options.spread = spread;
        let (width, height) = self.viewport;
        self.apply_viewport(width, height, self.clock.now());
    }

    #[must_use]
    pub fn zoom(&self) -> Zoom {
        self.layout_calc.zoom()
    }

    pub fn set_zoom(&mut self, factor: f32) {
        self.layout_calc.set_zoom(Zoom::new(factor));
        let (width, height) = self.viewport;
        self.apply_viewport(width, height, self.clock.now());
    }

    fn apply_viewport(&mut self, width: f32, height: f32, now: Instant) {
        self.viewport = (width, height);
        let layout = self.layout_calc.recompute(width, height, self.options.spread);
        if layout.spread_mode != self.layout.spread_mode {
            log::debug!(
                "Spread mode {} -> {} at {width}x{height}",
                self.layout.spread_mode.as_str(),
                layout.spread_mode.as_str()
            );
        }
        self.layout = layout;

        if let Some(session) = self.session.as_mut() {
            let effects = session.apply(Command::SetSpreadStep(layout.spread_mode.step()), now);
            self.handle_effects(effects);
        }
    }

    /// Bookmark or un-bookmark the current page. Returns whether it is now
    /// bookmarked.
    pub fn toggle_bookmark(&mut self) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        let page = session.current_page();

        let bookmarked = match self.bookmarks.binary_search(&page) {
            Ok(index) => {
                self.bookmarks.remove(index);
                false
            }
            Err(index) => {
                self.bookmarks.insert(index, page);
                true
            }
        };
        self.positions
            .save_bookmarks(session.document_key(), &self.bookmarks);
        bookmarked
    }

    #[must_use]
    pub fn bookmarks(&self) -> Vec<usize> {
        self.bookmarks.clone()
    }

    /// Pages of the spread on screen
    #[must_use]
    pub fn visible_pages(&self) -> Vec<usize> {
        self.session
            .as_ref()
            .map(DocumentSession::visible_pages)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn page(&self, page: usize) -> Option<Arc<PageContent>> {
        self.session.as_ref().and_then(|session| session.page(page))
    }

    #[must_use]
    pub fn is_page_ready(&self, page: usize) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.is_page_ready(page))
    }

    /// Ask for the page count again after the document failed to load
    pub fn retry_document_info(&mut self) -> bool {
        self.session
            .as_mut()
            .is_some_and(DocumentSession::retry_document_info)
    }
}
