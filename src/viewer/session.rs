//! Document session - one open document with its cache, scheduler and
//! navigation state

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::cache::PageCache;
use super::navigation::{Command, Effect, NavState, Navigator};
use super::request::FetchResponse;
use super::scheduler::{FetchStats, PrefetchScheduler};
use super::source::PageSource;
use super::types::{Direction, PageContent, spread_pages};
use crate::clock::Clock;

use super::{
    DEFAULT_CACHE_SIZE, DEFAULT_COMMIT_DELAY, DEFAULT_LOOKAHEAD, DEFAULT_SETTLE_DELAY,
    DEFAULT_WORKERS,
};

/// Tunables for a session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub cache_capacity: usize,
    pub lookahead: usize,
    pub workers: usize,
    pub commit_delay: Duration,
    pub settle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_SIZE,
            lookahead: DEFAULT_LOOKAHEAD,
            workers: DEFAULT_WORKERS,
            commit_delay: DEFAULT_COMMIT_DELAY,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// State of one open document.
///
/// Owns everything mutable about the document: the page cache, the pending
/// set (inside the scheduler) and the navigator. Dropping the session drops
/// the cache and shuts the fetch workers down.
pub struct DocumentSession {
    document_key: String,
    cache: PageCache,
    scheduler: PrefetchScheduler,
    navigator: Navigator,
    clock: Arc<dyn Clock>,
    lookahead: usize,
    document_error: Option<String>,
    warmed: bool,
}

impl DocumentSession {
    /// Open a document, starting at `start_page` (1 when unknown).
    ///
    /// The page count is requested right away; nothing else is fetched until
    /// it arrives.
    #[must_use]
    pub fn open(
        document_key: impl Into<String>,
        source: Arc<dyn PageSource>,
        start_page: Option<usize>,
        spread_step: usize,
        config: &SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let document_key = document_key.into();
        let mut scheduler = PrefetchScheduler::new(source, config.workers, Arc::clone(&clock));
        scheduler.request_document_info();

        log::info!(
            "Opened {document_key} at page {}",
            start_page.unwrap_or(1)
        );

        Self {
            document_key,
            cache: PageCache::new(config.cache_capacity),
            scheduler,
            navigator: Navigator::with_timings(
                start_page.unwrap_or(1),
                spread_step,
                config.commit_delay,
                config.settle_delay,
            ),
            clock,
            lookahead: config.lookahead,
            document_error: None,
            warmed: false,
        }
    }

    #[must_use]
    pub fn document_key(&self) -> &str {
        &self.document_key
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.navigator.current_page()
    }

    #[must_use]
    pub fn total_pages(&self) -> Option<usize> {
        self.navigator.total_pages()
    }

    #[must_use]
    pub fn nav_state(&self) -> NavState {
        self.navigator.state()
    }

    #[must_use]
    pub fn spread_step(&self) -> usize {
        self.navigator.spread_step()
    }

    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    #[must_use]
    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    #[must_use]
    pub fn scheduler(&self) -> &PrefetchScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn loading_progress(&self) -> u8 {
        self.scheduler.progress().percent()
    }

    #[must_use]
    pub fn fetch_stats(&self) -> FetchStats {
        self.scheduler.stats()
    }

    /// Error from the last failed attempt to read the page count
    #[must_use]
    pub fn document_error(&self) -> Option<&str> {
        self.document_error.as_deref()
    }

    /// Pages of the spread on screen
    #[must_use]
    pub fn visible_pages(&self) -> Vec<usize> {
        spread_pages(self.current_page(), self.spread_step(), self.total_pages())
    }

    #[must_use]
    pub fn page(&self, page: usize) -> Option<Arc<PageContent>> {
        self.cache.get(page)
    }

    #[must_use]
    pub fn is_page_ready(&self, page: usize) -> bool {
        self.cache.contains(page)
    }

    /// Apply a navigation command.
    ///
    /// Loading effects run here; the effects the session cannot carry out
    /// itself (persisting the position) are returned.
    pub fn apply(&mut self, cmd: Command, now: Instant) -> Vec<Effect> {
        let effects = self.navigator.apply(cmd, now);
        self.execute_effects(effects)
    }

    /// Drain fetch results and advance timed navigation phases
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        let responses = self.scheduler.poll_responses(&mut self.cache);
        let mut effects = self.handle_responses(&responses, now);
        let nav_effects = self.navigator.tick(now);
        effects.extend(self.execute_effects(nav_effects));
        effects
    }

    /// Drain fetch results without blocking.
    ///
    /// Effects the session cannot carry out itself are dropped; use
    /// [`tick`](Self::tick) to receive them.
    pub fn pump(&mut self) -> Vec<FetchResponse> {
        let responses = self.scheduler.poll_responses(&mut self.cache);
        let now = self.clock.now();
        let _ = self.handle_responses(&responses, now);
        responses
    }

    /// Block until every issued fetch has resolved or `timeout` elapses.
    ///
    /// Returns true when nothing is left in flight.
    pub fn wait_until_settled(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let responses = self.scheduler.wait_until_settled(&mut self.cache, remaining);
            let now = self.clock.now();
            let _ = self.handle_responses(&responses, now);

            if self.scheduler.is_settled() {
                return true;
            }
            if responses.is_empty() || Instant::now() >= deadline {
                return false;
            }
        }
    }

    /// Ask the source for the page count again after a failure
    pub fn retry_document_info(&mut self) -> bool {
        if self.total_pages().is_some() {
            return false;
        }
        log::info!("Retrying document info for {}", self.document_key);
        self.document_error = None;
        self.scheduler.request_document_info();
        true
    }

    /// When the next timed navigation phase is due
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.navigator.next_deadline()
    }

    fn handle_responses(&mut self, responses: &[FetchResponse], now: Instant) -> Vec<Effect> {
        let mut remaining = vec![];

        for response in responses {
            match response {
                FetchResponse::DocumentInfo { page_count: 0, .. } => {
                    log::warn!("{} has no pages", self.document_key);
                    self.document_error = Some("document has no pages".to_string());
                }
                FetchResponse::DocumentInfo { page_count, .. } => {
                    self.document_error = None;
                    let effects = self.navigator.apply(Command::SetTotalPages(*page_count), now);
                    remaining.extend(self.execute_effects(effects));
                    self.warm_initial();
                }
                FetchResponse::DocumentFailed { error, .. } => {
                    self.document_error = Some(error.to_string());
                }
                _ => {}
            }
        }

        remaining
    }

    /// Load the first spread and the pages after it, once per session
    fn warm_initial(&mut self) {
        if self.warmed {
            return;
        }
        self.warmed = true;

        let mut cohort: Vec<usize> = self
            .visible_pages()
            .into_iter()
            .filter(|&page| self.scheduler.request_page(&self.cache, page).is_some())
            .collect();
        if let Some(total) = self.total_pages() {
            let (center, step) = (self.current_page(), self.spread_step());
            cohort.extend(self.scheduler.schedule(
                &self.cache,
                center,
                Direction::Next,
                self.lookahead,
                step,
                total,
            ));
        }
        self.scheduler.begin_progress(&cohort);
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut remaining = vec![];

        for effect in effects {
            match effect {
                Effect::RequestVisible => {
                    for page in self.visible_pages() {
                        self.scheduler.request_page(&self.cache, page);
                    }
                }

                Effect::Schedule { center, direction } => {
                    if let Some(total) = self.total_pages() {
                        let step = self.spread_step();
                        self.scheduler.schedule(
                            &self.cache,
                            center,
                            direction,
                            self.lookahead,
                            step,
                            total,
                        );
                    }
                }

                Effect::SavePosition(_) => remaining.push(effect),
            }
        }

        remaining
    }
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("document_key", &self.document_key)
            .field("current_page", &self.current_page())
            .field("total_pages", &self.total_pages())
            .field("nav_state", &self.nav_state())
            .field("cached", &self.cache.len())
            .field("pending", &self.scheduler.pending_pages())
            .finish()
    }
}
