//! Prefetch scheduler - manages the worker pool and the pending set

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};

use super::cache::PageCache;
use crate::clock::Clock;
use super::request::{FetchKind, FetchRequest, FetchResponse, RequestId};
use super::source::PageSource;
use super::types::Direction;
use super::worker::fetch_worker;

/// A fetch that has been issued and not yet answered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    pub id: RequestId,
    pub kind: FetchKind,
    pub issued_at: Instant,
}

/// Counters for issued and completed fetches
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub issued: u64,
    pub loaded: u64,
    pub failed: u64,
}

/// Loading progress of the initial cohort.
///
/// Each successful fetch of a cohort page adds `100 / cohort_size`. The value
/// only ever grows; a failed page stays in the cohort and counts once a later
/// retry succeeds.
#[derive(Clone, Debug, Default)]
pub struct LoadingProgress {
    started: bool,
    size: usize,
    outstanding: HashSet<usize>,
}

impl LoadingProgress {
    fn begin(&mut self, cohort: &[usize]) {
        if self.started {
            return;
        }
        self.started = true;
        self.size = cohort.len();
        self.outstanding = cohort.iter().copied().collect();
    }

    fn record_loaded(&mut self, page: usize) {
        self.outstanding.remove(&page);
    }

    /// Percentage in `0..=100`
    #[must_use]
    pub fn percent(&self) -> u8 {
        if !self.started {
            return 0;
        }
        if self.size == 0 {
            return 100;
        }
        let done = self.size - self.outstanding.len();
        (done * 100 / self.size).min(100) as u8
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }
}

/// Pages that should be warmed when moving `direction` from `center`.
///
/// Steps by whole spreads so the next full spread is warmed rather than an
/// intermediate single page.
#[must_use]
pub fn prefetch_targets(
    center: usize,
    direction: Direction,
    lookahead: usize,
    spread_step: usize,
    total_pages: usize,
) -> Vec<usize> {
    let step = spread_step.max(1);
    (1..=lookahead)
        .filter_map(|k| match direction {
            Direction::Next => center.checked_add(k * step),
            Direction::Prev => center.checked_sub(k * step),
        })
        .filter(|&page| page >= 1 && page <= total_pages)
        .collect()
}

/// Issues page fetches to a pool of worker threads.
///
/// The scheduler lives on the thread that owns the session. Workers only run
/// the [`PageSource`]; the pending set and the cache are mutated here, when
/// responses are drained.
pub struct PrefetchScheduler {
    request_tx: Sender<FetchRequest>,
    response_rx: Receiver<FetchResponse>,
    num_workers: usize,
    next_request_id: u64,
    pending: HashMap<usize, FetchTicket>,
    clock: Arc<dyn Clock>,
    document_request: Option<RequestId>,
    progress: LoadingProgress,
    stats: FetchStats,
}

impl PrefetchScheduler {
    /// Spawn `num_workers` fetch threads (at least one) over `source`.
    ///
    /// Tickets are stamped with `clock`.
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>, num_workers: usize, clock: Arc<dyn Clock>) -> Self {
        // flume gives us MPMC: every worker clones the request receiver and
        // pulls from the same queue.
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let num_workers = num_workers.max(1);
        for _ in 0..num_workers {
            let source = Arc::clone(&source);
            let rx = request_rx.clone();
            let tx = response_tx.clone();

            std::thread::spawn(move || {
                fetch_worker(source, rx, tx);
            });
        }

        Self {
            request_tx,
            response_rx,
            num_workers,
            next_request_id: 1,
            pending: HashMap::new(),
            clock,
            document_request: None,
            progress: LoadingProgress::default(),
            stats: FetchStats::default(),
        }
    }

    /// Ask the source for its page count
    pub fn request_document_info(&mut self) -> RequestId {
        if let Some(id) = self.document_request {
            return id;
        }
        let id = self.next_id();
        let _ = self.request_tx.send(FetchRequest::DocumentInfo { id });
        self.document_request = Some(id);
        id
    }

    /// Warm the pages ahead of `center` in `direction`.
    ///
    /// Pages already cached or pending are skipped. Returns the cohort of
    /// pages actually issued.
    pub fn schedule(
        &mut self,
        cache: &PageCache,
        center: usize,
        direction: Direction,
        lookahead: usize,
        spread_step: usize,
        total_pages: usize,
    ) -> Vec<usize> {
        let cohort: Vec<usize> =
            prefetch_targets(center, direction, lookahead, spread_step, total_pages)
                .into_iter()
                .filter(|&page| !cache.contains(page) && !self.pending.contains_key(&page))
                .collect();

        for &page in &cohort {
            self.issue(page, FetchKind::Prefetch);
        }

        if !cohort.is_empty() {
            log::debug!(
                "Scheduled {} prefetch from page {center}: {cohort:?}",
                direction.as_str()
            );
        }
        cohort
    }

    /// Fetch a page only if it is not cached or already in flight
    pub fn request_page(&mut self, cache: &PageCache, page: usize) -> Option<RequestId> {
        if cache.contains(page) || self.pending.contains_key(&page) {
            return None;
        }
        Some(self.issue(page, FetchKind::Visible))
    }

    /// Start loading-progress accounting for the initial cohort
    pub fn begin_progress(&mut self, cohort: &[usize]) {
        self.progress.begin(cohort);
    }

    fn issue(&mut self, page: usize, kind: FetchKind) -> RequestId {
        let id = self.next_id();
        let _ = self.request_tx.send(FetchRequest::Page { id, page, kind });
        self.pending.insert(
            page,
            FetchTicket {
                id,
                kind,
                issued_at: self.clock.now(),
            },
        );
        self.stats.issued += 1;
        id
    }

    /// Drain completed fetches without blocking, inserting results into `cache`
    pub fn poll_responses(&mut self, cache: &mut PageCache) -> Vec<FetchResponse> {
        let mut responses = vec![];

        while let Ok(response) = self.response_rx.try_recv() {
            self.handle_response(cache, &response);
            responses.push(response);
        }

        responses
    }

    /// Block until nothing is pending or `timeout` elapses.
    ///
    /// Returns every response handled while waiting.
    pub fn wait_until_settled(
        &mut self,
        cache: &mut PageCache,
        timeout: Duration,
    ) -> Vec<FetchResponse> {
        let deadline = Instant::now() + timeout;
        let mut responses = self.poll_responses(cache);

        while !self.is_settled() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    self.handle_response(cache, &response);
                    responses.push(response);
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }

        responses
    }

    fn handle_response(&mut self, cache: &mut PageCache, response: &FetchResponse) {
        match response {
            FetchResponse::DocumentInfo { id, page_count } => {
                self.finish_document_request(*id);
                log::info!("Document reports {page_count} pages");
            }
            FetchResponse::DocumentFailed { id, error } => {
                self.finish_document_request(*id);
                log::warn!("Could not load document info: {error}");
            }
            FetchResponse::Page { id, page, data } => {
                self.finish_page(*id, *page);
                // Inserted even when nobody is looking at it any more; entries
                // are keyed by absolute page.
                if let Some(evicted) = cache.put(*page, Arc::clone(data)) {
                    log::trace!("Evicted page {evicted} for page {page}");
                }
                self.progress.record_loaded(*page);
                self.stats.loaded += 1;
            }
            FetchResponse::Error { id, page, error } => {
                self.finish_page(*id, *page);
                self.stats.failed += 1;
                log::warn!("Failed to fetch page {page}: {error}");
            }
        }
    }

    fn finish_page(&mut self, id: RequestId, page: usize) {
        if self.pending.get(&page).is_some_and(|ticket| ticket.id == id) {
            self.pending.remove(&page);
        }
    }

    fn finish_document_request(&mut self, id: RequestId) {
        if self.document_request == Some(id) {
            self.document_request = None;
        }
    }

    /// Nothing pending and no outstanding document info request
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty() && self.document_request.is_none()
    }

    #[must_use]
    pub fn is_pending(&self, page: usize) -> bool {
        self.pending.contains_key(&page)
    }

    #[must_use]
    pub fn ticket(&self, page: usize) -> Option<&FetchTicket> {
        self.pending.get(&page)
    }

    /// Pending page indices, ascending
    #[must_use]
    pub fn pending_pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self.pending.keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    #[must_use]
    pub fn progress(&self) -> &LoadingProgress {
        &self.progress
    }

    #[must_use]
    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(FetchRequest::Shutdown);
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_targets_step_by_spread() {
        assert_eq!(prefetch_targets(3, Direction::Next, 2, 2, 10), vec![5, 7]);
        assert_eq!(prefetch_targets(3, Direction::Next, 3, 1, 10), vec![4, 5, 6]);
    }

    #[test]
    fn targets_are_clipped_to_document() {
        assert_eq!(prefetch_targets(9, Direction::Next, 2, 2, 10), Vec::<usize>::new());
        assert_eq!(prefetch_targets(8, Direction::Next, 2, 1, 10), vec![9, 10]);
        assert_eq!(prefetch_targets(1, Direction::Prev, 2, 2, 10), Vec::<usize>::new());
        assert_eq!(prefetch_targets(4, Direction::Prev, 3, 1, 10), vec![3, 2, 1]);
        assert_eq!(prefetch_targets(3, Direction::Prev, 2, 2, 10), vec![1]);
    }

    #[test]
    fn zero_lookahead_schedules_nothing() {
        assert!(prefetch_targets(5, Direction::Next, 0, 1, 10).is_empty());
    }

    #[test]
    fn progress_grows_per_cohort_page() {
        let mut progress = LoadingProgress::default();
        assert_eq!(progress.percent(), 0);

        progress.begin(&[1, 2, 3]);
        assert_eq!(progress.percent(), 0);
        progress.record_loaded(2);
        assert_eq!(progress.percent(), 33);
        progress.record_loaded(9);
        assert_eq!(progress.percent(), 33);
        progress.record_loaded(1);
        progress.record_loaded(3);
        assert_eq!(progress.percent(), 100);

        // A later cohort does not reset the initial one
        progress.begin(&[4, 5]);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn tickets_use_the_injected_clock() {
        use crate::clock::ManualClock;
        use crate::test_utils::test_helpers::GatedSource;

        let clock = ManualClock::new();
        clock.advance_ms(1500);
        let source = GatedSource::new(4);
        let mut scheduler = PrefetchScheduler::new(source.clone(), 1, Arc::new(clock.clone()));
        let cache = PageCache::new(4);

        let id = scheduler.request_page(&cache, 2).unwrap();
        let ticket = *scheduler.ticket(2).unwrap();
        assert_eq!(ticket.id, id);
        assert_eq!(ticket.kind, FetchKind::Visible);
        assert_eq!(ticket.issued_at, clock.now());

        clock.advance_ms(300);
        assert_eq!(scheduler.ticket(2).unwrap().issued_at, ticket.issued_at);
        source.release();
    }

    #[test]
    fn empty_cohort_is_complete() {
        let mut progress = LoadingProgress::default();
        progress.begin(&[]);
        assert_eq!(progress.percent(), 100);
    }
}
