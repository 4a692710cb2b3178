//! Sources and storage doubles for tests

pub mod test_helpers {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Condvar, Mutex};

    use crate::positions::{MemoryStorage, Storage};
    use crate::viewer::{PageContent, PageSource, SourceError};

    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// In-memory document that records every fetch.
    ///
    /// Pages can be made to fail a number of times, and the page count can be
    /// made unavailable until [`set_page_count`](Self::set_page_count).
    #[derive(Default)]
    pub struct MemorySource {
        page_count: Mutex<Option<usize>>,
        fetches: Mutex<Vec<usize>>,
        failures: Mutex<HashMap<usize, usize>>,
    }

    impl MemorySource {
        pub fn new(page_count: usize) -> Arc<Self> {
            Arc::new(Self {
                page_count: Mutex::new(Some(page_count)),
                ..Self::default()
            })
        }

        /// Document whose metadata cannot be loaded
        pub fn broken() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn set_page_count(&self, page_count: usize) {
            *lock(&self.page_count) = Some(page_count);
        }

        /// Make the next `times` fetches of `page` fail
        pub fn fail_page(&self, page: usize, times: usize) {
            lock(&self.failures).insert(page, times);
        }

        /// Pages fetched so far, in call order
        pub fn fetches(&self) -> Vec<usize> {
            lock(&self.fetches).clone()
        }

        pub fn fetch_count(&self, page: usize) -> usize {
            lock(&self.fetches).iter().filter(|&&p| p == page).count()
        }

        pub fn fetched_pages(&self) -> HashSet<usize> {
            lock(&self.fetches).iter().copied().collect()
        }
    }

    impl PageSource for MemorySource {
        fn page_count(&self) -> Result<usize, SourceError> {
            lock(&self.page_count).ok_or_else(|| SourceError::metadata("document did not load"))
        }

        fn fetch_page(&self, page: usize) -> Result<PageContent, SourceError> {
            lock(&self.fetches).push(page);

            if let Some(remaining) = lock(&self.failures).get_mut(&page) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(SourceError::generic(format!("decode error on page {page}")));
                }
            }

            let total = lock(&self.page_count).unwrap_or(0);
            if page == 0 || page > total {
                return Err(SourceError::OutOfRange { page });
            }
            Ok(PageContent::new(page, format!("page {page}").into_bytes()).with_size(595, 842))
        }
    }

    /// Source whose page fetches block until the test opens the gate
    pub struct GatedSource {
        inner: Arc<MemorySource>,
        open: Mutex<bool>,
        gate: Condvar,
        started: Mutex<Vec<usize>>,
        started_signal: Condvar,
    }

    impl GatedSource {
        pub fn new(page_count: usize) -> Arc<Self> {
            Arc::new(Self {
                inner: MemorySource::new(page_count),
                open: Mutex::new(false),
                gate: Condvar::new(),
                started: Mutex::new(Vec::new()),
                started_signal: Condvar::new(),
            })
        }

        pub fn release(&self) {
            *lock(&self.open) = true;
            self.gate.notify_all();
        }

        pub fn fetches(&self) -> Vec<usize> {
            self.inner.fetches()
        }

        pub fn fetch_count(&self, page: usize) -> usize {
            self.inner.fetch_count(page)
        }

        /// Pages whose fetch has begun (possibly still blocked)
        pub fn started(&self) -> Vec<usize> {
            lock(&self.started).clone()
        }

        /// Wait until at least `count` fetches have begun
        pub fn wait_for_started(&self, count: usize, timeout: std::time::Duration) -> bool {
            let guard = lock(&self.started);
            let result = self
                .started_signal
                .wait_timeout_while(guard, timeout, |started| started.len() < count);
            match result {
                Ok((_, timeout)) => !timeout.timed_out(),
                Err(_) => false,
            }
        }
    }

    impl PageSource for GatedSource {
        fn page_count(&self) -> Result<usize, SourceError> {
            self.inner.page_count()
        }

        fn fetch_page(&self, page: usize) -> Result<PageContent, SourceError> {
            lock(&self.started).push(page);
            self.started_signal.notify_all();

            let guard = lock(&self.open);
            let _open = self
                .gate
                .wait_while(guard, |open| !*open)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            self.inner.fetch_page(page)
        }
    }

    /// Storage that records every write; clones share the same record
    #[derive(Clone, Default)]
    pub struct RecordingStorage {
        inner: Arc<Mutex<MemoryStorage>>,
        writes: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl RecordingStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn writes(&self) -> Vec<(String, String)> {
            lock(&self.writes).clone()
        }

        /// Pages saved as last position for `document_key`, in order
        pub fn saved_positions(&self, document_key: &str) -> Vec<usize> {
            let key = format!("lastPage:{document_key}");
            lock(&self.writes)
                .iter()
                .filter(|(k, _)| *k == key)
                .filter_map(|(_, v)| v.parse().ok())
                .collect()
        }
    }

    impl Storage for RecordingStorage {
        fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
            lock(&self.inner).read(key)
        }

        fn write(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
            lock(&self.writes).push((key.to_string(), value.to_string()));
            lock(&self.inner).write(key, value)
        }
    }

    /// Storage whose writes always fail
    #[derive(Default)]
    pub struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn read(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow::anyhow!("storage offline"))
        }

        fn write(&mut self, _key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("storage offline"))
        }
    }
}
