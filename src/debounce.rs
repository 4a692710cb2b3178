use std::time::{Duration, Instant};

/// Coalesces bursts of calls into one, keeping the latest arguments.
///
/// Every [`call`](Self::call) restarts the window. [`poll`](Self::poll) hands
/// out the latest arguments once the window has passed without another call.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn call(&mut self, args: T, now: Instant) {
        self.pending = Some((args, now + self.window));
    }

    /// Take the pending arguments if their window has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = self.deadline()?;
        if now >= due { self.flush() } else { None }
    }

    /// Take the pending arguments right away
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(args, _)| args)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due)| *due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(150);

    #[test]
    fn burst_collapses_to_latest() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.call((800, 600), t0);
        debouncer.call((900, 600), t0 + Duration::from_millis(50));
        debouncer.call((1000, 700), t0 + Duration::from_millis(100));

        // Window restarts on every call
        assert_eq!(debouncer.poll(t0 + Duration::from_millis(200)), None);
        assert_eq!(
            debouncer.poll(t0 + Duration::from_millis(250)),
            Some((1000, 700))
        );
        assert_eq!(debouncer.poll(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn flush_skips_the_wait() {
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.call(1, Instant::now());
        assert!(debouncer.is_pending());
        assert_eq!(debouncer.flush(), Some(1));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn idle_debouncer_yields_nothing() {
        let mut debouncer: Debouncer<u32> = Debouncer::new(WINDOW);
        assert_eq!(debouncer.poll(Instant::now()), None);
        assert_eq!(debouncer.deadline(), None);
    }
}
