//! Debounced view fitting.
//!
//! Every layout change requests a re-fit, but the host only re-frames the
//! canvas once changes stop arriving for `delay`. Latest request wins; time
//! is always supplied by the caller so behavior is deterministic in tests.

use std::time::{Duration, Instant};

pub const DEFAULT_FIT_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone)]
pub struct FitScheduler {
    delay: Duration,
    due: Option<Instant>,
}

impl Default for FitScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FIT_DEBOUNCE)
    }
}

impl FitScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay, due: None }
    }

    /// Ask for a fit `delay` after `now`, replacing any pending request.
    pub fn request(&mut self, now: Instant) {
        self.due = Some(now + self.delay);
    }

    /// Make a fit due immediately.
    pub fn force(&mut self, now: Instant) {
        self.due = Some(now);
    }

    /// True once, when the pending request has come due.
    pub fn poll(&mut self, now: Instant) -> bool {
        self.due.take_if(|due| *due <= now).is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// Time left before the pending fit is due.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.due.map(|due| due.saturating_duration_since(now))
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_delay() {
        let t0 = Instant::now();
        let mut fit = FitScheduler::default();
        fit.request(t0);
        assert!(!fit.poll(t0 + Duration::from_millis(149)));
        assert!(fit.poll(t0 + Duration::from_millis(150)));
        assert!(!fit.is_pending());
        assert!(!fit.poll(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn bursts_coalesce_to_latest() {
        let t0 = Instant::now();
        let mut fit = FitScheduler::new(Duration::from_millis(100));
        fit.request(t0);
        fit.request(t0 + Duration::from_millis(80));
        assert!(!fit.poll(t0 + Duration::from_millis(120)));
        assert_eq!(
            fit.time_until_due(t0 + Duration::from_millis(120)),
            Some(Duration::from_millis(60))
        );
        assert!(fit.poll(t0 + Duration::from_millis(180)));
    }

    #[test]
    fn force_and_cancel() {
        let t0 = Instant::now();
        let mut fit = FitScheduler::default();
        fit.force(t0);
        assert!(fit.poll(t0));

        fit.request(t0);
        fit.cancel();
        assert!(!fit.poll(t0 + Duration::from_secs(1)));
    }
}
