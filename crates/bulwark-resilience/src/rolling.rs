use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowTotals {
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
}

impl WindowTotals {
    pub fn total(&self) -> u64 {
        self.successes + self.failures + self.timeouts
    }

    pub fn errors(&self) -> u64 {
        self.failures + self.timeouts
    }

    /// Integer percentage of errors, 0 when the window is empty.
    pub fn error_percent(&self) -> u64 {
        match self.total() {
            0 => 0,
            total => self.errors() * 100 / total,
        }
    }

    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.successes += 1,
            Outcome::Failure => self.failures += 1,
            Outcome::Timeout => self.timeouts += 1,
        }
    }

    fn merge(&mut self, other: &WindowTotals) {
        self.successes += other.successes;
        self.failures += other.failures;
        self.timeouts += other.timeouts;
    }
}

#[derive(Debug)]
struct Bucket {
    start: Instant,
    counts: WindowTotals,
}

/// Outcome counts over a sliding time window, kept as fixed-length buckets.
/// Expired buckets are dropped lazily whenever the window is touched.
#[derive(Debug)]
pub struct RollingWindow {
    window: Duration,
    bucket_len: Duration,
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    pub fn new(window: Duration, buckets: u32) -> Self {
        let bucket_len = (window / buckets.max(1)).max(Duration::from_nanos(1));
        Self {
            window,
            bucket_len,
            buckets: VecDeque::with_capacity(buckets as usize + 1),
        }
    }

    pub fn record(&mut self, now: Instant, outcome: Outcome) {
        self.evict(now);
        self.bucket_at(now).counts.add(outcome);
    }

    pub fn totals(&mut self, now: Instant) -> WindowTotals {
        self.evict(now);
        let mut totals = WindowTotals::default();
        for b in &self.buckets {
            totals.merge(&b.counts);
        }
        totals
    }

    pub fn reset(&mut self) {
        self.buckets.clear();
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.buckets.front() {
            if front.start + self.window <= now {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    fn bucket_at(&mut self, now: Instant) -> &mut Bucket {
        let start = match self.buckets.back() {
            Some(last) if now < last.start + self.bucket_len => None,
            // Keep bucket boundaries aligned to the previous bucket while it is
            // still inside the window.
            Some(last) => {
                let elapsed = now.duration_since(last.start).as_nanos();
                let steps = elapsed / self.bucket_len.as_nanos();
                let offset = self.bucket_len.as_nanos() * steps;
                Some(last.start + Duration::from_nanos(offset as u64))
            }
            None => Some(now),
        };

        if let Some(start) = start {
            self.buckets.push_back(Bucket {
                start,
                counts: WindowTotals::default(),
            });
        }
        // Non-empty: either an existing bucket was reused or one was just pushed.
        let last = self.buckets.len() - 1;
        &mut self.buckets[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_percent() {
        let t = WindowTotals {
            successes: 1,
            failures: 2,
            timeouts: 1,
        };
        assert_eq!(t.total(), 4);
        assert_eq!(t.errors(), 3);
        assert_eq!(t.error_percent(), 75);
        assert_eq!(WindowTotals::default().error_percent(), 0);
    }

    #[test]
    fn test_outcomes_in_same_bucket_accumulate() {
        let t0 = Instant::now();
        let mut w = RollingWindow::new(Duration::from_secs(15), 5);
        w.record(t0, Outcome::Success);
        w.record(t0 + Duration::from_secs(1), Outcome::Failure);
        w.record(t0 + Duration::from_secs(2), Outcome::Timeout);

        assert_eq!(w.buckets.len(), 1);
        assert_eq!(w.totals(t0 + Duration::from_secs(2)).total(), 3);
    }

    #[test]
    fn test_old_buckets_expire() {
        let t0 = Instant::now();
        let mut w = RollingWindow::new(Duration::from_secs(15), 5);
        w.record(t0, Outcome::Failure);
        w.record(t0 + Duration::from_secs(4), Outcome::Failure);
        w.record(t0 + Duration::from_secs(10), Outcome::Success);

        assert_eq!(w.totals(t0 + Duration::from_secs(14)).total(), 3);
        // First bucket [0s, 3s) leaves the window at 15s.
        let totals = w.totals(t0 + Duration::from_secs(15));
        assert_eq!(totals.failures, 1);
        assert_eq!(totals.successes, 1);
        assert_eq!(w.totals(t0 + Duration::from_secs(30)).total(), 0);
    }

    #[test]
    fn test_bucket_boundaries_stay_aligned() {
        let t0 = Instant::now();
        let mut w = RollingWindow::new(Duration::from_secs(15), 5);
        w.record(t0, Outcome::Success);
        w.record(t0 + Duration::from_millis(7_500), Outcome::Success);

        assert_eq!(w.buckets.len(), 2);
        assert_eq!(w.buckets[1].start, t0 + Duration::from_secs(6));
    }

    #[test]
    fn test_reset_clears_counts() {
        let t0 = Instant::now();
        let mut w = RollingWindow::new(Duration::from_secs(15), 5);
        w.record(t0, Outcome::Failure);
        w.reset();
        assert_eq!(w.totals(t0), WindowTotals::default());
    }
}
