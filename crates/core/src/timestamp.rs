//! The monotonic timestamp cursor from §4.7. Every returned value is
//! strictly greater than every value returned before it, even under
//! concurrent callers and even if the wall clock stalls or runs
//! backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
pub struct TimestampGenerator {
    last: AtomicU64,
}

impl TimestampGenerator {
    pub fn new() -> Self {
        TimestampGenerator {
            last: AtomicU64::new(0),
        }
    }

    /// Returns the next timestamp: wall-clock `now` if it exceeds the
    /// cursor, otherwise the cursor incremented by one.
    pub fn next(&self) -> u64 {
        let now = Self::wall_clock_nanos();
        loop {
            let last = self.last.load(Ordering::SeqCst);
            let candidate = if now > last { now } else { last + 1 };
            if self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return candidate;
            }
        }
    }

    fn wall_clock_nanos() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the unix epoch")
            .as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn timestamps_strictly_increase_sequentially() {
        let gen = TimestampGenerator::new();
        let mut prev = gen.next();
        for _ in 0..1000 {
            let ts = gen.next();
            assert!(ts > prev);
            prev = ts;
        }
    }

    #[test]
    fn timestamps_strictly_increase_under_concurrency() {
        let gen = Arc::new(TimestampGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let gen = Arc::clone(&gen);
            handles.push(thread::spawn(move || {
                (0..500).map(|_| gen.next()).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total, "every returned timestamp must be unique");
    }
}
