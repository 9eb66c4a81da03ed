//! Request pacing and bounded fan-out.
//!
//! Public routing servers throttle clients, so every request start goes
//! through a shared [`Pacer`]. Independent batches may run on a small rayon
//! pool; the pacer keeps their aggregate rate below the service limit.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::warn;

/// Enforces a minimum spacing between consecutive request starts. Time spent
/// inside a request is not added on top.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Blocks until the caller may start its request.
    pub fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        let start = {
            let mut next_slot = self.next_slot.lock();
            let now = Instant::now();
            let start = match *next_slot {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_slot = Some(start + self.interval);
            start
        };
        let now = Instant::now();
        if start > now {
            std::thread::sleep(start - now);
        }
    }
}

/// Maps `f` over `items` with at most `max_in_flight` running at once.
/// Output order matches input order.
pub fn run_bounded<T, R, F>(items: &[T], max_in_flight: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    if max_in_flight <= 1 || items.len() <= 1 {
        return items.iter().enumerate().map(|(i, item)| f(i, item)).collect();
    }

    match rayon::ThreadPoolBuilder::new().num_threads(max_in_flight).build() {
        Ok(pool) => pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(i, item)| f(i, item))
                .collect()
        }),
        Err(err) => {
            warn!(error = %err, "could not start request pool, running sequentially");
            items.iter().enumerate().map(|(i, item)| f(i, item)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacer_spaces_requests() {
        let pacer = Pacer::new(Duration::from_millis(20));
        let start = Instant::now();
        pacer.wait();
        pacer.wait();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_slow_request_is_not_followed_by_a_pause() {
        let pacer = Pacer::new(Duration::from_millis(30));
        pacer.wait();
        std::thread::sleep(Duration::from_millis(60));
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() < Duration::from_millis(25));
    }

    #[test]
    fn test_zero_interval_never_blocks() {
        let pacer = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            pacer.wait();
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_run_bounded_preserves_order() {
        let items: Vec<u32> = (0..20).collect();
        let sequential = run_bounded(&items, 1, |i, x| (i, x * 2));
        let parallel = run_bounded(&items, 4, |i, x| (i, x * 2));
        assert_eq!(sequential, parallel);
        assert_eq!(parallel[7], (7, 14));
    }
}
