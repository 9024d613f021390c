use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ConfigError;

/// Ordered destinations for one endpoint plus the round-robin cursor.
///
/// The destination list is fixed at construction. The cursor is the only
/// mutable state and is only reachable through [`BackendPool::select_next`].
#[derive(Debug)]
pub struct BackendPool {
    endpoint: String,
    destinations: Vec<String>,
    cursor: AtomicUsize,
}

impl BackendPool {
    pub fn new(endpoint: impl Into<String>, destinations: Vec<String>) -> Result<Self, ConfigError> {
        let endpoint = endpoint.into();
        if destinations.is_empty() {
            return Err(ConfigError::EmptyPool { endpoint });
        }

        Ok(Self {
            endpoint,
            destinations,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Returns the destination under the cursor and advances it by one.
    ///
    /// Read and advance happen in one compare-and-swap, so concurrent callers
    /// never observe the same cursor value and the cursor stays in
    /// `0..len()`.
    pub fn select_next(&self) -> &str {
        let n = self.destinations.len();
        let index = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some((current + 1) % n)
            })
            .unwrap_or_else(|current| current);
        &self.destinations[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    fn pool(destinations: &[&str]) -> BackendPool {
        BackendPool::new(
            "/svc",
            destinations.iter().map(|d| d.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_round_robin_order_and_wrap() {
        let pool = pool(&["http://d0", "http://d1", "http://d2"]);

        assert_eq!(pool.select_next(), "http://d0");
        assert_eq!(pool.select_next(), "http://d1");
        assert_eq!(pool.select_next(), "http://d2");
        // n + 1th call starts over
        assert_eq!(pool.select_next(), "http://d0");
    }

    #[test]
    fn test_single_destination_is_stable() {
        let pool = pool(&["http://only:9000"]);
        for _ in 0..10 {
            assert_eq!(pool.select_next(), "http://only:9000");
        }
        assert_eq!(pool.cursor.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_empty_pool_rejected() {
        let result = BackendPool::new("/empty", vec![]);
        assert!(matches!(
            result,
            Err(ConfigError::EmptyPool { ref endpoint }) if endpoint == "/empty"
        ));
    }

    #[test]
    fn test_cursor_stays_in_range() {
        let pool = pool(&["a", "b", "c", "d"]);
        for _ in 0..1000 {
            pool.select_next();
            assert!(pool.cursor.load(Ordering::Acquire) < pool.len());
        }
    }

    #[test]
    fn test_concurrent_selection_is_fair() {
        let threads = 8;
        let calls = 250;
        let pool = Arc::new(pool(&["a", "b", "c"]));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    (0..calls)
                        .map(|_| pool.select_next().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for destination in handle.join().unwrap() {
                *counts.entry(destination).or_default() += 1;
            }
        }

        let total = threads * calls;
        let low = total / pool.len();
        let high = total.div_ceil(pool.len());
        assert_eq!(counts.values().sum::<usize>(), total);
        for destination in pool.destinations() {
            let seen = counts[destination];
            assert!(
                seen == low || seen == high,
                "{} selected {} times, expected {} or {}",
                destination,
                seen,
                low,
                high
            );
        }
    }
}
