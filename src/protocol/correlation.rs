//! Correlation id allocation for the scheduler side.
//!
//! Ids count down from -1 and wrap back to -1 after `i32::MIN`, so they
//! stay negative and fit a 32-bit MessagePack integer.

use std::sync::atomic::{AtomicI64, Ordering};

/// First id handed out, and the value after wrapping.
pub const FIRST_CORRELATION_ID: i64 = -1;

/// Lowest id handed out before wrapping.
pub const LAST_CORRELATION_ID: i64 = i32::MIN as i64;

/// Lock-free allocator of negative correlation ids.
///
/// Shared by reference between tasks; ids are unique until the counter
/// wraps, which takes 2^31 allocations.
#[derive(Debug)]
pub struct CorrelationIds {
    next: AtomicI64,
}

impl CorrelationIds {
    /// Create an allocator starting at -1.
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(FIRST_CORRELATION_ID),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> i64 {
        let step = |id: i64| {
            Some(if id <= LAST_CORRELATION_ID {
                FIRST_CORRELATION_ID
            } else {
                id - 1
            })
        };
        match self.next.fetch_update(Ordering::Relaxed, Ordering::Relaxed, step) {
            Ok(id) | Err(id) => id,
        }
    }
}

impl Default for CorrelationIds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_count_down() {
        let ids = CorrelationIds::new();
        assert_eq!(ids.next_id(), -1);
        assert_eq!(ids.next_id(), -2);
        assert_eq!(ids.next_id(), -3);
    }

    #[test]
    fn test_ids_wrap() {
        let ids = CorrelationIds {
            next: AtomicI64::new(LAST_CORRELATION_ID + 1),
        };
        assert_eq!(ids.next_id(), LAST_CORRELATION_ID + 1);
        assert_eq!(ids.next_id(), LAST_CORRELATION_ID);
        assert_eq!(ids.next_id(), -1);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let ids = Arc::new(CorrelationIds::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..1000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(id < 0);
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
