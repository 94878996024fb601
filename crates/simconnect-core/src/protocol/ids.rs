//! Thread-safe identifier allocators for events, groups, definitions, and requests.
//!
//! # Why several allocators? (for beginners)
//!
//! The host identifies everything the client registers by a plain `u32`:
//! client events, notification groups, data definitions, and outstanding
//! requests each live in their own ID space.  Every space needs the same
//! guarantee: an ID handed out once is never handed out again for the rest of
//! the session, even when many threads ask for IDs at the same time.
//!
//! # Thread safety
//!
//! The allocator uses an `AtomicU32` updated with a compare-and-swap loop
//! (`fetch_update`).  The loop refuses to wrap past `u32::MAX`, so a
//! long-running session reports [`IdError::Exhausted`] instead of silently
//! recycling an ID that may still be referenced by the host.

use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;

/// Last ID reserved by the host for its own events; user events start above it.
pub const USER_EVENT_FIRST: u32 = 64;

/// Errors produced by an [`IdAllocator`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdError {
    /// Every ID in the `u32` space has been handed out.
    #[error("{kind} space exhausted")]
    Exhausted { kind: &'static str },
}

/// A thread-safe, strictly increasing source of `u32` identifiers.
///
/// # Examples
///
/// ```rust
/// use simconnect_core::protocol::IdAllocator;
///
/// let ids = IdAllocator::starting_after("RequestID", 0);
/// assert_eq!(ids.next().unwrap(), 1);
/// assert_eq!(ids.next().unwrap(), 2);
/// ```
#[derive(Debug)]
pub struct IdAllocator {
    /// Human-readable name of the ID space, used in logs and errors.
    kind: &'static str,
    /// The most recently handed out ID (or the starting floor).
    last: AtomicU32,
}

impl IdAllocator {
    /// Creates an allocator whose first [`next`](Self::next) returns `floor + 1`.
    pub const fn starting_after(kind: &'static str, floor: u32) -> Self {
        Self {
            kind,
            last: AtomicU32::new(floor),
        }
    }

    /// Allocator for client event IDs (first ID is 65).
    pub const fn events() -> Self {
        Self::starting_after("EventID", USER_EVENT_FIRST)
    }

    /// Allocator for notification group IDs (first ID is 2).
    pub const fn groups() -> Self {
        Self::starting_after("GroupID", 1)
    }

    /// Allocator for data definition IDs (first ID is 2).
    pub const fn definitions() -> Self {
        Self::starting_after("DefinitionID", 1)
    }

    /// Allocator for request IDs (first ID is 1).
    pub const fn requests() -> Self {
        Self::starting_after("RequestID", 0)
    }

    /// Returns the next identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Exhausted`] once `u32::MAX` has been handed out.
    pub fn next(&self) -> Result<u32, IdError> {
        // `fetch_update` returns the value *before* the update; `checked_add`
        // succeeded, so `prev + 1` cannot overflow.
        self.last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_add(1))
            .map(|prev| prev + 1)
            .map_err(|_| IdError::Exhausted { kind: self.kind })
    }

    /// Returns the most recently handed out ID without allocating.
    pub fn last(&self) -> u32 {
        self.last.load(Ordering::Acquire)
    }

    /// Name of this ID space.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_first_id_follows_floor() {
        // Arrange
        let ids = IdAllocator::starting_after("Test", 10);

        // Act
        let first = ids.next().expect("id");

        // Assert
        assert_eq!(first, 11);
    }

    #[test]
    fn test_session_spaces_start_where_the_host_expects() {
        assert_eq!(IdAllocator::events().next(), Ok(65));
        assert_eq!(IdAllocator::groups().next(), Ok(2));
        assert_eq!(IdAllocator::definitions().next(), Ok(2));
        assert_eq!(IdAllocator::requests().next(), Ok(1));
    }

    #[test]
    fn test_ids_increase_strictly() {
        // Arrange
        let ids = IdAllocator::requests();

        // Act
        let values: Vec<u32> = (0..100).map(|_| ids.next().expect("id")).collect();

        // Assert – values must be strictly monotonically increasing
        for window in values.windows(2) {
            assert!(window[1] > window[0], "ids must be strictly increasing");
        }
    }

    #[test]
    fn test_exhaustion_is_reported_not_wrapped() {
        // Arrange – start the allocator one step before the end of the space
        let ids = IdAllocator::starting_after("Tiny", u32::MAX - 1);

        // Act
        let last = ids.next();
        let after = ids.next();

        // Assert
        assert_eq!(last, Ok(u32::MAX));
        assert_eq!(after, Err(IdError::Exhausted { kind: "Tiny" }));
        assert_eq!(ids.last(), u32::MAX, "a failed allocation must not move the counter");
    }

    #[test]
    fn test_concurrent_allocation_yields_distinct_ids() {
        // Arrange
        let ids = Arc::new(IdAllocator::events());
        let thread_count = 10;
        let per_thread = 100;

        // Act – allocate from many threads simultaneously
        let handles: Vec<_> = (0..thread_count)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || {
                    (0..per_thread)
                        .map(|_| ids.next().expect("id"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert – 1000 pairwise-distinct values
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), thread_count * per_thread);
    }

    #[test]
    fn test_last_does_not_allocate() {
        let ids = IdAllocator::groups();
        ids.next().expect("id");

        assert_eq!(ids.last(), 2);
        assert_eq!(ids.next(), Ok(3));
        assert_eq!(ids.kind(), "GroupID");
    }
}
