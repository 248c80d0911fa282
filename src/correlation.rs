//! Correlation identifiers for outgoing requests.
//!
//! Non-notify requests carry a string id derived from the wall clock
//! (nanoseconds since the Unix epoch) and a per-session sequence number.
//! The sequence keeps ids distinct for requests issued within the same
//! clock tick, which happens for every element of a batch.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

/// Generator of correlation identifiers for one client session.
#[derive(Debug, Default)]
pub struct CorrelationIds {
    sequence: AtomicU64,
}

impl CorrelationIds {
    /// Create a generator whose sequence starts at zero.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Produce the next identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use framerpc::correlation::CorrelationIds;
    ///
    /// let ids = CorrelationIds::new();
    /// assert_ne!(ids.next_id(), ids.next_id());
    /// ```
    #[must_use]
    pub fn next_id(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        // A clock before the epoch only loses the timestamp component.
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_nanos());
        format!("{nanos}-{sequence}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ids_are_unique_within_a_burst() {
        let ids = CorrelationIds::new();
        let issued: HashSet<String> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(issued.len(), 1000);
    }

    #[test]
    fn ids_start_with_a_timestamp() {
        let id = CorrelationIds::new().next_id();
        let (stamp, sequence) = id.split_once('-').expect("id has two parts");
        assert!(stamp.parse::<u128>().expect("numeric timestamp") > 0);
        assert_eq!(sequence, "0");
    }
}
