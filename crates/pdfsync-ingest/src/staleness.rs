//! Staleness decision shared by the fetch and output caches

use std::time::SystemTime;

/// `true` when `candidate` is missing or strictly older than `reference`.
///
/// Equal timestamps count as fresh.
pub fn is_stale(reference: SystemTime, candidate: Option<SystemTime>) -> bool {
    match candidate {
        None => true,
        Some(candidate) => candidate < reference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_missing_candidate_is_stale() {
        assert!(is_stale(at(0), None));
        assert!(is_stale(at(1_700_000_000), None));
    }

    #[test]
    fn test_equal_is_fresh() {
        assert!(!is_stale(at(100), Some(at(100))));
    }

    #[test]
    fn test_older_is_stale_newer_is_fresh() {
        assert!(is_stale(at(100), Some(at(99))));
        assert!(!is_stale(at(100), Some(at(101))));
    }

    proptest! {
        #[test]
        fn prop_stale_iff_strictly_older(reference in 0u64..4_000_000_000, candidate in 0u64..4_000_000_000) {
            prop_assert_eq!(is_stale(at(reference), Some(at(candidate))), candidate < reference);
        }
    }
}
