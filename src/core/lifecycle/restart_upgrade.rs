// src/core/lifecycle/restart_upgrade.rs

//! Restart and upgrade sequences (§4.2.3).

use crate::core::lifecycle::start::StartOpenSearch;
use crate::core::lifecycle::stop::StopOptions;

/// Restart: stop (with `restart=true` to skip the allocation exclusion),
/// then emit Start.
pub fn restart_sequence() -> (StopOptions, StartOpenSearch) {
    (
        StopOptions { for_restart: true },
        StartOpenSearch {
            ignore_lock: false,
            after_upgrade: false,
        },
    )
}

/// Upgrade: acquire the lock, set `cluster.routing.allocation.enable =
/// primaries`, best-effort flush, stop (restart=true), upgrade the workload
/// snap, then emit Start with `after_upgrade=true` (allocation is re-enabled
/// in the post-start sequence, §4.2.1 step 9).
pub fn upgrade_sequence(ignore_lock: bool) -> (StopOptions, StartOpenSearch) {
    (
        StopOptions { for_restart: true },
        StartOpenSearch {
            ignore_lock,
            after_upgrade: true,
        },
    )
}

/// Cluster allocation setting applied before an upgrade stop (§4.2.3).
pub const UPGRADE_ALLOCATION_SETTING: &str = "primaries";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_skips_allocation_exclusion_and_does_not_ignore_lock() {
        let (stop, start) = restart_sequence();
        assert!(stop.for_restart);
        assert!(!start.ignore_lock);
        assert!(!start.after_upgrade);
    }

    #[test]
    fn upgrade_marks_after_upgrade_and_propagates_ignore_lock() {
        let (stop, start) = upgrade_sequence(true);
        assert!(stop.for_restart);
        assert!(start.ignore_lock);
        assert!(start.after_upgrade);
    }
}
