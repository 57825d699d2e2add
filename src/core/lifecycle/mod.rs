// src/core/lifecycle/mod.rs

//! Lifecycle Controller (C10, §4.2): orchestrates `StartOpenSearch` /
//! `RestartOpenSearch` / `UpgradeOpenSearch` under the node lock, invoking
//! C5/C6/C4 pre- and post-start.

pub mod gate;
pub mod restart_upgrade;
pub mod start;
pub mod stop;

pub use gate::{evaluate as evaluate_start_gate, GateFailure, GateInputs};
pub use restart_upgrade::{restart_sequence, upgrade_sequence, UPGRADE_ALLOCATION_SETTING};
pub use start::{should_bootstrap_security_index, StartOpenSearch, StartOutcome, StartStep};
pub use stop::{exclusions_for_stop, StopExclusions, StopOptions};

/// Resource threshold per profile (§4.2.4, §6.1): production = min(50% RAM,
/// 32GB); staging = 25% RAM; testing = flat 1GB.
pub mod resources {
    use crate::core::pcm::Profile;

    pub const MIN_HEAP_SIZE_BYTES: u64 = 1024 * 1024 * 1024;
    pub const MAX_HEAP_SIZE_BYTES: u64 = 32 * MIN_HEAP_SIZE_BYTES;

    /// Required system memory for the given profile, given total system RAM.
    pub fn required_memory_bytes(profile: Profile, total_ram_bytes: u64) -> u64 {
        match profile {
            Profile::Production => (total_ram_bytes / 2).min(MAX_HEAP_SIZE_BYTES),
            Profile::Staging => total_ram_bytes / 4,
            Profile::Testing => MIN_HEAP_SIZE_BYTES,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn production_caps_at_32gb() {
            let huge_ram = 256 * MIN_HEAP_SIZE_BYTES;
            assert_eq!(required_memory_bytes(Profile::Production, huge_ram), MAX_HEAP_SIZE_BYTES);
        }

        #[test]
        fn production_uses_half_ram_below_cap() {
            let ram = 4 * MIN_HEAP_SIZE_BYTES;
            assert_eq!(required_memory_bytes(Profile::Production, ram), 2 * MIN_HEAP_SIZE_BYTES);
        }

        #[test]
        fn testing_is_flat_one_gb() {
            assert_eq!(required_memory_bytes(Profile::Testing, 64 * MIN_HEAP_SIZE_BYTES), MIN_HEAP_SIZE_BYTES);
        }

        #[test]
        fn staging_uses_quarter_ram() {
            let ram = 8 * MIN_HEAP_SIZE_BYTES;
            assert_eq!(required_memory_bytes(Profile::Staging, ram), 2 * MIN_HEAP_SIZE_BYTES);
        }
    }
}
