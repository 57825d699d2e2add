// src/core/lifecycle/stop.rs

//! Stop sequence (§4.2.2).

#[derive(Debug, Clone, Copy, Default)]
pub struct StopOptions {
    /// Stopping as part of a restart: skip the allocation exclusion
    /// (§4.2.2 step 1, §4.2.3).
    pub for_restart: bool,
}

/// Step 1: whether to add this node to voting exclusions (always, if peers
/// are online) and allocation exclusions (only if not stopping-for-restart).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopExclusions {
    pub voting_exclusion: bool,
    pub allocation_exclusion: bool,
}

pub fn exclusions_for_stop(other_nodes_online: bool, options: StopOptions) -> StopExclusions {
    if !other_nodes_online {
        return StopExclusions {
            voting_exclusion: false,
            allocation_exclusion: false,
        };
    }
    StopExclusions {
        voting_exclusion: true,
        allocation_exclusion: !options.for_restart,
    }
}
