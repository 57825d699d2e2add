// src/core/lifecycle/start.rs

//! Start sequence (§4.2.1): `StartOpenSearch{ignore_lock, after_upgrade}`.

use crate::core::lifecycle::gate::GateFailure;

/// Parameters carried by the internal `StartOpenSearch` event (§4.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOpenSearch {
    pub ignore_lock: bool,
    pub after_upgrade: bool,
}

/// Numbered steps of the start sequence, used to report which step a
/// deferral occurred at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStep {
    AlreadyUp,
    MachineRebootFastPath,
    ApplyDirectives,
    RequireAdminAndTls,
    RequireDataNodeSomewhere,
    AcquireLock,
    ResolveNodesAndWriteConfig,
    StartServiceAndPollReady,
    PostStartInit,
    ReleaseLock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Service was already up; post-start cleanup ran and returned.
    AlreadyUpCleanedUp,
    /// A bare service restart sufficed (the machine-reboot fast path).
    RestartedInPlace,
    Started,
    /// Failure at `step`; defer and retry on the next tick. The lock, if
    /// held, is released unless `keep_lock_and_retry_post_start` is set
    /// (the "service up but cluster not green yet" exception, §4.2.1).
    Deferred {
        step: StartStep,
        reason: String,
        keep_lock_and_retry_post_start: bool,
    },
}

/// Decides whether this unit can take the machine-reboot fast path: it
/// previously marked `started=true`, holds `cluster_manager`, and the local
/// service is currently down (§4.2.1 step 2).
pub fn wants_reboot_fast_path(previously_started: bool, holds_cluster_manager: bool, service_down: bool) -> bool {
    previously_started && holds_cluster_manager && service_down
}

/// Whether the very first data-bearing unit may bypass the lock: no cluster
/// exists yet to lock against (§4.2.1 step 6, §4.6, I9 exception).
pub fn bypasses_lock_as_first_data_unit(fleet_has_any_started_node: bool, this_unit_carries_data: bool) -> bool {
    !fleet_has_any_started_node && this_unit_carries_data
}

/// Maps a gate failure into the appropriate deferred start step (§4.2.1
/// step 3-5).
pub fn gate_failure_to_step(failure: GateFailure) -> StartStep {
    match failure {
        GateFailure::InsufficientMemory => StartStep::RequireAdminAndTls,
        GateFailure::NoDeploymentDescription | GateFailure::CannotStart => StartStep::ApplyDirectives,
        GateFailure::AdminUserNotConfigured => StartStep::RequireAdminAndTls,
        GateFailure::MustBeLeaderOrDataRole => StartStep::RequireDataNodeSomewhere,
        GateFailure::ShardsRelocating => StartStep::StartServiceAndPollReady,
    }
}

/// Whether this unit should bootstrap the security index during post-start
/// init: leader, not yet initialized, and carrying the `data` role (§4.2.1
/// step 9).
pub fn should_bootstrap_security_index(is_leader: bool, security_index_initialised: bool, carries_data_role: bool) -> bool {
    is_leader && !security_index_initialised && carries_data_role
}

/// Post-start exception (§4.2.1 closing paragraph): a failure where the
/// service came up but the cluster isn't green yet keeps the lock and
/// retries post-start init, instead of releasing the lock like every other
/// failure.
pub fn should_keep_lock_on_failure(step: StartStep, service_came_up_not_green: bool) -> bool {
    step == StartStep::PostStartInit && service_came_up_not_green
}

/// Marker left on the app when a force-upgrade (`ignore_lock=true`) fails:
/// the lock was deliberately bypassed, so there is no guarantee no other
/// unit is mid-restart too. Resolving this requires explicit operator
/// action; the operator never auto-clears it (§9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForceUpgradeUnresynchronized {
    pub reason: String,
}

impl ForceUpgradeUnresynchronized {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[cfg(test)]
mod force_upgrade_tests {
    use super::*;

    #[test]
    fn marker_carries_the_failure_reason() {
        let marker = ForceUpgradeUnresynchronized::new("service failed to report green after restart");
        assert_eq!(marker.reason, "service failed to report green after restart");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reboot_fast_path_requires_all_three_conditions() {
        assert!(wants_reboot_fast_path(true, true, true));
        assert!(!wants_reboot_fast_path(false, true, true));
        assert!(!wants_reboot_fast_path(true, false, true));
        assert!(!wants_reboot_fast_path(true, true, false));
    }

    #[test]
    fn first_data_unit_bypasses_lock() {
        assert!(bypasses_lock_as_first_data_unit(false, true));
        assert!(!bypasses_lock_as_first_data_unit(true, true));
        assert!(!bypasses_lock_as_first_data_unit(false, false));
    }

    #[test]
    fn lock_kept_only_for_not_yet_green_post_start_failure() {
        assert!(should_keep_lock_on_failure(StartStep::PostStartInit, true));
        assert!(!should_keep_lock_on_failure(StartStep::PostStartInit, false));
        assert!(!should_keep_lock_on_failure(StartStep::AcquireLock, true));
    }

    #[test]
    fn security_index_bootstraps_only_for_leader_data_node_once() {
        assert!(should_bootstrap_security_index(true, false, true));
        assert!(!should_bootstrap_security_index(false, false, true));
        assert!(!should_bootstrap_security_index(true, true, true));
        assert!(!should_bootstrap_security_index(true, false, false));
    }
}
