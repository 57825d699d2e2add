// src/core/pcm/promotion.rs

//! Failover promotion (§4.1.4).

use crate::core::pcm::state::{DeploymentDescription, DeploymentType, PeerClusterOrchestrators};
use crate::core::tls::trust::{is_fully_configured, ScopeTrustState};

/// Per-related-app observation feeding the promotion vote.
#[derive(Debug, Clone, Copy)]
pub struct RelatedAppView {
    /// Whether this related app still reports the main orchestrator as
    /// registered.
    pub main_registered: bool,
}

/// `true` iff a strict majority of related apps report the main
/// orchestrator disconnected: `disconnected_count > floor((n+1)/2)`,
/// counting "self" when no main app is recorded (§4.1.4).
pub fn majority_reports_main_disconnected(related: &[RelatedAppView], main_app_recorded: bool) -> bool {
    let n = related.len() + if main_app_recorded { 0 } else { 1 };
    if n == 0 {
        return false;
    }
    let disconnected = related.iter().filter(|r| !r.main_registered).count()
        + if main_app_recorded { 0 } else { 1 };
    disconnected > (n + 1) / 2
}

/// `true` iff this app should promote from failover to main: it is currently
/// FAILOVER_ORCHESTRATOR, TLS is fully configured, and a strict majority of
/// related apps report the main disconnected (§4.1.4).
pub fn should_promote(
    desc: &DeploymentDescription,
    tls_scopes: &[ScopeTrustState],
    current_ca_issuer: &str,
    related: &[RelatedAppView],
    main_app_recorded: bool,
) -> bool {
    matches!(desc.typ, DeploymentType::FailoverOrchestrator)
        && is_fully_configured(tls_scopes, current_ca_issuer)
        && majority_reports_main_disconnected(related, main_app_recorded)
}

/// Applies promotion effects 1-3; effect 4 (re-validate CM count) is the
/// caller's responsibility via [`super::quorum`] (§4.1.4).
pub fn promote(
    desc: &mut DeploymentDescription,
    orchestrators: &mut PeerClusterOrchestrators,
    now: f64,
) {
    desc.typ = DeploymentType::MainOrchestrator;
    desc.promotion_time = Some(now);
    orchestrators.promote_failover();
}

/// Demotes a MAIN_ORCHESTRATOR back to FAILOVER_ORCHESTRATOR, clearing
/// `promotion_time` (§4.1.6 `demote_deployment_type`).
pub fn demote(desc: &mut DeploymentDescription) {
    desc.typ = DeploymentType::FailoverOrchestrator;
    desc.promotion_time = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_counts_self_when_no_main_recorded() {
        let related = [
            RelatedAppView { main_registered: false },
        ];
        // n = 1 related + 1 self = 2; disconnected = 1 + 1 = 2 > floor(3/2)=1
        assert!(majority_reports_main_disconnected(&related, false));
    }

    #[test]
    fn majority_not_reached_with_mixed_reports() {
        let related = [
            RelatedAppView { main_registered: true },
            RelatedAppView { main_registered: false },
        ];
        assert!(!majority_reports_main_disconnected(&related, true));
    }

    #[test]
    fn strict_majority_required() {
        let related = [
            RelatedAppView { main_registered: false },
            RelatedAppView { main_registered: false },
            RelatedAppView { main_registered: true },
        ];
        // n=3, disconnected=2, floor((3+1)/2)=2, need >2 -> false
        assert!(!majority_reports_main_disconnected(&related, true));
    }
}
