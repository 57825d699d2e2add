// src/core/relation/requirer.rs

//! Requirer side of the orchestrator relation, run on every non-main app
//! (§4.5).

use crate::core::app::App;
use crate::core::kv::{KvBus, Scope};
use crate::core::pcm::{DeploymentType, PeerClusterOrchestrators};
use crate::core::relation::payload::{PeerClusterRelErrorData, ProviderPayload};

/// On relation-changed: merge the remote's `orchestrators` view into the
/// local one. If the same app now occupies both main and failover slots in
/// the remote view, treat it as a promotion and signal the caller to drop
/// the old main relation (§4.5).
pub fn merge_remote_orchestrators(
    local: &mut PeerClusterOrchestrators,
    remote: &PeerClusterOrchestrators,
) -> bool {
    *local = remote.clone();
    match (&remote.main_app, &remote.failover_app) {
        (Some(a), Some(b)) if a == b => true,
        _ => false,
    }
}

/// If the remote is a MAIN orchestrator and this app was itself MAIN before,
/// demote self to FAILOVER_ORCHESTRATOR (§4.5).
pub fn should_self_demote(local_typ: DeploymentType, remote_is_main: bool) -> bool {
    remote_is_main && matches!(local_typ, DeploymentType::MainOrchestrator)
}

/// Broadcasts `is_candidate_failover_orchestrator=true` iff locally
/// FAILOVER_ORCHESTRATOR (§4.5).
pub fn is_candidate_failover_orchestrator(local_typ: DeploymentType) -> Option<&'static str> {
    matches!(local_typ, DeploymentType::FailoverOrchestrator).then_some("true")
}

/// Classification of an incoming provider payload or error slot.
pub enum IncomingClassification {
    Normal,
    Error(PeerClusterRelErrorData),
}

/// Status-slot keys are per-relation and exact-string, never
/// substring-matched for clearing (§9 Open Question resolution).
pub fn provider_error_status_key(relation_id: i64) -> String {
    format!("error-from-provider-{relation_id}")
}

pub fn requirer_error_status_key(relation_id: i64) -> String {
    format!("error-from-requirer-{relation_id}")
}

/// True iff this node reports the given main app as still registered, used
/// by the provider side to evaluate failover promotion (§4.1.4, §4.5).
pub fn main_orchestrator_registered(local: &PeerClusterOrchestrators, main_app: &App) -> bool {
    local.main_app.as_ref() == Some(main_app)
}

/// Reads and deserializes the provider's last-written payload for `relation_id`
/// (§4.5, the requirer side's runtime driver for reacting to relation data):
/// `None` if the provider hasn't written anything yet.
pub async fn apply_incoming_relation_data<B: KvBus>(
    bus: &B,
    relation_id: i64,
) -> Result<Option<ProviderPayload>, serde_json::Error> {
    let Some(data) = bus.get(Scope::Relation(relation_id), "data").await else {
        return Ok(None);
    };
    let payload = serde_json::from_str(&data)?;
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_app_in_both_slots_signals_promotion() {
        let mut local = PeerClusterOrchestrators::new();
        let mut remote = PeerClusterOrchestrators::new();
        let app = App::new("m", "a");
        remote.main_app = Some(app.clone());
        remote.failover_app = Some(app);
        assert!(merge_remote_orchestrators(&mut local, &remote));
    }

    #[test]
    fn distinct_apps_do_not_signal_promotion() {
        let mut local = PeerClusterOrchestrators::new();
        let mut remote = PeerClusterOrchestrators::new();
        remote.main_app = Some(App::new("m", "a"));
        remote.failover_app = Some(App::new("m", "b"));
        assert!(!merge_remote_orchestrators(&mut local, &remote));
    }

    #[test]
    fn self_demotes_when_remote_is_main_and_self_was_main() {
        assert!(should_self_demote(DeploymentType::MainOrchestrator, true));
        assert!(!should_self_demote(DeploymentType::FailoverOrchestrator, true));
        assert!(!should_self_demote(DeploymentType::MainOrchestrator, false));
    }

    #[test]
    fn status_keys_are_per_relation_and_exact() {
        assert_eq!(provider_error_status_key(7), "error-from-provider-7");
        assert_ne!(provider_error_status_key(7), provider_error_status_key(70));
    }

    #[tokio::test]
    async fn apply_incoming_relation_data_reads_back_what_the_provider_wrote() {
        use crate::core::kv::InMemoryKvBus;
        use crate::core::relation::provider::{grant_credentials, PlaintextCredentials};
        use crate::core::relation::payload::ProviderPayload;

        let bus = InMemoryKvBus::new();
        assert!(apply_incoming_relation_data(&bus, 9).await.unwrap().is_none());

        let plaintext = PlaintextCredentials {
            admin_username: "admin".into(),
            admin_password: "pw".into(),
            admin_password_hash: "h1".into(),
            kibana_password: "kpw".into(),
            kibana_password_hash: "h2".into(),
            monitor_password: None,
            admin_tls: None,
            s3: None,
            azure: None,
        };
        let credentials = grant_credentials(&bus, 9, &plaintext).await;
        let payload = ProviderPayload {
            cluster_name: "logs".into(),
            cm_nodes: vec![],
            credentials,
            deployment_desc: None,
            security_index_initialised: true,
        };
        bus.set(Scope::Relation(9), "data", payload.canonical_json().unwrap()).await;

        let read_back = apply_incoming_relation_data(&bus, 9).await.unwrap().unwrap();
        assert_eq!(read_back.cluster_name, "logs");
        assert!(read_back.security_index_initialised);
    }
}
