// src/core/tasks/relation.rs

//! Relation-refresh loop (§4.5, §5): drives both sides of the orchestrator
//! relation wire protocol on the same cadence as the tick loop. Runs as a
//! second critical task alongside `tasks::tick` (§5: "one `JoinSet` tracks
//! the per-unit tick loop, the relation-refresh loop, and the metrics
//! server").

use crate::core::kv::KvBus;
use crate::core::pcm::{DeploymentType, PeerClusterManager};
use crate::core::relation::provider::{refresh_relation_data, PlaintextCredentials};
use crate::core::relation::requirer::{apply_incoming_relation_data, should_self_demote};
use crate::core::state::OperatorState;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Spawns the relation-refresh loop as a critical task on `state.critical_tasks`.
pub fn run_relation_refresh_loop<B>(state: Arc<OperatorState<B>>)
where
    B: KvBus + 'static,
{
    tokio::spawn(async move {
        let secs = { state.config.lock().await.scheduler.tick_interval_secs };
        let mut ticker = tokio::time::interval(Duration::from_secs(secs));
        loop {
            ticker.tick().await;
            refresh_provider_side(&state).await;
            refresh_requirer_side(&state).await;
        }
    });
}

/// Writes a fresh payload + hash to every related app's relation (§4.5), iff
/// this unit currently acts as a provider (MAIN or FAILOVER orchestrator).
async fn refresh_provider_side<B: KvBus>(state: &Arc<OperatorState<B>>) {
    let desc = { state.deployment_description.lock().await.clone() };
    let Some(desc) = desc else {
        return;
    };
    if !PeerClusterManager::is_provider(desc.typ) {
        return;
    }

    let admin_password = {
        let config = state.config.lock().await;
        config.opensearch.admin_password.clone()
    };
    let Some(admin_password) = admin_password else {
        debug!("relation refresh: admin credentials not yet configured, skipping");
        return;
    };
    let plaintext = PlaintextCredentials {
        admin_username: {
            let config = state.config.lock().await;
            config.opensearch.admin_username.clone()
        },
        admin_password: admin_password.clone(),
        admin_password_hash: crate::core::backup::credentials::credentials_hash(&admin_password),
        kibana_password: admin_password.clone(),
        kibana_password_hash: crate::core::backup::credentials::credentials_hash(&admin_password),
        monitor_password: None,
        admin_tls: None,
        s3: None,
        azure: None,
    };

    let cm_nodes = state
        .topology
        .nodes(&state.app)
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|n| n.is_cm_eligible())
        .collect::<Vec<_>>();
    let security_index_initialised = state.security_index_initialised.load(Ordering::SeqCst);
    let cluster_name = desc.config.cluster_name.clone();

    let apps = { state.fleet_census.lock().await.apps.clone() };
    for app in apps {
        let Some(relation_id) = ({ state.fleet_census.lock().await.relation_id_for(&app.app) }) else {
            continue;
        };
        if let Err(err) = refresh_relation_data(
            &state.bus,
            relation_id,
            cluster_name.clone(),
            cm_nodes.clone(),
            &plaintext,
            Some(desc.clone()),
            security_index_initialised,
        )
        .await
        {
            warn!("relation refresh failed for relation {relation_id}: {err}");
        }
    }
}

/// Reads the upstream orchestrator's payload and self-demotes if it now
/// reports itself as MAIN while this unit still thinks it's MAIN too (§4.5).
async fn refresh_requirer_side<B: KvBus>(state: &Arc<OperatorState<B>>) {
    let main_rel_id = { state.orchestrators.lock().await.main_rel_id };
    if main_rel_id < 0 {
        return;
    }

    let payload = match apply_incoming_relation_data(state.bus.as_ref(), main_rel_id).await {
        Ok(payload) => payload,
        Err(err) => {
            warn!("failed to parse incoming relation data on relation {main_rel_id}: {err}");
            return;
        }
    };
    let Some(payload) = payload else {
        return;
    };
    let remote_is_main = payload
        .deployment_desc
        .as_ref()
        .map(|d| matches!(d.typ, DeploymentType::MainOrchestrator))
        .unwrap_or(false);

    let mut desc = state.deployment_description.lock().await;
    if let Some(desc) = desc.as_mut() {
        if should_self_demote(desc.typ, remote_is_main) {
            debug!("self-demoting to FAILOVER_ORCHESTRATOR: remote relation {main_rel_id} reports MAIN");
            PeerClusterManager::demote_deployment_type(desc);
        }
    }
}
