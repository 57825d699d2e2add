// src/core/relation/provider.rs

//! Provider side of the orchestrator relation, run on MAIN and FAILOVER apps
//! (§4.5).

use crate::core::app::App;
use crate::core::kv::{KvBus, Scope};
use crate::core::node::Node;
use crate::core::pcm::{DeploymentDescription, PeerClusterApp, PeerClusterOrchestrators};
use crate::core::relation::payload::{
    AzureCredentials, Credentials, PeerClusterRelErrorData, ProviderPayload, RequirerPayload, S3Credentials,
};
use std::collections::HashMap;
use std::sync::Arc;

/// The fleet-wide census the provider accumulates across requirer relations
/// (§4.5), plus the relation id each census row arrived on so the provider
/// knows where to write refreshed payloads back (§4.5 "write payload + hash
/// to every relation").
#[derive(Debug, Default)]
pub struct FleetCensus {
    pub apps: Vec<PeerClusterApp>,
    relation_of: HashMap<String, i64>,
}

impl FleetCensus {
    pub fn new() -> Self {
        Self::default()
    }

    /// On relation-changed from any requirer: append (or replace) the
    /// requirer's census row, recording which relation it came in on.
    pub fn upsert(&mut self, relation_id: i64, app: PeerClusterApp) {
        self.relation_of.insert(app.app.id.clone(), relation_id);
        if let Some(existing) = self.apps.iter_mut().find(|a| a.app == app.app) {
            *existing = app;
        } else {
            self.apps.push(app);
        }
    }

    /// On relation-departed with `len(units)==0`: drop the app from the
    /// census.
    pub fn drop_app(&mut self, app: &App) {
        self.apps.retain(|a| &a.app != app);
        self.relation_of.remove(&app.id);
    }

    /// The relation id a given app's census row was last seen on, if any.
    pub fn relation_id_for(&self, app: &App) -> Option<i64> {
        self.relation_of.get(&app.id).copied()
    }
}

/// Elects a failover orchestrator the first time a candidate requirer
/// reports itself as such, iff none is registered yet (§4.5).
pub fn maybe_elect_failover(
    orchestrators: &mut PeerClusterOrchestrators,
    requirer: &RequirerPayload,
    relation_id: i64,
) {
    let is_candidate = requirer
        .is_candidate_failover_orchestrator
        .as_deref()
        == Some("true");
    if is_candidate && orchestrators.failover_app.is_none() {
        orchestrators.failover_app = Some(requirer.app.app.clone());
        orchestrators.failover_rel_id = relation_id;
    }
}

/// Plaintext secret material for one relation's [`Credentials`], before
/// secret-granting (§6.2). Assembled by the caller from config/keystore
/// state; `None` fields are simply omitted from the granted [`Credentials`].
#[derive(Debug, Clone, Default)]
pub struct PlaintextCredentials {
    pub admin_username: String,
    pub admin_password: String,
    pub admin_password_hash: String,
    pub kibana_password: String,
    pub kibana_password_hash: String,
    pub monitor_password: Option<String>,
    pub admin_tls: Option<String>,
    pub s3: Option<PlaintextS3Credentials>,
    pub azure: Option<PlaintextAzureCredentials>,
}

#[derive(Debug, Clone)]
pub struct PlaintextS3Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub tls_ca_chain: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlaintextAzureCredentials {
    pub storage_account: String,
    pub secret_key: String,
}

/// Mints a `SecretRef` via `bus.grant_secret` for every embedded secret in
/// `plaintext`, granting the relation visibility before the payload
/// referencing them is ever written (§6.2: "every embedded `SecretRef` is
/// granted to the relation before write").
pub async fn grant_credentials<B: KvBus>(
    bus: &B,
    relation_id: i64,
    plaintext: &PlaintextCredentials,
) -> Credentials {
    let monitor_password = match &plaintext.monitor_password {
        Some(p) => Some(bus.grant_secret(relation_id, p.clone()).await),
        None => None,
    };
    let admin_tls = match &plaintext.admin_tls {
        Some(p) => Some(bus.grant_secret(relation_id, p.clone()).await),
        None => None,
    };
    let s3 = match &plaintext.s3 {
        Some(s3) => Some(S3Credentials {
            access_key: bus.grant_secret(relation_id, s3.access_key.clone()).await,
            secret_key: bus.grant_secret(relation_id, s3.secret_key.clone()).await,
            tls_ca_chain: match &s3.tls_ca_chain {
                Some(c) => Some(bus.grant_secret(relation_id, c.clone()).await),
                None => None,
            },
        }),
        None => None,
    };
    let azure = match &plaintext.azure {
        Some(az) => Some(AzureCredentials {
            storage_account: bus.grant_secret(relation_id, az.storage_account.clone()).await,
            secret_key: bus.grant_secret(relation_id, az.secret_key.clone()).await,
        }),
        None => None,
    };

    Credentials {
        admin_username: plaintext.admin_username.clone(),
        admin_password: bus.grant_secret(relation_id, plaintext.admin_password.clone()).await,
        admin_password_hash: bus.grant_secret(relation_id, plaintext.admin_password_hash.clone()).await,
        kibana_password: bus.grant_secret(relation_id, plaintext.kibana_password.clone()).await,
        kibana_password_hash: bus.grant_secret(relation_id, plaintext.kibana_password_hash.clone()).await,
        monitor_password,
        admin_tls,
        s3,
        azure,
    }
}

/// Refreshes the relation payload for one related app: grants every
/// embedded secret to the relation, then writes `data` and `rel_data_hash`
/// together (§4.5, §6.2).
pub async fn refresh_relation_data<B: KvBus>(
    bus: &Arc<B>,
    relation_id: i64,
    cluster_name: String,
    cm_nodes: Vec<Node>,
    plaintext_credentials: &PlaintextCredentials,
    deployment_desc: Option<DeploymentDescription>,
    security_index_initialised: bool,
) -> Result<(String, String), serde_json::Error> {
    let credentials = grant_credentials(bus.as_ref(), relation_id, plaintext_credentials).await;
    let payload = ProviderPayload {
        cluster_name,
        cm_nodes,
        credentials,
        deployment_desc,
        security_index_initialised,
    };
    let data = payload.canonical_json()?;
    let hash = payload.rel_data_hash()?;
    bus.set(Scope::Relation(relation_id), "data", data.clone()).await;
    bus.set(Scope::Relation(relation_id), "rel_data_hash", hash.clone()).await;
    Ok((data, hash))
}

/// Writes an `error_data` slot instead of a normal payload when the cluster
/// is unreachable or otherwise degraded (§4.5).
pub async fn write_error_data<B: KvBus>(
    bus: &Arc<B>,
    relation_id: i64,
    error: PeerClusterRelErrorData,
) -> Result<(), serde_json::Error> {
    let json = serde_json::to_string(&error)?;
    bus.set(Scope::Relation(relation_id), "error_data", json).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kv::InMemoryKvBus;
    use crate::core::node::Role;
    use crate::core::pcm::{PeerClusterConfig, Profile, StartMode, State};

    #[test]
    fn census_upsert_replaces_existing_app() {
        let mut census = FleetCensus::new();
        let app = App::new("m", "a");
        census.upsert(
            10,
            PeerClusterApp {
                app: app.clone(),
                planned_units: 3,
                units: vec!["a/0".into()],
                roles: vec![Role::Data],
            },
        );
        census.upsert(
            10,
            PeerClusterApp {
                app: app.clone(),
                planned_units: 5,
                units: vec!["a/0".into(), "a/1".into()],
                roles: vec![Role::Data],
            },
        );
        assert_eq!(census.apps.len(), 1);
        assert_eq!(census.apps[0].planned_units, 5);
        assert_eq!(census.relation_id_for(&app), Some(10));
    }

    #[test]
    fn census_drop_removes_app() {
        let mut census = FleetCensus::new();
        let app = App::new("m", "a");
        census.upsert(
            10,
            PeerClusterApp {
                app: app.clone(),
                planned_units: 1,
                units: vec![],
                roles: vec![],
            },
        );
        census.drop_app(&app);
        assert!(census.apps.is_empty());
        assert_eq!(census.relation_id_for(&app), None);
    }

    #[test]
    fn failover_elected_only_once() {
        let mut orch = PeerClusterOrchestrators::new();
        let candidate = RequirerPayload {
            app: PeerClusterApp {
                app: App::new("m", "failover"),
                planned_units: 1,
                units: vec![],
                roles: vec![],
            },
            is_candidate_failover_orchestrator: Some("true".into()),
            main_orchestrator_registered: "true".into(),
            orchestrators: PeerClusterOrchestrators::new(),
        };
        maybe_elect_failover(&mut orch, &candidate, 1);
        assert!(orch.failover_app.is_some());

        let other = RequirerPayload {
            app: PeerClusterApp {
                app: App::new("m", "other"),
                planned_units: 1,
                units: vec![],
                roles: vec![],
            },
            is_candidate_failover_orchestrator: Some("true".into()),
            main_orchestrator_registered: "true".into(),
            orchestrators: PeerClusterOrchestrators::new(),
        };
        maybe_elect_failover(&mut orch, &other, 2);
        assert_eq!(orch.failover_app.as_ref().unwrap().name, "failover");
    }

    fn plaintext_creds() -> PlaintextCredentials {
        PlaintextCredentials {
            admin_username: "admin".into(),
            admin_password: "hunter2".into(),
            admin_password_hash: "hash-1".into(),
            kibana_password: "kibana-pw".into(),
            kibana_password_hash: "hash-2".into(),
            monitor_password: Some("monitor-pw".into()),
            admin_tls: None,
            s3: None,
            azure: None,
        }
    }

    #[tokio::test]
    async fn grant_credentials_grants_every_embedded_secret() {
        let bus = InMemoryKvBus::new();
        let creds = grant_credentials(&bus, 5, &plaintext_creds()).await;

        assert_eq!(bus.peek_secret(5, &creds.admin_password).await.as_deref(), Some("hunter2"));
        assert_eq!(
            bus.peek_secret(5, &creds.admin_password_hash).await.as_deref(),
            Some("hash-1")
        );
        assert_eq!(
            bus.peek_secret(5, &creds.kibana_password).await.as_deref(),
            Some("kibana-pw")
        );
        assert_eq!(
            bus.peek_secret(5, &creds.monitor_password.unwrap()).await.as_deref(),
            Some("monitor-pw")
        );
        // Secrets are scoped to the relation they were granted to.
        assert_eq!(bus.peek_secret(6, &creds.admin_password).await, None);
    }

    #[tokio::test]
    async fn refresh_relation_data_writes_data_and_hash_to_the_bus() {
        let bus = Arc::new(InMemoryKvBus::new());
        let desc = DeploymentDescription {
            app: App::new("m", "main"),
            config: PeerClusterConfig::normalize("logs".into(), false, &[], Profile::Production).unwrap(),
            start: StartMode::WithProvidedRoles,
            pending_directives: vec![],
            typ: crate::core::pcm::DeploymentType::MainOrchestrator,
            state: State::Active,
            message: String::new(),
            cluster_name_autogenerated: false,
            promotion_time: None,
        };

        let (data, hash) = refresh_relation_data(
            &bus,
            42,
            "logs".into(),
            vec![],
            &plaintext_creds(),
            Some(desc),
            true,
        )
        .await
        .unwrap();

        assert_eq!(bus.get(Scope::Relation(42), "data").await.as_deref(), Some(data.as_str()));
        assert_eq!(
            bus.get(Scope::Relation(42), "rel_data_hash").await.as_deref(),
            Some(hash.as_str())
        );
    }
}
