// src/core/state/core.rs

//! Defines the central `OperatorState` struct, holding all shared per-unit
//! state (§5).

use crate::config::OperatorConfig;
use crate::core::app::App;
use crate::core::errors::OperatorError;
use crate::core::events::EventQueue;
use crate::core::keystore::KeystoreManager;
use crate::core::kv::KvBus;
use crate::core::lock::{select_lock, NodeLock};
use crate::core::opensearch_client::OpenSearchClient;
use crate::core::pcm::{DeploymentDescription, PeerClusterOrchestrators};
use crate::core::relation::provider::FleetCensus;
use crate::core::tls::TlsManager;
use crate::core::topology::ClusterTopologyReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing_subscriber::{filter::EnvFilter, reload};

/// Everything returned by initialization; consumed once by `server::run`.
pub struct OperatorInit<B: KvBus> {
    pub state: Arc<OperatorState<B>>,
}

/// The central struct holding all shared, per-unit state. Wrapped in `Arc`
/// and passed to the tick loop, the metrics server, and the relation-event
/// handlers.
pub struct OperatorState<B: KvBus> {
    /// This unit's app identity (§3).
    pub app: App,
    /// Runtime configuration, mutex-guarded to allow reload on `config-changed`.
    pub config: Mutex<OperatorConfig>,
    /// The typed KV bus collaborator (C1).
    pub bus: Arc<B>,
    /// The OpenSearch admin API client (C2).
    pub opensearch: OpenSearchClient,
    /// Cluster topology reader (C3).
    pub topology: ClusterTopologyReader,
    /// Config-fragment and keystore manager (C4).
    pub keystore: KeystoreManager,
    /// TLS issuance/rotation/trust-store manager (C5).
    pub tls: TlsManager<B>,
    /// The cluster-wide node lock, swapped between the databag fallback and
    /// the index-backed variant once the security index exists (§4.6).
    pub lock: Mutex<Box<dyn NodeLock>>,
    /// Whether the security index has been bootstrapped yet; gates which
    /// lock backend `lock` holds (§4.6).
    pub security_index_initialised: AtomicBool,
    /// Whether this unit has completed a start sequence (§4.2.1 step 9): the
    /// machine-reboot fast path only applies once this is true.
    pub started: AtomicBool,
    /// This app's current deployment description, if the PCM has evaluated
    /// at least once (§4.1).
    pub deployment_description: Mutex<Option<DeploymentDescription>>,
    /// Known main/failover orchestrator apps (§4.1.4, §3).
    pub orchestrators: Mutex<PeerClusterOrchestrators>,
    /// Fleet-wide app census accumulated by the provider side of the
    /// orchestrator relation (§4.5).
    pub fleet_census: Mutex<FleetCensus>,
    /// The per-unit deferred-event queue driving the tick loop (§5).
    pub events: Mutex<EventQueue>,
    /// A handle to the logging filter, allowing dynamic log level changes.
    pub log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
    /// Tracks critical long-running tasks (tick loop, metrics server) for
    /// graceful shutdown.
    pub critical_tasks: Mutex<JoinSet<()>>,
}

impl<B: KvBus + 'static> OperatorState<B> {
    /// Initializes per-unit state from the given configuration and KV bus.
    pub fn initialize(
        config: OperatorConfig,
        bus: Arc<B>,
        log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
    ) -> Result<OperatorInit<B>, OperatorError> {
        let app = App::new(config.app.model_uuid.clone(), config.app.name.clone());

        let opensearch = OpenSearchClient::with_basic_auth(
            config.opensearch.admin_username.clone(),
            config.opensearch.admin_password.clone().unwrap_or_default(),
        );

        let topology = ClusterTopologyReader::new(opensearch.clone(), config.opensearch.host.clone());
        let keystore = KeystoreManager::new(
            config.opensearch.config_dir.clone(),
            opensearch.clone(),
            config.opensearch.host.clone(),
        );
        let tls = TlsManager::new(bus.clone());

        let security_index_initialised = AtomicBool::new(false);
        let started = AtomicBool::new(false);
        let lock = select_lock(
            security_index_initialised.load(Ordering::SeqCst),
            opensearch.clone(),
            config.opensearch.host.clone(),
            bus.clone(),
        );

        let state = Arc::new(Self {
            app,
            config: Mutex::new(config),
            bus,
            opensearch,
            topology,
            keystore,
            tls,
            lock: Mutex::new(lock),
            security_index_initialised,
            started,
            deployment_description: Mutex::new(None),
            orchestrators: Mutex::new(PeerClusterOrchestrators::new()),
            fleet_census: Mutex::new(FleetCensus::new()),
            events: Mutex::new(EventQueue::new()),
            log_reload_handle,
            critical_tasks: Mutex::new(JoinSet::new()),
        });

        Ok(OperatorInit { state })
    }

    /// Rebuilds the active lock backend once the security index transitions
    /// from absent to bootstrapped (§4.6). A no-op once already switched.
    pub async fn promote_lock_backend(&self) {
        if self.security_index_initialised.swap(true, Ordering::SeqCst) {
            return;
        }
        let host = {
            let config = self.config.lock().await;
            config.opensearch.host.clone()
        };
        let new_lock = select_lock(true, self.opensearch.clone(), host, self.bus.clone());
        *self.lock.lock().await = new_lock;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppIdentity, BackupConfig, MetricsConfig, OpenSearchConfig, PeerClusterSettings, SchedulerConfig};
    use crate::core::kv::InMemoryKvBus;

    fn test_config() -> OperatorConfig {
        OperatorConfig {
            app: AppIdentity {
                model_uuid: "m1".into(),
                name: "opensearch".into(),
                unit_number: 0,
            },
            peer_cluster: PeerClusterSettings::default(),
            opensearch: OpenSearchConfig::default(),
            log_level: "info".into(),
            metrics: MetricsConfig::default(),
            backup: BackupConfig::default(),
            scheduler: SchedulerConfig::default(),
            data_temperature: None,
        }
    }

    fn reload_handle() -> Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>> {
        let (_filter, handle) = reload::Layer::new(EnvFilter::new("info"));
        Arc::new(handle)
    }

    #[tokio::test]
    async fn initialize_builds_databag_lock_before_security_index() {
        let bus = Arc::new(InMemoryKvBus::new());
        let init = OperatorState::initialize(test_config(), bus, reload_handle()).unwrap();
        assert!(!init.state.security_index_initialised.load(Ordering::SeqCst));
        assert!(init.state.lock.lock().await.acquire("unit-0").await.unwrap());
    }

    #[tokio::test]
    async fn promote_lock_backend_is_idempotent() {
        let bus = Arc::new(InMemoryKvBus::new());
        let init = OperatorState::initialize(test_config(), bus, reload_handle()).unwrap();
        init.state.promote_lock_backend().await;
        assert!(init.state.security_index_initialised.load(Ordering::SeqCst));
        init.state.promote_lock_backend().await;
        assert!(init.state.security_index_initialised.load(Ordering::SeqCst));
    }
}
