// src/server/mod.rs

use crate::config::OperatorConfig;
use crate::core::collaborators::{SecurityAdminTool, SystemdSupervisor};
use crate::core::kv::InMemoryKvBus;
use crate::core::state::OperatorState;
use crate::core::tasks::{run_relation_refresh_loop, run_tick_loop};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, reload};

mod metrics_server;

/// Runs the operator for one unit: initializes state, spawns the tick loop,
/// the relation-refresh loop, and (if enabled) the metrics server, then waits
/// forever (§5).
pub async fn run(
    config: OperatorConfig,
    log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
) -> Result<()> {
    let metrics_enabled = config.metrics.enabled;
    let unit_name = format!("{}-{}", config.app.name, config.app.unit_number);

    // The relation/secret bus and the local service supervisor are external
    // collaborators (§1, §6); this crate only ships an in-memory bus and a
    // systemd-backed supervisor as reasonable defaults for a standalone run.
    let bus = Arc::new(InMemoryKvBus::new());
    let supervisor = Arc::new(SystemdSupervisor::new(format!("opensearch-{}", config.app.name)));
    let security_init = Arc::new(SecurityAdminTool::new(
        "/usr/share/opensearch/plugins/opensearch-security/tools/securityadmin.sh",
        config.opensearch.config_dir.clone(),
    ));

    let init = OperatorState::initialize(config, bus, log_reload_handle)?;
    let state = init.state;
    info!("operator state initialized for unit {unit_name}");

    run_tick_loop(state.clone(), supervisor, security_init);
    run_relation_refresh_loop(state.clone());

    if metrics_enabled {
        let metrics_state = state.clone();
        state
            .critical_tasks
            .lock()
            .await
            .spawn(async move {
                metrics_server::run_metrics_server(metrics_state).await;
            });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    // Runs until killed; the tick loop and metrics server are the only
    // long-running tasks (§5 "single-threaded cooperative per process").
    std::future::pending::<()>().await;
    Ok(())
}
