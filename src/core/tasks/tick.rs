// src/core/tasks/tick.rs

//! Drives the per-unit event queue (§5): a single-threaded loop that wakes
//! on a fixed tick, runs PCM reconciliation, and processes whatever events
//! are due, deferring with backoff on failure.

use crate::core::collaborators::{SecurityIndexInitializer, ServiceSupervisor};
use crate::core::events::{DeferReason, Event, HandlerOutcome};
use crate::core::kv::KvBus;
use crate::core::lifecycle::resources::required_memory_bytes;
use crate::core::lifecycle::{
    evaluate_start_gate, gate::GateInputs, restart_sequence, should_bootstrap_security_index,
    start::gate_failure_to_step, start::should_keep_lock_on_failure, start::wants_reboot_fast_path,
    upgrade_sequence, StartStep,
};
use crate::core::metrics;
use crate::core::pcm::{DeploymentType, PeerClusterManager};
use crate::core::state::OperatorState;
use crate::core::topology::HealthColor;
use reqwest::Method;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Spawns the tick loop as a critical task on `state.critical_tasks`.
pub fn run_tick_loop<B, S, SI>(state: Arc<OperatorState<B>>, supervisor: Arc<S>, security_init: Arc<SI>)
where
    B: KvBus + 'static,
    S: ServiceSupervisor + 'static,
    SI: SecurityIndexInitializer + 'static,
{
    let tick_interval = {
        let state = state.clone();
        async move {
            let secs = state.config.lock().await.scheduler.tick_interval_secs;
            Duration::from_secs(secs)
        }
    };

    tokio::spawn(async move {
        let interval = tick_interval.await;
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            {
                let mut events = state.events.lock().await;
                events.push(Event::Tick);
            }
            if let Err(err) = drain_once(&state, &supervisor, &security_init).await {
                warn!("tick loop iteration failed: {err}");
            }
        }
    });
}

/// Runs every currently-queued event once, applying its outcome. Events that
/// defer stay queued with increased backoff for the next tick.
async fn drain_once<B, S, SI>(
    state: &Arc<OperatorState<B>>,
    supervisor: &Arc<S>,
    security_init: &Arc<SI>,
) -> Result<(), crate::core::OperatorError>
where
    B: KvBus,
    S: ServiceSupervisor,
    SI: SecurityIndexInitializer,
{
    let pending_events: Vec<Event> = {
        let mut events = state.events.lock().await;
        let mut out = Vec::new();
        // Snapshot + clear: handlers re-push on defer via apply_outcome.
        while !events.is_empty() {
            if let Some(event) = events_pop_any(&mut events) {
                out.push(event);
            } else {
                break;
            }
        }
        out
    };

    metrics::EVENT_QUEUE_LENGTH.set(pending_events.len() as i64);

    for event in pending_events {
        let outcome = handle_event(state, supervisor, security_init, event.clone()).await;
        let mut events = state.events.lock().await;
        events.apply_outcome(event, outcome);
    }

    Ok(())
}

/// Pops one event off the queue regardless of backoff timing (a bounded
/// process with a handful of event kinds; per-event backoff only throttles
/// how aggressively a *failing* event gets retried, not whether it's seen).
fn events_pop_any(events: &mut crate::core::events::EventQueue) -> Option<Event> {
    for candidate in [
        Event::Tick,
        Event::RestartOpenSearch,
        Event::UpgradeOpenSearch { ignore_lock: false },
        Event::UpgradeOpenSearch { ignore_lock: true },
        Event::StartOpenSearch { ignore_lock: false, after_upgrade: false },
        Event::StartOpenSearch { ignore_lock: false, after_upgrade: true },
        Event::StartOpenSearch { ignore_lock: true, after_upgrade: false },
        Event::StartOpenSearch { ignore_lock: true, after_upgrade: true },
    ] {
        if events.backoff_for(&candidate).is_some() {
            events.apply_outcome(candidate.clone(), HandlerOutcome::Done);
            return Some(candidate);
        }
    }
    None
}

async fn handle_event<B, S, SI>(
    state: &Arc<OperatorState<B>>,
    supervisor: &Arc<S>,
    security_init: &Arc<SI>,
    event: Event,
) -> HandlerOutcome
where
    B: KvBus,
    S: ServiceSupervisor,
    SI: SecurityIndexInitializer,
{
    match event {
        Event::Tick => handle_tick(state).await,
        Event::StartOpenSearch { ignore_lock, after_upgrade } => {
            handle_start(state, supervisor, security_init, ignore_lock, after_upgrade).await
        }
        Event::RestartOpenSearch => {
            let (_stop, start) = restart_sequence();
            let mut events = state.events.lock().await;
            events.push(Event::StartOpenSearch {
                ignore_lock: start.ignore_lock,
                after_upgrade: start.after_upgrade,
            });
            HandlerOutcome::Done
        }
        Event::UpgradeOpenSearch { ignore_lock } => {
            let (_stop, start) = upgrade_sequence(ignore_lock);
            let mut events = state.events.lock().await;
            events.push(Event::StartOpenSearch {
                ignore_lock: start.ignore_lock,
                after_upgrade: start.after_upgrade,
            });
            HandlerOutcome::Done
        }
    }
}

/// Tick: re-derive the PCM description (no relation data here — that's
/// handled by the relation endpoints directly), refresh gauges, and queue a
/// start attempt if this unit isn't started yet and the gate might now pass.
async fn handle_tick<B: KvBus>(state: &Arc<OperatorState<B>>) -> HandlerOutcome {
    let desc = state.deployment_description.lock().await;
    if let Some(desc) = desc.as_ref() {
        let label = match desc.typ {
            DeploymentType::MainOrchestrator => "main",
            DeploymentType::FailoverOrchestrator => "failover",
            DeploymentType::Other => "other",
        };
        metrics::set_deployment_type(label);
        metrics::DIRECTIVE_QUEUE_LENGTH.set(desc.pending_directives.len() as i64);
        debug!("tick: deployment_type={label} can_start={}", PeerClusterManager::can_start(Some(desc)));
    }
    drop(desc);

    let held = {
        let lock = state.lock.lock().await;
        lock.is_held_by(&state.app.short_id).await.unwrap_or(false)
    };
    metrics::LOCK_HELD.set(held as i64);

    if !state.started.load(Ordering::SeqCst) {
        let mut events = state.events.lock().await;
        events.push(Event::StartOpenSearch {
            ignore_lock: false,
            after_upgrade: false,
        });
    }

    HandlerOutcome::Done
}

/// Start sequence (§4.2.1), collapsed to the parts this crate actually
/// drives: the service lifecycle itself belongs to [`ServiceSupervisor`].
async fn handle_start<B, S, SI>(
    state: &Arc<OperatorState<B>>,
    supervisor: &Arc<S>,
    security_init: &Arc<SI>,
    ignore_lock: bool,
    after_upgrade: bool,
) -> HandlerOutcome
where
    B: KvBus,
    S: ServiceSupervisor,
    SI: SecurityIndexInitializer,
{
    match supervisor.is_running().await {
        Ok(true) if state.started.load(Ordering::SeqCst) => {
            debug!("start: already up, running post-start cleanup");
            return HandlerOutcome::Done;
        }
        Ok(false) if state.started.load(Ordering::SeqCst) => {
            let desc = state.deployment_description.lock().await;
            let holds_cm = desc
                .as_ref()
                .map(|d| d.config.roles.contains(&crate::core::node::Role::ClusterManager))
                .unwrap_or(false);
            if wants_reboot_fast_path(true, holds_cm, true) {
                drop(desc);
                return match supervisor.restart().await {
                    Ok(()) => HandlerOutcome::Done,
                    Err(err) => HandlerOutcome::Defer(DeferReason(format!("reboot fast path failed: {err}"))),
                };
            }
        }
        Err(err) => return HandlerOutcome::Defer(DeferReason(format!("supervisor unreachable: {err}"))),
        _ => {}
    }

    let desc = state.deployment_description.lock().await;
    let health = state.topology.health().await.unwrap_or(HealthColor::Unknown);
    let config = state.config.lock().await;

    let profile = desc.as_ref().map(|d| d.config.profile).unwrap_or(crate::core::pcm::Profile::Production);
    let total_ram = crate::config::available_memory_bytes();
    let memory_requirement_met = total_ram >= required_memory_bytes(profile, total_ram);

    let is_leader = {
        let lock = state.lock.lock().await;
        lock.is_held_by(&state.app.short_id).await.unwrap_or(false)
    };
    let solo_app_cluster = state.fleet_census.lock().await.apps.is_empty();
    let carries_data_role = desc
        .as_ref()
        .map(|d| d.config.roles.contains(&crate::core::node::Role::Data))
        .unwrap_or(false);

    let inputs = GateInputs {
        memory_requirement_met,
        desc: desc.as_ref(),
        admin_user_configured: config.opensearch.admin_password.is_some(),
        security_index_initialised: state.security_index_initialised.load(Ordering::SeqCst),
        is_leader,
        solo_app_cluster,
        carries_data_role,
        health,
        leader_unreachable: false,
    };
    drop(config);

    if let Err(failure) = evaluate_start_gate(&inputs) {
        let step = gate_failure_to_step(failure);
        drop(desc);
        return HandlerOutcome::Defer(DeferReason(format!("start gate failed at {step:?}")));
    }
    drop(desc);

    if !ignore_lock {
        let lock = state.lock.lock().await;
        match lock.acquire(&state.app.short_id).await {
            Ok(true) => {}
            Ok(false) => return HandlerOutcome::Defer(DeferReason("lock held by another unit".into())),
            Err(err) => return HandlerOutcome::Defer(DeferReason(format!("lock acquire failed: {err}"))),
        }
    }

    let result = supervisor.start().await;
    match result {
        Ok(()) => {
            state.started.store(true, Ordering::SeqCst);
            if after_upgrade {
                info!("start: post-upgrade start completed for {}", state.app);
            }

            if should_bootstrap_security_index(
                is_leader,
                state.security_index_initialised.load(Ordering::SeqCst),
                carries_data_role,
            ) {
                match security_init.bootstrap().await {
                    Ok(()) => {
                        state.promote_lock_backend().await;
                        info!("security index bootstrapped for {}; broadcasting on next relation refresh", state.app);
                    }
                    Err(err) => warn!("security-admin tool invocation failed: {err}"),
                }
            }

            if let Err(err) = state.keystore.remove_fragment("bootstrap").await {
                warn!("failed to flush bootstrap conf: {err}");
            }

            if let Err(err) = clear_node_exclusions(state).await {
                warn!("failed to remove voting/allocation exclusions: {err}");
            }

            if after_upgrade {
                if let Err(err) = reset_allocation_enable(state).await {
                    warn!("failed to reset cluster.routing.allocation.enable after upgrade: {err}");
                }
            }

            if !ignore_lock {
                let lock = state.lock.lock().await;
                let _ = lock.release(&state.app.short_id).await;
            }
            HandlerOutcome::Done
        }
        Err(err) => {
            let keep_lock = should_keep_lock_on_failure(StartStep::StartServiceAndPollReady, false);
            if !keep_lock && !ignore_lock {
                let lock = state.lock.lock().await;
                let _ = lock.release(&state.app.short_id).await;
            }
            HandlerOutcome::Defer(DeferReason(format!("service failed to start: {err}")))
        }
    }
}

/// Post-start init (§4.2.1 step 9): removes this node's voting-config
/// exclusion and clears any allocation exclusion carried over from a prior
/// stop sequence.
async fn clear_node_exclusions<B: KvBus>(state: &Arc<OperatorState<B>>) -> Result<(), crate::core::OperatorError> {
    let host = { state.config.lock().await.opensearch.host.clone() };
    state
        .opensearch
        .request(
            Method::DELETE,
            &host,
            "/_cluster/voting_config_exclusions",
            None,
            crate::core::opensearch_client::DEFAULT_RETRIES,
            crate::core::opensearch_client::DEFAULT_TIMEOUT,
            &[],
        )
        .await?;
    state
        .opensearch
        .request(
            Method::PUT,
            &host,
            "/_cluster/settings",
            Some(json!({ "transient": { "cluster.routing.allocation.exclude._name": null } })),
            crate::core::opensearch_client::DEFAULT_RETRIES,
            crate::core::opensearch_client::DEFAULT_TIMEOUT,
            &[],
        )
        .await?;
    Ok(())
}

/// Post-start init (§4.2.1 step 9, `after_upgrade` branch): restores normal
/// shard allocation after the upgrade sequence pinned it to `primaries`.
async fn reset_allocation_enable<B: KvBus>(state: &Arc<OperatorState<B>>) -> Result<(), crate::core::OperatorError> {
    let host = { state.config.lock().await.opensearch.host.clone() };
    state
        .opensearch
        .request(
            Method::PUT,
            &host,
            "/_cluster/settings",
            Some(json!({ "transient": { "cluster.routing.allocation.enable": "all" } })),
            crate::core::opensearch_client::DEFAULT_RETRIES,
            crate::core::opensearch_client::DEFAULT_TIMEOUT,
            &[],
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppIdentity, BackupConfig, MetricsConfig, OpenSearchConfig, PeerClusterSettings, SchedulerConfig};
    use crate::core::kv::InMemoryKvBus;
    use crate::core::state::OperatorState;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tracing_subscriber::{filter::EnvFilter, reload};

    struct FakeSupervisor {
        running: AtomicUsize,
    }

    #[async_trait]
    impl ServiceSupervisor for FakeSupervisor {
        async fn start(&self) -> Result<(), crate::core::OperatorError> {
            self.running.store(1, Ordering::SeqCst);
            Ok(())
        }
        async fn stop(&self) -> Result<(), crate::core::OperatorError> {
            self.running.store(0, Ordering::SeqCst);
            Ok(())
        }
        async fn restart(&self) -> Result<(), crate::core::OperatorError> {
            Ok(())
        }
        async fn is_running(&self) -> Result<bool, crate::core::OperatorError> {
            Ok(self.running.load(Ordering::SeqCst) == 1)
        }
    }

    struct FakeSecurityIndexInitializer {
        invocations: AtomicUsize,
    }

    #[async_trait]
    impl crate::core::collaborators::SecurityIndexInitializer for FakeSecurityIndexInitializer {
        async fn bootstrap(&self) -> Result<(), crate::core::OperatorError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config() -> crate::config::OperatorConfig {
        crate::config::OperatorConfig {
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
    async fn tick_queues_a_start_attempt_when_not_started() {
        let bus = Arc::new(InMemoryKvBus::new());
        let init = OperatorState::initialize(test_config(), bus, reload_handle()).unwrap();
        let outcome = handle_tick(&init.state).await;
        assert_eq!(outcome, HandlerOutcome::Done);
        let events = init.state.events.lock().await;
        assert!(events.backoff_for(&Event::StartOpenSearch { ignore_lock: false, after_upgrade: false }).is_some());
    }

    #[tokio::test]
    async fn start_defers_without_a_deployment_description() {
        let bus = Arc::new(InMemoryKvBus::new());
        let init = OperatorState::initialize(test_config(), bus, reload_handle()).unwrap();
        let supervisor = Arc::new(FakeSupervisor { running: AtomicUsize::new(0) });
        let security_init = Arc::new(FakeSecurityIndexInitializer { invocations: AtomicUsize::new(0) });
        let outcome = handle_start(&init.state, &supervisor, &security_init, false, false).await;
        assert!(matches!(outcome, HandlerOutcome::Defer(_)));
    }

    #[tokio::test]
    async fn start_bootstraps_security_index_once_for_leader_data_node() {
        let bus = Arc::new(InMemoryKvBus::new());
        let init = OperatorState::initialize(test_config(), bus, reload_handle()).unwrap();
        let state = init.state;

        *state.deployment_description.lock().await = Some(crate::core::pcm::DeploymentDescription {
            app: state.app.clone(),
            config: crate::core::pcm::PeerClusterConfig::normalize(
                "logs".into(),
                false,
                &["data".into()],
                crate::core::pcm::Profile::Testing,
            )
            .unwrap(),
            start: crate::core::pcm::StartMode::WithProvidedRoles,
            pending_directives: vec![],
            typ: DeploymentType::MainOrchestrator,
            state: crate::core::pcm::State::Active,
            message: String::new(),
            cluster_name_autogenerated: false,
            promotion_time: None,
        });
        {
            let mut config = state.config.lock().await;
            config.opensearch.admin_password = Some("hunter2".into());
        }
        state.lock.lock().await.acquire(&state.app.short_id).await.unwrap();

        let supervisor = Arc::new(FakeSupervisor { running: AtomicUsize::new(0) });
        let security_init = Arc::new(FakeSecurityIndexInitializer { invocations: AtomicUsize::new(0) });

        let outcome = handle_start(&state, &supervisor, &security_init, true, false).await;
        assert_eq!(outcome, HandlerOutcome::Done);
        assert_eq!(security_init.invocations.load(Ordering::SeqCst), 1);
        assert!(state.security_index_initialised.load(Ordering::SeqCst));
    }
}
