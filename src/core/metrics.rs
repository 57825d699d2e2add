// src/core/metrics.rs

//! Defines and registers Prometheus metrics exposed on `/metrics` (§2 ambient
//! stack).
//!
//! This module uses `lazy_static` to ensure that metrics are registered only
//! once globally for the entire process lifetime.

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_gauge_vec, register_int_counter, register_int_gauge,
    register_int_gauge_vec, Gauge, GaugeVec, IntCounter, IntGauge, IntGaugeVec, TextEncoder,
};

lazy_static! {
    /// This app's deployment type, one gauge per label value (`main`,
    /// `failover`, `other`), 1 for the active one.
    pub static ref DEPLOYMENT_TYPE: GaugeVec = register_gauge_vec!(
        "opensearch_peer_operator_deployment_type",
        "Current deployment type for this app (1 = active label value).",
        &["typ"]
    )
    .unwrap();

    /// 1 iff the fleet-wide cluster-manager-eligible node count satisfies
    /// quorum (§4.1.5).
    pub static ref QUORUM_MET: IntGauge = register_int_gauge!(
        "opensearch_peer_operator_quorum_met",
        "1 if the fleet currently satisfies the cluster-manager quorum requirement."
    )
    .unwrap();

    /// 1 iff this unit currently holds the node lock (§4.6).
    pub static ref LOCK_HELD: IntGauge = register_int_gauge!(
        "opensearch_peer_operator_lock_held",
        "1 if this unit currently holds the cluster-wide node lock."
    )
    .unwrap();

    /// 1 iff a snapshot is currently in progress (§4.3.3).
    pub static ref SNAPSHOT_IN_PROGRESS: IntGauge = register_int_gauge!(
        "opensearch_peer_operator_snapshot_in_progress",
        "1 if a snapshot operation is currently in progress."
    )
    .unwrap();

    /// 1 iff a CA rotation is currently in progress fleet-wide (§4.4.2).
    pub static ref CA_ROTATION_IN_PROGRESS: IntGauge = register_int_gauge!(
        "opensearch_peer_operator_ca_rotation_in_progress",
        "1 if a CA rotation is currently in progress."
    )
    .unwrap();

    /// Length of this unit's pending-directive queue (§4.1).
    pub static ref DIRECTIVE_QUEUE_LENGTH: IntGauge = register_int_gauge!(
        "opensearch_peer_operator_directive_queue_length",
        "Number of pending PCM directives for this app."
    )
    .unwrap();

    /// Number of related apps on the orchestrator relation (§4.5).
    pub static ref ORCHESTRATOR_RELATION_COUNT: IntGaugeVec = register_int_gauge_vec!(
        "opensearch_peer_operator_orchestrator_relation_count",
        "Number of related apps on the orchestrator relation, labeled by role.",
        &["role"]
    )
    .unwrap();

    /// Length of the deferred-event queue (§5).
    pub static ref EVENT_QUEUE_LENGTH: IntGauge = register_int_gauge!(
        "opensearch_peer_operator_event_queue_length",
        "Number of events currently deferred in this unit's event queue."
    )
    .unwrap();

    /// Count of backup/snapshot failures, labeled by classified state
    /// (§4.3.7).
    pub static ref BACKUP_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "opensearch_peer_operator_backup_failures_total",
        "Total number of backup/restore operations that ended in a failure state."
    )
    .unwrap();

    /// Process-level memory budget for this unit's profile (§4.2.4,
    /// informational only).
    pub static ref REQUIRED_MEMORY_BYTES: Gauge = register_gauge!(
        "opensearch_peer_operator_required_memory_bytes",
        "Memory requirement computed for this unit's configured profile."
    )
    .unwrap();
}

/// Sets the deployment-type gauge to reflect the single currently-active
/// label.
pub fn set_deployment_type(active: &str) {
    for label in ["main", "failover", "other"] {
        DEPLOYMENT_TYPE.with_label_values(&[label]).set(if label == active { 1.0 } else { 0.0 });
    }
}

/// Gathers all registered metrics and encodes them in the Prometheus text
/// format, served at `/metrics` (§2).
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
