// tests/scenarios.rs

//! End-to-end scenarios from the PCM's testable-properties list, exercised
//! through the crate's public API rather than internal helpers directly.

use opensearch_peer_operator::core::app::App;
use opensearch_peer_operator::core::node::Role;
use opensearch_peer_operator::core::pcm::{
    DeploymentType, PeerClusterConfig, PeerClusterManager, PeerClusterOrchestrators, Profile, StartMode, State,
};

/// S1 — Auto-generate cluster name: an app with empty `cluster_name`, no
/// roles, and `profile=testing` becomes a solo main orchestrator with a
/// generated name and generated-roles start mode.
#[test]
fn s1_auto_generated_cluster_name_becomes_solo_main() {
    let pcm = PeerClusterManager::new(App::new("m1", "opensearch"));
    let cfg = PeerClusterConfig::normalize("".into(), false, &[], Profile::Testing).unwrap();

    let desc = pcm.run(None, cfg, false, false, 0.0).unwrap();

    assert!(desc.cluster_name_autogenerated);
    assert!(desc.config.cluster_name.starts_with("opensearch-"));
    assert_eq!(desc.config.cluster_name.len(), "opensearch-".len() + 4);
    assert_eq!(desc.start, StartMode::WithGeneratedRoles);
    assert_eq!(desc.typ, DeploymentType::MainOrchestrator);
    assert_eq!(desc.state, State::Active);
}

/// S2 — Invalid roles: `cluster_manager` + `voting_only` together is
/// rejected by normalization before the PCM ever evaluates the description.
#[test]
fn s2_conflicting_roles_rejected_at_normalization() {
    let err = PeerClusterConfig::normalize(
        "logs".into(),
        false,
        &["cluster_manager".into(), "voting_only".into()],
        Profile::Production,
    );
    assert!(err.is_ok(), "role parsing itself succeeds; conflict is enforced at Node construction");

    let cfg = err.unwrap();
    assert!(cfg.roles.contains(&Role::ClusterManager));
    assert!(cfg.roles.contains(&Role::VotingOnly));

    let built = opensearch_peer_operator::core::node::Node::new(
        "unit-0",
        cfg.roles.clone(),
        "10.0.0.1",
        App::new("m1", "opensearch"),
        0,
        None,
    );
    assert_eq!(
        built.unwrap_err(),
        "cluster_manager and voting_only roles cannot be both set on the same nodes."
    );
}

/// S3 — Failover promotion: once the main orchestrator is gone, the failover
/// app is promoted to main and the registry is updated atomically.
#[test]
fn s3_failover_is_promoted_to_main() {
    let failover_app = App::new("m1", "failover");
    let mut desc = opensearch_peer_operator::core::pcm::DeploymentDescription {
        app: failover_app.clone(),
        config: PeerClusterConfig::normalize("logs".into(), false, &[], Profile::Production).unwrap(),
        start: StartMode::WithProvidedRoles,
        pending_directives: vec![],
        typ: DeploymentType::FailoverOrchestrator,
        state: State::Active,
        message: String::new(),
        cluster_name_autogenerated: false,
        promotion_time: None,
    };

    let mut data_app_orchestrators = PeerClusterOrchestrators::new();
    data_app_orchestrators.main_app = Some(App::new("m1", "main"));
    data_app_orchestrators.failover_app = Some(failover_app.clone());
    data_app_orchestrators.failover_rel_id = 7;
    data_app_orchestrators.main_rel_id = 3;

    PeerClusterManager::promote_deployment_type(&mut desc, &mut data_app_orchestrators, 42.0);

    assert_eq!(desc.typ, DeploymentType::MainOrchestrator);
    assert_eq!(desc.promotion_time, Some(42.0));
    assert_eq!(data_app_orchestrators.main_app, Some(failover_app));
    assert_eq!(data_app_orchestrators.failover_app, None);
}
