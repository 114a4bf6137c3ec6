//! Multi-round reconciliation scenarios.

use std::time::Duration;

use mysql_operator::actions::{FORTUNE, dispatch};
use mysql_operator::controller::reconciler::ReconcileOutcome;
use mysql_operator::controller::status::{IMAGE_FETCH_FAILED, UnitStatus};
use mysql_operator::crd::{OciImageResourceSpec, UnitState};
use mysql_operator::resources::pod_spec::ROOT_PASSWORD_ENV;
use mysql_operator::state::PASSWORD_SECRET_KEY;
use serde_json::json;

use crate::common::fixtures::{MysqlDeploymentBuilder, minimal_resource, test_resource};
use crate::{MockCluster, Write};

// ============================================================================
// Leadership
// ============================================================================

#[test]
fn test_follower_never_applies() {
    let mut cluster = MockCluster::follower();
    let resource = test_resource("mysql", "db");

    for _ in 0..3 {
        assert_eq!(cluster.reconcile(&resource), ReconcileOutcome::Standby);
    }

    assert!(cluster.applied.is_empty());
    assert!(cluster.persisted.is_empty());
    assert_eq!(cluster.state_writes, 0);
    assert!(cluster.statuses.iter().all(UnitStatus::is_active));
}

#[test]
fn test_follower_ignores_broken_image() {
    let mut cluster = MockCluster::follower();

    assert_eq!(
        cluster.reconcile(&minimal_resource("mysql")),
        ReconcileOutcome::Standby
    );
    assert_eq!(cluster.last_status(), Some(&UnitStatus::Active));
}

#[test]
fn test_promotion_applies_on_next_round() {
    let mut cluster = MockCluster::follower();
    let resource = test_resource("mysql", "db");

    cluster.reconcile(&resource);
    assert!(cluster.applied.is_empty());

    cluster.is_leader = true;
    cluster.reconcile(&resource);
    assert_eq!(cluster.applied.len(), 1);
}

// ============================================================================
// Image failures
// ============================================================================

#[test]
fn test_missing_image_blocks_without_apply() {
    let mut cluster = MockCluster::leader();

    let outcome = cluster.reconcile(&minimal_resource("mysql"));

    assert_eq!(
        outcome,
        ReconcileOutcome::Blocked(IMAGE_FETCH_FAILED.to_string())
    );
    assert!(cluster.applied.is_empty());
    assert!(cluster.persisted.is_empty());
    assert_eq!(
        cluster.last_status(),
        Some(&UnitStatus::blocked("Error fetching image information"))
    );
}

#[test]
fn test_invalid_image_blocks_without_apply() {
    let mut cluster = MockCluster::leader();
    let resource = MysqlDeploymentBuilder::new("mysql")
        .namespace("db")
        .image_resource(OciImageResourceSpec {
            registry_path: Some("mysql:8.0".to_string()),
            username: Some("puller".to_string()),
            password: None,
        })
        .build();

    assert!(matches!(
        cluster.reconcile(&resource),
        ReconcileOutcome::Blocked(_)
    ));
    assert!(cluster.applied.is_empty());
}

#[test]
fn test_blocked_deployment_recovers_when_image_added() {
    let mut cluster = MockCluster::leader();

    cluster.reconcile(&minimal_resource("mysql"));
    assert!(!cluster.last_status().unwrap().is_active());

    cluster.reconcile(&test_resource("mysql", "db"));
    assert_eq!(cluster.last_status(), Some(&UnitStatus::Active));
    assert_eq!(cluster.applied.len(), 1);
}

#[test]
fn test_recovery_clears_blocked_message() {
    let mut cluster = MockCluster::leader();

    cluster.reconcile(&minimal_resource("mysql"));
    let blocked = cluster.resource_status().unwrap();
    assert_eq!(blocked.state, UnitState::Blocked);
    assert_eq!(blocked.message.as_deref(), Some(IMAGE_FETCH_FAILED));

    cluster.reconcile(&test_resource("mysql", "db"));
    let active = cluster.resource_status().unwrap();
    assert_eq!(active.state, UnitState::Active);
    assert_eq!(active.message, None);
    assert_eq!(active.pod_spec_version, Some(3));
}

#[test]
fn test_blocked_waits_for_change() {
    let mut cluster = MockCluster::leader();

    cluster.reconcile(&minimal_resource("mysql"));
    assert_eq!(cluster.requeue, None);
    assert_eq!(cluster.writes, vec![Write::Status]);
}

// ============================================================================
// Successful configuration
// ============================================================================

#[test]
fn test_state_persisted_before_apply() {
    let mut cluster = MockCluster::leader();

    cluster.reconcile(&test_resource("mysql", "db"));
    assert_eq!(
        cluster.writes,
        vec![
            Write::StoredState,
            Write::RemovePullSecret,
            Write::PodSpec,
            Write::Status
        ]
    );
    assert_eq!(cluster.requeue, Some(Duration::from_secs(300)));

    cluster.reconcile(&test_resource("mysql", "db"));
    assert_eq!(
        cluster.writes,
        vec![Write::RemovePullSecret, Write::PodSpec, Write::Status]
    );
}

#[test]
fn test_private_image_applies_pull_secret() {
    let mut cluster = MockCluster::leader();
    let resource = MysqlDeploymentBuilder::new("mysql")
        .namespace("db")
        .private_image("registry.example.com/mysql:8.0", "puller", "pw")
        .build();

    cluster.reconcile(&resource);
    assert!(cluster.writes.contains(&Write::PullSecret));

    cluster.reconcile(&test_resource("mysql", "db"));
    assert!(cluster.writes.contains(&Write::RemovePullSecret));
}

#[test]
fn test_events_only_on_status_change() {
    let mut cluster = MockCluster::leader();
    let resource = test_resource("mysql", "db");

    for _ in 0..3 {
        cluster.reconcile(&resource);
    }
    assert_eq!(cluster.events, 1);

    cluster.reconcile(&minimal_resource("mysql"));
    assert_eq!(cluster.events, 2);
}

#[test]
fn test_follower_writes_nothing() {
    let mut cluster = MockCluster::follower();

    cluster.reconcile(&test_resource("mysql", "db"));
    assert!(cluster.writes.is_empty());
    assert!(cluster.stored_status.is_none());
    assert_eq!(cluster.events, 0);
    assert_eq!(cluster.requeue, Some(Duration::from_secs(30)));
}

#[test]
fn test_leader_applies_pod_spec() {
    let mut cluster = MockCluster::leader();
    let resource = MysqlDeploymentBuilder::new("orders-db")
        .namespace("db")
        .image("registry.example.com/mysql:8.0")
        .build();

    cluster.reconcile(&resource);

    let secret = cluster.persisted_secret().unwrap().to_string();
    assert_eq!(secret.len(), 96);
    assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));

    let value = serde_json::to_value(&cluster.applied[0]).unwrap();
    assert_eq!(
        value,
        json!({
            "version": 3,
            "containers": [{
                "name": "orders-db",
                "imageDetails": {"imagePath": "registry.example.com/mysql:8.0"},
                "ports": [{"containerPort": 3306, "protocol": "TCP"}],
                "envConfig": {"MYSQL_ROOT_PASSWORD": secret}
            }]
        })
    );
}

#[test]
fn test_private_image_credentials_in_document() {
    let mut cluster = MockCluster::leader();
    let resource = MysqlDeploymentBuilder::new("mysql")
        .namespace("db")
        .private_image("registry.example.com/mysql:8.0", "puller", "pw")
        .build();

    cluster.reconcile(&resource);

    let details = &cluster.applied[0].containers[0].image_details;
    assert_eq!(details.username.as_deref(), Some("puller"));
    assert_eq!(details.password.as_deref(), Some("pw"));
}

#[test]
fn test_repeated_rounds_are_identical() {
    let mut cluster = MockCluster::leader();
    let resource = test_resource("mysql", "db");

    for _ in 0..5 {
        cluster.reconcile(&resource);
    }

    let first = cluster.applied[0].to_json().unwrap();
    assert!(
        cluster
            .applied
            .iter()
            .all(|doc| doc.to_json().unwrap() == first)
    );
    assert_eq!(cluster.state_writes, 1);
}

#[test]
fn test_existing_secret_is_reused() {
    let mut cluster = MockCluster::leader();
    cluster
        .persisted
        .insert(PASSWORD_SECRET_KEY.to_string(), "previously-stored".to_string());

    cluster.reconcile(&test_resource("mysql", "db"));

    assert_eq!(
        cluster.applied[0].containers[0].env_config[ROOT_PASSWORD_ENV],
        "previously-stored"
    );
    assert_eq!(cluster.state_writes, 0);
}

#[test]
fn test_config_changes_keep_secret() {
    let mut cluster = MockCluster::leader();

    cluster.reconcile(&test_resource("mysql", "db"));
    let secret = cluster.persisted_secret().unwrap().to_string();

    let reconfigured = MysqlDeploymentBuilder::new("mysql")
        .namespace("db")
        .image("mysql:8.4")
        .config("max-connections", "500")
        .build();
    cluster.reconcile(&reconfigured);

    assert_eq!(cluster.persisted_secret(), Some(secret.as_str()));
    assert_eq!(
        cluster.applied[1].containers[0].env_config[ROOT_PASSWORD_ENV],
        secret
    );
    assert_eq!(
        cluster.applied[1].containers[0].image_details.image_path,
        "mysql:8.4"
    );
}

// ============================================================================
// Actions
// ============================================================================

#[test]
fn test_fortune_does_not_touch_state() {
    let mut cluster = MockCluster::leader();
    cluster.reconcile(&test_resource("mysql", "db"));
    let before = cluster.persisted.clone();

    let results = dispatch("fortune", json!({"fail": ""})).unwrap().unwrap();
    assert_eq!(results["fortune"], FORTUNE);

    let failure = dispatch("fortune", json!({"fail": "boom"}))
        .unwrap()
        .unwrap_err();
    assert_eq!(failure.message, "boom");

    assert_eq!(cluster.persisted, before);
    assert_eq!(cluster.applied.len(), 1);
}
