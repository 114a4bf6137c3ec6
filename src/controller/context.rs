//! Shared context for the controller.
//!
//! The Context struct holds shared state that is passed to the reconciler:
//! the Kubernetes client, the event reporter identity, the health state and
//! the leadership flag maintained by the Lease election task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};

use crate::crd::MysqlDeployment;
use crate::health::HealthState;

/// Field manager name for the operator
pub const FIELD_MANAGER: &str = "mysql-operator";

/// Shared context for the controller
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Event reporter identity
    reporter: Reporter,
    /// Optional health state for metrics and readiness
    pub health_state: Option<Arc<HealthState>>,
    /// Whether this replica currently holds the leader Lease
    leadership: Arc<AtomicBool>,
}

impl Context {
    /// Create a new context
    pub fn new(
        client: Client,
        health_state: Option<Arc<HealthState>>,
        leadership: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: FIELD_MANAGER.into(),
                instance: std::env::var("POD_NAME").ok(),
            },
            health_state,
            leadership,
        }
    }

    /// Whether this replica may mutate cluster state
    pub fn is_leader(&self) -> bool {
        self.leadership.load(Ordering::SeqCst)
    }

    /// Create an event recorder for publishing Kubernetes events
    fn recorder(&self) -> Recorder {
        Recorder::new(self.client.clone(), self.reporter.clone())
    }

    /// Publish an event for a resource, logging failures
    async fn publish_event(
        &self,
        resource: &MysqlDeployment,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let recorder = self.recorder();
        let object_ref = resource.object_ref(&());
        if let Err(e) = recorder
            .publish(
                &Event {
                    type_,
                    reason: reason.into(),
                    note,
                    action: action.into(),
                    secondary: None,
                },
                &object_ref,
            )
            .await
        {
            tracing::warn!(reason = %reason, error = %e, "Failed to publish event");
        }
    }

    /// Publish a normal event for a resource
    pub async fn publish_normal_event(
        &self,
        resource: &MysqlDeployment,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.publish_event(resource, EventType::Normal, reason, action, note)
            .await
    }

    /// Publish a warning event for a resource
    pub async fn publish_warning_event(
        &self,
        resource: &MysqlDeployment,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.publish_event(resource, EventType::Warning, reason, action, note)
            .await
    }
}
