//! In-memory stand-in for the cluster the controller reconciles against.

use std::collections::BTreeMap;
use std::time::Duration;

use mysql_operator::controller::reconciler::{
    PullSecretPlan, ReconcileOutcome, configure_pod, pull_secret_plan, status_patch,
};
use mysql_operator::controller::status::UnitStatus;
use mysql_operator::crd::{MYSQL_IMAGE_RESOURCE, MysqlDeployment, MysqlDeploymentStatus};
use mysql_operator::image::OciImageResource;
use mysql_operator::resources::pod_spec::PodSpecDocument;
use mysql_operator::state::{PASSWORD_SECRET_KEY, SecretStore, StoredState};

use crate::common::merge_patch;

/// One write the reconciler sent to the API server, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
    StoredState,
    PullSecret,
    RemovePullSecret,
    PodSpec,
    Status,
}

/// Records everything a reconciliation round sent to the API.
#[derive(Debug, Default)]
pub struct MockCluster {
    /// Values persisted in the deployment's state Secret.
    pub persisted: BTreeMap<String, String>,
    /// Status subresource as stored by the API server.
    pub stored_status: Option<serde_json::Value>,
    /// Pod spec documents applied, in order.
    pub applied: Vec<PodSpecDocument>,
    /// Statuses computed, in order.
    pub statuses: Vec<UnitStatus>,
    /// Writes of the last round, in order.
    pub writes: Vec<Write>,
    /// Number of times stored state was written back.
    pub state_writes: usize,
    /// Events published.
    pub events: usize,
    /// Requeue chosen by the last round.
    pub requeue: Option<Duration>,
    pub is_leader: bool,
}

impl MockCluster {
    pub fn leader() -> Self {
        Self {
            is_leader: true,
            ..Default::default()
        }
    }

    pub fn follower() -> Self {
        Self::default()
    }

    /// Run one reconciliation round for `resource`.
    ///
    /// Follows the controller's order: stored state is loaded only by the
    /// leader and saved before anything is applied, the status patch is
    /// merged into the stored status last, and events fire only when the
    /// reported status changes.
    pub fn reconcile(&mut self, resource: &MysqlDeployment) -> ReconcileOutcome {
        let resource = self.observed(resource);
        self.writes.clear();

        let mut stored = if self.is_leader {
            StoredState::from_values(self.persisted.clone())
        } else {
            StoredState::default()
        };

        let resolver = OciImageResource::new(MYSQL_IMAGE_RESOURCE, &resource.spec.resources);
        let outcome = configure_pod(
            self.is_leader,
            resource.metadata.name.as_deref().unwrap_or_default(),
            &resource.spec.config,
            &resolver,
            &mut SecretStore::new(&mut stored),
        );
        let status = outcome.status();

        if outcome.mutates() {
            if status.differs_from(resource.status.as_ref(), resource.metadata.generation) {
                self.events += 1;
            }

            let version = match &outcome {
                ReconcileOutcome::Apply(document) => {
                    if stored.is_dirty() {
                        self.persisted = stored.values().clone();
                        self.state_writes += 1;
                        self.writes.push(Write::StoredState);
                    }
                    match pull_secret_plan(&resource, document).unwrap() {
                        PullSecretPlan::Apply(_) => self.writes.push(Write::PullSecret),
                        PullSecretPlan::Remove => self.writes.push(Write::RemovePullSecret),
                    }
                    self.applied.push(document.clone());
                    self.writes.push(Write::PodSpec);
                    Some(document.version)
                }
                _ => None,
            };

            let patch = status_patch(&resource, &status, version);
            let mut stored_status = serde_json::json!({ "status": self.stored_status.clone() });
            merge_patch(&mut stored_status, &patch);
            self.stored_status = Some(stored_status["status"].clone());
            self.writes.push(Write::Status);
        }

        self.statuses.push(status);
        self.requeue = outcome.requeue_after();
        outcome
    }

    /// `resource` as the controller would see it, with the stored status.
    fn observed(&self, resource: &MysqlDeployment) -> MysqlDeployment {
        let mut resource = resource.clone();
        resource.status = self.resource_status();
        resource
    }

    /// The status subresource, decoded.
    pub fn resource_status(&self) -> Option<MysqlDeploymentStatus> {
        self.stored_status
            .clone()
            .map(|value| serde_json::from_value(value).unwrap())
    }

    /// The root credential persisted so far.
    pub fn persisted_secret(&self) -> Option<&str> {
        self.persisted.get(PASSWORD_SECRET_KEY).map(String::as_str)
    }

    pub fn last_status(&self) -> Option<&UnitStatus> {
        self.statuses.last()
    }
}
