//! MysqlDeployment Custom Resource Definition.
//!
//! A MysqlDeployment declares one MySQL workload: free-form configuration
//! options and the OCI image resources the operator may pull from. The
//! operator derives the pod spec, root credential and status from it.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the image resource the MySQL container is resolved from.
pub const MYSQL_IMAGE_RESOURCE: &str = "mysql-image";

/// MysqlDeployment is a custom resource for running a MySQL instance.
///
/// Example:
/// ```yaml
/// apiVersion: mysqloperator.smoketurner.com/v1alpha1
/// kind: MysqlDeployment
/// metadata:
///   name: mysql
/// spec:
///   resources:
///     mysql-image:
///       registryPath: mysql:8.0
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "mysqloperator.smoketurner.com",
    version = "v1alpha1",
    kind = "MysqlDeployment",
    plural = "mysqldeployments",
    shortname = "mysqld",
    status = "MysqlDeploymentStatus",
    namespaced,
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Message", "type":"string", "jsonPath":".status.message"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MysqlDeploymentSpec {
    /// Configuration options for the deployment.
    /// Options are carried through reconciliation; the current pod spec
    /// policy does not read any of them.
    #[serde(default)]
    pub config: BTreeMap<String, String>,

    /// OCI image resources keyed by resource name.
    /// The MySQL container is resolved from the `mysql-image` entry.
    #[serde(default)]
    pub resources: BTreeMap<String, OciImageResourceSpec>,

    /// Additional labels to apply to all managed resources.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// An OCI image resource: where to pull from and how to authenticate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OciImageResourceSpec {
    /// Full image reference, e.g. `registry.example.com/db/mysql:8.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<String>,

    /// Registry username, if the registry requires authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Registry password, required whenever `username` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Status of a MysqlDeployment.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MysqlDeploymentStatus {
    /// Unit state reported by the leader.
    #[serde(default)]
    pub state: UnitState,

    /// Human-readable reason accompanying a Blocked or Waiting state.
    ///
    /// Always serialized so a merge patch clears a stale reason.
    #[serde(default)]
    pub message: Option<String>,

    /// The generation observed by the operator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Version tag of the last pod spec document applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_spec_version: Option<u32>,

    /// Conditions representing the deployment's current state.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Unit state as shown on the custom resource.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum UnitState {
    /// The workload is configured and healthy.
    #[default]
    Active,
    /// Operator intervention is needed before progress can be made.
    Blocked,
    /// The unit is waiting on something outside its control.
    Waiting,
}

impl std::fmt::Display for UnitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitState::Active => write!(f, "Active"),
            UnitState::Blocked => write!(f, "Blocked"),
            UnitState::Waiting => write!(f, "Waiting"),
        }
    }
}

/// Condition describes the state of a deployment at a certain point.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition.
    pub r#type: String,
    /// Status of the condition ("True", "False", "Unknown").
    pub status: String,
    /// Machine-readable reason for the condition's last transition.
    pub reason: String,
    /// Human-readable message indicating details about last transition.
    pub message: String,
    /// Last time the condition transitioned from one status to another.
    pub last_transition_time: String,
    /// The generation of the resource this condition was observed for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a new condition.
    pub fn new(
        condition_type: &str,
        status: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: if status {
                "True".to_string()
            } else {
                "False".to_string()
            },
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: jiff::Timestamp::now().to_string(),
            observed_generation: generation,
        }
    }

    /// Create a "Ready" condition.
    pub fn ready(ready: bool, reason: &str, message: &str, generation: Option<i64>) -> Self {
        Self::new("Ready", ready, reason, message, generation)
    }

    /// Create a "Progressing" condition.
    pub fn progressing(
        progressing: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self::new("Progressing", progressing, reason, message, generation)
    }

    /// Create a "Degraded" condition.
    pub fn degraded(degraded: bool, reason: &str, message: &str, generation: Option<i64>) -> Self {
        Self::new("Degraded", degraded, reason, message, generation)
    }
}
