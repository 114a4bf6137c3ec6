//! Common resource generation utilities.
//!
//! Naming, labels and owner references shared by every object the operator
//! manages for a MysqlDeployment.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;

use crate::crd::MysqlDeployment;

/// Value of the `app.kubernetes.io/managed-by` label.
pub const MANAGED_BY: &str = "mysql-operator";

/// Standard labels applied to all managed resources
///
/// User-defined labels never override the operator's identity labels, so the
/// pod template always matches [`pod_selector_labels`].
pub fn standard_labels(resource: &MysqlDeployment) -> BTreeMap<String, String> {
    let mut labels = resource.spec.labels.clone();
    labels.insert(
        "app.kubernetes.io/component".to_string(),
        "database".to_string(),
    );
    labels.extend(pod_selector_labels(resource));
    labels
}

/// Labels used to select the deployment's pods.
///
/// Kept independent of user labels so selectors never change.
pub fn pod_selector_labels(resource: &MysqlDeployment) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/name".to_string(), resource.name_any());
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGED_BY.to_string(),
    );
    labels
}

/// Create owner reference for a MysqlDeployment
pub fn owner_reference(resource: &MysqlDeployment) -> OwnerReference {
    OwnerReference {
        api_version: "mysqloperator.smoketurner.com/v1alpha1".to_string(),
        kind: "MysqlDeployment".to_string(),
        name: resource.name_any(),
        uid: resource.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Metadata for an owned object named `name`.
pub fn owned_metadata(resource: &MysqlDeployment, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: resource.namespace(),
        labels: Some(standard_labels(resource)),
        owner_references: Some(vec![owner_reference(resource)]),
        ..Default::default()
    }
}

/// Name of the headless service backing the StatefulSet.
pub fn headless_service_name(resource: &MysqlDeployment) -> String {
    format!("{}-endpoints", resource.name_any())
}

/// Name of the client-facing service.
pub fn client_service_name(resource: &MysqlDeployment) -> String {
    resource.name_any()
}

/// Name of the Secret holding the operator's stored state.
pub fn state_secret_name(resource: &MysqlDeployment) -> String {
    format!("{}-operator-state", resource.name_any())
}

/// Name of the image pull Secret.
pub fn image_pull_secret_name(resource: &MysqlDeployment) -> String {
    format!("{}-image-pull", resource.name_any())
}
