//! StatefulSet generation for MySQL deployments.
//!
//! Renders a [`PodSpecDocument`] into a single-replica StatefulSet:
//! - Stable network identity via the headless service
//! - One container per document container, image taken verbatim
//! - Root credential read from the state Secret instead of inlined
//! - Image pull secret when the image details carry credentials

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, LocalObjectReference, PodSpec,
    PodTemplateSpec, SecretKeySelector,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;

use crate::crd::MysqlDeployment;
use crate::resources::common::{
    headless_service_name, image_pull_secret_name, owner_reference, pod_selector_labels,
    standard_labels, state_secret_name,
};
use crate::resources::pod_spec::{ContainerSpec, PodSpecDocument, PortSpec, ROOT_PASSWORD_ENV};
use crate::state::PASSWORD_SECRET_KEY;

/// Annotation recording which pod spec document version was rendered.
pub const POD_SPEC_VERSION_ANNOTATION: &str = "mysqloperator.smoketurner.com/pod-spec-version";

/// Grace period for MySQL to flush and shut down cleanly.
const TERMINATION_GRACE_PERIOD: i64 = 60;

/// Generate a StatefulSet for a MysqlDeployment from its pod spec document.
pub fn generate_statefulset(resource: &MysqlDeployment, document: &PodSpecDocument) -> StatefulSet {
    let name = resource.name_any();
    let labels = standard_labels(resource);

    let mut annotations = BTreeMap::new();
    annotations.insert(
        POD_SPEC_VERSION_ANNOTATION.to_string(),
        document.version.to_string(),
    );

    StatefulSet {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: resource.namespace(),
            labels: Some(labels.clone()),
            annotations: Some(annotations.clone()),
            owner_references: Some(vec![owner_reference(resource)]),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: Some(headless_service_name(resource)),
            selector: LabelSelector {
                match_labels: Some(pod_selector_labels(resource)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some(annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    termination_grace_period_seconds: Some(TERMINATION_GRACE_PERIOD),
                    containers: document
                        .containers
                        .iter()
                        .map(|c| render_container(resource, c))
                        .collect(),
                    image_pull_secrets: image_pull_secrets(resource, document),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Render one document container into a Kubernetes container.
fn render_container(resource: &MysqlDeployment, container: &ContainerSpec) -> Container {
    Container {
        name: container.name.clone(),
        image: Some(container.image_details.image_path.clone()),
        ports: Some(container.ports.iter().map(render_port).collect()),
        env: Some(
            container
                .env_config
                .iter()
                .map(|(name, value)| render_env(resource, name, value))
                .collect(),
        ),
        ..Default::default()
    }
}

/// The root credential is referenced from the state Secret, where it is
/// persisted before any StatefulSet is applied.
fn render_env(resource: &MysqlDeployment, name: &str, value: &str) -> EnvVar {
    if name == ROOT_PASSWORD_ENV {
        return EnvVar {
            name: name.to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: state_secret_name(resource),
                    key: PASSWORD_SECRET_KEY.to_string(),
                    optional: Some(false),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
    }
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn render_port(port: &PortSpec) -> ContainerPort {
    ContainerPort {
        container_port: port.container_port,
        name: Some(port_name(port)),
        protocol: Some(port.protocol.clone()),
        ..Default::default()
    }
}

/// Name for a document port, e.g. `tcp-3306`.
pub fn port_name(port: &PortSpec) -> String {
    format!("{}-{}", port.protocol.to_lowercase(), port.container_port)
}

fn image_pull_secrets(
    resource: &MysqlDeployment,
    document: &PodSpecDocument,
) -> Option<Vec<LocalObjectReference>> {
    document
        .containers
        .iter()
        .any(|c| c.image_details.has_credentials())
        .then(|| {
            vec![LocalObjectReference {
                name: image_pull_secret_name(resource),
            }]
        })
}
