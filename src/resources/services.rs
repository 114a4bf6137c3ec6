//! Service generation for MySQL deployments.
//!
//! Creates two services exposing the ports declared in the pod spec document:
//! - **Headless Service**: Stable network identity for the StatefulSet pod
//! - **Client Service**: ClusterIP endpoint for database clients

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::crd::MysqlDeployment;
use crate::resources::common::{
    client_service_name, headless_service_name, owned_metadata, pod_selector_labels,
};
use crate::resources::pod_spec::PodSpecDocument;
use crate::resources::statefulset::port_name;

/// Generate a headless Service for the StatefulSet.
pub fn generate_headless_service(resource: &MysqlDeployment, document: &PodSpecDocument) -> Service {
    let mut metadata = owned_metadata(resource, headless_service_name(resource));
    if let Some(labels) = metadata.labels.as_mut() {
        labels.insert(
            "app.kubernetes.io/service-type".to_string(),
            "headless".to_string(),
        );
    }

    Service {
        metadata,
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            publish_not_ready_addresses: Some(true),
            selector: Some(pod_selector_labels(resource)),
            ports: Some(service_ports(document)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Generate the client-facing ClusterIP Service.
pub fn generate_client_service(resource: &MysqlDeployment, document: &PodSpecDocument) -> Service {
    Service {
        metadata: owned_metadata(resource, client_service_name(resource)),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(pod_selector_labels(resource)),
            ports: Some(service_ports(document)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// One service port per container port in the document.
fn service_ports(document: &PodSpecDocument) -> Vec<ServicePort> {
    document
        .containers
        .iter()
        .flat_map(|c| c.ports.iter())
        .map(|port| ServicePort {
            port: port.container_port,
            target_port: Some(IntOrString::String(port_name(port))),
            name: Some(port_name(port)),
            protocol: Some(port.protocol.clone()),
            ..Default::default()
        })
        .collect()
}
