//! Pod spec document construction.
//!
//! The pod spec document is the operator's canonical description of the
//! MySQL workload. It is built from fully-typed values only, so it is
//! either complete or not built at all.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::image::ImageDetails;

/// Schema revision of the pod spec document.
pub const POD_SPEC_VERSION: u32 = 3;

/// Port MySQL listens on.
pub const MYSQL_PORT: i32 = 3306;

/// Environment variable carrying the root credential.
pub const ROOT_PASSWORD_ENV: &str = "MYSQL_ROOT_PASSWORD";

/// Versioned description of the workload's containers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpecDocument {
    pub version: u32,
    pub containers: Vec<ContainerSpec>,
}

/// One container in a pod spec document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub name: String,
    pub image_details: ImageDetails,
    pub ports: Vec<PortSpec>,
    pub env_config: BTreeMap<String, String>,
}

/// A port opened by a container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    pub container_port: i32,
    pub protocol: String,
}

impl PodSpecDocument {
    /// Serialize to the JSON form consumed by the orchestrator.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Build the pod spec document for the MySQL workload.
///
/// `workload_name` is the deployment's own name. `config` is accepted so
/// callers hand over the full reconciliation context, but no option
/// currently affects the document.
pub fn build_pod_spec(
    workload_name: &str,
    _config: &BTreeMap<String, String>,
    image: &ImageDetails,
    secret: &str,
) -> PodSpecDocument {
    let mut env_config = BTreeMap::new();
    env_config.insert(ROOT_PASSWORD_ENV.to_string(), secret.to_string());

    PodSpecDocument {
        version: POD_SPEC_VERSION,
        containers: vec![ContainerSpec {
            name: workload_name.to_string(),
            image_details: image.clone(),
            ports: vec![PortSpec {
                container_port: MYSQL_PORT,
                protocol: "TCP".to_string(),
            }],
            env_config,
        }],
    }
}
