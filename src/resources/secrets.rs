//! Secret generation for MySQL deployments.
//!
//! - **State Secret**: the operator's stored state (root credential)
//! - **Image Pull Secret**: registry credentials from the image details

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;

use crate::crd::MysqlDeployment;
use crate::image::ImageDetails;
use crate::resources::common::{image_pull_secret_name, owned_metadata, state_secret_name};

/// Secret type for registry credentials.
pub const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";

/// Key of the registry credentials within the pull secret.
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// Generate the Secret holding the operator's stored state.
///
/// Owned by the MysqlDeployment so it is removed together with it.
pub fn generate_state_secret(
    resource: &MysqlDeployment,
    values: &BTreeMap<String, String>,
) -> Secret {
    Secret {
        metadata: owned_metadata(resource, state_secret_name(resource)),
        type_: Some("Opaque".to_string()),
        string_data: Some(values.clone()),
        ..Default::default()
    }
}

/// Generate an image pull Secret, if the image needs credentials.
pub fn generate_image_pull_secret(
    resource: &MysqlDeployment,
    image: &ImageDetails,
) -> Result<Option<Secret>, serde_json::Error> {
    let (Some(username), Some(password)) = (&image.username, &image.password) else {
        return Ok(None);
    };

    let config = serde_json::json!({
        "auths": {
            image.registry_host(): {
                "username": username,
                "password": password,
            }
        }
    });

    let mut string_data = BTreeMap::new();
    string_data.insert(
        DOCKER_CONFIG_JSON_KEY.to_string(),
        serde_json::to_string(&config)?,
    );

    Ok(Some(Secret {
        metadata: owned_metadata(resource, image_pull_secret_name(resource)),
        type_: Some(DOCKER_CONFIG_JSON_TYPE.to_string()),
        string_data: Some(string_data),
        ..Default::default()
    }))
}
