//! Test fixtures and builder patterns for MysqlDeployment.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use mysql_operator::crd::{
    MYSQL_IMAGE_RESOURCE, MysqlDeployment, MysqlDeploymentSpec, OciImageResourceSpec,
};
use std::collections::BTreeMap;

/// Builder for creating MysqlDeployment test fixtures.
///
/// # Example
/// ```
/// let resource = MysqlDeploymentBuilder::new("mysql")
///     .namespace("db")
///     .image("mysql:8.0")
///     .config("max-connections", "200")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct MysqlDeploymentBuilder {
    name: String,
    namespace: Option<String>,
    config: BTreeMap<String, String>,
    image: Option<OciImageResourceSpec>,
    labels: BTreeMap<String, String>,
    generation: Option<i64>,
    uid: Option<String>,
}

impl MysqlDeploymentBuilder {
    /// Create a new builder with the given resource name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            config: BTreeMap::new(),
            image: None,
            labels: BTreeMap::new(),
            generation: None,
            uid: None,
        }
    }

    /// Set the namespace for the resource.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Declare the MySQL image resource with a registry path.
    pub fn image(mut self, registry_path: impl Into<String>) -> Self {
        self.image = Some(OciImageResourceSpec {
            registry_path: Some(registry_path.into()),
            ..Default::default()
        });
        self
    }

    /// Declare the MySQL image resource with registry credentials.
    pub fn private_image(
        mut self,
        registry_path: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.image = Some(OciImageResourceSpec {
            registry_path: Some(registry_path.into()),
            username: Some(username.into()),
            password: Some(password.into()),
        });
        self
    }

    /// Declare the MySQL image resource verbatim.
    pub fn image_resource(mut self, spec: OciImageResourceSpec) -> Self {
        self.image = Some(spec);
        self
    }

    /// Set a configuration option.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Add a label to managed resources.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Set the generation (for testing status updates).
    pub fn generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Set the UID (for testing owner references).
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Build the MysqlDeployment.
    pub fn build(self) -> MysqlDeployment {
        let mut resources = BTreeMap::new();
        if let Some(image) = self.image {
            resources.insert(MYSQL_IMAGE_RESOURCE.to_string(), image);
        }

        MysqlDeployment {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: self.namespace,
                generation: self.generation,
                uid: self.uid,
                ..Default::default()
            },
            spec: MysqlDeploymentSpec {
                config: self.config,
                resources,
                labels: self.labels,
            },
            status: None,
        }
    }
}

impl Default for MysqlDeploymentBuilder {
    fn default() -> Self {
        Self::new("mysql")
    }
}

/// Create a MysqlDeployment without an image resource.
pub fn minimal_resource(name: &str) -> MysqlDeployment {
    MysqlDeploymentBuilder::new(name).build()
}

/// Create a MysqlDeployment with common test defaults.
pub fn test_resource(name: &str, namespace: &str) -> MysqlDeployment {
    MysqlDeploymentBuilder::new(name)
        .namespace(namespace)
        .image("mysql:8.0")
        .generation(1)
        .uid(format!("test-uid-{}", name))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let resource = MysqlDeploymentBuilder::new("test").build();
        assert_eq!(resource.metadata.name, Some("test".to_string()));
        assert!(resource.spec.resources.is_empty());
    }

    #[test]
    fn test_builder_with_options() {
        let resource = MysqlDeploymentBuilder::new("test")
            .namespace("my-ns")
            .image("mysql:8.0")
            .config("max-connections", "200")
            .label("team", "payments")
            .build();

        assert_eq!(resource.metadata.namespace, Some("my-ns".to_string()));
        assert!(resource.spec.resources.contains_key(MYSQL_IMAGE_RESOURCE));
        assert_eq!(resource.spec.config.len(), 1);
        assert_eq!(resource.spec.labels.len(), 1);
    }
}
