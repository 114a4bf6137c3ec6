//! OCI image resolution.
//!
//! The reconciler never pulls images itself. It asks an [`ImageResolver`] for
//! the pull metadata of the MySQL image and attaches the result verbatim to
//! the pod spec. A failed resolution blocks the deployment until the
//! resource declaration changes.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crd::OciImageResourceSpec;

/// Registry assumed for references without an explicit registry host.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Loose validation of `[host[:port]/]path[:tag][@digest]` image references.
const IMAGE_REFERENCE_PATTERN: &str = r"^(?:[a-zA-Z0-9.-]+(?::[0-9]+)?/)?[a-z0-9]+(?:[._-][a-z0-9]+)*(?:/[a-z0-9]+(?:[._-][a-z0-9]+)*)*(?::[A-Za-z0-9_][A-Za-z0-9_.-]{0,127})?(?:@sha256:[a-f0-9]{64})?$";

#[allow(clippy::expect_used)]
static IMAGE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IMAGE_REFERENCE_PATTERN).expect("valid image reference pattern"));

/// Errors raised while resolving an image resource.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageResolutionError {
    /// No resource is declared under the requested name.
    #[error("image resource '{0}' is not declared")]
    Missing(String),

    /// The resource exists but cannot be turned into pull metadata.
    #[error("image resource '{resource}' is invalid: {reason}")]
    Invalid { resource: String, reason: String },
}

impl ImageResolutionError {
    fn invalid(resource: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            resource: resource.to_string(),
            reason: reason.into(),
        }
    }
}

/// Concrete pull metadata for a container image.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetails {
    pub image_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ImageDetails {
    /// Whether pulling this image needs registry credentials.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Registry host the image is pulled from.
    pub fn registry_host(&self) -> &str {
        registry_host(&self.image_path)
    }
}

/// Resolves a named image reference to pull metadata.
pub trait ImageResolver {
    /// Fetch the pull metadata, or fail if the declaration is unusable.
    fn fetch(&self) -> Result<ImageDetails, ImageResolutionError>;
}

/// An image resource declared in a MysqlDeployment's `spec.resources`.
#[derive(Debug, Clone, Copy)]
pub struct OciImageResource<'a> {
    name: &'a str,
    resources: &'a BTreeMap<String, OciImageResourceSpec>,
}

impl<'a> OciImageResource<'a> {
    pub fn new(name: &'a str, resources: &'a BTreeMap<String, OciImageResourceSpec>) -> Self {
        Self { name, resources }
    }

    /// Name of the resource this resolver reads.
    pub fn name(&self) -> &str {
        self.name
    }
}

impl ImageResolver for OciImageResource<'_> {
    fn fetch(&self) -> Result<ImageDetails, ImageResolutionError> {
        let spec = self
            .resources
            .get(self.name)
            .ok_or_else(|| ImageResolutionError::Missing(self.name.to_string()))?;

        let image_path = spec
            .registry_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ImageResolutionError::invalid(self.name, "registryPath is required"))?;

        if !IMAGE_REFERENCE.is_match(image_path) {
            return Err(ImageResolutionError::invalid(
                self.name,
                format!("'{}' is not a valid image reference", image_path),
            ));
        }

        match (&spec.username, &spec.password) {
            (Some(_), None) => Err(ImageResolutionError::invalid(
                self.name,
                "username is set without a password",
            )),
            (None, Some(_)) => Err(ImageResolutionError::invalid(
                self.name,
                "password is set without a username",
            )),
            (username, password) => Ok(ImageDetails {
                image_path: image_path.to_string(),
                username: username.clone(),
                password: password.clone(),
            }),
        }
    }
}

/// Extract the registry host from an image reference.
///
/// The first path component is a host only if it looks like one
/// (contains `.` or `:`, or is `localhost`).
pub fn registry_host(image_path: &str) -> &str {
    match image_path.split_once('/') {
        Some((first, _)) if first.contains('.') || first.contains(':') || first == "localhost" => {
            first
        }
        _ => DEFAULT_REGISTRY,
    }
}
