//! Stored state persisted in a Kubernetes Secret.
//!
//! The Secret is named `<deployment>-operator-state` and owned by the
//! MysqlDeployment, so the stored state lives exactly as long as the
//! deployment does.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use tracing::debug;

use crate::controller::context::FIELD_MANAGER;
use crate::controller::error::{Error, Result};
use crate::crd::MysqlDeployment;
use crate::resources::common::state_secret_name;
use crate::resources::secrets::generate_state_secret;
use crate::state::StoredState;

/// Load the stored state for a deployment.
///
/// A missing Secret yields an empty state.
pub async fn load_stored_state(
    api: &Api<Secret>,
    resource: &MysqlDeployment,
) -> Result<StoredState> {
    let name = state_secret_name(resource);
    let Some(secret) = api.get_opt(&name).await? else {
        debug!(secret = %name, "No stored state yet");
        return Ok(StoredState::default());
    };

    decode_stored_state(&secret).map(StoredState::from_values)
}

/// Write the stored state back if it changed since it was loaded.
pub async fn save_stored_state(
    api: &Api<Secret>,
    resource: &MysqlDeployment,
    state: &mut StoredState,
) -> Result<()> {
    if !state.is_dirty() {
        return Ok(());
    }

    let secret = generate_state_secret(resource, state.values());
    let name = state_secret_name(resource);
    api.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&secret),
    )
    .await?;

    debug!(deployment = %resource.name_any(), secret = %name, "Persisted stored state");
    state.mark_clean();
    Ok(())
}

/// Decode a state Secret's data into string values.
pub fn decode_stored_state(secret: &Secret) -> Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();
    for (key, bytes) in secret.data.iter().flatten() {
        let value = String::from_utf8(bytes.0.clone()).map_err(|_| {
            Error::StoredState(format!("key '{}' of secret '{}' is not UTF-8", key, secret.name_any()))
        })?;
        values.insert(key.clone(), value);
    }
    Ok(values)
}
