//! Reconciliation loop for MysqlDeployment.
//!
//! [`configure_pod`] decides what should happen for a deployment given its
//! configuration, image resource and this replica's leadership. It touches
//! nothing outside the secret store it is handed. [`reconcile`] is the
//! controller entry point that loads stored state, carries out the outcome
//! against the Kubernetes API and reports status.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::{
    Api, ResourceExt,
    api::{DeleteParams, Patch, PatchParams},
    runtime::controller::Action,
};
use tracing::{debug, error, info, warn};

use crate::{
    controller::{
        context::{Context, FIELD_MANAGER},
        error::Error,
        status::{IMAGE_FETCH_FAILED, UnitStatus},
    },
    crd::{MYSQL_IMAGE_RESOURCE, MysqlDeployment},
    image::{ImageResolver, OciImageResource},
    resources::{
        common::image_pull_secret_name,
        pod_spec::{PodSpecDocument, build_pod_spec},
        secrets::generate_image_pull_secret,
        services::{generate_client_service, generate_headless_service},
        statefulset::generate_statefulset,
    },
    state::{
        PASSWORD_SECRET_LENGTH, SecretStore, StateStore, StoredState,
        kube_store::{load_stored_state, save_stored_state},
    },
};

/// Periodic resync for healthy deployments
const ACTIVE_REQUEUE: Duration = Duration::from_secs(300);
/// How often a non-leader rechecks so it picks up work after an election
const STANDBY_REQUEUE: Duration = Duration::from_secs(30);

/// What a reconciliation decided to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This replica is not the leader and leaves cluster state alone.
    Standby,
    /// The deployment cannot progress until its inputs change.
    Blocked(String),
    /// The document to apply to the cluster.
    Apply(PodSpecDocument),
}

impl ReconcileOutcome {
    /// Status to report once the outcome has been carried out.
    pub fn status(&self) -> UnitStatus {
        match self {
            ReconcileOutcome::Standby | ReconcileOutcome::Apply(_) => UnitStatus::Active,
            ReconcileOutcome::Blocked(reason) => UnitStatus::blocked(reason.clone()),
        }
    }

    /// The document to apply, if any.
    pub fn pod_spec(&self) -> Option<&PodSpecDocument> {
        match self {
            ReconcileOutcome::Apply(document) => Some(document),
            _ => None,
        }
    }

    /// When to look at the deployment again; `None` waits for a change.
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            ReconcileOutcome::Standby => Some(STANDBY_REQUEUE),
            ReconcileOutcome::Blocked(_) => None,
            ReconcileOutcome::Apply(_) => Some(ACTIVE_REQUEUE),
        }
    }

    /// Whether this outcome writes to the cluster.
    pub fn mutates(&self) -> bool {
        !matches!(self, ReconcileOutcome::Standby)
    }

    fn action(&self) -> Action {
        match self.requeue_after() {
            Some(duration) => Action::requeue(duration),
            None => Action::await_change(),
        }
    }
}

/// What to do with the image pull Secret for a document.
#[derive(Clone, Debug, PartialEq)]
pub enum PullSecretPlan {
    Apply(Secret),
    Remove,
}

/// Decide the image pull Secret for `document`.
pub fn pull_secret_plan(
    obj: &MysqlDeployment,
    document: &PodSpecDocument,
) -> Result<PullSecretPlan, Error> {
    let credentials = document
        .containers
        .iter()
        .find(|c| c.image_details.has_credentials());
    match credentials {
        Some(container) => Ok(generate_image_pull_secret(obj, &container.image_details)?
            .map_or(PullSecretPlan::Remove, PullSecretPlan::Apply)),
        None => Ok(PullSecretPlan::Remove),
    }
}

/// Body of the status merge patch for `status`.
///
/// Every field is present, so a recovered deployment clears its old reason.
pub fn status_patch(
    obj: &MysqlDeployment,
    status: &UnitStatus,
    pod_spec_version: Option<u32>,
) -> serde_json::Value {
    let resource_status =
        status.to_resource_status(obj.metadata.generation, pod_spec_version, obj.status.as_ref());
    serde_json::json!({ "status": resource_status })
}

/// Treat a 404 from the API server as success.
pub fn ignore_not_found<T>(result: kube::Result<T>) -> kube::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
        Err(e) => Err(e),
    }
}

/// Decide the pod configuration for a deployment.
///
/// Non-leaders stand by. The leader resolves the image first; on failure the
/// deployment is blocked and the secret store is not touched. Otherwise the
/// root credential is fetched (or generated) and the document built.
pub fn configure_pod<R, S>(
    is_leader: bool,
    workload_name: &str,
    config: &BTreeMap<String, String>,
    image: &R,
    secrets: &mut SecretStore<S>,
) -> ReconcileOutcome
where
    R: ImageResolver + ?Sized,
    S: StateStore,
{
    if !is_leader {
        return ReconcileOutcome::Standby;
    }

    let image_details = match image.fetch() {
        Ok(details) => details,
        Err(e) => {
            error!(name = %workload_name, error = %e, "An error occurred while fetching the image info");
            return ReconcileOutcome::Blocked(IMAGE_FETCH_FAILED.to_string());
        }
    };

    let secret = secrets.get_or_create_secret(PASSWORD_SECRET_LENGTH);
    ReconcileOutcome::Apply(build_pod_spec(
        workload_name,
        config,
        &image_details,
        &secret,
    ))
}

/// Reconcile a MysqlDeployment
///
/// This is the main reconciliation function called by the controller.
pub async fn reconcile(obj: Arc<MysqlDeployment>, ctx: Arc<Context>) -> Result<Action, Error> {
    let start_time = Instant::now();
    let name = obj.name_any();
    let namespace = obj
        .namespace()
        .ok_or_else(|| Error::MissingField("metadata.namespace".to_string()))?;
    let is_leader = ctx.is_leader();

    debug!(name = %name, namespace = %namespace, is_leader, "Reconciling MysqlDeployment");

    let secret_api: Api<Secret> = Api::namespaced(ctx.client.clone(), &namespace);
    let mut stored_state = if is_leader {
        load_stored_state(&secret_api, &obj).await?
    } else {
        StoredState::default()
    };

    let resolver = OciImageResource::new(MYSQL_IMAGE_RESOURCE, &obj.spec.resources);
    let outcome = configure_pod(
        is_leader,
        &name,
        &obj.spec.config,
        &resolver,
        &mut SecretStore::new(&mut stored_state),
    );
    let status = outcome.status();
    let status_changed = status.differs_from(obj.status.as_ref(), obj.metadata.generation);

    match &outcome {
        ReconcileOutcome::Standby => {
            debug!(name = %name, "Not the leader, standing by");
        }
        ReconcileOutcome::Blocked(reason) => {
            warn!(name = %name, reason = %reason, "Deployment blocked");
            if status_changed {
                ctx.publish_warning_event(&obj, "ImageFetchFailed", "Reconciling", Some(reason.clone()))
                    .await;
            }
            update_status(&obj, &ctx, &namespace, &status, None).await?;
        }
        ReconcileOutcome::Apply(document) => {
            // Persist the credential before anything references it
            save_stored_state(&secret_api, &obj, &mut stored_state).await?;
            apply_pod_spec(&obj, &ctx, &namespace, document).await?;

            if let Some(ref health_state) = ctx.health_state {
                health_state.metrics.record_pod_spec_applied(&namespace, &name);
            }
            if status_changed {
                info!(name = %name, version = document.version, "Applied pod spec");
                ctx.publish_normal_event(
                    &obj,
                    "PodSpecApplied",
                    "Reconciling",
                    Some(format!("Applied pod spec version {}", document.version)),
                )
                .await;
            }
            update_status(&obj, &ctx, &namespace, &status, Some(document.version)).await?;
        }
    }

    if let Some(ref health_state) = ctx.health_state {
        let duration = start_time.elapsed().as_secs_f64();
        health_state
            .metrics
            .record_reconcile(&namespace, &name, duration);
        health_state
            .metrics
            .set_unit_status(&namespace, &name, &status);
        health_state
            .set_unit_status(&namespace, &name, status)
            .await;
    }

    Ok(outcome.action())
}

/// Error policy for the controller
pub fn error_policy(obj: Arc<MysqlDeployment>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    // Record error metric
    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_error(&namespace, &name);
    }

    if error.is_not_found() {
        debug!(name = %name, "Resource not found (likely deleted)");
        return Action::await_change();
    }

    if error.is_retryable() {
        warn!(name = %name, error = %error, "Retryable error, will retry");
    } else {
        error!(name = %name, error = %error, "Non-retryable error");
    }
    Action::requeue(error.requeue_after())
}

/// Render the document and apply the owned resources.
///
/// Server-side apply with a fixed field manager makes repeated applies of
/// the same document a no-op.
async fn apply_pod_spec(
    obj: &MysqlDeployment,
    ctx: &Context,
    namespace: &str,
    document: &PodSpecDocument,
) -> Result<(), Error> {
    let name = obj.name_any();
    let params = PatchParams::apply(FIELD_MANAGER).force();

    // Image pull secret, removed again once credentials are dropped
    let secret_api: Api<Secret> = Api::namespaced(ctx.client.clone(), namespace);
    let pull_secret_name = image_pull_secret_name(obj);
    match pull_secret_plan(obj, document)? {
        PullSecretPlan::Apply(secret) => {
            secret_api
                .patch(&pull_secret_name, &params, &Patch::Apply(&secret))
                .await?;
        }
        PullSecretPlan::Remove => {
            let deleted = ignore_not_found(
                secret_api
                    .delete(&pull_secret_name, &DeleteParams::default())
                    .await,
            )?;
            if deleted.is_some() {
                debug!(name = %name, "Removed stale image pull secret");
            }
        }
    }

    let svc_api: Api<Service> = Api::namespaced(ctx.client.clone(), namespace);
    let headless = generate_headless_service(obj, document);
    if let Some(ref svc_name) = headless.metadata.name {
        svc_api
            .patch(svc_name, &params, &Patch::Apply(&headless))
            .await?;
    }
    let client_svc = generate_client_service(obj, document);
    if let Some(ref svc_name) = client_svc.metadata.name {
        svc_api
            .patch(svc_name, &params, &Patch::Apply(&client_svc))
            .await?;
    }

    let sts_api: Api<StatefulSet> = Api::namespaced(ctx.client.clone(), namespace);
    let statefulset = generate_statefulset(obj, document);
    sts_api
        .patch(&name, &params, &Patch::Apply(&statefulset))
        .await?;

    debug!(name = %name, "Applied owned resources");
    Ok(())
}

/// Write the unit status to the MysqlDeployment (leader only).
async fn update_status(
    obj: &MysqlDeployment,
    ctx: &Context,
    namespace: &str,
    status: &UnitStatus,
    pod_spec_version: Option<u32>,
) -> Result<(), Error> {
    let api: Api<MysqlDeployment> = Api::namespaced(ctx.client.clone(), namespace);
    let patch = status_patch(obj, status, pod_spec_version);

    api.patch_status(
        &obj.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    Ok(())
}
