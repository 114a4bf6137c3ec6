//! mysql-operator library crate
//!
//! This module exports the controller, CRD definitions, image resolution,
//! stored state, resource generators and operational actions.

pub mod actions;
pub mod controller;
pub mod crd;
pub mod health;
pub mod image;
pub mod resources;
pub mod state;

pub use health::HealthState;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use futures::{Stream, StreamExt};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{Controller, WatchStreamExt, metadata_watcher, predicates, reflector, watcher};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use controller::{context::Context, reconciler::reconcile};
use crd::MysqlDeployment;

/// Create namespaced or cluster-wide API based on scope
pub fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Create the default watcher configuration for all controllers.
fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Create a filtered stream for a resource type with standard optimizations.
///
/// This creates a reflector-backed stream that:
/// - Maintains an in-memory cache via reflector
/// - Uses automatic retry with exponential backoff on errors
/// - Converts watch events to objects (Added/Modified only)
/// - Filters out status-only updates via generation predicate, so only
///   configuration changes trigger reconciliation
///
/// Returns the reflector store (for cache lookups) and the filtered stream.
fn create_filtered_stream<K>(
    api: Api<K>,
    watcher_config: WatcherConfig,
) -> (
    reflector::Store<K>,
    impl Stream<Item = Result<K, watcher::Error>>,
)
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    let (reader, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watcher_config))
        .default_backoff()
        .applied_objects()
        .predicate_filter(predicates::generation);
    (reader, stream)
}

/// Run the operator controller (cluster-wide).
///
/// Every replica runs the controller; `leadership` decides whether a
/// reconciliation may mutate cluster state.
pub async fn run_controller(
    client: Client,
    health_state: Option<Arc<HealthState>>,
    leadership: Arc<AtomicBool>,
) {
    run_controller_scoped(client, health_state, leadership, None).await
}

/// Run the operator controller with optional namespace scoping.
///
/// When `namespace` is `Some(ns)`, only watches resources in that namespace.
/// When `namespace` is `None`, watches resources cluster-wide.
pub async fn run_controller_scoped(
    client: Client,
    health_state: Option<Arc<HealthState>>,
    leadership: Arc<AtomicBool>,
    namespace: Option<&str>,
) {
    let scope_msg = namespace.unwrap_or("cluster-wide");
    info!(
        "Starting controller for MysqlDeployment resources (scope: {})",
        scope_msg
    );

    // Mark as ready once we start the controller
    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let ctx = Arc::new(Context::new(client.clone(), health_state.clone(), leadership));

    let deployments: Api<MysqlDeployment> = scoped_api(client.clone(), namespace);
    let statefulsets: Api<StatefulSet> = scoped_api(client.clone(), namespace);
    let services: Api<Service> = scoped_api(client.clone(), namespace);
    let secrets: Api<Secret> = scoped_api(client.clone(), namespace);

    let watcher_config = default_watcher_config();

    let (reader, resource_stream) = create_filtered_stream(deployments, watcher_config.clone());

    // Owned objects only need to signal that they changed, so metadata
    // watches are enough for all of them.
    Controller::for_stream(resource_stream, reader)
        .owns_stream(metadata_watcher(statefulsets, watcher_config.clone()).touched_objects())
        .owns_stream(metadata_watcher(services, watcher_config.clone()).touched_objects())
        .owns_stream(metadata_watcher(secrets, watcher_config).touched_objects())
        .run(reconcile, controller::reconciler::error_policy, ctx)
        .for_each(|result| {
            let health_state = health_state.clone();
            async move {
                match result {
                    Ok((obj, _action)) => {
                        debug!("Reconciled: {}", obj.name);
                    }
                    Err(e) => {
                        // ObjectNotFound errors are expected after deletion when
                        // owned-object events trigger reconciliation.
                        let deleted = match &e {
                            kube::runtime::controller::Error::ObjectNotFound(obj_ref) => {
                                Some(obj_ref)
                            }
                            kube::runtime::controller::Error::ReconcilerFailed(err, obj_ref)
                                if err.is_not_found() =>
                            {
                                Some(obj_ref)
                            }
                            _ => None,
                        };
                        match deleted {
                            Some(obj_ref) => {
                                debug!("Object no longer exists (likely deleted): {:?}", e);
                                if let (Some(state), Some(namespace)) =
                                    (&health_state, obj_ref.namespace.as_deref())
                                {
                                    state.forget(namespace, &obj_ref.name).await;
                                }
                            }
                            None => error!("Reconciliation error: {:?}", e),
                        }
                    }
                }
            }
        })
        .await;

    // This should never complete in normal operation
    error!("Controller stream ended unexpectedly");
}
