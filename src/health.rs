//! Health server for Kubernetes probes, Prometheus metrics and actions.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 when ready to serve traffic)
//! - `/metrics` - Prometheus metrics endpoint
//! - `/status` - Last reported unit status per deployment
//! - `POST /actions/{name}` - Run an operational action

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::actions::{self, ActionError};
use crate::controller::status::UnitStatus;
use crate::crd::UnitState;

/// Port the health server listens on
pub const HEALTH_PORT: u16 = 8080;

/// Labels for reconciliation metrics (namespace + name)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ReconcileLabels {
    pub namespace: String,
    pub name: String,
}

impl EncodeLabelSet for ReconcileLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for unit status metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct UnitStatusLabels {
    pub namespace: String,
    pub name: String,
    pub state: String,
}

impl EncodeLabelSet for UnitStatusLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        ("state", self.state.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the operator
pub struct Metrics {
    /// Total reconciliations counter
    pub reconciliations_total: Family<ReconcileLabels, Counter>,
    /// Failed reconciliations counter
    pub reconciliation_errors_total: Family<ReconcileLabels, Counter>,
    /// Reconciliation duration histogram
    pub reconcile_duration_seconds: Family<ReconcileLabels, Histogram>,
    /// Pod spec applications counter
    pub pod_spec_applies_total: Family<ReconcileLabels, Counter>,
    /// Unit status, 1 for the current state and 0 for the others
    pub unit_status: Family<UnitStatusLabels, Gauge>,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let reconciliations_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "mysqloperator_reconciliations",
            "Total number of reconciliations",
            reconciliations_total.clone(),
        );

        let reconciliation_errors_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "mysqloperator_reconciliation_errors",
            "Total number of reconciliation errors",
            reconciliation_errors_total.clone(),
        );

        let reconcile_duration_seconds =
            Family::<ReconcileLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 15))
            });
        registry.register(
            "mysqloperator_reconcile_duration_seconds",
            "Duration of reconciliation in seconds",
            reconcile_duration_seconds.clone(),
        );

        let pod_spec_applies_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "mysqloperator_pod_spec_applies",
            "Total number of pod spec applications",
            pod_spec_applies_total.clone(),
        );

        let unit_status = Family::<UnitStatusLabels, Gauge>::default();
        registry.register(
            "mysqloperator_unit_status",
            "Unit status of each MysqlDeployment by state",
            unit_status.clone(),
        );

        Self {
            reconciliations_total,
            reconciliation_errors_total,
            reconcile_duration_seconds,
            pod_spec_applies_total,
            unit_status,
            registry,
        }
    }

    /// Record a successful reconciliation
    pub fn record_reconcile(&self, namespace: &str, name: &str, duration_secs: f64) {
        let labels = ReconcileLabels {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        self.reconciliations_total.get_or_create(&labels).inc();
        self.reconcile_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a failed reconciliation
    pub fn record_error(&self, namespace: &str, name: &str) {
        let labels = ReconcileLabels {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        self.reconciliation_errors_total
            .get_or_create(&labels)
            .inc();
    }

    /// Record a pod spec application
    pub fn record_pod_spec_applied(&self, namespace: &str, name: &str) {
        let labels = ReconcileLabels {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        self.pod_spec_applies_total.get_or_create(&labels).inc();
    }

    /// Update the unit status gauges for a deployment
    pub fn set_unit_status(&self, namespace: &str, name: &str, status: &UnitStatus) {
        let current = status.state();
        for state in [UnitState::Active, UnitState::Blocked, UnitState::Waiting] {
            let labels = UnitStatusLabels {
                namespace: namespace.to_string(),
                name: name.to_string(),
                state: state.to_string(),
            };
            self.unit_status
                .get_or_create(&labels)
                .set(i64::from(state == current));
        }
    }

    /// Remove every series labelled with a deployment
    pub fn forget(&self, namespace: &str, name: &str) {
        let labels = ReconcileLabels {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        self.reconciliations_total.remove(&labels);
        self.reconciliation_errors_total.remove(&labels);
        self.reconcile_duration_seconds.remove(&labels);
        self.pod_spec_applies_total.remove(&labels);
        for state in [UnitState::Active, UnitState::Blocked, UnitState::Waiting] {
            self.unit_status.remove(&UnitStatusLabels {
                namespace: namespace.to_string(),
                name: name.to_string(),
                state: state.to_string(),
            });
        }
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the operator is ready (controller running)
    ready: RwLock<bool>,
    /// Last reported unit status per `namespace/name`
    unit_statuses: RwLock<BTreeMap<String, UnitStatus>>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            unit_statuses: RwLock::new(BTreeMap::new()),
            metrics: Metrics::new(),
        }
    }

    /// Mark the operator as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the operator is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }

    /// Record the unit status reported for a deployment
    pub async fn set_unit_status(&self, namespace: &str, name: &str, status: UnitStatus) {
        self.unit_statuses
            .write()
            .await
            .insert(format!("{}/{}", namespace, name), status);
    }

    /// Drop everything recorded for a deployment that no longer exists.
    pub async fn forget(&self, namespace: &str, name: &str) {
        self.unit_statuses
            .write()
            .await
            .remove(&format!("{}/{}", namespace, name));
        self.metrics.forget(namespace, name);
    }

    /// Snapshot of all reported unit statuses
    pub async fn unit_statuses(&self) -> BTreeMap<String, UnitStatus> {
        self.unit_statuses.read().await.clone()
    }
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 200 OK if the operator is ready to serve.
/// Returns 503 Service Unavailable if not ready.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Unit status handler
async fn status_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    Json(state.unit_statuses().await)
}

/// Action handler
///
/// Completed actions return 200 with their results, failed actions 422 with
/// the failure message.
async fn action_handler(
    Path(name): Path<String>,
    params: Option<Json<serde_json::Value>>,
) -> Response {
    let params = params.map(|Json(p)| p).unwrap_or(serde_json::Value::Null);

    match actions::dispatch(&name, params) {
        Ok(Ok(results)) => {
            info!(action = %name, "Action completed");
            (
                StatusCode::OK,
                Json(serde_json::json!({"status": "completed", "results": results})),
            )
                .into_response()
        }
        Ok(Err(failure)) => {
            warn!(action = %name, message = %failure, "Action failed");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({"status": "failed", "message": failure.message})),
            )
                .into_response()
        }
        Err(e @ ActionError::Unknown(_)) => {
            (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": e.to_string()})))
                .into_response()
        }
        Err(e @ ActionError::InvalidParams { .. }) => {
            (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": e.to_string()})))
                .into_response()
        }
    }
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .route("/actions/{name}", post(action_handler))
        .with_state(state)
}

/// Run the health server
///
/// Binds to 0.0.0.0:8080 and serves health, metrics and action endpoints.
pub async fn run_health_server(state: Arc<HealthState>) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], HEALTH_PORT));
    info!(port = HEALTH_PORT, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
