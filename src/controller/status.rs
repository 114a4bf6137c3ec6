//! Status management utilities.
//!
//! [`UnitStatus`] is the operator-visible health signal, recomputed on every
//! reconciliation. This module maps it onto the custom resource's status
//! fields and conditions.

use std::fmt;

use serde::Serialize;

use crate::crd::{Condition, MysqlDeploymentStatus, UnitState};

/// Status message reported when the MySQL image cannot be resolved.
pub const IMAGE_FETCH_FAILED: &str = "Error fetching image information";

/// Health signal of a deployment unit.
///
/// `Waiting` is part of the status vocabulary but no reconciliation path
/// currently produces it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", content = "message")]
pub enum UnitStatus {
    Active,
    Blocked(String),
    Waiting(String),
}

impl UnitStatus {
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::Blocked(reason.into())
    }

    pub fn waiting(reason: impl Into<String>) -> Self {
        Self::Waiting(reason.into())
    }

    /// State without the accompanying message.
    pub fn state(&self) -> UnitState {
        match self {
            UnitStatus::Active => UnitState::Active,
            UnitStatus::Blocked(_) => UnitState::Blocked,
            UnitStatus::Waiting(_) => UnitState::Waiting,
        }
    }

    /// Reason attached to a Blocked or Waiting status.
    pub fn message(&self) -> Option<&str> {
        match self {
            UnitStatus::Active => None,
            UnitStatus::Blocked(reason) | UnitStatus::Waiting(reason) => Some(reason),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, UnitStatus::Active)
    }

    /// Conditions describing this status.
    pub fn conditions(&self, generation: Option<i64>) -> Vec<Condition> {
        let mut builder = ConditionBuilder::new();
        match self {
            UnitStatus::Active => {
                builder
                    .ready(true, "Active", "MySQL pod spec applied", generation)
                    .progressing(false, "ReconcileComplete", "Reconciliation complete", generation)
                    .degraded(false, "Active", "Deployment is healthy", generation);
            }
            UnitStatus::Blocked(reason) => {
                builder
                    .ready(false, "Blocked", reason, generation)
                    .progressing(false, "Blocked", reason, generation)
                    .degraded(true, "Blocked", reason, generation);
            }
            UnitStatus::Waiting(reason) => {
                builder
                    .ready(false, "Waiting", reason, generation)
                    .progressing(true, "Waiting", reason, generation)
                    .degraded(false, "Waiting", reason, generation);
            }
        }
        builder.build()
    }

    /// Build the custom resource status for this unit status.
    ///
    /// `pod_spec_version` falls back to the previously applied version, and
    /// conditions whose status is unchanged keep their transition time.
    pub fn to_resource_status(
        &self,
        generation: Option<i64>,
        pod_spec_version: Option<u32>,
        previous: Option<&MysqlDeploymentStatus>,
    ) -> MysqlDeploymentStatus {
        let mut conditions = self.conditions(generation);
        if let Some(previous) = previous {
            preserve_transition_times(&mut conditions, &previous.conditions);
        }

        MysqlDeploymentStatus {
            state: self.state(),
            message: self.message().map(str::to_string),
            observed_generation: generation,
            pod_spec_version: pod_spec_version
                .or_else(|| previous.and_then(|p| p.pod_spec_version)),
            conditions,
        }
    }

    /// Whether reporting this status changes what `previous` shows.
    pub fn differs_from(
        &self,
        previous: Option<&MysqlDeploymentStatus>,
        generation: Option<i64>,
    ) -> bool {
        previous.is_none_or(|p| {
            p.observed_generation != generation
                || p.state != self.state()
                || p.message.as_deref() != self.message()
        })
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{}: {}", self.state(), message),
            None => write!(f, "{}", self.state()),
        }
    }
}

/// Builder for managing conditions list
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
}

impl ConditionBuilder {
    /// Create a new condition builder
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Add or update a condition
    pub fn set(&mut self, condition: Condition) -> &mut Self {
        // Find and replace existing condition of same type
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            *existing = condition;
        } else {
            self.conditions.push(condition);
        }
        self
    }

    /// Set Ready condition
    pub fn ready(
        &mut self,
        ready: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::ready(ready, reason, message, generation))
    }

    /// Set Progressing condition
    pub fn progressing(
        &mut self,
        progressing: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::progressing(
            progressing,
            reason,
            message,
            generation,
        ))
    }

    /// Set Degraded condition
    pub fn degraded(
        &mut self,
        degraded: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::degraded(degraded, reason, message, generation))
    }

    /// Build the conditions list
    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}

impl Default for ConditionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Carry `lastTransitionTime` over from `previous` for every condition whose
/// status did not change.
pub fn preserve_transition_times(conditions: &mut [Condition], previous: &[Condition]) {
    for condition in conditions {
        if let Some(prev) = previous
            .iter()
            .find(|p| p.r#type == condition.r#type && p.status == condition.status)
        {
            condition.last_transition_time = prev.last_transition_time.clone();
        }
    }
}

/// Check if a condition type is true
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    conditions
        .iter()
        .find(|c| c.r#type == condition_type)
        .is_some_and(|c| c.status == "True")
}

/// Get the reason for a condition
pub fn get_condition_reason<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a str> {
    conditions
        .iter()
        .find(|c| c.r#type == condition_type)
        .map(|c| c.reason.as_str())
}
