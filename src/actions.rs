//! Operational actions.
//!
//! Actions are synchronous, parameterized requests distinct from
//! reconciliation. Each one is a plain function registered by name in
//! [`ACTIONS`]; none of them read or write controller state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed payload returned by the `fortune` action.
pub const FORTUNE: &str = "A bug in the code is worth two in the documentation.";

/// Results of a successful action, keyed by result name.
pub type ActionResults = BTreeMap<String, String>;

/// Outcome of running an action.
pub type ActionResult = Result<ActionResults, ActionFailure>;

/// An action that ran and reported failure.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct ActionFailure {
    pub message: String,
}

impl ActionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised before an action gets to run.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unknown action '{0}'")]
    Unknown(String),

    #[error("invalid parameters for action '{action}': {source}")]
    InvalidParams {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Handler signature shared by every action.
pub type ActionHandler = fn(serde_json::Value) -> Result<ActionResult, serde_json::Error>;

/// Registered actions.
pub const ACTIONS: &[(&str, ActionHandler)] = &[("fortune", run_fortune)];

/// Look up the handler registered under `name`.
pub fn handler_for(name: &str) -> Option<ActionHandler> {
    ACTIONS
        .iter()
        .find(|(action, _)| *action == name)
        .map(|(_, handler)| *handler)
}

/// Run the action registered under `name` with JSON parameters.
pub fn dispatch(name: &str, params: serde_json::Value) -> Result<ActionResult, ActionError> {
    let handler = handler_for(name).ok_or_else(|| ActionError::Unknown(name.to_string()))?;
    handler(params).map_err(|source| ActionError::InvalidParams {
        action: name.to_string(),
        source,
    })
}

/// Parameters of the `fortune` action.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FortuneParams {
    /// Failure message to report; empty means succeed.
    #[serde(default)]
    pub fail: String,
}

/// Liveness probe for the action interface.
pub fn fortune(params: &FortuneParams) -> ActionResult {
    if !params.fail.is_empty() {
        return Err(ActionFailure::new(params.fail.clone()));
    }

    let mut results = BTreeMap::new();
    results.insert("fortune".to_string(), FORTUNE.to_string());
    Ok(results)
}

fn run_fortune(params: serde_json::Value) -> Result<ActionResult, serde_json::Error> {
    let params: FortuneParams = if params.is_null() {
        FortuneParams::default()
    } else {
        serde_json::from_value(params)?
    };
    Ok(fortune(&params))
}
