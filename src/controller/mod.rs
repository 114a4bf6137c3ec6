//! Controller module for mysql-operator.
//!
//! Contains the reconciliation loop, error handling and status management
//! for MysqlDeployment resources.

pub mod context;
pub mod error;
pub mod reconciler;
pub mod status;
