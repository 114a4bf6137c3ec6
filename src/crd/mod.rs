//! Custom Resource Definitions (CRDs) for mysql-operator.
//!
//! - `MysqlDeployment`: Declare a single MySQL workload, its configuration and image

mod mysql_deployment;

pub use mysql_deployment::*;
