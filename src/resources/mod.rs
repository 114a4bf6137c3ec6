//! Resource generation module.
//!
//! Builds the pod spec document for a MysqlDeployment and renders it into
//! the Kubernetes objects the operator owns.
//!
//! ## Resources Generated
//!
//! | Resource | Purpose |
//! |----------|---------|
//! | StatefulSet | Runs the MySQL container described by the pod spec document |
//! | Headless Service | Stable network identity for the pod |
//! | Client Service | Client access endpoint on the document's ports |
//! | Secret (state) | Operator stored state, including the root credential |
//! | Secret (image pull) | Registry credentials, when the image needs them |

pub mod common;
pub mod pod_spec;
pub mod secrets;
pub mod services;
pub mod statefulset;

// Re-export commonly used items from common
pub use common::{owner_reference, standard_labels};
pub use pod_spec::{PodSpecDocument, build_pod_spec};
