//! # Custom Resource Definitions
//!
//! CRD types shared by the reconciliation core and the resource kinds it drives.
//!
//! ## Module Structure
//!
//! - `condition.rs` - Status condition record and the `StateObject` trait
//! - `flex_cluster.rs` - `FlexCluster` custom resource (reference kind)

mod condition;
mod flex_cluster;

pub use condition::{Condition, StateObject, CONDITION_FALSE, CONDITION_TRUE, CONDITION_UNKNOWN};
pub use flex_cluster::{
    ConnectionSecretRef, FlexCluster, FlexClusterEntry, FlexClusterSpec, FlexClusterSpecV20250312,
    FlexClusterStatus, FlexClusterStatusV20250312, ProviderSettings,
};
