//! Cluster access boundary
//!
//! The detector reads pods and policies only through [`ClusterAccessor`].
//! Implementations map their transport's "not found" signal to
//! [`AccessError::NotFound`] so callers never inspect raw client errors.

mod mock;

pub use mock::{MockAccessor, OperationCounts};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;

use crate::error::AccessError;
use crate::policy::PodSecurityPolicy;

/// Read-only lookup of pods and policies
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ClusterAccessor: Send + Sync {
    /// Get a pod by namespace and name
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, AccessError>;

    /// Get a cluster-scoped policy by name
    async fn get_policy(&self, name: &str) -> Result<PodSecurityPolicy, AccessError>;

    /// List pods across all namespaces
    async fn list_pods(&self) -> Result<Vec<Pod>, AccessError>;

    /// List every policy in the cluster
    async fn list_policies(&self) -> Result<Vec<PodSecurityPolicy>, AccessError>;
}
