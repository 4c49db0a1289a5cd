//! Mock cluster accessor for testing
//!
//! Serves pods and policies from memory, useful for unit tests without a
//! Kubernetes cluster. A transport failure can be injected to exercise
//! error propagation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::ClusterAccessor;
use crate::error::{AccessError, ObjectKind};
use crate::policy::PodSecurityPolicy;

/// In-memory cluster accessor for testing
#[derive(Clone, Default)]
pub struct MockAccessor {
    /// Pods keyed by (namespace, name)
    pods: Arc<RwLock<BTreeMap<(String, String), Pod>>>,
    /// Policies keyed by name
    policies: Arc<RwLock<BTreeMap<String, PodSecurityPolicy>>>,
    /// When set, every call fails with this transport message
    failure: Arc<RwLock<Option<String>>>,
    /// Track operation counts for assertions
    operations: Arc<RwLock<OperationCounts>>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub pod_gets: usize,
    pub policy_gets: usize,
    pub pod_lists: usize,
    pub policy_lists: usize,
}

impl MockAccessor {
    /// Create a new empty mock accessor
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pod, keyed by its metadata namespace and name
    pub fn with_pod(self, pod: Pod) -> Self {
        {
            let key = (
                pod.metadata.namespace.clone().unwrap_or_default(),
                pod.metadata.name.clone().unwrap_or_default(),
            );
            self.pods.write().unwrap().insert(key, pod);
        }
        self
    }

    /// Add a policy, keyed by its metadata name
    pub fn with_policy(self, policy: PodSecurityPolicy) -> Self {
        {
            let name = policy.name().to_string();
            self.policies.write().unwrap().insert(name, policy);
        }
        self
    }

    /// Make every subsequent call fail with a transport error
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.write().unwrap() = Some(message.into());
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), AccessError> {
        match self.failure.read().unwrap().as_ref() {
            Some(message) => Err(AccessError::transport(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterAccessor for MockAccessor {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, AccessError> {
        self.operations.write().unwrap().pod_gets += 1;
        self.check_failure()?;

        let pods = self.pods.read().unwrap();
        pods.get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| AccessError::not_found(ObjectKind::Pod, Some(namespace), name))
    }

    async fn get_policy(&self, name: &str) -> Result<PodSecurityPolicy, AccessError> {
        self.operations.write().unwrap().policy_gets += 1;
        self.check_failure()?;

        let policies = self.policies.read().unwrap();
        policies
            .get(name)
            .cloned()
            .ok_or_else(|| AccessError::not_found(ObjectKind::PodSecurityPolicy, None, name))
    }

    async fn list_pods(&self) -> Result<Vec<Pod>, AccessError> {
        self.operations.write().unwrap().pod_lists += 1;
        self.check_failure()?;

        Ok(self.pods.read().unwrap().values().cloned().collect())
    }

    async fn list_policies(&self) -> Result<Vec<PodSecurityPolicy>, AccessError> {
        self.operations.write().unwrap().policy_lists += 1;
        self.check_failure()?;

        Ok(self.policies.read().unwrap().values().cloned().collect())
    }
}
