//! Kubernetes-backed cluster accessor
//!
//! Reads pods and `policy/v1beta1` PodSecurityPolicies through the API server.
//! HTTP 404 becomes [`AccessError::NotFound`]; every other client failure is
//! passed on as a transport error with the client error kept as its source.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::Client;
use kube::api::{Api, ListParams};

use pspmigrator_core::{AccessError, ClusterAccessor, ObjectKind, PodSecurityPolicy};

use crate::config::ClusterConfig;
use crate::error::Result;

/// Cluster accessor over a shared kube client
#[derive(Clone)]
pub struct KubeAccessor {
    client: Client,
}

impl KubeAccessor {
    /// Connect using the given configuration
    pub async fn connect(config: &ClusterConfig) -> Result<Self> {
        let client = config.connect().await?;
        Ok(Self::with_client(client))
    }

    /// Create with an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn policies(&self) -> Api<PodSecurityPolicy> {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl ClusterAccessor for KubeAccessor {
    async fn get_pod(&self, namespace: &str, name: &str) -> std::result::Result<Pod, AccessError> {
        tracing::debug!(namespace = %namespace, pod = %name, "fetching pod");
        self.pods(namespace)
            .get(name)
            .await
            .map_err(|e| map_error(e, ObjectKind::Pod, Some(namespace), name))
    }

    async fn get_policy(&self, name: &str) -> std::result::Result<PodSecurityPolicy, AccessError> {
        tracing::debug!(policy = %name, "fetching policy");
        self.policies()
            .get(name)
            .await
            .map_err(|e| map_error(e, ObjectKind::PodSecurityPolicy, None, name))
    }

    async fn list_pods(&self) -> std::result::Result<Vec<Pod>, AccessError> {
        tracing::debug!("listing pods in all namespaces");
        let api: Api<Pod> = Api::all(self.client.clone());
        let pods = api
            .list(&ListParams::default())
            .await
            .map_err(AccessError::transport_from)?;
        Ok(pods.items)
    }

    async fn list_policies(&self) -> std::result::Result<Vec<PodSecurityPolicy>, AccessError> {
        tracing::debug!("listing policies");
        let policies = self
            .policies()
            .list(&ListParams::default())
            .await
            .map_err(AccessError::transport_from)?;
        Ok(policies.items)
    }
}

/// Convert a client error for a named object
fn map_error(
    err: kube::Error,
    kind: ObjectKind,
    namespace: Option<&str>,
    name: &str,
) -> AccessError {
    match err {
        kube::Error::Api(e) if e.code == 404 => AccessError::not_found(kind, namespace, name),
        other => AccessError::transport_from(other),
    }
}
