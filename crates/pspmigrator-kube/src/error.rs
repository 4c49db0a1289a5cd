//! Error types for pspmigrator-kube

use thiserror::Error;

/// Result type for cluster connection
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors raised while building a cluster client
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubeconfig could not be read or does not contain the context
    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// Neither in-cluster nor default kubeconfig configuration was usable
    #[error("could not infer cluster configuration: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    /// Kubernetes client construction failed
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
