//! Cluster connection configuration

use std::path::PathBuf;
use std::time::Duration;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::error::{KubeError, Result};

/// Default timeout for Kubernetes API requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Explicit kubeconfig file; the default lookup applies when unset
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context; the current context applies when unset
    pub context: Option<String>,
    /// Connect and read timeout for every request
    pub timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClusterConfig {
    pub fn with_kubeconfig(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the client configuration
    ///
    /// An explicit kubeconfig path is read directly. Otherwise a requested
    /// context is looked up in the default kubeconfig, and with neither set
    /// the in-cluster or default kubeconfig configuration is inferred.
    pub async fn resolve(&self) -> Result<Config> {
        if self.timeout.is_zero() {
            return Err(KubeError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }

        let options = KubeConfigOptions {
            context: self.context.clone(),
            ..Default::default()
        };

        let mut config = match (&self.kubeconfig, &self.context) {
            (Some(path), _) => {
                tracing::debug!(path = %path.display(), context = ?self.context, "reading kubeconfig");
                let kubeconfig = Kubeconfig::read_from(path)?;
                Config::from_custom_kubeconfig(kubeconfig, &options).await?
            }
            (None, Some(context)) => {
                tracing::debug!(context = %context, "using context from default kubeconfig");
                Config::from_kubeconfig(&options).await?
            }
            (None, None) => {
                tracing::debug!("inferring cluster configuration");
                Config::infer().await?
            }
        };

        config.connect_timeout = Some(self.timeout);
        config.read_timeout = Some(self.timeout);

        Ok(config)
    }

    /// Build a client for the configured cluster
    ///
    /// No request is sent; connection problems surface on first use.
    pub async fn connect(&self) -> Result<Client> {
        let config = self.resolve().await?;
        tracing::debug!(cluster_url = %config.cluster_url, "connecting to cluster");
        Ok(Client::try_from(config)?)
    }
}
