//! CLI error types with exit code handling
//!
//! Every failure from the core and kube crates is mapped once into
//! [`CliError`], which carries the diagnostic code, help text and exit code.

use miette::Diagnostic;
use pspmigrator_core::{AccessError, CoreError};
use pspmigrator_kube::KubeError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Pod or policy does not exist
    #[error("{message}")]
    #[diagnostic(code(pspmigrator::cli::not_found))]
    NotFound {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// API server unreachable, unauthorized or failing
    #[error("Cluster error: {message}")]
    #[diagnostic(code(pspmigrator::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Policy lacks data required by one of its strategies
    #[error("{message}")]
    #[diagnostic(
        code(pspmigrator::cli::malformed_policy),
        help("fix the policy object; admission cannot apply this strategy either")
    )]
    MalformedPolicy { message: String },

    /// Kubeconfig, context or timeout problem
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(pspmigrator::cli::config),
        help("check --kubeconfig, --context and --timeout (or KUBECONFIG, PSPMIGRATOR_CONTEXT, PSPMIGRATOR_TIMEOUT)")
    )]
    Config { message: String },

    /// Writing output failed
    #[error("IO error: {message}")]
    #[diagnostic(code(pspmigrator::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(pspmigrator::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::MalformedPolicy { .. } => exit_codes::MALFORMED_POLICY,
            CliError::Config { .. } => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<AccessError> for CliError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound { .. } => CliError::NotFound {
                message: err.to_string(),
                help: Some("check the name and --namespace".to_string()),
            },
            AccessError::Transport { .. } => CliError::Cluster {
                message: err.to_string(),
                help: Some(
                    "check that the cluster is reachable and your credentials can read pods and podsecuritypolicies"
                        .to_string(),
                ),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedPolicy { .. } => CliError::MalformedPolicy {
                message: err.to_string(),
            },
            CoreError::PolicyNotFound { .. } => CliError::NotFound {
                message: err.to_string(),
                help: Some(
                    "the policy may have been deleted after the pod was admitted".to_string(),
                ),
            },
            CoreError::Accessor(e) => e.into(),
            other => CliError::internal(other.to_string()),
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Api(e) => CliError::Cluster {
                message: e.to_string(),
                help: None,
            },
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(format!("failed to serialize output: {}", err))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
