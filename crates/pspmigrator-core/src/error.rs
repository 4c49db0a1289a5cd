//! Error types for pspmigrator-core

use std::fmt;

use thiserror::Error;

/// Result type for pspmigrator-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Boxed transport-level cause carried by [`AccessError::Transport`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while analyzing policies and pods
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A policy declares a strategy without the data it needs
    #[error("policy '{policy}' is malformed at '{field}': {reason}")]
    MalformedPolicy {
        policy: String,
        field: String,
        reason: String,
    },

    /// The policy named by a pod's annotation does not exist
    #[error("pod '{namespace}/{pod}' is bound to PodSecurityPolicy '{policy}', which no longer exists")]
    PolicyNotFound {
        policy: String,
        pod: String,
        namespace: String,
    },

    /// Cluster accessor failure, propagated unchanged
    #[error(transparent)]
    Accessor(#[from] AccessError),
}

impl CoreError {
    pub(crate) fn malformed(
        policy: &str,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::MalformedPolicy {
            policy: policy.to_string(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Kind of object requested from the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Pod,
    PodSecurityPolicy,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Pod => write!(f, "Pod"),
            ObjectKind::PodSecurityPolicy => write!(f, "PodSecurityPolicy"),
        }
    }
}

/// Errors returned by a [`crate::ClusterAccessor`]
#[derive(Debug, Error)]
pub enum AccessError {
    /// The requested object does not exist
    #[error("{kind} {} not found", display_name(.namespace.as_deref(), .name))]
    NotFound {
        kind: ObjectKind,
        name: String,
        namespace: Option<String>,
    },

    /// Authentication, network or API server failure
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl AccessError {
    pub fn not_found(kind: ObjectKind, namespace: Option<&str>, name: &str) -> Self {
        AccessError::NotFound {
            kind,
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        AccessError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a client error, keeping it as the error source
    pub fn transport_from(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        AccessError::Transport {
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessError::NotFound { .. })
    }
}

fn display_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("'{}' in namespace '{}'", name, ns),
        None => format!("'{}'", name),
    }
}
