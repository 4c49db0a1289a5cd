//! pspmigrator kube - cluster access for pspmigrator
//!
//! Provides [`KubeAccessor`], the [`pspmigrator_core::ClusterAccessor`]
//! implementation over a `kube` client, and [`ClusterConfig`] for choosing
//! the kubeconfig, context and request timeout.

pub mod client;
pub mod config;
pub mod error;

pub use client::KubeAccessor;
pub use config::{ClusterConfig, DEFAULT_TIMEOUT};
pub use error::{KubeError, Result};
