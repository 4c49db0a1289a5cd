//! Mutating commands - check pods and policies for PSP mutation

use futures::stream::{self, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use pspmigrator_core::{
    AccessError, ClusterAccessor, IgnoreSet, PolicyAnalysis, analyze, bound_policy,
    detect,
};
use serde::Serialize;

use crate::OutputFormat;
use crate::display;
use crate::error::Result;

/// Pods checked concurrently in batch mode
const MAX_CONCURRENT_CHECKS: usize = 8;

/// Result of one row in a batch check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RowOutcome<T> {
    Checked(T),
    Error { error: String },
}

impl<T> RowOutcome<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, RowOutcome::Error { .. })
    }
}

/// Mutation status of one pod in the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodStatus {
    pub mutated: bool,
    pub changes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodRow {
    pub name: String,
    pub namespace: String,
    pub policy: String,
    #[serde(flatten)]
    pub outcome: RowOutcome<PodStatus>,
}

/// Every policy-bound pod in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodBatch {
    /// Pods in the cluster, bound or not
    pub total: usize,
    pub pods: Vec<PodRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyRow {
    pub name: String,
    #[serde(flatten)]
    pub outcome: RowOutcome<PolicyAnalysis>,
}

/// Check a single pod
pub async fn pod(
    accessor: &dyn ClusterAccessor,
    namespace: &str,
    name: &str,
    ignore: &IgnoreSet,
    output: OutputFormat,
) -> Result<()> {
    let pod = accessor.get_pod(namespace, name).await?;
    let report = detect(&pod, accessor, ignore).await?;

    let mut out = std::io::stdout().lock();
    match output {
        OutputFormat::Json => display::json(&mut out, &report)?,
        OutputFormat::Table => display::pod_report(&mut out, &report)?,
    }
    Ok(())
}

/// Check every pod that carries a policy annotation
pub async fn pods(accessor: &dyn ClusterAccessor, output: OutputFormat) -> Result<()> {
    let batch = check_pods(accessor).await?;

    let mut out = std::io::stdout().lock();
    match output {
        OutputFormat::Json => display::json(&mut out, &batch)?,
        OutputFormat::Table => display::pod_table(&mut out, &batch)?,
    }
    Ok(())
}

/// Show the mutating fields of a single policy
pub async fn psp(accessor: &dyn ClusterAccessor, name: &str, output: OutputFormat) -> Result<()> {
    let policy = accessor.get_policy(name).await?;
    let analysis = analyze(&policy)?;

    let mut out = std::io::stdout().lock();
    match output {
        OutputFormat::Json => display::json(&mut out, &analysis)?,
        OutputFormat::Table => display::policy_summary(&mut out, &analysis)?,
    }
    Ok(())
}

/// Show the mutating fields of every policy
pub async fn psps(accessor: &dyn ClusterAccessor, output: OutputFormat) -> Result<()> {
    let rows = check_policies(accessor).await?;

    let mut out = std::io::stdout().lock();
    match output {
        OutputFormat::Json => display::json(&mut out, &rows)?,
        OutputFormat::Table => display::policy_table(&mut out, &rows)?,
    }
    Ok(())
}

/// Run the detector over every bound pod, keeping per-pod failures as rows
pub async fn check_pods(accessor: &dyn ClusterAccessor) -> std::result::Result<PodBatch, AccessError> {
    let pods = accessor.list_pods().await?;
    let total = pods.len();
    let ignore = IgnoreSet::new();

    let bound: Vec<&Pod> = pods.iter().filter(|p| bound_policy(p).is_some()).collect();
    tracing::debug!(total, bound = bound.len(), "checking pods");

    let rows = stream::iter(bound)
        .map(|pod| check_pod(pod, accessor, &ignore))
        .buffered(MAX_CONCURRENT_CHECKS)
        .collect()
        .await;

    Ok(PodBatch { total, pods: rows })
}

async fn check_pod(pod: &Pod, accessor: &dyn ClusterAccessor, ignore: &IgnoreSet) -> PodRow {
    let name = pod.metadata.name.clone().unwrap_or_default();
    let namespace = pod.metadata.namespace.clone().unwrap_or_default();
    let policy = bound_policy(pod).unwrap_or_default().to_string();

    let outcome = match detect(pod, accessor, ignore).await {
        Ok(report) => RowOutcome::Checked(PodStatus {
            mutated: report.mutated,
            changes: report.diff.len(),
        }),
        Err(err) => {
            tracing::warn!(
                pod = %name,
                namespace = %namespace,
                policy = %policy,
                error = %err,
                "error checking if pod is mutated"
            );
            RowOutcome::Error {
                error: err.to_string(),
            }
        }
    };

    PodRow {
        name,
        namespace,
        policy,
        outcome,
    }
}

/// Analyze every policy, keeping malformed ones as error rows
pub async fn check_policies(
    accessor: &dyn ClusterAccessor,
) -> std::result::Result<Vec<PolicyRow>, AccessError> {
    let policies = accessor.list_policies().await?;

    Ok(policies
        .iter()
        .map(|policy| {
            let outcome = match analyze(policy) {
                Ok(analysis) => RowOutcome::Checked(analysis),
                Err(err) => {
                    tracing::warn!(policy = %policy.name(), error = %err, "error analyzing policy");
                    RowOutcome::Error {
                        error: err.to_string(),
                    }
                }
            };
            PolicyRow {
                name: policy.name().to_string(),
                outcome,
            }
        })
        .collect())
}
