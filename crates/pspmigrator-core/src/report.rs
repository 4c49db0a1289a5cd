//! Mutation report types handed to the presentation layer

use std::fmt;

use serde::Serialize;

use crate::analyzer::{DefaultSource, PolicyAnalysis};
use crate::field::FieldValue;

/// A single field where the live pod differs from the policy default
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    /// Policy field or annotation that declares the default
    pub source: DefaultSource,
    /// Container the path belongs to, for container-scoped fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Full path within the pod
    pub path: String,
    pub expected: FieldValue,
    pub actual: FieldValue,
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, actual {}",
            self.path, self.expected, self.actual
        )
    }
}

/// Outcome of checking one pod against its bound policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodMutation {
    pub pod: String,
    pub namespace: String,
    /// Bound policy, `None` when the pod carries no policy annotation
    pub policy: Option<String>,
    pub mutated: bool,
    pub diff: Vec<FieldDiff>,
    /// Analysis of the bound policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PolicyAnalysis>,
}

impl PodMutation {
    /// Report for a pod that no policy admitted
    pub fn unbound(pod: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            pod: pod.into(),
            namespace: namespace.into(),
            policy: None,
            mutated: false,
            diff: Vec::new(),
            analysis: None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.policy.is_some()
    }

    /// Diff entries for one container
    pub fn container_diff<'a>(&'a self, container: &'a str) -> impl Iterator<Item = &'a FieldDiff> {
        self.diff
            .iter()
            .filter(move |d| d.container.as_deref() == Some(container))
    }
}
