//! pspmigrator core - PodSecurityPolicy mutation detection
//!
//! This crate provides:
//! - **Policy model**: `policy/v1beta1` PodSecurityPolicy with typed strategies
//! - **Analyzer**: which policy fields and annotations inject values into pods
//! - **Detector**: whether a live pod differs from what its bound policy would write
//! - **Cluster access**: the [`ClusterAccessor`] boundary plus an in-memory mock
//!
//! Everything here is read-only; nothing writes back to the cluster.

pub mod accessor;
pub mod analyzer;
pub mod detector;
pub mod error;
pub mod field;
pub mod ignore;
pub mod policy;
pub mod report;

pub use accessor::{ClusterAccessor, MockAccessor, OperationCounts};
pub use analyzer::{
    DefaultSource, PolicyAnalysis, PolicyAnalyzer, PolicyDefault, analyze, selinux_label,
};
pub use detector::{bound_policy, detect, detect_with_policy, diff_pod};
pub use error::{AccessError, BoxError, CoreError, ObjectKind, Result};
pub use field::{
    Comparison, ContainerKind, ContainerRef, FieldValue, MutatingAnnotation, MutatingField,
    PodPath, Scope,
};
pub use ignore::IgnoreSet;
pub use policy::{
    APPARMOR_CONTAINER_ANNOTATION_PREFIX, APPARMOR_DEFAULT_PROFILE_ANNOTATION,
    BOUND_POLICY_ANNOTATION, GroupRule, GroupStrategyOptions, IdRange, PodSecurityPolicy,
    PodSecurityPolicySpec, RunAsGroupStrategyOptions, RunAsUserRule, RunAsUserStrategyOptions,
    RuntimeClassStrategyOptions, SECCOMP_DEFAULT_PROFILE_ANNOTATION, SECCOMP_POD_ANNOTATION,
    SeLinuxRule, SeLinuxStrategyOptions,
};
pub use report::{FieldDiff, PodMutation};
