//! Closed enumeration of the pod fields a policy can default
//!
//! Every policy default lands on one [`PodPath`] and is checked with one
//! [`Comparison`] rule, so the set of checks the detector performs is fixed at
//! compile time.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::policy::{
    APPARMOR_CONTAINER_ANNOTATION_PREFIX, APPARMOR_DEFAULT_PROFILE_ANNOTATION, IdRange,
    SECCOMP_DEFAULT_PROFILE_ANNOTATION,
};

/// Where in the pod a field lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Compared once against `spec` / pod security context
    Pod,
    /// Compared for every (init) container
    Container,
}

/// Pod locations a policy default is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PodPath {
    CapabilitiesAdd,
    CapabilitiesDrop,
    RunAsUser,
    RunAsNonRoot,
    RunAsGroup,
    ReadOnlyRootFilesystem,
    AllowPrivilegeEscalation,
    AppArmorProfile,
    SeLinuxOptions,
    SupplementalGroups,
    FsGroup,
    RuntimeClassName,
    SeccompProfile,
}

impl PodPath {
    pub fn scope(self) -> Scope {
        match self {
            Self::SeLinuxOptions
            | Self::SupplementalGroups
            | Self::FsGroup
            | Self::RuntimeClassName
            | Self::SeccompProfile => Scope::Pod,
            Self::CapabilitiesAdd
            | Self::CapabilitiesDrop
            | Self::RunAsUser
            | Self::RunAsNonRoot
            | Self::RunAsGroup
            | Self::ReadOnlyRootFilesystem
            | Self::AllowPrivilegeEscalation
            | Self::AppArmorProfile => Scope::Container,
        }
    }

    /// Render the full path, e.g. `spec.containers[app].securityContext.runAsUser`
    ///
    /// `container` is ignored for pod-scoped paths.
    pub fn render(self, container: Option<&ContainerRef>) -> String {
        let container_path = |suffix: &str| match container {
            Some(c) => format!("spec.{}[{}].{}", c.kind.list_name(), c.name, suffix),
            None => format!("spec.containers[*].{}", suffix),
        };

        match self {
            Self::CapabilitiesAdd => container_path("securityContext.capabilities.add"),
            Self::CapabilitiesDrop => container_path("securityContext.capabilities.drop"),
            Self::RunAsUser => container_path("securityContext.runAsUser"),
            Self::RunAsNonRoot => container_path("securityContext.runAsNonRoot"),
            Self::RunAsGroup => container_path("securityContext.runAsGroup"),
            Self::ReadOnlyRootFilesystem => container_path("securityContext.readOnlyRootFilesystem"),
            Self::AllowPrivilegeEscalation => {
                container_path("securityContext.allowPrivilegeEscalation")
            }
            Self::AppArmorProfile => format!(
                "metadata.annotations[{}{}]",
                APPARMOR_CONTAINER_ANNOTATION_PREFIX,
                container.map_or("*", |c| c.name.as_str())
            ),
            Self::SeLinuxOptions => "spec.securityContext.seLinuxOptions".to_string(),
            Self::SupplementalGroups => "spec.securityContext.supplementalGroups".to_string(),
            Self::FsGroup => "spec.securityContext.fsGroup".to_string(),
            Self::RuntimeClassName => "spec.runtimeClassName".to_string(),
            Self::SeccompProfile => "spec.securityContext.seccompProfile".to_string(),
        }
    }
}

/// Which container list a container came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Container,
    InitContainer,
}

impl ContainerKind {
    fn list_name(self) -> &'static str {
        match self {
            ContainerKind::Container => "containers",
            ContainerKind::InitContainer => "initContainers",
        }
    }
}

/// A container addressed by name within a pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub kind: ContainerKind,
    pub name: String,
}

/// Policy fields whose strategy can inject a value into a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MutatingField {
    DefaultAddCapabilities,
    RequiredDropCapabilities,
    SeLinux,
    RunAsUser,
    RunAsGroup,
    SupplementalGroups,
    FsGroup,
    ReadOnlyRootFilesystem,
    DefaultAllowPrivilegeEscalation,
    AllowPrivilegeEscalation,
    RuntimeClass,
}

impl MutatingField {
    pub const ALL: [MutatingField; 11] = [
        MutatingField::DefaultAddCapabilities,
        MutatingField::RequiredDropCapabilities,
        MutatingField::SeLinux,
        MutatingField::RunAsUser,
        MutatingField::RunAsGroup,
        MutatingField::SupplementalGroups,
        MutatingField::FsGroup,
        MutatingField::ReadOnlyRootFilesystem,
        MutatingField::DefaultAllowPrivilegeEscalation,
        MutatingField::AllowPrivilegeEscalation,
        MutatingField::RuntimeClass,
    ];

    /// Field name as spelled in the policy spec
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DefaultAddCapabilities => "defaultAddCapabilities",
            Self::RequiredDropCapabilities => "requiredDropCapabilities",
            Self::SeLinux => "seLinux",
            Self::RunAsUser => "runAsUser",
            Self::RunAsGroup => "runAsGroup",
            Self::SupplementalGroups => "supplementalGroups",
            Self::FsGroup => "fsGroup",
            Self::ReadOnlyRootFilesystem => "readOnlyRootFilesystem",
            Self::DefaultAllowPrivilegeEscalation => "defaultAllowPrivilegeEscalation",
            Self::AllowPrivilegeEscalation => "allowPrivilegeEscalation",
            Self::RuntimeClass => "runtimeClass",
        }
    }
}

impl fmt::Display for MutatingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutatingField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|f| f.as_str()).collect();
                format!("unknown field '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

impl Serialize for MutatingField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Policy annotations that inject a profile into pods
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MutatingAnnotation {
    SeccompDefaultProfile,
    AppArmorDefaultProfile,
}

impl MutatingAnnotation {
    pub const ALL: [MutatingAnnotation; 2] = [
        MutatingAnnotation::SeccompDefaultProfile,
        MutatingAnnotation::AppArmorDefaultProfile,
    ];

    /// Annotation key on the policy object
    pub fn key(self) -> &'static str {
        match self {
            Self::SeccompDefaultProfile => SECCOMP_DEFAULT_PROFILE_ANNOTATION,
            Self::AppArmorDefaultProfile => APPARMOR_DEFAULT_PROFILE_ANNOTATION,
        }
    }
}

impl fmt::Display for MutatingAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for MutatingAnnotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// A value read from, or expected in, a pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Unset,
    Bool(bool),
    Int(i64),
    Text(String),
    Ints(Vec<i64>),
    Texts(Vec<String>),
}

impl FieldValue {
    pub fn is_unset(&self) -> bool {
        matches!(self, FieldValue::Unset)
    }

    pub fn from_bool(value: Option<bool>) -> Self {
        value.map_or(FieldValue::Unset, FieldValue::Bool)
    }

    pub fn from_int(value: Option<i64>) -> Self {
        value.map_or(FieldValue::Unset, FieldValue::Int)
    }

    pub fn from_text(value: Option<&str>) -> Self {
        value.map_or(FieldValue::Unset, |v| FieldValue::Text(v.to_string()))
    }

    /// Empty lists are reported as unset
    pub fn from_texts(values: Option<&[String]>) -> Self {
        match values {
            Some(v) if !v.is_empty() => FieldValue::Texts(v.to_vec()),
            _ => FieldValue::Unset,
        }
    }

    pub fn from_ints(values: Option<&[i64]>) -> Self {
        match values {
            Some(v) if !v.is_empty() => FieldValue::Ints(v.to_vec()),
            _ => FieldValue::Unset,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unset => f.write_str("<unset>"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Ints(values) => {
                let parts: Vec<String> = values.iter().map(i64::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            FieldValue::Texts(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

/// How a live value is checked against the expected one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// Values must be equal
    Exact,
    /// Live list must contain every expected element
    Contains,
    /// Live id must fall inside one of the ranges
    InRanges(Vec<IdRange>),
    /// Any explicit value is accepted
    Presence,
}

impl Comparison {
    /// Whether `actual` already satisfies `expected` under this rule
    pub fn satisfied(&self, expected: &FieldValue, actual: &FieldValue) -> bool {
        match self {
            Comparison::Exact => expected == actual,
            Comparison::Presence => !actual.is_unset(),
            Comparison::InRanges(ranges) => match actual {
                FieldValue::Int(id) => ranges.iter().any(|r| r.contains(*id)),
                FieldValue::Ints(ids) => ids.iter().all(|id| ranges.iter().any(|r| r.contains(*id))),
                _ => false,
            },
            Comparison::Contains => match (expected, actual) {
                (FieldValue::Texts(want), FieldValue::Texts(have)) => {
                    let have: BTreeSet<_> = have.iter().collect();
                    want.iter().all(|w| have.contains(w))
                }
                (FieldValue::Ints(want), FieldValue::Ints(have)) => {
                    let have: BTreeSet<_> = have.iter().collect();
                    want.iter().all(|w| have.contains(w))
                }
                (_, FieldValue::Unset) => false,
                _ => expected == actual,
            },
        }
    }
}
