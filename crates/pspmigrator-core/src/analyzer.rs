//! Policy mutation analyzer
//!
//! Statically determines which fields and annotations of a PodSecurityPolicy
//! inject a value into pods that leave the field unset. The same defaulting
//! rules are exposed as [`PolicyDefault`]s so the pod detector compares
//! against exactly what admission would write.
//!
//! Strategies that only validate (`RunAsAny`, `MayRunAs`, host namespaces,
//! volumes, sysctls, host ports) never contribute.

use std::collections::BTreeSet;
use std::fmt;

use k8s_openapi::api::core::v1::SELinuxOptions;
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::field::{Comparison, FieldValue, MutatingAnnotation, MutatingField, PodPath};
use crate::policy::{
    GroupRule, GroupStrategyOptions, IdRange, PodSecurityPolicy, PodSecurityPolicySpec,
    RunAsUserRule, SeLinuxRule,
};

/// Result of analyzing a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyAnalysis {
    /// Policy name
    pub policy: String,
    /// Mutating spec fields
    pub fields: BTreeSet<MutatingField>,
    /// Mutating annotations
    pub annotations: BTreeSet<MutatingAnnotation>,
}

impl PolicyAnalysis {
    /// True iff at least one field or annotation mutates pods
    pub fn is_mutating(&self) -> bool {
        !self.fields.is_empty() || !self.annotations.is_empty()
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.as_str()).collect()
    }

    pub fn annotation_keys(&self) -> Vec<&'static str> {
        self.annotations.iter().map(|a| a.key()).collect()
    }
}

/// What declared a default
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum DefaultSource {
    Field(MutatingField),
    Annotation(MutatingAnnotation),
}

impl fmt::Display for DefaultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultSource::Field(field) => field.fmt(f),
            DefaultSource::Annotation(annotation) => annotation.fmt(f),
        }
    }
}

/// A value the policy writes into pods that omit it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDefault {
    pub source: DefaultSource,
    pub target: PodPath,
    pub expected: FieldValue,
    pub comparison: Comparison,
}

impl PolicyDefault {
    fn field(
        field: MutatingField,
        target: PodPath,
        expected: FieldValue,
        comparison: Comparison,
    ) -> Self {
        Self {
            source: DefaultSource::Field(field),
            target,
            expected,
            comparison,
        }
    }
}

/// Policy mutation analyzer
pub struct PolicyAnalyzer;

impl PolicyAnalyzer {
    /// Analyze a policy for mutating fields and annotations
    pub fn analyze(policy: &PodSecurityPolicy) -> Result<PolicyAnalysis> {
        let mut analysis = PolicyAnalysis {
            policy: policy.name().to_string(),
            fields: BTreeSet::new(),
            annotations: BTreeSet::new(),
        };

        for default in Self::defaults(policy)? {
            match default.source {
                DefaultSource::Field(field) => {
                    analysis.fields.insert(field);
                }
                DefaultSource::Annotation(annotation) => {
                    analysis.annotations.insert(annotation);
                }
            }
        }

        tracing::debug!(
            policy = %analysis.policy,
            fields = ?analysis.field_names(),
            annotations = ?analysis.annotation_keys(),
            "analyzed policy"
        );

        Ok(analysis)
    }

    /// Every default the policy injects, in a stable order
    ///
    /// Fails with [`CoreError::MalformedPolicy`] when any declared strategy,
    /// mutating or not, lacks the data it needs.
    pub fn defaults(policy: &PodSecurityPolicy) -> Result<Vec<PolicyDefault>> {
        let name = policy.name();
        let spec = policy
            .spec
            .as_ref()
            .ok_or_else(|| CoreError::malformed(name, "spec", "policy has no spec"))?;

        Self::validate(name, spec)?;

        let mut defaults = Vec::new();
        Self::capability_defaults(spec, &mut defaults);
        Self::selinux_default(spec, &mut defaults);
        Self::id_defaults(spec, &mut defaults);
        Self::container_flag_defaults(spec, &mut defaults);
        Self::runtime_class_default(spec, &mut defaults);
        Self::annotation_defaults(policy, &mut defaults);

        Ok(defaults)
    }

    /// Check every declared strategy carries its required sub-fields
    fn validate(name: &str, spec: &PodSecurityPolicySpec) -> Result<()> {
        if let Some(strategy) = &spec.run_as_user {
            if strategy.rule == RunAsUserRule::MustRunAs {
                validate_ranges(name, "runAsUser", &strategy.ranges)?;
            }
        }

        if let Some(strategy) = &spec.run_as_group {
            if strategy.rule != GroupRule::RunAsAny {
                validate_ranges(name, "runAsGroup", &strategy.ranges)?;
            }
        }

        for (field, strategy) in [
            ("supplementalGroups", &spec.supplemental_groups),
            ("fsGroup", &spec.fs_group),
        ] {
            if let Some(strategy) = strategy {
                if strategy.effective_rule() != GroupRule::RunAsAny {
                    validate_ranges(name, field, &strategy.ranges)?;
                }
            }
        }

        if let Some(strategy) = &spec.se_linux {
            if strategy.rule == SeLinuxRule::MustRunAs && strategy.se_linux_options.is_none() {
                return Err(CoreError::malformed(
                    name,
                    "seLinux",
                    "rule MustRunAs requires seLinuxOptions",
                ));
            }
        }

        if let Some(strategy) = &spec.runtime_class {
            if let Some(default) = &strategy.default_runtime_class_name {
                if !strategy.allows(default) {
                    return Err(CoreError::malformed(
                        name,
                        "runtimeClass",
                        format!(
                            "defaultRuntimeClassName '{}' is not in allowedRuntimeClassNames",
                            default
                        ),
                    ));
                }
            }
        }

        Ok(())
    }

    fn capability_defaults(spec: &PodSecurityPolicySpec, defaults: &mut Vec<PolicyDefault>) {
        if !spec.default_add_capabilities.is_empty() {
            defaults.push(PolicyDefault::field(
                MutatingField::DefaultAddCapabilities,
                PodPath::CapabilitiesAdd,
                FieldValue::Texts(spec.default_add_capabilities.clone()),
                Comparison::Contains,
            ));
        }

        if !spec.required_drop_capabilities.is_empty() {
            defaults.push(PolicyDefault::field(
                MutatingField::RequiredDropCapabilities,
                PodPath::CapabilitiesDrop,
                FieldValue::Texts(spec.required_drop_capabilities.clone()),
                Comparison::Contains,
            ));
        }
    }

    fn selinux_default(spec: &PodSecurityPolicySpec, defaults: &mut Vec<PolicyDefault>) {
        let Some(strategy) = &spec.se_linux else {
            return;
        };
        if let (SeLinuxRule::MustRunAs, Some(options)) = (strategy.rule, &strategy.se_linux_options)
        {
            defaults.push(PolicyDefault::field(
                MutatingField::SeLinux,
                PodPath::SeLinuxOptions,
                FieldValue::Text(selinux_label(options)),
                Comparison::Exact,
            ));
        }
    }

    fn id_defaults(spec: &PodSecurityPolicySpec, defaults: &mut Vec<PolicyDefault>) {
        if let Some(strategy) = &spec.run_as_user {
            match strategy.rule {
                RunAsUserRule::MustRunAs => defaults.push(PolicyDefault::field(
                    MutatingField::RunAsUser,
                    PodPath::RunAsUser,
                    FieldValue::Int(strategy.ranges[0].min),
                    Comparison::InRanges(strategy.ranges.clone()),
                )),
                // An explicit runAsUser or runAsNonRoot suppresses the default.
                RunAsUserRule::MustRunAsNonRoot => defaults.push(PolicyDefault::field(
                    MutatingField::RunAsUser,
                    PodPath::RunAsNonRoot,
                    FieldValue::Bool(true),
                    Comparison::Presence,
                )),
                RunAsUserRule::RunAsAny => {}
            }
        }

        if let Some(strategy) = &spec.run_as_group {
            if strategy.rule == GroupRule::MustRunAs {
                defaults.push(PolicyDefault::field(
                    MutatingField::RunAsGroup,
                    PodPath::RunAsGroup,
                    FieldValue::Int(strategy.ranges[0].min),
                    Comparison::InRanges(strategy.ranges.clone()),
                ));
            }
        }

        if let Some(ranges) = must_run_as_ranges(spec.supplemental_groups.as_ref()) {
            defaults.push(PolicyDefault::field(
                MutatingField::SupplementalGroups,
                PodPath::SupplementalGroups,
                FieldValue::Ints(vec![ranges[0].min]),
                Comparison::InRanges(ranges.to_vec()),
            ));
        }

        if let Some(ranges) = must_run_as_ranges(spec.fs_group.as_ref()) {
            defaults.push(PolicyDefault::field(
                MutatingField::FsGroup,
                PodPath::FsGroup,
                FieldValue::Int(ranges[0].min),
                Comparison::InRanges(ranges.to_vec()),
            ));
        }
    }

    fn container_flag_defaults(spec: &PodSecurityPolicySpec, defaults: &mut Vec<PolicyDefault>) {
        if spec.read_only_root_filesystem == Some(true) {
            defaults.push(PolicyDefault::field(
                MutatingField::ReadOnlyRootFilesystem,
                PodPath::ReadOnlyRootFilesystem,
                FieldValue::Bool(true),
                Comparison::Exact,
            ));
        }

        if let Some(value) = spec.default_allow_privilege_escalation {
            defaults.push(PolicyDefault::field(
                MutatingField::DefaultAllowPrivilegeEscalation,
                PodPath::AllowPrivilegeEscalation,
                FieldValue::Bool(value),
                Comparison::Presence,
            ));
        }

        if spec.allow_privilege_escalation == Some(false) {
            defaults.push(PolicyDefault::field(
                MutatingField::AllowPrivilegeEscalation,
                PodPath::AllowPrivilegeEscalation,
                FieldValue::Bool(false),
                Comparison::Exact,
            ));
        }
    }

    fn runtime_class_default(spec: &PodSecurityPolicySpec, defaults: &mut Vec<PolicyDefault>) {
        let default = spec
            .runtime_class
            .as_ref()
            .and_then(|s| s.default_runtime_class_name.as_deref());

        if let Some(name) = default {
            defaults.push(PolicyDefault::field(
                MutatingField::RuntimeClass,
                PodPath::RuntimeClassName,
                FieldValue::Text(name.to_string()),
                Comparison::Presence,
            ));
        }
    }

    fn annotation_defaults(policy: &PodSecurityPolicy, defaults: &mut Vec<PolicyDefault>) {
        for annotation in MutatingAnnotation::ALL {
            let Some(profile) = policy.annotation(annotation.key()) else {
                continue;
            };
            if profile.is_empty() {
                continue;
            }

            let target = match annotation {
                MutatingAnnotation::SeccompDefaultProfile => PodPath::SeccompProfile,
                MutatingAnnotation::AppArmorDefaultProfile => PodPath::AppArmorProfile,
            };

            defaults.push(PolicyDefault {
                source: DefaultSource::Annotation(annotation),
                target,
                expected: FieldValue::Text(profile.to_string()),
                comparison: Comparison::Presence,
            });
        }
    }
}

/// Analyze a policy for mutating fields and annotations
pub fn analyze(policy: &PodSecurityPolicy) -> Result<PolicyAnalysis> {
    PolicyAnalyzer::analyze(policy)
}

/// Render SELinux options as `user:role:type:level`
pub fn selinux_label(options: &SELinuxOptions) -> String {
    [&options.user, &options.role, &options.type_, &options.level]
        .iter()
        .map(|part| part.as_deref().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(":")
}

fn validate_ranges(policy: &str, field: &str, ranges: &[IdRange]) -> Result<()> {
    if ranges.is_empty() {
        return Err(CoreError::malformed(
            policy,
            field,
            "range strategy declares no ranges",
        ));
    }

    if let Some(range) = ranges.iter().find(|r| r.min > r.max) {
        return Err(CoreError::malformed(
            policy,
            format!("{}.ranges", field),
            format!("min {} is greater than max {}", range.min, range.max),
        ));
    }

    Ok(())
}

fn must_run_as_ranges(strategy: Option<&GroupStrategyOptions>) -> Option<&[IdRange]> {
    strategy
        .filter(|s| s.effective_rule() == GroupRule::MustRunAs)
        .map(|s| s.ranges.as_slice())
}
