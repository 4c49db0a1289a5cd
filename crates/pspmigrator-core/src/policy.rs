//! PodSecurityPolicy object model
//!
//! `policy/v1beta1` PodSecurityPolicy was removed from the Kubernetes API in
//! v1.25 and is no longer generated by `k8s-openapi`, so the subset of the
//! schema that drives admission-time defaulting is declared here.
//!
//! Fields that only validate a pod (host namespaces, volumes, sysctls, ...)
//! are kept so that policies round-trip faithfully, but they never contribute
//! to mutation analysis.

use k8s_openapi::api::core::v1::SELinuxOptions;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Pod annotation recording the policy that admitted a pod
pub const BOUND_POLICY_ANNOTATION: &str = "kubernetes.io/psp";

/// Policy annotation holding the default seccomp profile
pub const SECCOMP_DEFAULT_PROFILE_ANNOTATION: &str =
    "seccomp.security.alpha.kubernetes.io/defaultProfileName";

/// Policy annotation holding the default AppArmor profile
pub const APPARMOR_DEFAULT_PROFILE_ANNOTATION: &str =
    "apparmor.security.beta.kubernetes.io/defaultProfileName";

/// Pod annotation carrying the pod-wide seccomp profile
pub const SECCOMP_POD_ANNOTATION: &str = "seccomp.security.alpha.kubernetes.io/pod";

/// Prefix of the per-container AppArmor pod annotation
pub const APPARMOR_CONTAINER_ANNOTATION_PREFIX: &str = "container.apparmor.security.beta.kubernetes.io/";

/// A cluster-scoped PodSecurityPolicy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSecurityPolicy {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<PodSecurityPolicySpec>,
}

impl PodSecurityPolicy {
    /// Policy name, empty when the object carries none
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Look up a policy annotation
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }
}

impl k8s_openapi::Resource for PodSecurityPolicy {
    const API_VERSION: &'static str = "policy/v1beta1";
    const GROUP: &'static str = "policy";
    const KIND: &'static str = "PodSecurityPolicy";
    const VERSION: &'static str = "v1beta1";
    const URL_PATH_SEGMENT: &'static str = "podsecuritypolicies";
    type Scope = k8s_openapi::ClusterResourceScope;
}

impl k8s_openapi::Metadata for PodSecurityPolicy {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// Policy rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSecurityPolicySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_add_capabilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_drop_capabilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_capabilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_network: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_ports: Vec<HostPortRange>,

    #[serde(default, rename = "hostPID", skip_serializing_if = "Option::is_none")]
    pub host_pid: Option<bool>,

    #[serde(default, rename = "hostIPC", skip_serializing_if = "Option::is_none")]
    pub host_ipc: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub se_linux: Option<SeLinuxStrategyOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<RunAsUserStrategyOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_group: Option<RunAsGroupStrategyOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_groups: Option<GroupStrategyOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_group: Option<GroupStrategyOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_root_filesystem: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_allow_privilege_escalation: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_privilege_escalation: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_host_paths: Vec<AllowedHostPath>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_unsafe_sysctls: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbidden_sysctls: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_proc_mount_types: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_class: Option<RuntimeClassStrategyOptions>,
}

/// Inclusive id range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub min: i64,
    pub max: i64,
}

impl IdRange {
    pub fn contains(&self, id: i64) -> bool {
        self.min <= id && id <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPortRange {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedHostPath {
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub read_only: Option<bool>,
}

/// SELinux strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeLinuxStrategyOptions {
    pub rule: SeLinuxRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub se_linux_options: Option<SELinuxOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeLinuxRule {
    MustRunAs,
    RunAsAny,
}

/// `runAsUser` strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAsUserStrategyOptions {
    pub rule: RunAsUserRule,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<IdRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunAsUserRule {
    MustRunAs,
    MustRunAsNonRoot,
    RunAsAny,
}

/// `runAsGroup` strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAsGroupStrategyOptions {
    pub rule: GroupRule,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<IdRange>,
}

/// `supplementalGroups` and `fsGroup` strategy
///
/// The API leaves `rule` optional; an absent rule behaves as `RunAsAny`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStrategyOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<GroupRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<IdRange>,
}

impl GroupStrategyOptions {
    pub fn effective_rule(&self) -> GroupRule {
        self.rule.unwrap_or(GroupRule::RunAsAny)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupRule {
    MustRunAs,
    MayRunAs,
    RunAsAny,
}

/// Runtime class strategy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeClassStrategyOptions {
    #[serde(default)]
    pub allowed_runtime_class_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_runtime_class_name: Option<String>,
}

impl RuntimeClassStrategyOptions {
    /// Whether a runtime class name is permitted (`*` allows everything)
    pub fn allows(&self, name: &str) -> bool {
        self.allowed_runtime_class_names
            .iter()
            .any(|allowed| allowed == "*" || allowed == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy_yaml() {
        let policy: PodSecurityPolicy = serde_yaml::from_str(
            r#"
apiVersion: policy/v1beta1
kind: PodSecurityPolicy
metadata:
  name: restricted
  annotations:
    seccomp.security.alpha.kubernetes.io/defaultProfileName: runtime/default
spec:
  hostPID: false
  requiredDropCapabilities: [ALL]
  volumes: [configMap, secret]
  seLinux:
    rule: RunAsAny
  runAsUser:
    rule: MustRunAs
    ranges:
      - min: 1000
        max: 2000
  supplementalGroups:
    rule: MayRunAs
    ranges:
      - min: 1
        max: 65535
  fsGroup: {}
"#,
        )
        .unwrap();

        assert_eq!(policy.name(), "restricted");
        assert_eq!(
            policy.annotation(SECCOMP_DEFAULT_PROFILE_ANNOTATION),
            Some("runtime/default")
        );

        let spec = policy.spec.unwrap();
        assert_eq!(spec.host_pid, Some(false));
        assert_eq!(spec.required_drop_capabilities, vec!["ALL"]);
        assert_eq!(spec.se_linux.unwrap().rule, SeLinuxRule::RunAsAny);

        let run_as_user = spec.run_as_user.unwrap();
        assert_eq!(run_as_user.rule, RunAsUserRule::MustRunAs);
        assert_eq!(run_as_user.ranges, vec![IdRange { min: 1000, max: 2000 }]);

        assert_eq!(
            spec.supplemental_groups.unwrap().effective_rule(),
            GroupRule::MayRunAs
        );
        assert_eq!(spec.fs_group.unwrap().effective_rule(), GroupRule::RunAsAny);
    }

    #[test]
    fn test_unknown_rule_is_rejected() {
        let result: Result<PodSecurityPolicy, _> = serde_yaml::from_str(
            r#"
metadata:
  name: odd
spec:
  runAsUser:
    rule: RunAsSomebody
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_runtime_class_wildcard() {
        let strategy = RuntimeClassStrategyOptions {
            allowed_runtime_class_names: vec!["*".to_string()],
            default_runtime_class_name: Some("gvisor".to_string()),
        };
        assert!(strategy.allows("gvisor"));
        assert!(strategy.allows("kata"));

        let strict = RuntimeClassStrategyOptions {
            allowed_runtime_class_names: vec!["kata".to_string()],
            default_runtime_class_name: None,
        };
        assert!(strict.allows("kata"));
        assert!(!strict.allows("gvisor"));
    }

    #[test]
    fn test_id_range_is_inclusive() {
        let range = IdRange { min: 10, max: 20 };
        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(9));
        assert!(!range.contains(21));
    }
}
