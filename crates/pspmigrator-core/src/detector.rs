//! Pod mutation detector
//!
//! Resolves the policy that admitted a pod, reconstructs the value each of the
//! policy's defaults would write, and diffs it against the live pod.
//!
//! Detection is structural: a pod that explicitly sets a value equal to the
//! policy default is indistinguishable from one the policy mutated, and is
//! reported as not mutated.

use k8s_openapi::api::core::v1::{
    Capabilities, Container, Pod, PodSecurityContext, SELinuxOptions,
};

use crate::accessor::ClusterAccessor;
use crate::analyzer::{PolicyAnalyzer, PolicyDefault, selinux_label};
use crate::error::{AccessError, CoreError, Result};
use crate::field::{ContainerKind, ContainerRef, FieldValue, PodPath, Scope};
use crate::ignore::IgnoreSet;
use crate::policy::{
    APPARMOR_CONTAINER_ANNOTATION_PREFIX, BOUND_POLICY_ANNOTATION, PodSecurityPolicy,
    SECCOMP_POD_ANNOTATION,
};
use crate::report::{FieldDiff, PodMutation};

/// Name of the policy recorded on the pod at admission, if any
pub fn bound_policy(pod: &Pod) -> Option<&str> {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(BOUND_POLICY_ANNOTATION))
        .map(String::as_str)
}

/// Check whether a pod is being mutated by its bound policy
///
/// Pods without a policy annotation are reported as not mutated. A missing
/// policy fails with [`CoreError::PolicyNotFound`]; any other accessor
/// failure is propagated unchanged.
pub async fn detect<A>(pod: &Pod, accessor: &A, ignore: &IgnoreSet) -> Result<PodMutation>
where
    A: ClusterAccessor + ?Sized,
{
    let name = pod.metadata.name.as_deref().unwrap_or_default();
    let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();

    let Some(policy_name) = bound_policy(pod) else {
        tracing::debug!(pod = %name, namespace = %namespace, "pod has no bound policy");
        return Ok(PodMutation::unbound(name, namespace));
    };

    let policy = match accessor.get_policy(policy_name).await {
        Ok(policy) => policy,
        Err(AccessError::NotFound { .. }) => {
            return Err(CoreError::PolicyNotFound {
                policy: policy_name.to_string(),
                pod: name.to_string(),
                namespace: namespace.to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    detect_with_policy(pod, &policy, ignore)
}

/// Check a pod against an already resolved policy
pub fn detect_with_policy(
    pod: &Pod,
    policy: &PodSecurityPolicy,
    ignore: &IgnoreSet,
) -> Result<PodMutation> {
    let analysis = PolicyAnalyzer::analyze(policy)?;
    let defaults = PolicyAnalyzer::defaults(policy)?;
    let diff = diff_pod(pod, &defaults, ignore);

    let report = PodMutation {
        pod: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        policy: Some(policy.name().to_string()),
        mutated: !diff.is_empty(),
        diff,
        analysis: Some(analysis),
    };

    tracing::debug!(
        pod = %report.pod,
        namespace = %report.namespace,
        policy = %policy.name(),
        mutated = report.mutated,
        "checked pod"
    );

    Ok(report)
}

/// Compare a pod against policy defaults
///
/// Pod-scoped defaults are compared once, container-scoped ones for every
/// container and init container not in the ignore set. When two defaults
/// target the same path only the first difference is kept.
///
/// SELinux options are applied per container, so the pod-level entry is
/// also satisfied when every compared container sets matching options.
pub fn diff_pod(pod: &Pod, defaults: &[PolicyDefault], ignore: &IgnoreSet) -> Vec<FieldDiff> {
    let active: Vec<&PolicyDefault> = defaults
        .iter()
        .filter(|d| !ignore.ignores_source(d.source))
        .collect();

    let mut diff = Vec::new();

    for default in active.iter().filter(|d| d.target.scope() == Scope::Pod) {
        let actual = pod_value(pod, default.target);
        if default.target == PodPath::SeLinuxOptions
            && !default.comparison.satisfied(&default.expected, &actual)
            && containers_carry_selinux(pod, default, ignore)
        {
            continue;
        }
        compare(default, None, default.expected.clone(), actual, &mut diff);
    }

    for (container_ref, container) in containers(pod) {
        if ignore.ignores_container(&container_ref.name) {
            tracing::trace!(container = %container_ref.name, "skipping ignored container");
            continue;
        }

        for default in active.iter().filter(|d| d.target.scope() == Scope::Container) {
            let Some(expected) = expected_for_container(default, container) else {
                continue;
            };
            let actual = container_value(pod, container, default.target);
            compare(default, Some(&container_ref), expected, actual, &mut diff);
        }
    }

    diff.dedup_by(|later, earlier| later.path == earlier.path);
    diff
}

fn compare(
    default: &PolicyDefault,
    container: Option<&ContainerRef>,
    expected: FieldValue,
    actual: FieldValue,
    diff: &mut Vec<FieldDiff>,
) {
    if default.comparison.satisfied(&expected, &actual) {
        return;
    }

    diff.push(FieldDiff {
        source: default.source,
        container: container.map(|c| c.name.clone()),
        path: default.target.render(container),
        expected,
        actual,
    });
}

/// Every container and init container with its address in the pod
fn containers(pod: &Pod) -> Vec<(ContainerRef, &Container)> {
    let Some(spec) = pod.spec.as_ref() else {
        return Vec::new();
    };

    let init = spec
        .init_containers
        .iter()
        .flatten()
        .map(|c| (ContainerKind::InitContainer, c));
    let regular = spec.containers.iter().map(|c| (ContainerKind::Container, c));

    init.chain(regular)
        .map(|(kind, c)| {
            (
                ContainerRef {
                    kind,
                    name: c.name.clone(),
                },
                c,
            )
        })
        .collect()
}

/// Adjust a container-scoped default to what admission would write here
///
/// Default-add capabilities the container explicitly drops are not added.
fn expected_for_container(default: &PolicyDefault, container: &Container) -> Option<FieldValue> {
    match (default.target, &default.expected) {
        (PodPath::CapabilitiesAdd, FieldValue::Texts(caps)) => {
            let dropped = capabilities(container, |c| c.drop.as_deref());
            let remaining: Vec<String> = caps
                .iter()
                .filter(|cap| !dropped.contains(cap))
                .cloned()
                .collect();
            (!remaining.is_empty()).then_some(FieldValue::Texts(remaining))
        }
        _ => Some(default.expected.clone()),
    }
}

/// Whether every compared container sets SELinux options matching the default
fn containers_carry_selinux(pod: &Pod, default: &PolicyDefault, ignore: &IgnoreSet) -> bool {
    let mut labels = containers(pod)
        .into_iter()
        .filter(|(container_ref, _)| !ignore.ignores_container(&container_ref.name))
        .map(|(_, container)| {
            selinux_value(
                container
                    .security_context
                    .as_ref()
                    .and_then(|sc| sc.se_linux_options.as_ref()),
            )
        })
        .peekable();

    labels.peek().is_some()
        && labels.all(|actual| default.comparison.satisfied(&default.expected, &actual))
}

fn selinux_value(options: Option<&SELinuxOptions>) -> FieldValue {
    options.map_or(FieldValue::Unset, |o| FieldValue::Text(selinux_label(o)))
}

fn pod_security_context(pod: &Pod) -> Option<&PodSecurityContext> {
    pod.spec.as_ref().and_then(|s| s.security_context.as_ref())
}

fn pod_annotation<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}

fn pod_value(pod: &Pod, target: PodPath) -> FieldValue {
    let psc = pod_security_context(pod);

    match target {
        PodPath::SeLinuxOptions => selinux_value(psc.and_then(|sc| sc.se_linux_options.as_ref())),
        PodPath::SupplementalGroups => {
            FieldValue::from_ints(psc.and_then(|sc| sc.supplemental_groups.as_deref()))
        }
        PodPath::FsGroup => FieldValue::from_int(psc.and_then(|sc| sc.fs_group)),
        PodPath::RuntimeClassName => FieldValue::from_text(
            pod.spec
                .as_ref()
                .and_then(|s| s.runtime_class_name.as_deref()),
        ),
        PodPath::SeccompProfile => {
            if let Some(profile) = pod_annotation(pod, SECCOMP_POD_ANNOTATION) {
                return FieldValue::Text(profile.to_string());
            }
            psc.and_then(|sc| sc.seccomp_profile.as_ref())
                .map_or(FieldValue::Unset, |p| {
                    FieldValue::Text(seccomp_profile_name(&p.type_, p.localhost_profile.as_deref()))
                })
        }
        _ => FieldValue::Unset,
    }
}

fn container_value(pod: &Pod, container: &Container, target: PodPath) -> FieldValue {
    let csc = container.security_context.as_ref();
    let psc = pod_security_context(pod);

    // Container settings take precedence over the pod security context.
    let run_as_user = csc
        .and_then(|sc| sc.run_as_user)
        .or_else(|| psc.and_then(|sc| sc.run_as_user));

    match target {
        PodPath::CapabilitiesAdd => {
            FieldValue::from_texts(Some(capabilities(container, |c| c.add.as_deref()).as_slice()))
        }
        PodPath::CapabilitiesDrop => {
            FieldValue::from_texts(Some(capabilities(container, |c| c.drop.as_deref()).as_slice()))
        }
        PodPath::RunAsUser => FieldValue::from_int(run_as_user),
        PodPath::RunAsNonRoot => {
            let non_root = csc
                .and_then(|sc| sc.run_as_non_root)
                .or_else(|| psc.and_then(|sc| sc.run_as_non_root));
            match (non_root, run_as_user) {
                (Some(value), _) => FieldValue::Bool(value),
                (None, Some(uid)) => FieldValue::Int(uid),
                (None, None) => FieldValue::Unset,
            }
        }
        PodPath::RunAsGroup => FieldValue::from_int(
            csc.and_then(|sc| sc.run_as_group)
                .or_else(|| psc.and_then(|sc| sc.run_as_group)),
        ),
        PodPath::ReadOnlyRootFilesystem => {
            FieldValue::from_bool(csc.and_then(|sc| sc.read_only_root_filesystem))
        }
        PodPath::AllowPrivilegeEscalation => {
            FieldValue::from_bool(csc.and_then(|sc| sc.allow_privilege_escalation))
        }
        PodPath::AppArmorProfile => {
            let key = format!("{}{}", APPARMOR_CONTAINER_ANNOTATION_PREFIX, container.name);
            FieldValue::from_text(pod_annotation(pod, &key))
        }
        _ => FieldValue::Unset,
    }
}

fn capabilities(
    container: &Container,
    select: impl Fn(&Capabilities) -> Option<&[String]>,
) -> Vec<String> {
    container
        .security_context
        .as_ref()
        .and_then(|sc| sc.capabilities.as_ref())
        .and_then(select)
        .map(<[String]>::to_vec)
        .unwrap_or_default()
}

/// Render a seccomp profile the way the legacy annotation spells it
fn seccomp_profile_name(profile_type: &str, localhost_profile: Option<&str>) -> String {
    match profile_type {
        "RuntimeDefault" => "runtime/default".to_string(),
        "Unconfined" => "unconfined".to_string(),
        "Localhost" => format!("localhost/{}", localhost_profile.unwrap_or_default()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::MockAccessor;
    use crate::analyzer::DefaultSource;
    use crate::field::MutatingField;

    fn make_pod(yaml: &str) -> Pod {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn make_policy(yaml: &str) -> PodSecurityPolicy {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn fixed_user_policy() -> PodSecurityPolicy {
        make_policy(
            r#"
metadata:
  name: fixed-user
spec:
  runAsUser:
    rule: MustRunAs
    ranges:
      - min: 1000
        max: 1000
  seLinux:
    rule: RunAsAny
"#,
        )
    }

    fn restricted_policy() -> PodSecurityPolicy {
        make_policy(
            r#"
metadata:
  name: restricted
  annotations:
    seccomp.security.alpha.kubernetes.io/defaultProfileName: runtime/default
    apparmor.security.beta.kubernetes.io/defaultProfileName: runtime/default
spec:
  allowPrivilegeEscalation: false
  defaultAllowPrivilegeEscalation: false
  requiredDropCapabilities: [ALL]
  runAsUser:
    rule: MustRunAsNonRoot
  seLinux:
    rule: RunAsAny
  supplementalGroups:
    rule: MustRunAs
    ranges:
      - min: 1
        max: 65535
  fsGroup:
    rule: MustRunAs
    ranges:
      - min: 1
        max: 65535
"#,
        )
    }

    fn bare_pod(policy: &str) -> Pod {
        make_pod(&format!(
            r#"
apiVersion: v1
kind: Pod
metadata:
  name: web
  namespace: shop
  annotations:
    kubernetes.io/psp: {policy}
spec:
  containers:
    - name: app
      image: nginx
    - name: istio-proxy
      image: istio/proxyv2
"#
        ))
    }

    fn compliant_restricted_pod() -> Pod {
        make_pod(
            r#"
apiVersion: v1
kind: Pod
metadata:
  name: web
  namespace: shop
  annotations:
    kubernetes.io/psp: restricted
    seccomp.security.alpha.kubernetes.io/pod: runtime/default
    container.apparmor.security.beta.kubernetes.io/app: runtime/default
spec:
  securityContext:
    runAsNonRoot: true
    fsGroup: 2000
    supplementalGroups: [3000]
  containers:
    - name: app
      image: nginx
      securityContext:
        allowPrivilegeEscalation: false
        capabilities:
          drop: [ALL]
"#,
        )
    }

    #[tokio::test]
    async fn test_missing_run_as_user_is_mutated() {
        let accessor = MockAccessor::new().with_policy(fixed_user_policy());
        let pod = bare_pod("fixed-user");

        let report = detect(&pod, &accessor, &IgnoreSet::new()).await.unwrap();

        assert!(report.mutated);
        assert_eq!(report.policy.as_deref(), Some("fixed-user"));
        assert!(
            report
                .analysis
                .as_ref()
                .unwrap()
                .fields
                .contains(&MutatingField::RunAsUser)
        );
        assert_eq!(report.diff.len(), 2);
        insta::assert_snapshot!(
            report.diff[0].to_string(),
            @"spec.containers[app].securityContext.runAsUser: expected 1000, actual <unset>"
        );
        assert_eq!(report.diff[0].actual, FieldValue::Unset);
        assert_eq!(report.diff[1].container.as_deref(), Some("istio-proxy"));
    }

    #[tokio::test]
    async fn test_explicit_default_value_is_not_mutation() {
        let accessor = MockAccessor::new().with_policy(fixed_user_policy());
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
  annotations:
    kubernetes.io/psp: fixed-user
spec:
  securityContext:
    runAsUser: 1000
  containers:
    - name: app
      image: nginx
"#,
        );

        let report = detect(&pod, &accessor, &IgnoreSet::new()).await.unwrap();
        assert!(!report.mutated);
        assert!(report.diff.is_empty());
    }

    #[tokio::test]
    async fn test_no_annotation_is_not_mutated() {
        let accessor = MockAccessor::new().with_policy(fixed_user_policy());
        let pod = make_pod(
            r#"
metadata:
  name: plain
  namespace: default
spec:
  containers:
    - name: app
      image: nginx
"#,
        );

        let report = detect(&pod, &accessor, &IgnoreSet::new()).await.unwrap();
        assert!(!report.mutated);
        assert!(report.diff.is_empty());
        assert!(report.policy.is_none());
        assert_eq!(accessor.operation_counts().policy_gets, 0);
    }

    #[tokio::test]
    async fn test_missing_policy() {
        let accessor = MockAccessor::new();
        let pod = bare_pod("deleted");

        match detect(&pod, &accessor, &IgnoreSet::new()).await {
            Err(CoreError::PolicyNotFound { policy, pod, namespace }) => {
                assert_eq!(policy, "deleted");
                assert_eq!(pod, "web");
                assert_eq!(namespace, "shop");
            }
            other => panic!("expected PolicyNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let accessor = MockAccessor::new().with_policy(fixed_user_policy());
        accessor.fail_with("Unauthorized");

        let err = detect(&bare_pod("fixed-user"), &accessor, &IgnoreSet::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Accessor(AccessError::Transport { .. })
        ));
        assert_eq!(accessor.operation_counts().policy_gets, 1);
    }

    #[tokio::test]
    async fn test_malformed_policy_propagates() {
        let accessor = MockAccessor::new().with_policy(make_policy(
            r#"
metadata:
  name: broken
spec:
  fsGroup:
    rule: MustRunAs
"#,
        ));

        let err = detect(&bare_pod("broken"), &accessor, &IgnoreSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MalformedPolicy { .. }));
    }

    #[test]
    fn test_ignored_container_never_appears() {
        let pod = bare_pod("restricted");
        let ignore = IgnoreSet::parse_containers("istio-proxy");

        let report = detect_with_policy(&pod, &restricted_policy(), &ignore).unwrap();

        assert!(report.mutated);
        assert_eq!(report.container_diff("istio-proxy").count(), 0);
        assert!(report.diff.iter().all(|d| !d.path.contains("istio-proxy")));
        assert!(report.container_diff("app").count() > 0);
    }

    #[test]
    fn test_ignored_field() {
        let pod = bare_pod("fixed-user");
        let ignore = IgnoreSet::new().with_field(MutatingField::RunAsUser);

        let report = detect_with_policy(&pod, &fixed_user_policy(), &ignore).unwrap();
        assert!(!report.mutated);
        assert!(report.analysis.unwrap().fields.contains(&MutatingField::RunAsUser));
    }

    #[test]
    fn test_compliant_pod_is_not_mutated() {
        let report =
            detect_with_policy(&compliant_restricted_pod(), &restricted_policy(), &IgnoreSet::new())
                .unwrap();
        assert!(!report.mutated, "unexpected diff: {:?}", report.diff);
    }

    #[test]
    fn test_restricted_diff_paths() {
        let pod = bare_pod("restricted");
        let ignore = IgnoreSet::parse_containers("istio-proxy");
        let report = detect_with_policy(&pod, &restricted_policy(), &ignore).unwrap();

        let paths: Vec<&str> = report.diff.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "spec.securityContext.supplementalGroups",
                "spec.securityContext.fsGroup",
                "spec.securityContext.seccompProfile",
                "spec.containers[app].securityContext.capabilities.drop",
                "spec.containers[app].securityContext.runAsNonRoot",
                "spec.containers[app].securityContext.allowPrivilegeEscalation",
                "metadata.annotations[container.apparmor.security.beta.kubernetes.io/app]",
            ]
        );

        // Both privilege escalation rules target one path; the first wins.
        let escalation = &report.diff[5];
        assert_eq!(
            escalation.source,
            DefaultSource::Field(MutatingField::DefaultAllowPrivilegeEscalation)
        );
        assert_eq!(escalation.expected, FieldValue::Bool(false));
    }

    #[test]
    fn test_explicit_uid_satisfies_non_root() {
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  containers:
    - name: app
      image: nginx
      securityContext:
        runAsUser: 1001
"#,
        );
        let policy = make_policy(
            r#"
metadata:
  name: nonroot
spec:
  runAsUser:
    rule: MustRunAsNonRoot
"#,
        );

        let report = detect_with_policy(&pod, &policy, &IgnoreSet::new()).unwrap();
        assert!(!report.mutated);
    }

    #[test]
    fn test_run_as_any_capabilities_produce_no_diff() {
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  containers:
    - name: app
      image: nginx
      securityContext:
        capabilities:
          add: [NET_ADMIN]
"#,
        );
        let policy = make_policy(
            r#"
metadata:
  name: caps
spec:
  allowedCapabilities: ['*']
  runAsUser:
    rule: RunAsAny
"#,
        );

        let report = detect_with_policy(&pod, &policy, &IgnoreSet::new()).unwrap();
        assert!(!report.mutated);
        assert!(report.diff.is_empty());
    }

    #[test]
    fn test_default_add_respects_container_drop() {
        let policy = make_policy(
            r#"
metadata:
  name: add-caps
spec:
  defaultAddCapabilities: [NET_BIND_SERVICE, CHOWN]
"#,
        );
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  initContainers:
    - name: setup
      image: busybox
      securityContext:
        capabilities:
          drop: [NET_BIND_SERVICE, CHOWN]
  containers:
    - name: app
      image: nginx
      securityContext:
        capabilities:
          drop: [CHOWN]
          add: [SYS_TIME]
"#,
        );

        let report = detect_with_policy(&pod, &policy, &IgnoreSet::new()).unwrap();
        assert_eq!(report.diff.len(), 1);
        assert_eq!(report.diff[0].container.as_deref(), Some("app"));
        assert_eq!(
            report.diff[0].expected,
            FieldValue::Texts(vec!["NET_BIND_SERVICE".to_string()])
        );
        assert_eq!(
            report.diff[0].actual,
            FieldValue::Texts(vec!["SYS_TIME".to_string()])
        );
    }

    #[test]
    fn test_seccomp_field_satisfies_annotation_default() {
        let policy = make_policy(
            r#"
metadata:
  name: seccomp
  annotations:
    seccomp.security.alpha.kubernetes.io/defaultProfileName: runtime/default
spec: {}
"#,
        );
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  securityContext:
    seccompProfile:
      type: RuntimeDefault
  containers:
    - name: app
      image: nginx
"#,
        );

        let report = detect_with_policy(&pod, &policy, &IgnoreSet::new()).unwrap();
        assert!(!report.mutated);
    }

    #[test]
    fn test_out_of_range_fs_group_is_reported() {
        let policy = make_policy(
            r#"
metadata:
  name: fsgroup
spec:
  fsGroup:
    rule: MustRunAs
    ranges:
      - min: 100
        max: 200
"#,
        );
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  securityContext:
    fsGroup: 5
  containers:
    - name: app
      image: nginx
"#,
        );

        let report = detect_with_policy(&pod, &policy, &IgnoreSet::new()).unwrap();
        assert_eq!(report.diff.len(), 1);
        assert_eq!(
            report.diff[0].to_string(),
            "spec.securityContext.fsGroup: expected 100, actual 5"
        );
    }

    fn selinux_policy() -> PodSecurityPolicy {
        make_policy(
            r#"
metadata:
  name: selinux
spec:
  seLinux:
    rule: MustRunAs
    seLinuxOptions:
      level: s0:c1,c2
"#,
        )
    }

    #[test]
    fn test_container_selinux_options_satisfy_default() {
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  containers:
    - name: app
      image: nginx
      securityContext:
        seLinuxOptions:
          level: s0:c1,c2
"#,
        );

        let report = detect_with_policy(&pod, &selinux_policy(), &IgnoreSet::new()).unwrap();
        assert!(!report.mutated, "unexpected diff: {:?}", report.diff);
    }

    #[test]
    fn test_partial_container_selinux_options_are_mutated() {
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  containers:
    - name: app
      image: nginx
      securityContext:
        seLinuxOptions:
          level: s0:c1,c2
    - name: istio-proxy
      image: istio/proxyv2
"#,
        );

        let report = detect_with_policy(&pod, &selinux_policy(), &IgnoreSet::new()).unwrap();
        assert_eq!(report.diff.len(), 1);
        assert_eq!(
            report.diff[0].to_string(),
            "spec.securityContext.seLinuxOptions: expected :::s0:c1,c2, actual <unset>"
        );

        let ignore = IgnoreSet::new().with_container("istio-proxy");
        let report = detect_with_policy(&pod, &selinux_policy(), &ignore).unwrap();
        assert!(!report.mutated);
    }

    fn group_policy() -> PodSecurityPolicy {
        make_policy(
            r#"
metadata:
  name: group
spec:
  runAsGroup:
    rule: MustRunAs
    ranges:
      - min: 100
        max: 200
"#,
        )
    }

    #[test]
    fn test_missing_run_as_group_is_mutated() {
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  containers:
    - name: app
      image: nginx
"#,
        );

        let report = detect_with_policy(&pod, &group_policy(), &IgnoreSet::new()).unwrap();
        assert_eq!(report.diff.len(), 1);
        assert_eq!(
            report.diff[0].to_string(),
            "spec.containers[app].securityContext.runAsGroup: expected 100, actual <unset>"
        );
    }

    #[test]
    fn test_pod_level_run_as_group_in_range() {
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  securityContext:
    runAsGroup: 150
  containers:
    - name: app
      image: nginx
"#,
        );

        let report = detect_with_policy(&pod, &group_policy(), &IgnoreSet::new()).unwrap();
        assert!(!report.mutated, "unexpected diff: {:?}", report.diff);
    }

    #[test]
    fn test_read_only_root_filesystem() {
        let policy = make_policy(
            r#"
metadata:
  name: read-only
spec:
  readOnlyRootFilesystem: true
"#,
        );
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  containers:
    - name: app
      image: nginx
      securityContext:
        readOnlyRootFilesystem: false
    - name: sidecar
      image: busybox
      securityContext:
        readOnlyRootFilesystem: true
"#,
        );

        let report = detect_with_policy(&pod, &policy, &IgnoreSet::new()).unwrap();
        assert_eq!(report.diff.len(), 1);
        assert_eq!(
            report.diff[0].to_string(),
            "spec.containers[app].securityContext.readOnlyRootFilesystem: expected true, actual false"
        );
        assert_eq!(
            report.diff[0].source,
            DefaultSource::Field(MutatingField::ReadOnlyRootFilesystem)
        );
    }

    #[test]
    fn test_runtime_class_presence() {
        let policy = make_policy(
            r#"
metadata:
  name: sandboxed
spec:
  runtimeClass:
    allowedRuntimeClassNames: ['*']
    defaultRuntimeClassName: gvisor
"#,
        );

        let report = detect_with_policy(&bare_pod("sandboxed"), &policy, &IgnoreSet::new()).unwrap();
        assert_eq!(report.diff.len(), 1);
        assert_eq!(
            report.diff[0].to_string(),
            "spec.runtimeClassName: expected gvisor, actual <unset>"
        );

        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  runtimeClassName: kata
  containers:
    - name: app
      image: nginx
"#,
        );
        let report = detect_with_policy(&pod, &policy, &IgnoreSet::new()).unwrap();
        assert!(!report.mutated);
    }

    #[test]
    fn test_disallowed_privilege_escalation_without_default() {
        let policy = make_policy(
            r#"
metadata:
  name: no-escalation
spec:
  allowPrivilegeEscalation: false
"#,
        );
        let pod = make_pod(
            r#"
metadata:
  name: web
  namespace: shop
spec:
  containers:
    - name: app
      image: nginx
    - name: sidecar
      image: busybox
      securityContext:
        allowPrivilegeEscalation: false
"#,
        );

        let report = detect_with_policy(&pod, &policy, &IgnoreSet::new()).unwrap();
        assert_eq!(report.diff.len(), 1);
        assert_eq!(
            report.diff[0].source,
            DefaultSource::Field(MutatingField::AllowPrivilegeEscalation)
        );
        assert_eq!(
            report.diff[0].to_string(),
            "spec.containers[app].securityContext.allowPrivilegeEscalation: expected false, actual <unset>"
        );
    }

    #[tokio::test]
    async fn test_detect_is_idempotent() {
        let accessor = MockAccessor::new().with_policy(restricted_policy());
        let pod = bare_pod("restricted");
        let ignore = IgnoreSet::new();

        let first = detect(&pod, &accessor, &ignore).await.unwrap();
        let second = detect(&pod, &accessor, &ignore).await.unwrap();
        assert_eq!(first, second);
    }
}
