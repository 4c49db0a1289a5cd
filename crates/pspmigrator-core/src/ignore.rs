//! Caller-supplied exclusions applied while diffing a pod

use std::collections::BTreeSet;

use crate::analyzer::DefaultSource;
use crate::field::MutatingField;

/// Containers and policy fields excluded from comparison
///
/// Only consulted by the detector; policy analysis always sees every field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    containers: BTreeSet<String>,
    fields: BTreeSet<MutatingField>,
}

impl IgnoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated container list, e.g. `istio-proxy, linkerd-proxy`
    pub fn parse_containers(list: &str) -> Self {
        let containers = list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            containers,
            fields: BTreeSet::new(),
        }
    }

    pub fn with_container(mut self, name: impl Into<String>) -> Self {
        self.containers.insert(name.into());
        self
    }

    pub fn with_field(mut self, field: MutatingField) -> Self {
        self.fields.insert(field);
        self
    }

    pub fn ignores_container(&self, name: &str) -> bool {
        self.containers.contains(name)
    }

    pub fn ignores_source(&self, source: DefaultSource) -> bool {
        match source {
            DefaultSource::Field(field) => self.fields.contains(&field),
            DefaultSource::Annotation(_) => false,
        }
    }

    pub fn containers(&self) -> impl Iterator<Item = &str> {
        self.containers.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.fields.is_empty()
    }
}
