//! Diff Engine
//!
//! Compares the deployed objects with the requested ones kind by kind. Two
//! objects are the same object when their names match and, if both carry a
//! namespace, their namespaces match. For every kind:
//!
//! - deployed with no requested counterpart goes to `removed`
//! - requested with no deployed counterpart goes to `added`
//! - a pair the [`Comparator`] finds different puts the requested object in
//!   `updated`
//!
//! Kinds with nothing to do are left out of the result. Order inside a
//! bucket follows the input lists and carries no meaning.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::merge::is_empty;
use crate::resource::{Resource, ResourceKind, ResourceMap};

/// Equality policy for a pair of objects of the same kind
pub type EqualsFn = dyn Fn(&Resource, &Resource) -> bool + Send + Sync;

/// What has to change for one kind
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Delta {
    /// Requested objects that do not exist yet
    pub added: Vec<Resource>,
    /// Requested objects replacing a different deployed version
    pub updated: Vec<Resource>,
    /// Deployed objects nothing asks for anymore
    pub removed: Vec<Resource>,
}

impl Delta {
    /// True when nothing changes
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Number of changes
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Per-kind equality policy.
///
/// Holds one fallback comparison and optional overrides per kind, so fields
/// that are expected to differ (generated payloads, server defaults) can be
/// masked without changing the diff itself.
pub struct Comparator {
    fallback: Box<EqualsFn>,
    per_kind: BTreeMap<ResourceKind, Box<EqualsFn>>,
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparator")
            .field("per_kind", &self.per_kind.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for Comparator {
    /// Requested-subset comparison, with secret payloads and trigger-resolved
    /// images masked
    fn default() -> Self {
        Self::new(semantic_equals)
            .with_kind(ResourceKind::Secret, secret_equals)
            .with_kind(ResourceKind::DeploymentConfig, deployment_config_equals)
    }
}

impl Comparator {
    /// Comparator using `fallback` for every kind
    pub fn new(fallback: impl Fn(&Resource, &Resource) -> bool + Send + Sync + 'static) -> Self {
        Self {
            fallback: Box::new(fallback),
            per_kind: BTreeMap::new(),
        }
    }

    /// Comparator that finds every pair equal
    pub fn always_equal() -> Self {
        Self::new(|_, _| true)
    }

    /// Use `equals` for objects of `kind`
    pub fn with_kind(
        mut self,
        kind: ResourceKind,
        equals: impl Fn(&Resource, &Resource) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.per_kind.insert(kind, Box::new(equals));
        self
    }

    /// Compare a deployed object with its requested counterpart.
    ///
    /// # Panics
    ///
    /// When the two objects are of different kinds.
    pub fn equals(&self, deployed: &Resource, requested: &Resource) -> bool {
        assert_eq!(
            deployed.kind(),
            requested.kind(),
            "cannot compare {} {} with {} {}",
            deployed.kind(),
            deployed.name(),
            requested.kind(),
            requested.name()
        );
        let equals = self
            .per_kind
            .get(&deployed.kind())
            .unwrap_or(&self.fallback);
        equals(deployed, requested)
    }
}

/// Compute per-kind deltas between deployed and requested objects.
pub fn compare(
    deployed: &ResourceMap,
    requested: &ResourceMap,
    comparator: &Comparator,
) -> BTreeMap<ResourceKind, Delta> {
    let kinds: BTreeSet<ResourceKind> = deployed.keys().chain(requested.keys()).copied().collect();
    let empty = Vec::new();

    kinds
        .into_iter()
        .filter_map(|kind| {
            let delta = compare_kind(
                deployed.get(&kind).unwrap_or(&empty),
                requested.get(&kind).unwrap_or(&empty),
                comparator,
            );
            if delta.is_empty() {
                None
            } else {
                debug!(
                    %kind,
                    added = delta.added.len(),
                    updated = delta.updated.len(),
                    removed = delta.removed.len(),
                    "computed delta"
                );
                Some((kind, delta))
            }
        })
        .collect()
}

fn compare_kind(deployed: &[Resource], requested: &[Resource], comparator: &Comparator) -> Delta {
    let mut delta = Delta::default();
    let mut matched = vec![false; requested.len()];

    for live in deployed {
        let counterpart = requested
            .iter()
            .enumerate()
            .position(|(i, r)| !matched[i] && same_object(live, r));
        match counterpart {
            None => delta.removed.push(live.clone()),
            Some(i) => {
                matched[i] = true;
                if !comparator.equals(live, &requested[i]) {
                    delta.updated.push(requested[i].clone());
                }
            }
        }
    }

    delta.added.extend(
        requested
            .iter()
            .zip(matched)
            .filter(|(_, m)| !m)
            .map(|(r, _)| r.clone()),
    );
    delta
}

fn same_object(a: &Resource, b: &Resource) -> bool {
    a.name() == b.name()
        && match (a.namespace(), b.namespace()) {
            (Some(x), Some(y)) => x == y,
            _ => true,
        }
}

// =============================================================================
// Comparisons
// =============================================================================

/// True when every field the requested object sets has the same value on the
/// deployed object.
///
/// Only name, labels and annotations of the metadata take part and status is
/// ignored, so fields filled in by the API server do not count as drift.
pub fn semantic_equals(deployed: &Resource, requested: &Resource) -> bool {
    let deployed = to_json(deployed);
    let requested = comparable(to_json(requested));
    is_subset(&requested, &deployed)
}

/// [`semantic_equals`] after masking secret payloads.
///
/// `stringData` is folded into `data` and every value replaced by the same
/// marker, so only the set of keys is compared.
pub fn secret_equals(deployed: &Resource, requested: &Resource) -> bool {
    let deployed = mask_secret(to_json(deployed));
    let requested = comparable(mask_secret(to_json(requested)));
    is_subset(&requested, &deployed)
}

/// [`semantic_equals`] ignoring what image change triggers resolve.
///
/// The cluster rewrites the image of every container named by an automatic
/// `ImageChange` trigger to the resolved pull spec and records it as
/// `lastTriggeredImage`. Both are left out on either side.
pub fn deployment_config_equals(deployed: &Resource, requested: &Resource) -> bool {
    let deployed = mask_triggered_images(to_json(deployed));
    let requested = comparable(mask_triggered_images(to_json(requested)));
    is_subset(&requested, &deployed)
}

fn to_json(resource: &Resource) -> Value {
    resource
        .to_value()
        .unwrap_or_else(|e| panic!("{} {} does not serialize: {e}", resource.kind(), resource.name()))
}

fn comparable(mut value: Value) -> Value {
    if let Some(obj) = value.as_object_mut() {
        obj.remove("status");
        if let Some(Value::Object(meta)) = obj.get_mut("metadata") {
            meta.retain(|key, _| matches!(key.as_str(), "name" | "labels" | "annotations"));
        }
    }
    value
}

fn mask_secret(mut value: Value) -> Value {
    let Some(obj) = value.as_object_mut() else {
        return value;
    };
    let mut keys: Map<String, Value> = Map::new();
    for field in ["data", "stringData"] {
        if let Some(Value::Object(entries)) = obj.remove(field) {
            keys.extend(entries.into_iter().map(|(k, _)| (k, Value::Bool(true))));
        }
    }
    obj.insert("data".into(), Value::Object(keys));
    value
}

fn mask_triggered_images(mut value: Value) -> Value {
    let mut triggered: BTreeSet<String> = BTreeSet::new();
    if let Some(Value::Array(triggers)) = value.pointer_mut("/spec/triggers") {
        for trigger in triggers {
            let Some(params) = trigger
                .get_mut("imageChangeParams")
                .and_then(Value::as_object_mut)
            else {
                continue;
            };
            params.remove("lastTriggeredImage");
            if params.get("automatic").and_then(Value::as_bool) != Some(true) {
                continue;
            }
            if let Some(Value::Array(names)) = params.get("containerNames") {
                triggered.extend(names.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }
    }

    for list in ["containers", "initContainers"] {
        let pointer = format!("/spec/template/spec/{}", list);
        if let Some(Value::Array(containers)) = value.pointer_mut(&pointer) {
            for container in containers.iter_mut().filter_map(Value::as_object_mut) {
                let name = container.get("name").and_then(Value::as_str).unwrap_or_default();
                if triggered.contains(name) {
                    container.remove("image");
                }
            }
        }
    }
    value
}

fn is_subset(requested: &Value, deployed: &Value) -> bool {
    match (requested, deployed) {
        (Value::Object(r), Value::Object(d)) => r.iter().all(|(key, value)| match d.get(key) {
            Some(live) => is_subset(value, live),
            None => is_empty(value),
        }),
        (Value::Array(r), Value::Array(d)) => {
            r.len() == d.len() && r.iter().zip(d).all(|(a, b)| is_subset(a, b))
        }
        (r, d) => r == d,
    }
}
