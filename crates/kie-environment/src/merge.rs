//! Merge Engine
//!
//! Combines a baseline environment (the common template) with an overlay
//! (the environment template). Lists are merged per kind by object name:
//!
//! - an empty overlay list keeps the baseline list, an empty baseline list
//!   takes the overlay list
//! - a baseline object with no overlay counterpart is kept in place
//! - a live overlay counterpart is deep-merged into it, overlay values
//!   winning wherever they are not empty
//! - a pending-delete counterpart removes it
//! - unmatched live overlay objects are appended in overlay order
//!
//! Several objects sharing a name in one list is undefined input: the first
//! unconsumed overlay object with the name is the match.

use serde_json::Value;
use tracing::debug;

use crate::resource::{CustomObject, Environment, KieResource, Tracked};

/// Merge two environments slot by slot.
///
/// Servers and others are merged by position; a slot present on one side
/// only is taken as is.
pub fn merge_environments(baseline: Environment, overlay: Environment) -> Environment {
    Environment {
        console: merge_objects(baseline.console, overlay.console),
        smart_router: merge_objects(baseline.smart_router, overlay.smart_router),
        servers: merge_slots(baseline.servers, overlay.servers),
        others: merge_slots(baseline.others, overlay.others),
    }
}

fn merge_slots(baseline: Vec<CustomObject>, overlay: Vec<CustomObject>) -> Vec<CustomObject> {
    let len = baseline.len().max(overlay.len());
    let mut baseline = baseline.into_iter();
    let mut overlay = overlay.into_iter();
    (0..len)
        .filter_map(|_| match (baseline.next(), overlay.next()) {
            (Some(b), Some(o)) => Some(merge_objects(b, o)),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        })
        .collect()
}

/// Merge the lists of two tiers kind by kind.
pub fn merge_objects(baseline: CustomObject, overlay: CustomObject) -> CustomObject {
    CustomObject {
        omit: baseline.omit || overlay.omit,
        persistent_volume_claims: merge_list(
            baseline.persistent_volume_claims,
            overlay.persistent_volume_claims,
        ),
        service_accounts: merge_list(baseline.service_accounts, overlay.service_accounts),
        secrets: merge_list(baseline.secrets, overlay.secrets),
        roles: merge_list(baseline.roles, overlay.roles),
        role_bindings: merge_list(baseline.role_bindings, overlay.role_bindings),
        deployment_configs: merge_list(baseline.deployment_configs, overlay.deployment_configs),
        build_configs: merge_list(baseline.build_configs, overlay.build_configs),
        image_streams: merge_list(baseline.image_streams, overlay.image_streams),
        services: merge_list(baseline.services, overlay.services),
        stateful_sets: merge_list(baseline.stateful_sets, overlay.stateful_sets),
        routes: merge_list(baseline.routes, overlay.routes),
    }
}

/// Name-keyed merge of one kind list.
pub fn merge_list<T: KieResource>(
    baseline: Vec<Tracked<T>>,
    overlay: Vec<Tracked<T>>,
) -> Vec<Tracked<T>> {
    if overlay.is_empty() {
        return baseline;
    }
    if baseline.is_empty() {
        return overlay;
    }

    let mut consumed = vec![false; overlay.len()];
    let mut merged = Vec::with_capacity(baseline.len() + overlay.len());

    for base in baseline {
        let matched = overlay
            .iter()
            .enumerate()
            .position(|(i, o)| !consumed[i] && o.name() == base.name());
        let Some(index) = matched else {
            merged.push(base);
            continue;
        };
        consumed[index] = true;
        match &overlay[index] {
            Tracked::Live(over) => {
                merged.push(Tracked::Live(deep_merge(base.into_inner(), over)));
            }
            Tracked::PendingDelete(_) => {
                debug!(kind = %T::KIND, name = base.name(), "dropping object deleted by overlay");
            }
        }
    }

    merged.extend(
        overlay
            .into_iter()
            .zip(consumed)
            .filter(|(o, used)| !used && o.is_live())
            .map(|(o, _)| o),
    );
    merged
}

/// Deep-merge `overlay` into `baseline`, overlay winning on non-empty values.
///
/// # Panics
///
/// When the merged document no longer deserializes as `T`. Both inputs are
/// valid `T`, so this only happens if a type's serde shape is inconsistent.
pub fn deep_merge<T: KieResource>(baseline: T, overlay: &T) -> T {
    let kind = T::KIND;
    let name = baseline.name().to_string();
    let (mut base, over) = match (serde_json::to_value(&baseline), serde_json::to_value(overlay)) {
        (Ok(b), Ok(o)) => (b, o),
        (Err(e), _) | (_, Err(e)) => panic!("{kind} {name} does not serialize: {e}"),
    };
    merge_values(&mut base, over);
    serde_json::from_value(base)
        .unwrap_or_else(|e| panic!("merged {kind} {name} does not deserialize: {e}"))
}

/// Recursive JSON merge: objects merge key by key, any other non-empty
/// overlay value replaces the baseline value.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if is_empty(&value) {
                    continue;
                }
                match base.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_values(existing, value)
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => {
            if !is_empty(&overlay) {
                *base = overlay;
            }
        }
    }
}

pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;

    use crate::resource::{Route, DELETE_ANNOTATION};

    fn service(name: &str, labels: &[(&str, &str)]) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.into()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn tombstone(name: &str) -> Tracked<Service> {
        let mut svc = service(name, &[]);
        svc.metadata.annotations = Some(BTreeMap::from([(
            DELETE_ANNOTATION.to_string(),
            "true".to_string(),
        )]));
        Tracked::classify(svc)
    }

    fn live(svc: Service) -> Tracked<Service> {
        Tracked::Live(svc)
    }

    fn names<T: KieResource>(list: &[Tracked<T>]) -> Vec<&str> {
        list.iter().map(|t| t.name()).collect()
    }

    fn labels(t: &Tracked<Service>) -> BTreeMap<String, String> {
        t.inner().metadata.labels.clone().unwrap_or_default()
    }

    // =========================================================================
    // Story: Empty sides
    // =========================================================================

    #[test]
    fn empty_overlay_keeps_baseline() {
        let baseline = vec![live(service("a", &[])), live(service("b", &[]))];
        assert_eq!(merge_list(baseline.clone(), Vec::new()), baseline);
    }

    #[test]
    fn empty_baseline_takes_overlay() {
        let overlay = vec![live(service("a", &[])), tombstone("b")];
        let merged = merge_list(Vec::new(), overlay.clone());
        assert_eq!(merged, overlay);
        // the tombstone is kept as such and never becomes live
        assert!(!merged[1].is_live());
    }

    #[test]
    fn environment_merge_with_empty_is_identity() {
        let env = Environment {
            console: CustomObject {
                services: vec![live(service("console", &[("app", "x")]))],
                ..Default::default()
            },
            servers: vec![CustomObject {
                services: vec![live(service("server-0", &[]))],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(merge_environments(env.clone(), Environment::default()), env);
        assert_eq!(merge_environments(Environment::default(), env.clone()), env);
    }

    // =========================================================================
    // Story: Name-keyed merge
    // =========================================================================

    #[test]
    fn overlay_overrides_and_adds_while_tombstone_deletes() {
        let baseline = vec![
            live(service("s1", &[("baseline", "true"), ("source", "baseline")])),
            live(service("s1-2", &[])),
            live(service("s1-4", &[])),
        ];
        let overlay = vec![
            live(service("s1", &[("overwrite", "true"), ("source", "overwrite")])),
            live(service("s1-3", &[])),
            tombstone("s1-4"),
        ];

        let merged = merge_list(baseline, overlay);
        assert_eq!(names(&merged), ["s1", "s1-2", "s1-3"]);
        assert_eq!(
            labels(&merged[0]),
            BTreeMap::from([
                ("baseline".to_string(), "true".to_string()),
                ("overwrite".to_string(), "true".to_string()),
                ("source".to_string(), "overwrite".to_string()),
            ])
        );
    }

    #[test]
    fn tombstone_removes_its_counterpart() {
        let merged = merge_list(vec![live(service("a", &[]))], vec![tombstone("a")]);
        assert!(merged.iter().all(|t| t.name() != "a"));
    }

    #[test]
    fn count_law_with_unmatched_tombstone() {
        let baseline = vec![live(service("S1", &[])), live(service("S2", &[]))];
        let overlay = vec![
            live(service("S1", &[("over", "yes")])),
            live(service("S3", &[])),
            tombstone("S4"),
        ];
        let merged = merge_list(baseline, overlay);
        assert_eq!(names(&merged), ["S1", "S2", "S3"]);
        assert!(merged.iter().all(Tracked::is_live));
    }

    #[test]
    fn field_override_keeps_baseline_only_fields() {
        let merged = merge_list(
            vec![live(service(
                "a",
                &[("label", "baseline"), ("only-baseline", "x")],
            ))],
            vec![live(service("a", &[("label", "overwrite")]))],
        );
        assert_eq!(
            labels(&merged[0]),
            BTreeMap::from([
                ("label".to_string(), "overwrite".to_string()),
                ("only-baseline".to_string(), "x".to_string()),
            ])
        );
    }

    #[test]
    fn deep_merge_replaces_non_empty_lists_and_keeps_nested_fields() {
        let mut base = service("a", &[]);
        base.spec = Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("http".into()),
                port: 8080,
                ..Default::default()
            }]),
            selector: Some(BTreeMap::from([("app".into(), "a".into())])),
            ..Default::default()
        });
        let mut over = service("a", &[]);
        over.spec = Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("https".into()),
                port: 8443,
                ..Default::default()
            }]),
            ..Default::default()
        });

        let merged = deep_merge(base, &over);
        let spec = merged.spec.unwrap();
        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 8443);
        assert_eq!(spec.selector.unwrap()["app"], "a");
    }

    #[test]
    fn duplicate_names_match_first_unconsumed() {
        let baseline = vec![
            live(service("dup", &[("n", "1")])),
            live(service("dup", &[("n", "2")])),
        ];
        let overlay = vec![live(service("dup", &[("o", "x")]))];
        let merged = merge_list(baseline, overlay);
        assert_eq!(merged.len(), 2);
        assert_eq!(labels(&merged[0]).get("o").map(String::as_str), Some("x"));
        assert!(labels(&merged[1]).get("o").is_none());
    }

    // =========================================================================
    // Story: Environment slots
    // =========================================================================

    #[test]
    fn servers_merge_by_position_and_omit_is_sticky() {
        let baseline = Environment {
            servers: vec![
                CustomObject {
                    services: vec![live(service("server-0", &[("tier", "base")]))],
                    ..Default::default()
                },
                CustomObject::default(),
            ],
            ..Default::default()
        };
        let overlay = Environment {
            smart_router: CustomObject {
                omit: true,
                ..Default::default()
            },
            servers: vec![CustomObject {
                services: vec![live(service("server-0", &[("tier", "env")]))],
                ..Default::default()
            }],
            others: vec![CustomObject {
                routes: vec![Tracked::Live(Route::default())],
                ..Default::default()
            }],
            ..Default::default()
        };

        let merged = merge_environments(baseline, overlay);
        assert!(merged.smart_router.omit);
        assert_eq!(merged.servers.len(), 2);
        assert_eq!(labels(&merged.servers[0].services[0])["tier"], "env");
        assert_eq!(merged.others.len(), 1);
    }

    // =========================================================================
    // Story: JSON merge rules
    // =========================================================================

    #[test]
    fn empty_overlay_values_do_not_override() {
        let mut base = json!({"a": "x", "b": 3, "c": true, "d": [1], "e": {"f": 1}});
        merge_values(
            &mut base,
            json!({"a": "", "b": 0, "c": false, "d": [], "e": {}, "g": null}),
        );
        assert_eq!(base, json!({"a": "x", "b": 3, "c": true, "d": [1], "e": {"f": 1}}));
    }

    #[test]
    fn nested_objects_merge_recursively() {
        let mut base = json!({"spec": {"replicas": 1, "selector": {"app": "a"}}});
        merge_values(&mut base, json!({"spec": {"replicas": 3, "strategy": "Rolling"}}));
        assert_eq!(
            base,
            json!({"spec": {"replicas": 3, "selector": {"app": "a"}, "strategy": "Rolling"}})
        );
    }
}
