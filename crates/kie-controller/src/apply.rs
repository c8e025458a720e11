//! Apply layer
//!
//! Walks the deltas in kind order and hands each object to the client:
//! added objects are created, updated objects replace their live
//! counterpart, removed objects are deleted. The first failure stops the
//! walk; objects already written stay written and the next pass picks up
//! from the new live state.

use std::collections::BTreeMap;

use tracing::{info, instrument};

use kie_common::Result;
use kie_environment::{Delta, Resource, ResourceKind, ResourceMap};

use crate::client::KieKubeClient;

/// Apply every delta. Returns true when anything was written.
#[instrument(skip_all, fields(kinds = deltas.len()))]
pub async fn apply_deltas(
    kube: &dyn KieKubeClient,
    deployed: &ResourceMap,
    deltas: &BTreeMap<ResourceKind, Delta>,
) -> Result<bool> {
    let mut written = false;
    for kind in ResourceKind::ALL {
        let Some(delta) = deltas.get(kind) else {
            continue;
        };
        info!(
            %kind,
            added = delta.added.len(),
            updated = delta.updated.len(),
            removed = delta.removed.len(),
            "applying changes"
        );

        for resource in &delta.added {
            kube.create_resource(resource).await?;
        }
        let live = deployed.get(kind).map(Vec::as_slice).unwrap_or_default();
        for resource in &delta.updated {
            kube.replace_resource(&with_live_version(resource, live))
                .await?;
        }
        for resource in &delta.removed {
            kube.delete_resource(resource).await?;
        }
        written |= !delta.is_empty();
    }
    Ok(written)
}

/// Copy the `resourceVersion` of the live object with the same name
fn with_live_version(requested: &Resource, live: &[Resource]) -> Resource {
    let mut resource = requested.clone();
    if let Some(deployed) = live.iter().find(|d| d.name() == requested.name()) {
        resource.meta_mut().resource_version = deployed.meta().resource_version.clone();
    }
    resource
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockKieKubeClient;
    use k8s_openapi::api::core::v1::{Secret, Service};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kie_common::Error;
    use mockall::Sequence;

    fn meta(name: &str, version: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.into()),
            namespace: Some("apps".into()),
            resource_version: version.map(str::to_string),
            ..Default::default()
        }
    }

    fn service(name: &str, version: Option<&str>) -> Resource {
        Resource::Service(Service {
            metadata: meta(name, version),
            ..Default::default()
        })
    }

    fn secret(name: &str) -> Resource {
        Resource::Secret(Secret {
            metadata: meta(name, None),
            ..Default::default()
        })
    }

    // =========================================================================
    // Story: Writing the deltas
    // =========================================================================

    #[tokio::test]
    async fn each_bucket_reaches_its_operation() {
        let deployed = BTreeMap::from([(
            ResourceKind::Service,
            vec![service("updated", Some("42")), service("removed", Some("7"))],
        )]);
        let deltas = BTreeMap::from([(
            ResourceKind::Service,
            Delta {
                added: vec![service("added", None)],
                updated: vec![service("updated", None)],
                removed: vec![service("removed", Some("7"))],
            },
        )]);

        let mut kube = MockKieKubeClient::new();
        kube.expect_create_resource()
            .withf(|r| r.name() == "added")
            .times(1)
            .returning(|_| Ok(()));
        kube.expect_replace_resource()
            .withf(|r| r.name() == "updated" && r.meta().resource_version.as_deref() == Some("42"))
            .times(1)
            .returning(|_| Ok(()));
        kube.expect_delete_resource()
            .withf(|r| r.name() == "removed")
            .times(1)
            .returning(|_| Ok(()));

        assert!(apply_deltas(&kube, &deployed, &deltas).await.unwrap());
    }

    #[tokio::test]
    async fn nothing_to_apply_writes_nothing() {
        let kube = MockKieKubeClient::new();
        let written = apply_deltas(&kube, &ResourceMap::new(), &BTreeMap::new())
            .await
            .unwrap();
        assert!(!written);
    }

    #[tokio::test]
    async fn kinds_are_applied_in_order() {
        let deltas = BTreeMap::from([
            (
                ResourceKind::Service,
                Delta {
                    added: vec![service("svc", None)],
                    ..Default::default()
                },
            ),
            (
                ResourceKind::Secret,
                Delta {
                    added: vec![secret("keystore")],
                    ..Default::default()
                },
            ),
        ]);

        let mut seq = Sequence::new();
        let mut kube = MockKieKubeClient::new();
        kube.expect_create_resource()
            .withf(|r| r.kind() == ResourceKind::Secret)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        kube.expect_create_resource()
            .withf(|r| r.kind() == ResourceKind::Service)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        apply_deltas(&kube, &ResourceMap::new(), &deltas).await.unwrap();
    }

    #[tokio::test]
    async fn first_failure_stops_the_pass() {
        let deltas = BTreeMap::from([(
            ResourceKind::Service,
            Delta {
                added: vec![service("a", None), service("b", None)],
                removed: vec![service("c", None)],
                ..Default::default()
            },
        )]);

        let mut kube = MockKieKubeClient::new();
        kube.expect_create_resource()
            .times(1)
            .returning(|_| Err(Error::collaborator("apply", "quota exceeded")));
        kube.expect_delete_resource().never();

        let err = apply_deltas(&kube, &ResourceMap::new(), &deltas)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
