//! Deployed snapshot provider

use tracing::{debug, instrument};

use kie_common::Result;
use kie_environment::{ResourceKind, ResourceMap};

use crate::client::KieKubeClient;

/// Everything currently deployed for the KieApp with `owner_uid`, by kind.
///
/// Kinds without any owned object are left out of the map.
#[instrument(skip(kube))]
pub async fn deployed_snapshot(
    kube: &dyn KieKubeClient,
    namespace: &str,
    owner_uid: &str,
) -> Result<ResourceMap> {
    let mut deployed = ResourceMap::new();
    for kind in ResourceKind::ALL {
        let owned = kube.list_owned(*kind, namespace, owner_uid).await?;
        if !owned.is_empty() {
            deployed.insert(*kind, owned);
        }
    }
    debug!(
        objects = deployed.values().map(Vec::len).sum::<usize>(),
        "loaded deployed snapshot"
    );
    Ok(deployed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockKieKubeClient;
    use k8s_openapi::api::core::v1::Service;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kie_common::Error;
    use kie_environment::Resource;

    fn service(name: &str) -> Resource {
        Resource::Service(Service {
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn snapshot_holds_only_kinds_with_objects() {
        let mut kube = MockKieKubeClient::new();
        kube.expect_list_owned()
            .withf(|_, ns, uid| ns == "apps" && uid == "uid-1")
            .times(ResourceKind::ALL.len())
            .returning(|kind, _, _| match kind {
                ResourceKind::Service => Ok(vec![service("demo-rhpamcentr")]),
                _ => Ok(vec![]),
            });

        let deployed = deployed_snapshot(&kube, "apps", "uid-1").await.unwrap();
        assert_eq!(deployed.len(), 1);
        assert_eq!(deployed[&ResourceKind::Service][0].name(), "demo-rhpamcentr");
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_snapshot() {
        let mut kube = MockKieKubeClient::new();
        kube.expect_list_owned()
            .times(1)
            .returning(|_, _, _| Err(Error::internal("list failed")));
        assert!(deployed_snapshot(&kube, "apps", "uid-1").await.is_err());
    }
}
