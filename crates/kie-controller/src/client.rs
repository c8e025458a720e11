//! Cluster access for the KieApp controller
//!
//! [`KieKubeClient`] is everything the driver and its collaborators need from
//! the API server. Deployable objects travel as kind-tagged [`Resource`]s and
//! reach the API through `DynamicObject`, so one set of methods covers every
//! kind an environment can hold.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use kie_common::crd::{KieApp, KieAppStatus, LegacyKieApp};
use kie_common::kube_utils::{is_owned_by, patch_resource_status, HasApiResource};
use kie_common::{Error, Result, FIELD_MANAGER};
use kie_environment::resource::ImageStreamTag;
use kie_environment::{Resource, ResourceKind};

/// Trait abstracting Kubernetes client operations for KieApps
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KieKubeClient: Send + Sync {
    /// Get a KieApp by name and namespace
    async fn get_kieapp(&self, name: &str, namespace: &str) -> Result<Option<KieApp>>;

    /// Get a KieApp through the legacy schema
    async fn get_legacy_kieapp(&self, name: &str, namespace: &str)
        -> Result<Option<LegacyKieApp>>;

    /// Create a KieApp
    async fn create_kieapp(&self, kieapp: &KieApp) -> Result<KieApp>;

    /// Replace a KieApp, spec and metadata; the `resourceVersion` it carries
    /// is the optimistic-concurrency precondition
    async fn replace_kieapp(&self, kieapp: &KieApp) -> Result<KieApp>;

    /// Merge-patch the status of a KieApp
    async fn patch_kieapp_status(
        &self,
        name: &str,
        namespace: &str,
        status: &KieAppStatus,
    ) -> Result<()>;

    /// Objects of `kind` in `namespace` carrying an owner reference to `owner_uid`
    async fn list_owned(
        &self,
        kind: ResourceKind,
        namespace: &str,
        owner_uid: &str,
    ) -> Result<Vec<Resource>>;

    /// Create an object with server-side apply
    async fn create_resource(&self, resource: &Resource) -> Result<()>;

    /// Replace an object; it must carry the live `resourceVersion`
    async fn replace_resource(&self, resource: &Resource) -> Result<()>;

    /// Delete an object in the foreground; a missing object is not an error
    async fn delete_resource(&self, resource: &Resource) -> Result<()>;

    /// Get a ConfigMap by name and namespace
    async fn get_config_map(&self, name: &str, namespace: &str) -> Result<Option<ConfigMap>>;

    /// Create a ConfigMap
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<()>;

    /// ConfigMaps in `namespace`
    async fn list_config_maps(&self, namespace: &str) -> Result<Vec<ConfigMap>>;

    /// Replace a ConfigMap; it must carry the live `resourceVersion`
    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<()>;

    /// Get a Deployment by name and namespace
    async fn get_deployment(&self, name: &str, namespace: &str) -> Result<Option<Deployment>>;

    /// True when the ImageStreamTag `name` (`<stream>:<tag>`) exists in `namespace`
    async fn image_stream_tag_exists(&self, name: &str, namespace: &str) -> Result<bool>;

    /// Create an ImageStreamTag; one that already exists is not an error
    async fn create_image_stream_tag(&self, tag: &ImageStreamTag) -> Result<()>;
}

/// Real Kubernetes client implementation
pub struct KieKubeClientImpl {
    client: Client,
}

impl KieKubeClientImpl {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, resource: &Resource) -> Result<(Api<DynamicObject>, String)> {
        let namespace = resource.namespace().ok_or_else(|| {
            Error::internal_with_context(
                "kube-client",
                format!("{} {} has no namespace", resource.kind(), resource.name()),
            )
        })?;
        let ar = resource.kind().api_resource();
        Ok((
            Api::namespaced_with(self.client.clone(), namespace, &ar),
            resource.name().to_string(),
        ))
    }
}

/// Treat a 404 as absence
async fn get_opt<K>(api: &Api<K>, name: &str) -> Result<Option<K>>
where
    K: Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl KieKubeClient for KieKubeClientImpl {
    async fn get_kieapp(&self, name: &str, namespace: &str) -> Result<Option<KieApp>> {
        let api: Api<KieApp> = Api::namespaced(self.client.clone(), namespace);
        get_opt(&api, name).await
    }

    async fn get_legacy_kieapp(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<LegacyKieApp>> {
        let api: Api<LegacyKieApp> = Api::namespaced(self.client.clone(), namespace);
        get_opt(&api, name).await
    }

    async fn create_kieapp(&self, kieapp: &KieApp) -> Result<KieApp> {
        let namespace = kieapp.namespace().unwrap_or_default();
        let api: Api<KieApp> = Api::namespaced(self.client.clone(), &namespace);
        Ok(api.create(&PostParams::default(), kieapp).await?)
    }

    async fn replace_kieapp(&self, kieapp: &KieApp) -> Result<KieApp> {
        let namespace = kieapp.namespace().unwrap_or_default();
        let api: Api<KieApp> = Api::namespaced(self.client.clone(), &namespace);
        Ok(api
            .replace(&kieapp.name_any(), &PostParams::default(), kieapp)
            .await?)
    }

    async fn patch_kieapp_status(
        &self,
        name: &str,
        namespace: &str,
        status: &KieAppStatus,
    ) -> Result<()> {
        patch_resource_status::<KieApp>(&self.client, name, namespace, status, FIELD_MANAGER)
            .await?;
        Ok(())
    }

    async fn list_owned(
        &self,
        kind: ResourceKind,
        namespace: &str,
        owner_uid: &str,
    ) -> Result<Vec<Resource>> {
        let ar = kind.api_resource();
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);
        let list = api.list(&ListParams::default()).await?;
        let owned: Vec<Resource> = list
            .items
            .into_iter()
            .filter(|obj| is_owned_by(&obj.metadata, owner_uid))
            .map(|obj| Resource::from_dynamic(kind, obj))
            .collect::<Result<_>>()?;
        debug!(%kind, namespace, count = owned.len(), "listed owned objects");
        Ok(owned)
    }

    async fn create_resource(&self, resource: &Resource) -> Result<()> {
        let (api, name) = self.dynamic_api(resource)?;
        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&name, &params, &Patch::Apply(&resource.to_value()?))
            .await?;
        Ok(())
    }

    async fn replace_resource(&self, resource: &Resource) -> Result<()> {
        let (api, name) = self.dynamic_api(resource)?;
        api.replace(&name, &PostParams::default(), &resource.to_dynamic()?)
            .await?;
        Ok(())
    }

    async fn delete_resource(&self, resource: &Resource) -> Result<()> {
        let (api, name) = self.dynamic_api(resource)?;
        match api.delete(&name, &DeleteParams::foreground()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_config_map(&self, name: &str, namespace: &str) -> Result<Option<ConfigMap>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        get_opt(&api, name).await
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        let namespace = config_map.namespace().unwrap_or_default();
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&PostParams::default(), config_map).await?;
        Ok(())
    }

    async fn list_config_maps(&self, namespace: &str) -> Result<Vec<ConfigMap>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        let namespace = config_map.namespace().unwrap_or_default();
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&config_map.name_any(), &PostParams::default(), config_map)
            .await?;
        Ok(())
    }

    async fn get_deployment(&self, name: &str, namespace: &str) -> Result<Option<Deployment>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        get_opt(&api, name).await
    }

    async fn image_stream_tag_exists(&self, name: &str, namespace: &str) -> Result<bool> {
        let ar = ImageStreamTag::api_resource();
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);
        Ok(get_opt(&api, name).await?.is_some())
    }

    async fn create_image_stream_tag(&self, tag: &ImageStreamTag) -> Result<()> {
        let namespace = tag.metadata.namespace.clone().unwrap_or_default();
        let ar = ImageStreamTag::api_resource();
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), &namespace, &ar);
        let object: DynamicObject = serde_json::to_value(tag)
            .and_then(serde_json::from_value)
            .map_err(|e| Error::serialization_for_kind(ImageStreamTag::KIND, e.to_string()))?;
        match api.create(&PostParams::default(), &object).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
