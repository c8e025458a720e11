//! Image stream tags and server state ConfigMaps
//!
//! Image change triggers and source builds name an ImageStreamTag, by
//! default in the shared `openshift` namespace. When the tag is missing
//! there, or the KieApp asks for its own registry, the operator creates a
//! local tag in the KieApp's namespace that imports the registry image, and
//! repoints the reference at it.
//!
//! A KIE server records its state in a ConfigMap owned by its
//! DeploymentConfig. Once the server is scaled to zero that state is marked
//! detached so a later scale-up starts clean.

use std::collections::HashMap;

use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use kie_common::crd::{KieApp, KieAppRegistry};
use kie_common::{Result, DEFAULT_IMAGE_REGISTRY, KIE_SERVER_DETACHED, KIE_SERVER_STATE_LABEL};
use kie_environment::resource::openshift::{TagImportPolicy, TagReference, TagReferencePolicy};
use kie_environment::resource::{BuildConfig, ImageStreamTag, Tracked};
use kie_environment::{Environment, Resource, ResourceKind, ResourceMap};

use crate::client::KieKubeClient;

const IMAGE_STREAM_TAG_KIND: &str = "ImageStreamTag";

/// Split `<stream>:<tag>`; a bare stream name means `latest`
pub fn split_tag(name: &str) -> (&str, &str) {
    match name.split_once(':') {
        Some((stream, tag)) => (stream, tag),
        None => (name, "latest"),
    }
}

/// Registry host and its insecure flag for images of `cr`
fn effective_registry(cr: &KieApp, default_registry: &KieAppRegistry) -> (String, bool) {
    let registry = cr
        .spec
        .image_registry
        .as_ref()
        .unwrap_or(default_registry);
    let host = [&registry.registry, &default_registry.registry]
        .into_iter()
        .flatten()
        .find(|host| !host.is_empty())
        .cloned()
        .unwrap_or_else(|| DEFAULT_IMAGE_REGISTRY.to_string());
    (host, registry.insecure)
}

/// The local ImageStreamTag standing in for `name` in the KieApp's namespace.
///
/// Product images come from `<registry>/<product>-<major>/`. Data grid,
/// broker and database images always come from the Red Hat registry.
pub fn local_image_stream_tag(
    name: &str,
    cr: &KieApp,
    default_registry: &KieAppRegistry,
) -> ImageStreamTag {
    let (stream, tag) = split_tag(name);
    let tag_name = format!("{}:{}", stream, tag);
    let (host, insecure) = effective_registry(cr, default_registry);
    let major = cr
        .spec
        .version
        .as_deref()
        .and_then(|version| version.chars().next())
        .map(String::from)
        .unwrap_or_default();

    let (host, context, image) = if stream.contains("datagrid") {
        (DEFAULT_IMAGE_REGISTRY.to_string(), "jboss-datagrid-7".to_string(), tag_name.clone())
    } else if stream.contains("amq-broker-7") {
        (DEFAULT_IMAGE_REGISTRY.to_string(), "amq-broker-7".to_string(), tag_name.clone())
    } else if stream == "postgresql" || stream == "mysql" {
        let digits: String = tag.chars().filter(char::is_ascii_digit).collect();
        (
            DEFAULT_IMAGE_REGISTRY.to_string(),
            "rhscl".to_string(),
            format!("{}-{}-rhel7:latest", stream, digits),
        )
    } else {
        let product = cr.spec.environment.constants().product;
        (host, format!("{}-{}", product, major), tag_name.clone())
    };

    ImageStreamTag::new(
        ObjectMeta {
            name: Some(tag_name),
            namespace: cr.namespace(),
            ..Default::default()
        },
        Some(TagReference {
            name: tag.to_string(),
            from: Some(ObjectReference {
                kind: Some("DockerImage".to_string()),
                name: Some(format!("{}/{}/{}", host, context, image)),
                ..Default::default()
            }),
            reference_policy: Some(TagReferencePolicy {
                type_: "Local".to_string(),
            }),
            import_policy: insecure.then_some(TagImportPolicy { insecure }),
        }),
    )
}

/// Resolves ImageStreamTag references once per pass
struct TagResolver<'a> {
    kube: &'a dyn KieKubeClient,
    cr: &'a KieApp,
    default_registry: &'a KieAppRegistry,
    namespace: String,
    custom_registry: bool,
    resolved: HashMap<(String, String), String>,
}

impl TagResolver<'_> {
    /// Point an `ImageStreamTag` reference at the namespace that serves it
    async fn repoint(&mut self, from: &mut Value) -> Result<()> {
        if from.get("kind").and_then(Value::as_str) != Some(IMAGE_STREAM_TAG_KIND) {
            return Ok(());
        }
        let Some(name) = from.get("name").and_then(Value::as_str).map(str::to_string) else {
            return Ok(());
        };
        let namespace = from
            .get("namespace")
            .and_then(Value::as_str)
            .unwrap_or(&self.namespace)
            .to_string();

        let key = (name, namespace);
        let target = match self.resolved.get(&key) {
            Some(target) => target.clone(),
            None => {
                let target = self.resolve(&key.0, &key.1).await?;
                self.resolved.insert(key, target.clone());
                target
            }
        };
        if let Some(from) = from.as_object_mut() {
            from.insert("namespace".to_string(), Value::String(target));
        }
        Ok(())
    }

    async fn resolve(&self, name: &str, namespace: &str) -> Result<String> {
        if !self.custom_registry && self.kube.image_stream_tag_exists(name, namespace).await? {
            return Ok(namespace.to_string());
        }
        if (self.custom_registry || namespace != self.namespace)
            && self
                .kube
                .image_stream_tag_exists(name, &self.namespace)
                .await?
        {
            return Ok(self.namespace.clone());
        }

        let tag = local_image_stream_tag(name, self.cr, self.default_registry);
        match self.kube.create_image_stream_tag(&tag).await {
            Ok(()) => {
                info!(tag = %name, namespace = %self.namespace, "created local image stream tag");
                Ok(self.namespace.clone())
            }
            Err(err) => {
                warn!(error = %err, tag = %name, namespace = %namespace, "local image stream tag not created, keeping reference");
                Ok(namespace.to_string())
            }
        }
    }
}

/// The image a source build starts from
fn source_build_from(build: &mut BuildConfig) -> Option<&mut Value> {
    let strategy = build.spec.get_mut("strategy")?;
    if strategy.get("type").and_then(Value::as_str) != Some("Source") {
        return None;
    }
    strategy.pointer_mut("/sourceStrategy/from")
}

/// Make every ImageStreamTag the environment refers to resolvable.
///
/// Tiers that build their own image keep their deployment triggers, which
/// follow the build output.
#[instrument(skip_all, fields(kieapp = %cr.name_any()))]
pub async fn ensure_image_streams(
    kube: &dyn KieKubeClient,
    env: &mut Environment,
    cr: &KieApp,
    default_registry: &KieAppRegistry,
) -> Result<()> {
    let mut resolver = TagResolver {
        kube,
        cr,
        default_registry,
        namespace: cr.namespace().unwrap_or_default(),
        custom_registry: cr.spec.image_registry.is_some(),
        resolved: HashMap::new(),
    };

    for tier in env.tiers_mut().filter(|tier| !tier.omit) {
        for build in tier.build_configs.iter_mut() {
            if let Tracked::Live(build) = build {
                if let Some(from) = source_build_from(build) {
                    resolver.repoint(from).await?;
                }
            }
        }
        if !tier.build_configs.is_empty() {
            continue;
        }
        for dc in tier.deployment_configs.iter_mut() {
            let Tracked::Live(dc) = dc else {
                continue;
            };
            for trigger in dc.spec.triggers.iter_mut() {
                if trigger.type_ != "ImageChange" {
                    continue;
                }
                if let Some(from) = trigger
                    .image_change_params
                    .as_mut()
                    .and_then(|params| params.get_mut("from"))
                {
                    resolver.repoint(from).await?;
                }
            }
        }
    }
    debug!(tags = resolver.resolved.len(), "image stream tags resolved");
    Ok(())
}

/// Mark the state ConfigMaps of servers scaled to zero as detached.
///
/// A server counts as scaled down when its requested replicas are zero and
/// none of its pods is still available. Returns how many were relabelled.
#[instrument(skip(kube, env, deployed))]
pub async fn detach_idle_server_config_maps(
    kube: &dyn KieKubeClient,
    env: &Environment,
    deployed: &ResourceMap,
    namespace: &str,
) -> Result<usize> {
    let requested: HashMap<&str, i32> = env
        .servers
        .iter()
        .flat_map(|server| server.deployment_configs.iter().filter_map(Tracked::live))
        .filter_map(|dc| Some((dc.metadata.name.as_deref()?, dc.spec.replicas)))
        .collect();
    let available: HashMap<&str, i32> = deployed
        .get(&ResourceKind::DeploymentConfig)
        .into_iter()
        .flatten()
        .filter_map(|resource| match resource {
            Resource::DeploymentConfig(dc) => Some((
                resource.name(),
                dc.status.as_ref().map_or(0, |status| status.available_replicas),
            )),
            _ => None,
        })
        .collect();

    let mut detached = 0;
    for mut config_map in kube.list_config_maps(namespace).await? {
        let Some(server) = config_map
            .owner_references()
            .iter()
            .find(|owner| owner.kind == "DeploymentConfig")
            .map(|owner| owner.name.clone())
        else {
            continue;
        };
        let state = config_map
            .labels()
            .get(KIE_SERVER_STATE_LABEL)
            .cloned()
            .unwrap_or_default();
        if state.is_empty() || state == KIE_SERVER_DETACHED {
            continue;
        }
        let scaled_down = requested.get(server.as_str()).copied().unwrap_or(0) == 0
            && available.get(server.as_str()).copied().unwrap_or(0) == 0;
        if !scaled_down {
            continue;
        }

        config_map
            .labels_mut()
            .insert(KIE_SERVER_STATE_LABEL.to_string(), KIE_SERVER_DETACHED.to_string());
        kube.replace_config_map(&config_map).await?;
        info!(config_map = %config_map.name_any(), %server, "server state detached");
        detached += 1;
    }
    Ok(detached)
}
