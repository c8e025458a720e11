//! Configuration ConfigMap bootstrap
//!
//! In cluster the embedded per-version configuration is published as one
//! ConfigMap per version and unit, owned by the operator Deployment. Existing
//! ConfigMaps are left as they are: they may carry user customizations that
//! upgrade-conflict detection compares against.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use tracing::{info, instrument, warn};

use kie_common::{Result, KIEAPP_GROUP, OPERATOR_VERSION};
use kie_environment::source::{config_map_name, embedded_files};

use crate::client::KieKubeClient;

/// ConfigMaps holding the embedded configuration, sorted by name
pub fn embedded_config_maps(namespace: &str, owner: Option<&OwnerReference>) -> Vec<ConfigMap> {
    let mut grouped: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for file in embedded_files() {
        grouped
            .entry(config_map_name(file.version, file.unit()))
            .or_default()
            .insert(file.file_name().to_string(), file.content.to_string());
    }

    grouped
        .into_iter()
        .map(|(name, data)| ConfigMap {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(namespace.to_string()),
                annotations: Some(BTreeMap::from([(
                    KIEAPP_GROUP.to_string(),
                    OPERATOR_VERSION.to_string(),
                )])),
                owner_references: owner.map(|o| {
                    vec![OwnerReference {
                        controller: Some(true),
                        block_owner_deletion: None,
                        ..o.clone()
                    }]
                }),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        })
        .collect()
}

/// Create every missing configuration ConfigMap. Returns how many were
/// created.
#[instrument(skip(kube, owner))]
pub async fn bootstrap_config_maps(
    kube: &dyn KieKubeClient,
    namespace: &str,
    owner: Option<OwnerReference>,
) -> Result<usize> {
    let mut created = 0;
    for config_map in embedded_config_maps(namespace, owner.as_ref()) {
        let name = config_map.metadata.name.clone().unwrap_or_default();
        match kube.get_config_map(&name, namespace).await? {
            None => {
                kube.create_config_map(&config_map).await?;
                info!(config_map = %name, "created configuration ConfigMap");
                created += 1;
            }
            Some(existing) if existing.data != config_map.data => {
                warn!(
                    config_map = %name,
                    "ConfigMap differs from the embedded configuration, keeping it"
                );
            }
            Some(_) => {}
        }
    }
    Ok(created)
}
