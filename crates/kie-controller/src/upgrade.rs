//! Schema and product upgrades
//!
//! [`upgrading_schema`] brings a legacy KieApp over to the current schema and
//! moves ownership of its workloads to the new resource. [`product_upgrade`]
//! moves a KieApp to a newer product version when its policy allows it and
//! the live configuration has no local changes the upgrade would lose.

use kube::{Resource as _, ResourceExt};
use tracing::{debug, info, instrument};

use kie_common::crd::KieApp;
use kie_common::{Error, Result};
use kie_environment::migration::{check_upgrade_conflicts, convert, reparent, upgrade_target};
use kie_environment::source::embedded_snapshot;
use kie_environment::{ConfigSource, ResourceKind, VersionRegistry};

use crate::client::KieKubeClient;

/// Outcome of the schema upgrade step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaUpgrade {
    /// No legacy resource with this name
    NoLegacy,
    /// The legacy resource asks for a version this operator does not support
    Unsupported(String),
    /// The current resource exists and owns the legacy workloads
    Migrated {
        /// The current resource was created in this pass
        created: bool,
        /// Workloads whose controller moved to the current resource
        reparented: usize,
    },
}

/// Migrate the legacy KieApp `name` to the current schema.
///
/// Safe to repeat: an existing current resource is kept and workloads already
/// owned by it are left alone.
#[instrument(skip(kube, registry))]
pub async fn upgrading_schema(
    kube: &dyn KieKubeClient,
    registry: &VersionRegistry,
    name: &str,
    namespace: &str,
) -> Result<SchemaUpgrade> {
    let Some(legacy) = kube.get_legacy_kieapp(name, namespace).await? else {
        debug!("no legacy resource, no schema upgrade needed");
        return Ok(SchemaUpgrade::NoLegacy);
    };

    if let Some(version) = legacy
        .spec
        .common_config
        .version
        .as_deref()
        .filter(|v| !v.is_empty())
    {
        if !registry.is_eligible(version) {
            debug!(version, "unsupported legacy version, leaving it alone");
            return Ok(SchemaUpgrade::Unsupported(version.to_string()));
        }
    }

    let (current, created) = match kube.get_kieapp(name, namespace).await? {
        Some(current) => (current, false),
        None => {
            let converted = convert(&legacy)?;
            info!("creating KieApp from legacy resource");
            (kube.create_kieapp(&converted).await?, true)
        }
    };

    let Some(legacy_uid) = legacy.uid() else {
        return Ok(SchemaUpgrade::Migrated {
            created,
            reparented: 0,
        });
    };
    let owner = current.controller_owner_ref(&()).ok_or_else(|| {
        Error::internal_with_context("schema-upgrade", format!("KieApp {} has no uid", name))
    })?;

    let mut reparented = 0;
    for mut dc in kube
        .list_owned(ResourceKind::DeploymentConfig, namespace, &legacy_uid)
        .await?
    {
        if reparent(dc.meta_mut(), &legacy_uid, owner.clone()) {
            kube.replace_resource(&dc).await?;
            debug!(dc = %dc.name(), "moved DeploymentConfig to current KieApp");
            reparented += 1;
        }
    }
    Ok(SchemaUpgrade::Migrated {
        created,
        reparented,
    })
}

/// Move `cr` to its upgrade target, if any. Returns the new version.
///
/// # Errors
///
/// `VersionUnsupported` when the KieApp asks for an unsupported version,
/// `UpgradeConflict` when the live configuration of the running version was
/// changed in a way the upgrade would overwrite.
#[instrument(skip_all, fields(kieapp = %cr.name_any()))]
pub async fn product_upgrade(
    cr: &mut KieApp,
    registry: &VersionRegistry,
    config_source: &dyn ConfigSource,
) -> Result<Option<String>> {
    let Some(target) = upgrade_target(cr, registry)? else {
        return Ok(None);
    };
    let from = cr
        .spec
        .version
        .clone()
        .unwrap_or_else(|| registry.current().to_string());

    // an incomplete read is retried, never taken for a local change
    let live = config_source.live_snapshot(&from).await.map_err(|e| {
        Error::collaborator(
            "config-source",
            format!("live configuration of {} is unavailable: {}", from, e),
        )
    })?;
    check_upgrade_conflicts(
        &from,
        &target,
        &embedded_snapshot(&from),
        &embedded_snapshot(&target),
        live.as_ref(),
    )?;

    info!(from = %from, to = %target, "upgrading product version");
    cr.spec.version = Some(target.clone());
    Ok(Some(target))
}
