//! Migration Engine
//!
//! Moves KieApps forward along two axes:
//!
//! - schema: a legacy (`v1`) resource is converted to the current (`v2`)
//!   schema and the objects it owns are re-parented to the new resource
//! - product version: a deployment may move to a newer supported version
//!   when its upgrade policy allows it and the configuration it runs has no
//!   local changes that the upgrade would overwrite
//!
//! Everything here is pure. Loading snapshots and writing resources is the
//! controller's job.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use tracing::debug;

use kie_common::crd::{
    KieApp, KieAppObjects, KieAppSpec, KieAppUpgrades, KieServerSet,
    LegacyCommonConfig, LegacyKieApp, LegacyKieAppObjects, LegacyKieAppSpec, LegacyUpgrades,
};
use kie_common::kube_utils::{is_owned_by, set_controller_reference};
use kie_common::{Error, Result};

use crate::versions::{Snapshot, VersionRegistry};

// =============================================================================
// Schema conversion
// =============================================================================

/// Convert a legacy KieApp to the current schema.
///
/// Name, namespace, labels and annotations are carried over; status is not,
/// the controller rebuilds it. `upgrades.patch` becomes `upgrades.enabled`
/// and `commonConfig.version` becomes `spec.version`. The single `server`
/// shorthand becomes a one-element server set list.
///
/// # Errors
///
/// A `Configuration` error when both `server` and `servers` are set.
pub fn convert(legacy: &LegacyKieApp) -> Result<KieApp> {
    let spec = &legacy.spec;
    let servers = match &spec.objects.server {
        Some(_) if !spec.objects.servers.is_empty() => {
            return Err(Error::configuration_in(
                "spec.objects",
                "provide either server or servers, not both",
            ));
        }
        Some(server) => vec![KieServerSet::from(server)],
        None => spec.objects.servers.clone(),
    };

    let mut current = KieApp::new(
        &legacy.name_any(),
        KieAppSpec {
            environment: spec.environment,
            version: spec.common_config.version.clone(),
            upgrades: KieAppUpgrades {
                enabled: spec.upgrades.patch.unwrap_or_default(),
                minor: spec.upgrades.minor.unwrap_or_default(),
            },
            image_registry: spec.image_registry.clone(),
            objects: KieAppObjects {
                console: spec.objects.console.clone(),
                servers,
                smart_router: spec.objects.smartrouter.clone(),
            },
            common_config: spec.common_config.config.clone(),
            auth: spec.auth.clone(),
        },
    );
    current.metadata = carried_metadata(&legacy.metadata);
    Ok(current)
}

/// Convert a current KieApp back to the legacy schema.
///
/// The inverse of [`convert`] for every mapped field. Server sets stay a
/// list; the `server` shorthand is never produced.
pub fn convert_back(current: &KieApp) -> LegacyKieApp {
    let spec = &current.spec;
    let mut legacy = LegacyKieApp::new(
        &current.name_any(),
        LegacyKieAppSpec {
            environment: spec.environment,
            image_registry: spec.image_registry.clone(),
            objects: LegacyKieAppObjects {
                console: spec.objects.console.clone(),
                server: None,
                servers: spec.objects.servers.clone(),
                smartrouter: spec.objects.smart_router.clone(),
            },
            common_config: LegacyCommonConfig {
                version: spec.version.clone(),
                config: spec.common_config.clone(),
            },
            auth: spec.auth.clone(),
            upgrades: LegacyUpgrades {
                patch: Some(spec.upgrades.enabled),
                minor: Some(spec.upgrades.minor),
            },
        },
    );
    legacy.metadata = carried_metadata(&current.metadata);
    legacy
}

fn carried_metadata(meta: &ObjectMeta) -> ObjectMeta {
    ObjectMeta {
        name: meta.name.clone(),
        namespace: meta.namespace.clone(),
        labels: meta.labels.clone(),
        annotations: meta.annotations.clone(),
        ..Default::default()
    }
}

/// Hand an object owned by the legacy resource to the current one.
///
/// `owner` becomes the controller; the legacy reference stays as a plain
/// owner reference. Objects the legacy resource does not own, and objects
/// already owned by `owner`, are left alone. Returns true when `meta`
/// changed.
pub fn reparent(meta: &mut ObjectMeta, legacy_uid: &str, owner: OwnerReference) -> bool {
    if !is_owned_by(meta, legacy_uid) || is_owned_by(meta, &owner.uid) {
        return false;
    }
    set_controller_reference(meta, owner)
}

// =============================================================================
// Product upgrades
// =============================================================================

/// Which upgrades the KieApp's policy allows: `(minor, micro)`.
///
/// Both are false when the KieApp is on the current version or upgrades are
/// disabled. An unset version counts as the current one.
///
/// # Errors
///
/// `VersionUnsupported` when the KieApp asks for a version outside the registry.
pub fn check_product_upgrade(cr: &KieApp, registry: &VersionRegistry) -> Result<(bool, bool)> {
    let version = cr.spec.version.as_deref().unwrap_or(registry.current());
    registry.require(version)?;
    if version == registry.current() || !cr.spec.upgrades.enabled {
        return Ok((false, false));
    }
    Ok((cr.spec.upgrades.minor, cr.spec.upgrades.enabled))
}

/// Version the KieApp should move to, if any.
///
/// Minor upgrades go to the current version, micro upgrades to the newest
/// supported version with the same major and minor.
pub fn upgrade_target(cr: &KieApp, registry: &VersionRegistry) -> Result<Option<String>> {
    let (minor, micro) = check_product_upgrade(cr, registry)?;
    let version = cr.spec.version.as_deref().unwrap_or(registry.current());
    let target = if minor {
        Some(registry.current())
    } else if micro {
        registry.latest_micro(version)
    } else {
        None
    };
    Ok(target.filter(|t| *t != version).map(str::to_string))
}

/// A file whose content differs between two snapshots
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChange {
    /// Content on the old side, `None` when the file is missing there
    pub from: Option<String>,
    /// Content on the new side, `None` when the file is missing there
    pub to: Option<String>,
}

/// Changed files per unit, keyed by file name
pub type ConfigDiffs = BTreeMap<String, BTreeMap<String, FileChange>>;

/// Per-unit file changes between two snapshots.
///
/// Only units present in both snapshots are compared; units without
/// differences are left out.
pub fn config_diffs(from: &Snapshot, to: &Snapshot) -> ConfigDiffs {
    from.iter()
        .filter_map(|(unit, from_files)| {
            let to_files = to.get(unit)?;
            let files: BTreeSet<&String> = from_files.keys().chain(to_files.keys()).collect();
            let changes: BTreeMap<String, FileChange> = files
                .into_iter()
                .filter_map(|file| {
                    let change = FileChange {
                        from: from_files.get(file).cloned(),
                        to: to_files.get(file).cloned(),
                    };
                    (change.from != change.to).then(|| (file.clone(), change))
                })
                .collect();
            (!changes.is_empty()).then(|| (unit.clone(), changes))
        })
        .collect()
}

/// Block an upgrade that would overwrite local configuration changes.
///
/// The diff between the two versions' defaults is what the upgrade is
/// expected to change. When the live configuration of `from_version` differs
/// from `to_version` in any other way, the deployment carries changes the
/// upgrade does not know about. The comparison is coarse: the whole diff
/// maps are compared, conflicting keys are not reported.
///
/// Without a live snapshot (embedded configuration) there is nothing to
/// conflict with. A live snapshot missing one of the units is an incomplete
/// read, reported as a retryable error rather than a conflict.
pub fn check_upgrade_conflicts(
    from_version: &str,
    to_version: &str,
    from_defaults: &Snapshot,
    to_defaults: &Snapshot,
    live_from: Option<&Snapshot>,
) -> Result<()> {
    let Some(live) = live_from else {
        return Ok(());
    };
    if let Some(unit) = from_defaults.keys().find(|unit| !live.contains_key(*unit)) {
        return Err(Error::collaborator(
            "config-source",
            format!("live configuration of {} has no {} unit", from_version, unit),
        ));
    }
    let expected = config_diffs(from_defaults, to_defaults);
    let actual = config_diffs(live, to_defaults);
    if expected != actual {
        debug!(
            from = from_version,
            to = to_version,
            units = ?actual.keys().collect::<Vec<_>>(),
            "live configuration differs from defaults"
        );
        return Err(Error::upgrade_conflict(
            from_version,
            format!(
                "potential configuration conflicts in your {} ConfigMap(s)",
                from_version
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::embedded_snapshot;
    use kie_common::crd::{CommonConfig, CommonKieServerSet, EnvironmentType, ImageReference};
    use rstest::rstest;

    fn legacy(version: Option<&str>, patch: Option<bool>) -> LegacyKieApp {
        let mut app = LegacyKieApp::new(
            "legacy",
            LegacyKieAppSpec {
                environment: EnvironmentType::RhpamProduction,
                common_config: LegacyCommonConfig {
                    version: version.map(str::to_string),
                    config: CommonConfig {
                        admin_password: Some("secret".into()),
                        ..Default::default()
                    },
                },
                upgrades: LegacyUpgrades { patch, minor: None },
                ..Default::default()
            },
        );
        app.metadata.namespace = Some("prod".into());
        app.metadata.uid = Some("legacy-uid".into());
        app.metadata.resource_version = Some("7".into());
        app
    }

    fn owner(uid: &str) -> OwnerReference {
        OwnerReference {
            api_version: "app.kiegroup.org/v2".into(),
            kind: "KieApp".into(),
            name: "legacy".into(),
            uid: uid.into(),
            ..Default::default()
        }
    }

    fn snapshot(units: &[(&str, &str, &str)]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (unit, file, text) in units {
            snapshot
                .entry(unit.to_string())
                .or_default()
                .insert(file.to_string(), text.to_string());
        }
        snapshot
    }

    // =========================================================================
    // Story: Converting legacy resources
    // =========================================================================

    #[test]
    fn patch_flag_becomes_enabled_and_back() {
        let original = legacy(Some("7.5.0"), Some(true));
        let current = convert(&original).unwrap();
        assert!(current.spec.upgrades.enabled);
        assert_eq!(current.spec.version.as_deref(), Some("7.5.0"));

        let back = convert_back(&current);
        assert_eq!(back.spec.upgrades.patch, Some(true));
        assert_eq!(back.spec.common_config.version.as_deref(), Some("7.5.0"));
        assert_eq!(back.spec.common_config.config, original.spec.common_config.config);
        assert_eq!(back.spec.environment, original.spec.environment);
    }

    #[test]
    fn conversion_keeps_identity_but_not_server_state() {
        let current = convert(&legacy(None, None)).unwrap();
        assert_eq!(current.name_any(), "legacy");
        assert_eq!(current.metadata.namespace.as_deref(), Some("prod"));
        assert!(current.metadata.uid.is_none());
        assert!(current.metadata.resource_version.is_none());
        assert!(current.status.is_none());
        assert!(!current.spec.upgrades.enabled);
    }

    #[test]
    fn server_shorthand_becomes_one_set() {
        let mut app = legacy(None, None);
        app.spec.objects.server = Some(CommonKieServerSet {
            deployments: Some(3),
            from: Some(ImageReference {
                kind: "ImageStreamTag".into(),
                name: "custom:1".into(),
                namespace: None,
            }),
        });
        let current = convert(&app).unwrap();
        assert_eq!(current.spec.objects.servers.len(), 1);
        assert_eq!(current.spec.objects.servers[0].deployments, Some(3));
        assert_eq!(
            KieServerSet::from(app.spec.objects.server.as_ref().unwrap()),
            current.spec.objects.servers[0]
        );
    }

    #[test]
    fn server_and_servers_together_are_rejected() {
        let mut app = legacy(None, None);
        app.spec.objects.server = Some(CommonKieServerSet::default());
        app.spec.objects.servers = vec![KieServerSet::default()];
        let err = convert(&app).unwrap_err();
        assert_eq!(err.source_name(), Some("spec.objects"));
    }

    // =========================================================================
    // Story: Handing owned objects to the converted resource
    // =========================================================================

    #[test]
    fn reparenting_is_idempotent_and_keeps_the_legacy_owner() {
        let mut meta = ObjectMeta {
            owner_references: Some(vec![OwnerReference {
                controller: Some(true),
                ..owner("legacy-uid")
            }]),
            ..Default::default()
        };
        assert!(reparent(&mut meta, "legacy-uid", owner("current-uid")));
        assert!(!reparent(&mut meta, "legacy-uid", owner("current-uid")));

        let refs = meta.owner_references.unwrap();
        assert_eq!(refs.len(), 2);
        let controller: Vec<_> = refs.iter().filter(|r| r.controller == Some(true)).collect();
        assert_eq!(controller.len(), 1);
        assert_eq!(controller[0].uid, "current-uid");
    }

    #[test]
    fn objects_of_other_owners_are_not_touched() {
        let mut meta = ObjectMeta::default();
        assert!(!reparent(&mut meta, "legacy-uid", owner("current-uid")));
        assert!(meta.owner_references.is_none());
    }

    // =========================================================================
    // Story: Deciding on product upgrades
    // =========================================================================

    #[rstest]
    #[case(Some("7.6.0"), true, true, (false, false))]
    #[case(None, true, true, (false, false))]
    #[case(Some("7.5.0"), false, true, (false, false))]
    #[case(Some("7.5.0"), true, false, (false, true))]
    #[case(Some("7.5.1"), true, true, (true, true))]
    fn upgrade_policy(
        #[case] version: Option<&str>,
        #[case] enabled: bool,
        #[case] minor: bool,
        #[case] expected: (bool, bool),
    ) {
        let mut cr = KieApp::new("demo", KieAppSpec::default());
        cr.spec.version = version.map(str::to_string);
        cr.spec.upgrades = KieAppUpgrades { enabled, minor };
        assert_eq!(
            check_product_upgrade(&cr, &VersionRegistry::default()).unwrap(),
            expected
        );
    }

    #[test]
    fn unsupported_versions_cannot_be_upgraded() {
        let mut cr = KieApp::new("demo", KieAppSpec::default());
        cr.spec.version = Some("7.2.0".into());
        let err = check_product_upgrade(&cr, &VersionRegistry::default()).unwrap_err();
        assert!(matches!(err, Error::VersionUnsupported { .. }));
    }

    #[rstest]
    #[case("7.5.0", false, Some("7.5.1"))]
    #[case("7.5.1", false, None)]
    #[case("7.5.0", true, Some("7.6.0"))]
    fn upgrade_targets(#[case] version: &str, #[case] minor: bool, #[case] target: Option<&str>) {
        let mut cr = KieApp::new("demo", KieAppSpec::default());
        cr.spec.version = Some(version.into());
        cr.spec.upgrades = KieAppUpgrades {
            enabled: true,
            minor,
        };
        assert_eq!(
            upgrade_target(&cr, &VersionRegistry::default()).unwrap().as_deref(),
            target
        );
    }

    // =========================================================================
    // Story: Detecting configuration conflicts before an upgrade
    // =========================================================================

    #[test]
    fn diffs_cover_shared_units_only() {
        let from = snapshot(&[("common", "common.yaml", "a\nb\n"), ("envs", "x.yaml", "x")]);
        let to = snapshot(&[("common", "common.yaml", "a\nc\n"), ("extra", "y.yaml", "y")]);
        let diffs = config_diffs(&from, &to);
        assert_eq!(diffs.len(), 1);
        assert_eq!(
            diffs["common"]["common.yaml"],
            FileChange {
                from: Some("a\nb\n".into()),
                to: Some("a\nc\n".into()),
            }
        );
        assert!(config_diffs(&from, &from).is_empty());
    }

    #[test]
    fn local_changes_block_the_upgrade() {
        let from = snapshot(&[("common", "common.yaml", "grace: 60\nprobe: 60\n")]);
        let to = snapshot(&[("common", "common.yaml", "grace: 90\nprobe: 60\n")]);
        let live = snapshot(&[("common", "common.yaml", "grace: 60\nprobe: 120\n")]);

        let err = check_upgrade_conflicts("7.5.0", "7.6.0", &from, &to, Some(&live)).unwrap_err();
        assert!(matches!(err, Error::UpgradeConflict { .. }));
        assert!(err.to_string().contains("7.5.0 ConfigMap(s)"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn untouched_configuration_upgrades() {
        let from = snapshot(&[("common", "common.yaml", "grace: 60\n")]);
        let to = snapshot(&[("common", "common.yaml", "grace: 90\n")]);
        assert!(check_upgrade_conflicts("7.5.0", "7.6.0", &from, &to, Some(&from)).is_ok());
        assert!(check_upgrade_conflicts("7.5.0", "7.6.0", &from, &to, None).is_ok());
    }

    #[test]
    fn files_on_one_side_only_are_changes() {
        let from = snapshot(&[("envs", "old.yaml", "x")]);
        let to = snapshot(&[("envs", "new.yaml", "y")]);
        let diffs = config_diffs(&from, &to);
        assert_eq!(diffs["envs"]["old.yaml"].to, None);
        assert_eq!(diffs["envs"]["new.yaml"].from, None);
    }

    #[test]
    fn live_configuration_missing_a_unit_is_retried_not_blocked() {
        let from = embedded_snapshot("7.5.0");
        let to = embedded_snapshot("7.6.0");
        let mut live = from.clone();
        live.remove("common");

        let err = check_upgrade_conflicts("7.5.0", "7.6.0", &from, &to, Some(&live)).unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("common"));
    }

    #[test]
    fn embedded_versions_upgrade_cleanly() {
        let from = embedded_snapshot("7.5.0");
        let to = embedded_snapshot("7.6.0");
        assert!(config_diffs(&from, &to).contains_key("common"));
        assert!(!config_diffs(&from, &to).contains_key("envs"));
        assert!(check_upgrade_conflicts("7.5.0", "7.6.0", &from, &to, Some(&from)).is_ok());
    }
}
