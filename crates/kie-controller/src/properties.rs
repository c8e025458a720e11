//! Environment properties
//!
//! Everything the controller adds to a merged environment before it is
//! compared with the cluster: the console URL, a generated keystore Secret per
//! tier and the namespace and owner reference on every requested object.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::{Resource as _, ResourceExt};
use tracing::debug;

use kie_common::crd::KieApp;
use kie_common::kube_utils::set_controller_reference;
use kie_common::{keystore_secret_name, Error, Result, KEYSTORE_SECRET_KEY, LABEL_APPLICATION};
use kie_environment::defaults::{effective_server_sets, server_slots};
use kie_environment::resource::{CustomObject, Tracked};
use kie_environment::{Environment, Resource, ResourceKind, ResourceMap};

use crate::secrets::SecretMaterial;

/// Host of the first TLS route of a tier.
///
/// A route without a host gets one from the router, so the live route with
/// the same name is asked instead.
fn tls_route_host(tier: &CustomObject, deployed: &ResourceMap) -> Option<String> {
    let route = tier
        .routes
        .iter()
        .filter_map(Tracked::live)
        .find(|route| route.is_tls())?;
    if let Some(host) = route.spec.host.as_ref().filter(|h| !h.is_empty()) {
        return Some(host.clone());
    }
    let name = route.metadata.name.as_deref()?;
    deployed
        .get(&ResourceKind::Route)
        .into_iter()
        .flatten()
        .find_map(|resource| match resource {
            Resource::Route(live) if live.metadata.name.as_deref() == Some(name) => {
                live.spec.host.clone()
            }
            _ => None,
        })
        .filter(|h| !h.is_empty())
}

/// URL of the console: `https://<host>` of its first TLS route, else
/// `http://<application name>`.
pub fn console_host(env: &Environment, deployed: &ResourceMap, application_name: &str) -> String {
    match tls_route_host(&env.console, deployed) {
        Some(host) => format!("https://{}", host),
        None => format!("http://{}", application_name),
    }
}

/// Add a generated keystore Secret to every tier that needs one.
///
/// Omitted tiers and tiers whose spec names an existing keystore secret are
/// skipped. The first omitted server ends the server tiers.
pub fn add_keystore_secrets(
    env: &mut Environment,
    cr: &KieApp,
    deployed: &ResourceMap,
    secrets: &dyn SecretMaterial,
) -> Result<()> {
    let application_name = cr.application_name();
    let password = cr
        .spec
        .common_config
        .key_store_password
        .clone()
        .unwrap_or_default();
    let objects = &cr.spec.objects;

    if !env.console.omit && objects.console.keystore_secret.is_none() {
        let tier = format!("{}-businesscentral", application_name);
        add_keystore(&mut env.console, &tier, &application_name, &password, deployed, secrets)?;
    }

    let sets = effective_server_sets(cr);
    let slots = server_slots(&application_name, &sets);
    for (server, slot) in env.servers.iter_mut().zip(&slots) {
        if server.omit {
            break;
        }
        if sets[slot.set].keystore_secret.is_some() {
            continue;
        }
        add_keystore(server, &slot.id, &application_name, &password, deployed, secrets)?;
    }

    if !env.smart_router.omit && objects.smart_router.keystore_secret.is_none() {
        let tier = format!("{}-smartrouter", application_name);
        add_keystore(&mut env.smart_router, &tier, &application_name, &password, deployed, secrets)?;
    }
    Ok(())
}

fn add_keystore(
    object: &mut CustomObject,
    tier: &str,
    application_name: &str,
    password: &str,
    deployed: &ResourceMap,
    secrets: &dyn SecretMaterial,
) -> Result<()> {
    let common_name =
        tls_route_host(object, deployed).unwrap_or_else(|| application_name.to_string());
    let keystore = secrets.keystore(&common_name, password)?;
    let name = keystore_secret_name(tier);
    debug!(secret = %name, %common_name, "generated keystore");

    let labels = BTreeMap::from([
        ("app".to_string(), application_name.to_string()),
        (LABEL_APPLICATION.to_string(), application_name.to_string()),
    ]);
    object.secrets.push(Tracked::Live(Secret {
        metadata: ObjectMeta {
            name: Some(name),
            labels: Some(labels),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([(
            KEYSTORE_SECRET_KEY.to_string(),
            ByteString(keystore),
        )])),
        ..Default::default()
    }));
    Ok(())
}

/// The requested object set with the namespace and controller owner
/// reference of `cr` on every object.
pub fn requested_resources(env: &Environment, cr: &KieApp) -> Result<ResourceMap> {
    let namespace = cr.namespace().ok_or_else(|| {
        Error::internal_with_context("properties", format!("KieApp {} has no namespace", cr.name_any()))
    })?;
    let owner = cr.controller_owner_ref(&()).ok_or_else(|| {
        Error::internal_with_context("properties", format!("KieApp {} has no uid", cr.name_any()))
    })?;

    let mut requested = env.requested();
    for resource in requested.values_mut().flatten() {
        let meta = resource.meta_mut();
        meta.namespace = Some(namespace.clone());
        set_controller_reference(meta, owner.clone());
    }
    Ok(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MockSecretMaterial;
    use kie_common::crd::{KieAppSpec, KieServerSet};
    use kie_common::kube_utils::is_controlled_by;
    use kie_environment::resource::openshift::{RouteSpec, TlsConfig};
    use kie_environment::resource::{group_by_kind, Route};

    fn kieapp() -> KieApp {
        let mut cr = KieApp::new("demo", KieAppSpec::default());
        cr.metadata.namespace = Some("apps".into());
        cr.metadata.uid = Some("uid-1".into());
        cr.spec.common_config.key_store_password = Some("s3cr3t".into());
        cr
    }

    fn route(name: &str, host: Option<&str>, tls: bool) -> Route {
        Route::new(
            ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            RouteSpec {
                host: host.map(str::to_string),
                tls: tls.then(|| TlsConfig {
                    termination: "passthrough".into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
    }

    fn tier_with_routes(routes: Vec<Route>) -> CustomObject {
        CustomObject {
            routes: routes.into_iter().map(Tracked::Live).collect(),
            ..Default::default()
        }
    }

    fn material() -> MockSecretMaterial {
        let mut secrets = MockSecretMaterial::new();
        secrets
            .expect_keystore()
            .returning(|cn, _| Ok(format!("PEM for {}", cn).into_bytes()));
        secrets
    }

    fn secret_names(object: &CustomObject) -> Vec<&str> {
        object.secrets.iter().map(Tracked::name).collect()
    }

    // =========================================================================
    // Story: Console URL
    // =========================================================================

    #[test]
    fn console_host_uses_the_first_tls_route() {
        let env = Environment {
            console: tier_with_routes(vec![
                route("demo-rhpamcentr-http", Some("plain.apps.example.com"), false),
                route("demo-rhpamcentr", Some("secure.apps.example.com"), true),
            ]),
            ..Default::default()
        };
        assert_eq!(
            console_host(&env, &ResourceMap::new(), "demo"),
            "https://secure.apps.example.com"
        );
    }

    #[test]
    fn generated_route_host_is_read_from_the_cluster() {
        let env = Environment {
            console: tier_with_routes(vec![route("demo-rhpamcentr", None, true)]),
            ..Default::default()
        };
        let deployed = group_by_kind([Resource::Route(route(
            "demo-rhpamcentr",
            Some("demo-rhpamcentr-apps.router.example.com"),
            true,
        ))]);
        assert_eq!(
            console_host(&env, &deployed, "demo"),
            "https://demo-rhpamcentr-apps.router.example.com"
        );
    }

    #[test]
    fn console_without_tls_falls_back_to_the_application_name() {
        let env = Environment {
            console: tier_with_routes(vec![route("demo-rhpamcentr", None, true)]),
            ..Default::default()
        };
        assert_eq!(console_host(&env, &ResourceMap::new(), "demo"), "http://demo");
        assert_eq!(
            console_host(&Environment::default(), &ResourceMap::new(), "demo"),
            "http://demo"
        );
    }

    // =========================================================================
    // Story: Keystore secrets
    // =========================================================================

    #[test]
    fn every_tier_gets_a_keystore() {
        let mut cr = kieapp();
        cr.spec.objects.servers = vec![KieServerSet {
            deployments: Some(2),
            ..Default::default()
        }];
        let mut env = Environment {
            console: tier_with_routes(vec![route("demo-rhpamcentr", Some("bc.example.com"), true)]),
            servers: vec![CustomObject::default(), CustomObject::default()],
            ..Default::default()
        };

        let mut secrets = MockSecretMaterial::new();
        secrets
            .expect_keystore()
            .withf(|cn, password| cn == "bc.example.com" && password == "s3cr3t")
            .times(1)
            .returning(|_, _| Ok(b"console".to_vec()));
        secrets
            .expect_keystore()
            .withf(|cn, _| cn == "demo")
            .times(3)
            .returning(|_, _| Ok(b"other".to_vec()));

        add_keystore_secrets(&mut env, &cr, &ResourceMap::new(), &secrets).unwrap();

        assert_eq!(secret_names(&env.console), vec!["demo-businesscentral-app-secret"]);
        assert_eq!(secret_names(&env.servers[0]), vec!["demo-kieserver-0-app-secret"]);
        assert_eq!(secret_names(&env.servers[1]), vec!["demo-kieserver-1-app-secret"]);
        assert_eq!(secret_names(&env.smart_router), vec!["demo-smartrouter-app-secret"]);

        let secret = env.console.secrets[0].live().unwrap();
        let data = secret.data.as_ref().unwrap();
        assert_eq!(data[KEYSTORE_SECRET_KEY], ByteString(b"console".to_vec()));
        assert_eq!(secret.metadata.labels.as_ref().unwrap()[LABEL_APPLICATION], "demo");
    }

    #[test]
    fn omitted_tiers_and_named_keystores_are_skipped() {
        let mut cr = kieapp();
        cr.spec.objects.console.keystore_secret = Some("my-keystore".into());
        cr.spec.objects.servers = vec![
            KieServerSet {
                keystore_secret: Some("server-keystore".into()),
                ..Default::default()
            },
            KieServerSet::default(),
            KieServerSet::default(),
        ];
        let mut env = Environment {
            smart_router: CustomObject {
                omit: true,
                ..Default::default()
            },
            servers: vec![
                CustomObject::default(),
                CustomObject::default(),
                CustomObject {
                    omit: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        add_keystore_secrets(&mut env, &cr, &ResourceMap::new(), &material()).unwrap();

        assert!(env.console.secrets.is_empty());
        assert!(env.servers[0].secrets.is_empty());
        assert_eq!(secret_names(&env.servers[1]), vec!["demo-kieserver-1-app-secret"]);
        assert!(env.servers[2].secrets.is_empty());
        assert!(env.smart_router.secrets.is_empty());
    }

    #[test]
    fn keystore_failure_is_reported() {
        let mut secrets = MockSecretMaterial::new();
        secrets
            .expect_keystore()
            .returning(|_, _| Err(Error::collaborator_permanent("keystore", "bad common name")));
        let mut env = Environment::default();
        let err = add_keystore_secrets(&mut env, &kieapp(), &ResourceMap::new(), &secrets)
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    // =========================================================================
    // Story: Ownership of requested objects
    // =========================================================================

    #[test]
    fn requested_objects_carry_namespace_and_owner() {
        let env = Environment {
            console: tier_with_routes(vec![route("demo-rhpamcentr", None, true)]),
            ..Default::default()
        };
        let requested = requested_resources(&env, &kieapp()).unwrap();
        let route = &requested[&ResourceKind::Route][0];
        assert_eq!(route.namespace(), Some("apps"));
        assert!(is_controlled_by(route.meta(), "uid-1"));
    }

    #[test]
    fn kieapp_without_uid_cannot_own_objects() {
        let mut cr = kieapp();
        cr.metadata.uid = None;
        assert!(requested_resources(&Environment::default(), &cr).is_err());
    }
}
