//! Spec defaults and template context
//!
//! [`apply_spec_defaults`] fills the values a KieApp may leave out
//! (application name, version, image tag, credentials, webhook secrets) and
//! reports whether anything changed so the caller can persist the spec.
//! Generated values are written back once and then reused, which keeps the
//! rendered environment stable from one pass to the next.
//!
//! [`env_template`] then builds the [`EnvTemplate`] the configuration
//! templates are rendered against. It is a pure function of the spec.

use kube::ResourceExt;

use kie_common::crd::{
    ImageReference, KieApp, KieAppBuildObject, KieAppRegistry, KieServerSet, WebhookSecret,
    WebhookType,
};
use kie_common::{
    keystore_secret_name, Error, Result, DEFAULT_IMAGE_REGISTRY, DEFAULT_KIE_DEPLOYMENTS,
    DEFAULT_PASSWORD, IMAGE_STREAM_NAMESPACE, IMAGE_STREAM_TAG,
};

use crate::template::{
    AuthTemplate, BuildTemplate, ConsoleTemplate, EnvTemplate, ImageTemplate, RegistryTemplate,
    ServerTemplate, SmartRouterTemplate,
};
use crate::versions::{minor_image_version, VersionRegistry};

/// Console admin user when the spec names none
pub const DEFAULT_ADMIN_USER: &str = "adminUser";

/// Fill unset spec values. Returns true when the spec changed.
///
/// Trial environments get [`DEFAULT_PASSWORD`] for unset passwords, every
/// other environment asks `generate` for a fresh one. Build webhooks without
/// a secret get a generated one as well.
pub fn apply_spec_defaults(
    cr: &mut KieApp,
    registry: &VersionRegistry,
    mut generate: impl FnMut() -> String,
) -> bool {
    let name = cr.name_any();
    let trial = cr.spec.environment.is_trial();
    let spec = &mut cr.spec;
    let mut changed = false;

    changed |= fill(&mut spec.version, || registry.current().to_string());

    let config = &mut spec.common_config;
    changed |= fill(&mut config.application_name, || name);
    changed |= fill(&mut config.image_tag, || IMAGE_STREAM_TAG.to_string());
    changed |= fill(&mut config.admin_user, || DEFAULT_ADMIN_USER.to_string());

    let mut password = || {
        if trial {
            DEFAULT_PASSWORD.to_string()
        } else {
            generate()
        }
    };
    for field in [
        &mut config.key_store_password,
        &mut config.admin_password,
        &mut config.controller_password,
        &mut config.maven_password,
        &mut config.server_password,
    ] {
        changed |= fill(field, &mut password);
    }

    for build in spec.objects.servers.iter_mut().filter_map(|s| s.build.as_mut()) {
        for type_ in [WebhookType::GitHub, WebhookType::Generic] {
            if !build.webhooks.iter().any(|w| w.type_ == type_) {
                build.webhooks.push(WebhookSecret {
                    type_,
                    secret: generate(),
                });
                changed = true;
            }
        }
    }

    changed
}

fn fill(field: &mut Option<String>, value: impl FnOnce() -> String) -> bool {
    match field {
        Some(v) if !v.is_empty() => false,
        _ => {
            *field = Some(value());
            true
        }
    }
}

// =============================================================================
// Server expansion
// =============================================================================

/// One server deployment expanded from a server set
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSlot {
    /// Index of the set in the spec
    pub set: usize,
    /// Running index over every server of the KieApp
    pub index: usize,
    /// Server id, also the name of its objects
    pub id: String,
}

/// Server sets to deploy; a spec without any gets one default set.
pub fn effective_server_sets(cr: &KieApp) -> Vec<KieServerSet> {
    if cr.spec.objects.servers.is_empty() {
        vec![KieServerSet::default()]
    } else {
        cr.spec.objects.servers.clone()
    }
}

/// Expand server sets into one slot per deployment, in spec order.
///
/// Ids are `<app>-kieserver-<index>`. A named set uses its name for a single
/// deployment and `<name>-<j>` for the j-th (from 0) of several.
pub fn server_slots(application_name: &str, sets: &[KieServerSet]) -> Vec<ServerSlot> {
    let mut slots = Vec::new();
    for (set_index, set) in sets.iter().enumerate() {
        let deployments = set.deployments.unwrap_or(DEFAULT_KIE_DEPLOYMENTS) as usize;
        for j in 0..deployments {
            let index = slots.len();
            let id = match set.name.as_deref().filter(|n| !n.is_empty()) {
                Some(name) if deployments == 1 => name.to_string(),
                Some(name) => format!("{}-{}", name, j),
                None => format!("{}-kieserver-{}", application_name, index),
            };
            slots.push(ServerSlot {
                set: set_index,
                index,
                id,
            });
        }
    }
    slots
}

// =============================================================================
// Template context
// =============================================================================

/// Build the template context of a KieApp whose defaults were applied.
///
/// # Errors
///
/// A `Configuration` error when a defaulted value is still missing or the
/// authentication sections contradict each other.
pub fn env_template(cr: &KieApp, default_registry: &KieAppRegistry) -> Result<EnvTemplate> {
    let spec = &cr.spec;
    let config = &spec.common_config;
    let constants = spec.environment.constants();

    let application_name = cr.application_name();
    let version = required("spec.version", &spec.version)?;
    let image_tag = config
        .image_tag
        .clone()
        .unwrap_or_else(|| IMAGE_STREAM_TAG.to_string());
    let minor_version = minor_image_version(&version);

    let default_image = |from: Option<&ImageReference>| match from {
        Some(from) => image_template(from),
        None => ImageTemplate {
            kind: "ImageStreamTag".into(),
            name: format!(
                "{}{}-kieserver-openshift:{}",
                constants.product, minor_version, image_tag
            ),
            namespace: IMAGE_STREAM_NAMESPACE.into(),
        },
    };

    let sets = effective_server_sets(cr);
    let servers = server_slots(&application_name, &sets)
        .into_iter()
        .map(|slot| {
            let set = &sets[slot.set];
            let built = format!("{}-kieserver-{}", application_name, slot.index);
            let (from, build) = match &set.build {
                Some(build) => (
                    ImageTemplate {
                        kind: "ImageStreamTag".into(),
                        name: format!("{}:latest", built),
                        namespace: String::new(),
                    },
                    Some(build_template(build, default_image(build.from.as_ref()), built)?),
                ),
                None => (default_image(set.from.as_ref()), None),
            };
            Ok(ServerTemplate {
                keystore_secret: set
                    .keystore_secret
                    .clone()
                    .unwrap_or_else(|| keystore_secret_name(&slot.id)),
                kie_server_id: slot.id,
                from,
                build,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let auth = &spec.auth;
    if auth.sso.is_some() && auth.ldap.is_some() {
        return Err(Error::configuration_in(
            "spec.auth",
            "sso and ldap authentication are mutually exclusive",
        ));
    }

    let registry = spec.image_registry.clone().unwrap_or_default();

    Ok(EnvTemplate {
        product: constants.product.into(),
        version,
        minor_version,
        image_tag,
        maven_repo: constants.maven_repo.into(),
        key_store_password: required("commonConfig.keyStorePassword", &config.key_store_password)?,
        admin_user: required("commonConfig.adminUser", &config.admin_user)?,
        admin_password: required("commonConfig.adminPassword", &config.admin_password)?,
        controller_password: required(
            "commonConfig.controllerPassword",
            &config.controller_password,
        )?,
        server_password: required("commonConfig.serverPassword", &config.server_password)?,
        maven_password: required("commonConfig.mavenPassword", &config.maven_password)?,
        registry: RegistryTemplate {
            registry: registry
                .registry
                .or_else(|| default_registry.registry.clone())
                .unwrap_or_else(|| DEFAULT_IMAGE_REGISTRY.to_string()),
            insecure: registry.insecure || default_registry.insecure,
        },
        console: ConsoleTemplate {
            name: constants.prefix.into(),
            image_name: constants.image_name.into(),
            probe_page: constants.console_probe_page.into(),
            keystore_secret: spec
                .objects
                .console
                .keystore_secret
                .clone()
                .unwrap_or_else(|| {
                    keystore_secret_name(&format!("{}-businesscentral", application_name))
                }),
        },
        smart_router: SmartRouterTemplate {
            keystore_secret: spec
                .objects
                .smart_router
                .keystore_secret
                .clone()
                .unwrap_or_else(|| {
                    keystore_secret_name(&format!("{}-smartrouter", application_name))
                }),
        },
        servers,
        auth: AuthTemplate {
            sso: auth.sso.clone(),
            ldap: auth.ldap.clone(),
            role_mapper: auth.role_mapper.clone(),
        },
        application_name,
    })
}

fn required(field: &str, value: &Option<String>) -> Result<String> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::configuration_in(field, format!("{} is not set", field)))
}

fn image_template(from: &ImageReference) -> ImageTemplate {
    ImageTemplate {
        kind: from.kind.clone(),
        name: from.name.clone(),
        namespace: from.namespace.clone().unwrap_or_default(),
    }
}

fn build_template(
    build: &KieAppBuildObject,
    from: ImageTemplate,
    image_stream_name: String,
) -> Result<BuildTemplate> {
    let secret = |type_: WebhookType| {
        build
            .webhooks
            .iter()
            .find(|w| w.type_ == type_)
            .map(|w| w.secret.clone())
            .ok_or_else(|| {
                Error::configuration_in(
                    "spec.objects.servers.build.webhooks",
                    format!("no {:?} webhook secret", type_),
                )
            })
    };
    Ok(BuildTemplate {
        git_source: build.git_source.clone(),
        github_webhook_secret: secret(WebhookType::GitHub)?,
        generic_webhook_secret: secret(WebhookType::Generic)?,
        kie_server_container_deployment: build
            .kie_server_container_deployment
            .clone()
            .unwrap_or_default(),
        maven_mirror_url: build.maven_mirror_url.clone().unwrap_or_default(),
        artifact_dir: build.artifact_dir.clone().unwrap_or_default(),
        from,
        image_stream_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kie_common::crd::{EnvironmentType, GitSource, KieAppSpec, LdapAuthConfig, SsoAuthConfig};

    fn kieapp(env: EnvironmentType) -> KieApp {
        KieApp::new(
            "demo",
            KieAppSpec {
                environment: env,
                ..Default::default()
            },
        )
    }

    fn defaulted(env: EnvironmentType) -> KieApp {
        let mut cr = kieapp(env);
        let mut n = 0;
        apply_spec_defaults(&mut cr, &VersionRegistry::default(), || {
            n += 1;
            format!("generated-{}", n)
        });
        cr
    }

    fn build() -> KieAppBuildObject {
        KieAppBuildObject {
            kie_server_container_deployment: Some("orders=com.acme:orders:1.0".into()),
            git_source: GitSource {
                uri: "https://github.com/acme/orders".into(),
                reference: "main".into(),
                context_dir: None,
            },
            ..Default::default()
        }
    }

    // =========================================================================
    // Story: Filling spec defaults
    // =========================================================================

    #[test]
    fn trial_environments_use_the_default_password() {
        let cr = defaulted(EnvironmentType::RhpamTrial);
        let config = &cr.spec.common_config;
        assert_eq!(config.application_name.as_deref(), Some("demo"));
        assert_eq!(config.admin_user.as_deref(), Some(DEFAULT_ADMIN_USER));
        assert_eq!(config.admin_password.as_deref(), Some(DEFAULT_PASSWORD));
        assert_eq!(config.key_store_password.as_deref(), Some(DEFAULT_PASSWORD));
        assert_eq!(config.image_tag.as_deref(), Some(IMAGE_STREAM_TAG));
        assert_eq!(cr.spec.version.as_deref(), Some("7.6.0"));
    }

    #[test]
    fn other_environments_get_generated_passwords() {
        let cr = defaulted(EnvironmentType::RhpamProduction);
        let config = &cr.spec.common_config;
        assert_eq!(config.key_store_password.as_deref(), Some("generated-1"));
        assert_eq!(config.server_password.as_deref(), Some("generated-5"));
    }

    #[test]
    fn defaults_are_applied_once() {
        let mut cr = defaulted(EnvironmentType::RhpamProduction);
        let before = cr.clone();
        let changed =
            apply_spec_defaults(&mut cr, &VersionRegistry::default(), || "other".to_string());
        assert!(!changed);
        assert_eq!(cr.spec, before.spec);
    }

    #[test]
    fn explicit_values_are_kept() {
        let mut cr = kieapp(EnvironmentType::RhdmTrial);
        cr.spec.version = Some("7.5.0".into());
        cr.spec.common_config.admin_password = Some("mine".into());
        apply_spec_defaults(&mut cr, &VersionRegistry::default(), String::new);
        assert_eq!(cr.spec.version.as_deref(), Some("7.5.0"));
        assert_eq!(cr.spec.common_config.admin_password.as_deref(), Some("mine"));
    }

    #[test]
    fn build_webhooks_get_secrets() {
        let mut cr = kieapp(EnvironmentType::RhpamTrial);
        let mut with_hook = build();
        with_hook.webhooks.push(WebhookSecret {
            type_: WebhookType::GitHub,
            secret: "given".into(),
        });
        cr.spec.objects.servers = vec![KieServerSet {
            build: Some(with_hook),
            ..Default::default()
        }];
        apply_spec_defaults(&mut cr, &VersionRegistry::default(), || "made".to_string());
        let hooks = &cr.spec.objects.servers[0].build.as_ref().unwrap().webhooks;
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].secret, "given");
        assert_eq!(hooks[1].type_, WebhookType::Generic);
        assert_eq!(hooks[1].secret, "made");
    }

    // =========================================================================
    // Story: Expanding server sets
    // =========================================================================

    #[test]
    fn server_ids_follow_set_order_and_names() {
        let sets = vec![
            KieServerSet {
                deployments: Some(2),
                ..Default::default()
            },
            KieServerSet {
                name: Some("orders".into()),
                ..Default::default()
            },
            KieServerSet {
                name: Some("billing".into()),
                deployments: Some(2),
                ..Default::default()
            },
        ];
        let ids: Vec<_> = server_slots("demo", &sets).into_iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            ["demo-kieserver-0", "demo-kieserver-1", "orders", "billing-0", "billing-1"]
        );
    }

    #[test]
    fn spec_without_servers_gets_one() {
        let cr = kieapp(EnvironmentType::RhpamTrial);
        let slots = server_slots("demo", &effective_server_sets(&cr));
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].id, "demo-kieserver-0");
    }

    // =========================================================================
    // Story: Building the template context
    // =========================================================================

    #[test]
    fn context_carries_product_constants_and_images() {
        let mut cr = defaulted(EnvironmentType::RhpamTrial);
        cr.spec.version = Some("7.5.1".into());
        let ctx = env_template(&cr, &KieAppRegistry::default()).unwrap();
        assert_eq!(ctx.application_name, "demo");
        assert_eq!(ctx.product, "rhpam");
        assert_eq!(ctx.minor_version, "75");
        assert_eq!(ctx.console.name, "rhpamcentr");
        assert_eq!(ctx.console.keystore_secret, "demo-businesscentral-app-secret");
        assert_eq!(ctx.smart_router.keystore_secret, "demo-smartrouter-app-secret");
        assert_eq!(ctx.registry.registry, DEFAULT_IMAGE_REGISTRY);

        let server = &ctx.servers[0];
        assert_eq!(server.kie_server_id, "demo-kieserver-0");
        assert_eq!(server.from.name, "rhpam75-kieserver-openshift:1.0");
        assert_eq!(server.from.namespace, "openshift");
        assert_eq!(server.keystore_secret, "demo-kieserver-0-app-secret");
        assert!(server.build.is_none());
    }

    #[test]
    fn build_sets_run_the_locally_built_image() {
        let mut cr = kieapp(EnvironmentType::RhdmTrial);
        cr.spec.objects.servers = vec![
            KieServerSet::default(),
            KieServerSet {
                build: Some(build()),
                keystore_secret: Some("my-keystore".into()),
                ..Default::default()
            },
        ];
        apply_spec_defaults(&mut cr, &VersionRegistry::default(), || "hook".to_string());
        let ctx = env_template(&cr, &KieAppRegistry::default()).unwrap();

        let server = &ctx.servers[1];
        assert_eq!(server.from.name, "demo-kieserver-1:latest");
        assert_eq!(server.from.namespace, "");
        assert_eq!(server.keystore_secret, "my-keystore");
        let build = server.build.as_ref().unwrap();
        assert_eq!(build.image_stream_name, "demo-kieserver-1");
        assert_eq!(build.from.name, "rhdm76-kieserver-openshift:1.0");
        assert_eq!(build.github_webhook_secret, "hook");
    }

    #[test]
    fn explicit_server_image_wins() {
        let mut cr = defaulted(EnvironmentType::RhpamTrial);
        cr.spec.objects.servers = vec![KieServerSet {
            from: Some(ImageReference {
                kind: "DockerImage".into(),
                name: "quay.io/acme/server:1".into(),
                namespace: None,
            }),
            ..Default::default()
        }];
        let ctx = env_template(&cr, &KieAppRegistry::default()).unwrap();
        assert_eq!(ctx.servers[0].from.kind, "DockerImage");
        assert_eq!(ctx.servers[0].from.namespace, "");
    }

    #[test]
    fn registry_comes_from_spec_then_operator() {
        let mut cr = defaulted(EnvironmentType::RhpamTrial);
        let operator = KieAppRegistry {
            registry: Some("mirror.local".into()),
            insecure: true,
        };
        assert_eq!(env_template(&cr, &operator).unwrap().registry.registry, "mirror.local");

        cr.spec.image_registry = Some(KieAppRegistry {
            registry: Some("spec.local".into()),
            insecure: false,
        });
        let ctx = env_template(&cr, &operator).unwrap();
        assert_eq!(ctx.registry.registry, "spec.local");
    }

    #[test]
    fn missing_defaults_are_configuration_errors() {
        let cr = kieapp(EnvironmentType::RhpamTrial);
        let err = env_template(&cr, &KieAppRegistry::default()).unwrap_err();
        assert_eq!(err.source_name(), Some("spec.version"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn sso_and_ldap_are_exclusive() {
        let mut cr = defaulted(EnvironmentType::RhpamTrial);
        cr.spec.auth.sso = Some(SsoAuthConfig {
            url: "https://sso".into(),
            realm: "demo".into(),
            ..Default::default()
        });
        cr.spec.auth.ldap = Some(LdapAuthConfig {
            url: "ldap://ldap".into(),
            ..Default::default()
        });
        let err = env_template(&cr, &KieAppRegistry::default()).unwrap_err();
        assert_eq!(err.source_name(), Some("spec.auth"));
    }
}
