//! Template Assembler
//!
//! Renders the baseline (`common.yaml`) and overlay (`envs/<env>.yaml`)
//! templates against the same context and parses each into an
//! [`Environment`]. [`build_environment`] adds loading through a
//! [`ConfigSource`], the merge, and the per-tier overrides of the spec.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, EnvVar as KubeEnvVar, ResourceRequirements as KubeResources};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;
use tracing::{debug, instrument};

use kie_common::crd::{EnvVar, EnvironmentType, KieApp, ResourceRequirements};
use kie_common::yaml::parse_yaml_into;
use kie_common::{Error, Result};

use crate::defaults::{effective_server_sets, server_slots};
use crate::merge::merge_environments;
use crate::resource::{CustomObject, Environment, Tracked};
use crate::source::{env_template_path, ConfigSource, COMMON_TEMPLATE, COMMON_UNIT};
use crate::template::{EnvTemplate, TemplateEngine};

/// Render and parse the baseline and overlay environments.
///
/// Returns `(baseline, overlay)`. A failure names the template it came from,
/// `common` or `envs/<environment>`; nothing is returned on failure.
pub fn assemble(
    common_text: &str,
    env_text: &str,
    environment: EnvironmentType,
    ctx: &EnvTemplate,
) -> Result<(Environment, Environment)> {
    let engine = TemplateEngine::new();
    let baseline = render_environment(&engine, common_text, COMMON_UNIT, ctx)?;
    let overlay_name = format!("envs/{}", environment);
    let overlay = render_environment(&engine, env_text, &overlay_name, ctx)?;
    Ok((baseline, overlay))
}

fn render_environment(
    engine: &TemplateEngine,
    text: &str,
    source_name: &str,
    ctx: &EnvTemplate,
) -> Result<Environment> {
    let rendered = engine
        .render(text, ctx)
        .map_err(|e| Error::template_in(source_name, e.to_string()))?;
    parse_yaml_into(&rendered).map_err(|e| Error::configuration_in(source_name, e.to_string()))
}

/// Load, assemble and merge the environment of a KieApp.
///
/// Templates come from `source` at `ctx.version`. The spec's per-tier env
/// vars and resources are applied to the merged DeploymentConfigs.
#[instrument(
    skip(source, cr, ctx),
    fields(kieapp = %cr.name_any(), environment = %cr.spec.environment, version = %ctx.version)
)]
pub async fn build_environment(
    source: &dyn ConfigSource,
    cr: &KieApp,
    ctx: &EnvTemplate,
) -> Result<Environment> {
    let common = source.load_template(COMMON_TEMPLATE, &ctx.version).await?;
    let overlay = source
        .load_template(&env_template_path(cr.spec.environment.as_str()), &ctx.version)
        .await?;

    let (baseline, overlay) = assemble(&common, &overlay, cr.spec.environment, ctx)?;
    let mut env = merge_environments(baseline, overlay);
    apply_tier_overrides(&mut env, cr);
    debug!(servers = env.servers.len(), "assembled environment");
    Ok(env)
}

/// Apply the env vars and resources of the spec tiers to their DeploymentConfigs.
pub fn apply_tier_overrides(env: &mut Environment, cr: &KieApp) {
    let objects = &cr.spec.objects;
    override_tier(&mut env.console, &objects.console.env, objects.console.resources.as_ref());
    override_tier(
        &mut env.smart_router,
        &objects.smart_router.env,
        objects.smart_router.resources.as_ref(),
    );

    let sets = effective_server_sets(cr);
    let slots = server_slots(&cr.application_name(), &sets);
    for (tier, slot) in env.servers.iter_mut().zip(&slots) {
        let set = &sets[slot.set];
        override_tier(tier, &set.env, set.resources.as_ref());
    }
}

fn override_tier(tier: &mut CustomObject, env: &[EnvVar], resources: Option<&ResourceRequirements>) {
    if env.is_empty() && resources.is_none() {
        return;
    }
    for dc in tier.deployment_configs.iter_mut() {
        let Tracked::Live(dc) = dc else { continue };
        let Some(container) = dc
            .spec
            .template
            .as_mut()
            .and_then(|t| t.spec.as_mut())
            .and_then(|s| s.containers.first_mut())
        else {
            continue;
        };
        override_container(container, env, resources);
    }
}

fn override_container(
    container: &mut Container,
    env: &[EnvVar],
    resources: Option<&ResourceRequirements>,
) {
    let vars = container.env.get_or_insert_with(Vec::new);
    for var in env {
        let value = KubeEnvVar {
            name: var.name.clone(),
            value: var.value.clone(),
            value_from: None,
        };
        match vars.iter_mut().find(|v| v.name == var.name) {
            Some(existing) => *existing = value,
            None => vars.push(value),
        }
    }
    if let Some(resources) = resources {
        container.resources = Some(KubeResources {
            limits: quantities(&resources.limits),
            requests: quantities(&resources.requests),
            ..Default::default()
        });
    }
}

fn quantities(values: &BTreeMap<String, String>) -> Option<BTreeMap<String, Quantity>> {
    if values.is_empty() {
        return None;
    }
    Some(
        values
            .iter()
            .map(|(k, v)| (k.clone(), Quantity(v.clone())))
            .collect(),
    )
}
