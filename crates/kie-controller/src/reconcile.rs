//! KieApp reconciliation
//!
//! One pass re-derives everything from the KieApp and the live cluster:
//! schema migration, spec defaults and product upgrade, then assembly,
//! diff against the owned objects, apply, and status. Nothing is kept
//! between passes.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource as _, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use kie_common::crd::{KieApp, KieAppStatus};
use kie_common::events::{actions, reasons};
use kie_common::{Error, Result};
use kie_environment::defaults::{apply_spec_defaults, env_template};
use kie_environment::{build_environment, compare, Comparator};

use crate::apply::apply_deltas;
use crate::context::KieAppContext;
use crate::images::{detach_idle_server_config_maps, ensure_image_streams};
use crate::properties::{add_keystore_secrets, console_host, requested_resources};
use crate::snapshot::deployed_snapshot;
use crate::status::{classify_deployments, set_deployed, set_failed, set_provisioning};
use crate::upgrade::{product_upgrade, upgrading_schema, SchemaUpgrade};

/// Requeue delay after objects were written
const PROVISIONING_REQUEUE: Duration = Duration::from_secs(10);

/// Requeue delay once the deployment matches the spec
const STEADY_REQUEUE: Duration = Duration::from_secs(60);

/// Requeue delay for retryable failures
const RETRY_REQUEUE: Duration = Duration::from_secs(30);

/// Reconcile a KieApp
///
/// A failed pass is recorded as a `Failed` condition before the error is
/// returned to the error policy.
#[instrument(skip(kieapp, ctx), fields(kieapp = %kieapp.name_any(), namespace = ?kieapp.namespace()))]
pub async fn reconcile(kieapp: Arc<KieApp>, ctx: Arc<KieAppContext>) -> Result<Action> {
    match reconcile_pass(&kieapp, &ctx).await {
        Ok(action) => Ok(action),
        Err(err) => {
            record_failure(&kieapp, &ctx, &err).await;
            Err(err)
        }
    }
}

async fn reconcile_pass(kieapp: &KieApp, ctx: &KieAppContext) -> Result<Action> {
    let name = kieapp.name_any();
    let namespace = kieapp.namespace().ok_or_else(|| {
        Error::internal_with_context("reconcile", format!("KieApp {} has no namespace", name))
    })?;
    info!("reconciling KieApp");

    match upgrading_schema(ctx.kube.as_ref(), &ctx.registry, &name, &namespace).await? {
        SchemaUpgrade::Migrated {
            created: true,
            reparented,
        } => {
            publish(
                ctx,
                kieapp,
                EventType::Normal,
                reasons::SCHEMA_MIGRATED,
                actions::UPGRADE,
                format!("converted from the legacy schema, {} workloads moved", reparented),
            )
            .await;
        }
        SchemaUpgrade::Unsupported(version) => {
            debug!(%version, "legacy resource left on unsupported version");
        }
        _ => {}
    }

    let mut cr = kieapp.clone();
    apply_spec_defaults(&mut cr, &ctx.registry, || ctx.secrets.password());

    match product_upgrade(&mut cr, &ctx.registry, ctx.config_source.as_ref()).await {
        Ok(Some(target)) => {
            publish(
                ctx,
                kieapp,
                EventType::Normal,
                reasons::VERSION_UPGRADED,
                actions::UPGRADE,
                format!("product version moved to {}", target),
            )
            .await;
        }
        Ok(None) => {}
        Err(err @ Error::VersionUnsupported { .. }) => {
            warn!(error = %err, "leaving KieApp with unsupported version alone");
            publish(
                ctx,
                kieapp,
                EventType::Warning,
                reasons::VERSION_UNSUPPORTED,
                actions::RECONCILE,
                err.to_string(),
            )
            .await;
            return Ok(Action::await_change());
        }
        Err(err @ Error::UpgradeConflict { .. }) => {
            warn!(error = %err, "upgrade blocked");
            let mut status = kieapp.status.clone().unwrap_or_default();
            if set_failed(&mut status, err.status_reason(), &err.to_string()) {
                ctx.kube
                    .patch_kieapp_status(&name, &namespace, &status)
                    .await?;
                publish(
                    ctx,
                    kieapp,
                    EventType::Warning,
                    reasons::UPGRADE_BLOCKED,
                    actions::UPGRADE,
                    err.to_string(),
                )
                .await;
            }
            return Ok(Action::await_change());
        }
        Err(err) => return Err(err),
    }

    if cr.spec != kieapp.spec {
        info!(version = ?cr.spec.version, "writing defaulted spec");
        ctx.kube.replace_kieapp(&cr).await?;
        return Ok(Action::await_change());
    }

    let template = env_template(&cr, &ctx.default_registry)?;
    let mut env = build_environment(ctx.config_source.as_ref(), &cr, &template).await?;
    ensure_image_streams(ctx.kube.as_ref(), &mut env, &cr, &ctx.default_registry).await?;

    let uid = cr.uid().ok_or_else(|| {
        Error::internal_with_context("reconcile", format!("KieApp {} has no uid", name))
    })?;
    let deployed = deployed_snapshot(ctx.kube.as_ref(), &namespace, &uid).await?;

    let console = console_host(&env, &deployed, &cr.application_name());
    add_keystore_secrets(&mut env, &cr, &deployed, ctx.secrets.as_ref())?;
    let requested = requested_resources(&env, &cr)?;

    let deltas = compare(&deployed, &requested, &Comparator::default());
    let written = apply_deltas(ctx.kube.as_ref(), &deployed, &deltas).await?;
    if let Err(err) =
        detach_idle_server_config_maps(ctx.kube.as_ref(), &env, &deployed, &namespace).await
    {
        warn!(error = %err, "failed to detach scaled-down server state");
    }

    let before = cr.status.clone().unwrap_or_default();
    let mut status = KieAppStatus {
        console_host: Some(console),
        deployments: classify_deployments(&deployed),
        version: cr.spec.version.clone(),
        ..before.clone()
    };
    let event = if written {
        set_provisioning(&mut status).then_some(reasons::PROVISIONING)
    } else {
        set_deployed(&mut status).then_some(reasons::DEPLOYED)
    };
    if status != before {
        ctx.kube
            .patch_kieapp_status(&name, &namespace, &status)
            .await?;
    }
    if let Some(reason) = event {
        publish(
            ctx,
            kieapp,
            EventType::Normal,
            reason,
            actions::RECONCILE,
            format!("{} environment at version {}", cr.spec.environment, template.version),
        )
        .await;
    }

    Ok(Action::requeue(if written {
        PROVISIONING_REQUEUE
    } else {
        STEADY_REQUEUE
    }))
}

/// Record a failed pass on the KieApp status
async fn record_failure(kieapp: &KieApp, ctx: &KieAppContext, err: &Error) {
    let Some(namespace) = kieapp.namespace() else {
        return;
    };
    let name = kieapp.name_any();
    let mut status = kieapp.status.clone().unwrap_or_default();
    if !set_failed(&mut status, err.status_reason(), &err.to_string()) {
        return;
    }
    if let Err(patch_err) = ctx
        .kube
        .patch_kieapp_status(&name, &namespace, &status)
        .await
    {
        warn!(error = %patch_err, "failed to record failure on KieApp status");
    }
    publish(
        ctx,
        kieapp,
        EventType::Warning,
        reasons::FAILED,
        actions::RECONCILE,
        err.to_string(),
    )
    .await;
}

async fn publish(
    ctx: &KieAppContext,
    kieapp: &KieApp,
    type_: EventType,
    reason: &str,
    action: &str,
    note: String,
) {
    ctx.events
        .publish(&kieapp.object_ref(&()), type_, reason, action, Some(note))
        .await;
}

/// Error policy for the KieApp controller
///
/// Retryable errors are retried after 30 seconds; anything else waits for
/// the KieApp to change.
pub fn error_policy(kieapp: Arc<KieApp>, error: &Error, _ctx: Arc<KieAppContext>) -> Action {
    error!(
        ?error,
        kieapp = %kieapp.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(RETRY_REQUEUE)
    } else {
        Action::await_change()
    }
}
