//! Controller runner - builds the KieApp controller future
//!
//! The controller watches KieApps and the objects they own, so a deleted or
//! edited DeploymentConfig or Secret triggers a pass for its KieApp.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::DynamicObject;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use kie_common::crd::KieApp;
use kie_common::kube_utils::HasApiResource;
use kie_controller::{error_policy, reconcile, KieAppContext, OperatorConfig};
use kie_environment::resource::DeploymentConfig;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the KieApp controller future
///
/// Watches the configured namespace, or every namespace when none is set.
pub fn build_kieapp_controller(
    client: Client,
    config: &OperatorConfig,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let ctx = Arc::new(KieAppContext::from_client(client.clone(), config));
    let dc_resource = DeploymentConfig::api_resource();

    let (kieapps, deployment_configs, secrets): (
        Api<KieApp>,
        Api<DynamicObject>,
        Api<Secret>,
    ) = match config.namespace.as_deref() {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced_with(client.clone(), ns, &dc_resource),
            Api::namespaced(client, ns),
        ),
        None => (
            Api::all(client.clone()),
            Api::all_with(client.clone(), &dc_resource),
            Api::all(client),
        ),
    };

    match config.namespace.as_deref() {
        Some(ns) => tracing::info!(namespace = %ns, "- KieApp controller"),
        None => tracing::info!("- KieApp controller (all namespaces)"),
    }

    Box::pin(
        Controller::new(
            kieapps,
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .owns_with(
            deployment_configs,
            dc_resource,
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .owns(
            secrets,
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(log_reconcile_result("KieApp")),
    )
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
