//! KieApp Operator - deploys KIE environments from KieApp resources

mod controller_runner;

use clap::{Parser, ValueEnum};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::core::crd::merge_crds;
use kube::{Api, Client, CustomResourceExt, Resource};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kie_common::crd::{KieApp, LegacyKieApp};
use kie_common::FIELD_MANAGER;
use kie_controller::configmaps::bootstrap_config_maps;
use kie_controller::{KieKubeClient, KieKubeClientImpl, OperatorConfig};

const CRD_NAME: &str = "kieapps.app.kiegroup.org";

/// Log line format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// KieApp operator - deploys and upgrades KIE environments on OpenShift
#[derive(Parser, Debug)]
#[command(name = "kie-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Log line format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(flatten)]
    config: OperatorConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&kieapp_crd()?)
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_tracing(cli.log_format);
    run_controller(cli.config).await
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// The KieApp CRD serving both schema versions, storing v2
fn kieapp_crd() -> anyhow::Result<CustomResourceDefinition> {
    merge_crds(vec![LegacyKieApp::crd(), KieApp::crd()], "v2")
        .map_err(|e| anyhow::anyhow!("Failed to merge KieApp CRD versions: {}", e))
}

/// Ensure the KieApp CRD is installed
///
/// Server-side apply keeps the installed CRD in step with the operator version.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!("Installing KieApp CRD...");
    crds.patch(CRD_NAME, &params, &Patch::Apply(&kieapp_crd()?))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install KieApp CRD: {}", e))?;

    Ok(())
}

/// Publish the embedded configuration as ConfigMaps owned by the operator
/// Deployment, so users can customize it in place.
async fn ensure_config_maps(client: &Client, namespace: &str, operator_name: &str) -> anyhow::Result<()> {
    let kube = KieKubeClientImpl::new(client.clone());
    let owner = kube
        .get_deployment(operator_name, namespace)
        .await?
        .and_then(|deployment| deployment.controller_owner_ref(&()));
    if owner.is_none() {
        tracing::warn!(
            namespace = %namespace,
            operator = %operator_name,
            "Operator Deployment not found, ConfigMaps will have no owner"
        );
    }

    let created = bootstrap_config_maps(&kube, namespace, owner).await?;
    tracing::info!(namespace = %namespace, created, "Configuration ConfigMaps in place");
    Ok(())
}

async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    tracing::info!(
        version = kie_common::OPERATOR_VERSION,
        registry = %config.registry,
        "Starting KieApp operator"
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    match config.in_cluster() {
        Some((namespace, operator_name)) => {
            ensure_config_maps(&client, namespace, operator_name).await?;
        }
        None => tracing::info!("Not running in cluster, serving the embedded configuration"),
    }

    controller_runner::build_kieapp_controller(client, &config).await;

    tracing::info!("KieApp operator shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // =========================================================================
    // Story: The CRD serves the legacy and current schemas
    // =========================================================================

    #[test]
    fn merged_crd_serves_both_versions_and_stores_v2() {
        let crd = kieapp_crd().unwrap();
        assert_eq!(crd.metadata.name.as_deref(), Some(CRD_NAME));

        let versions: Vec<(&str, bool)> = crd
            .spec
            .versions
            .iter()
            .map(|v| (v.name.as_str(), v.storage))
            .collect();
        assert_eq!(versions.len(), 2);
        assert!(versions.contains(&("v1", false)));
        assert!(versions.contains(&("v2", true)));
    }

    #[test]
    fn merged_crd_serializes_to_yaml() {
        let yaml = serde_yaml::to_string(&kieapp_crd().unwrap()).unwrap();
        assert!(yaml.contains("app.kiegroup.org"));
        assert!(yaml.contains("KieApp"));
    }

    // =========================================================================
    // Story: The command line selects the mode and log format
    // =========================================================================

    #[rstest]
    #[case(&[], LogFormat::Text)]
    #[case(&["--log-format", "json"], LogFormat::Json)]
    #[case(&["--log-format", "text"], LogFormat::Text)]
    fn log_format_flag(#[case] args: &[&str], #[case] expected: LogFormat) {
        let cli = Cli::try_parse_from(std::iter::once("kie-operator").chain(args.iter().copied()))
            .unwrap();
        assert_eq!(cli.log_format, expected);
    }

    #[test]
    fn crd_flag_and_operator_settings_parse_together() {
        let cli = Cli::try_parse_from([
            "kie-operator",
            "--crd",
            "--namespace",
            "kie",
            "--operator-name",
            "kie-cloud-operator",
        ])
        .unwrap();
        assert!(cli.crd);
        assert_eq!(cli.config.in_cluster(), Some(("kie", "kie-cloud-operator")));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let result = Cli::try_parse_from(["kie-operator", "--log-format", "xml"]);
        assert!(result.is_err());
    }
}
