//! KieApp controller
//!
//! Drives a KieApp towards its spec and owns every cluster-facing
//! collaborator of the environment core:
//!
//! - **Reconcile**: the per-pass driver and its error policy
//! - **Client**: the mockable Kubernetes surface the driver works through
//! - **Snapshot / Apply**: reading owned objects and writing deltas
//! - **Upgrade**: legacy schema migration and product version upgrades
//! - **ConfigMaps**: publishing and reading the per-version configuration
//! - **Images**: local image stream tags and server state bookkeeping

#![deny(missing_docs)]

pub mod apply;
pub mod client;
pub mod config;
pub mod config_source;
pub mod configmaps;
pub mod context;
pub mod images;
pub mod properties;
pub mod reconcile;
pub mod secrets;
pub mod snapshot;
pub mod status;
pub mod upgrade;

#[cfg(test)]
mod testing;

pub use client::{KieKubeClient, KieKubeClientImpl};
pub use config::OperatorConfig;
pub use context::KieAppContext;
pub use reconcile::{error_policy, reconcile};
