//! Environment assembly for the KieApp operator
//!
//! Turns a KieApp spec into the set of objects it should deploy and works out
//! what has to change in the cluster:
//!
//! - [`template`] renders the per-version configuration templates
//! - [`assembler`] parses the rendered baseline and overlay environments
//! - [`merge`] folds the overlay into the baseline
//! - [`diff`] compares the result with what is deployed
//! - [`migration`] moves legacy resources and product versions forward
//!
//! Everything here is synchronous apart from the [`source::ConfigSource`]
//! contract the templates are loaded through.

#![deny(missing_docs)]

pub mod assembler;
pub mod defaults;
pub mod diff;
pub mod merge;
pub mod migration;
pub mod resource;
pub mod source;
pub mod template;
pub mod versions;

pub use assembler::{assemble, build_environment};
pub use diff::{compare, Comparator, Delta};
pub use merge::merge_environments;
pub use resource::{
    CustomObject, Environment, KieResource, Resource, ResourceKind, ResourceMap, Tracked,
};
pub use source::{ConfigSource, EmbeddedConfig, SourceError};
pub use versions::{Snapshot, VersionRegistry, CURRENT_VERSION, SUPPORTED_VERSIONS};
