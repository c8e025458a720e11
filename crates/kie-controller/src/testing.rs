//! Test doubles shared by the controller tests

use async_trait::async_trait;
use mockall::mock;

use kie_common::Result;
use kie_environment::{ConfigSource, Snapshot, SourceError};

use crate::secrets::SecretMaterial;

mock! {
    pub Source {}

    #[async_trait]
    impl ConfigSource for Source {
        async fn load_template(
            &self,
            path: &str,
            version: &str,
        ) -> std::result::Result<String, SourceError>;

        async fn live_snapshot(
            &self,
            version: &str,
        ) -> std::result::Result<Option<Snapshot>, SourceError>;
    }
}

/// Deterministic passwords and keystores
pub struct FixedSecretMaterial;

impl SecretMaterial for FixedSecretMaterial {
    fn password(&self) -> String {
        "generated".to_string()
    }

    fn keystore(&self, common_name: &str, _password: &str) -> Result<Vec<u8>> {
        Ok(format!("keystore for {}", common_name).into_bytes())
    }
}
