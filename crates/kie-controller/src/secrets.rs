//! Secret material for generated credentials and keystores

use rand::distributions::Alphanumeric;
use rand::Rng;
use rcgen::CertifiedKey;

#[cfg(test)]
use mockall::automock;

use kie_common::{Error, Result};

/// Length of generated passwords
pub const PASSWORD_LENGTH: usize = 8;

/// Supplies the opaque payloads embedded in generated Secrets.
#[cfg_attr(test, automock)]
pub trait SecretMaterial: Send + Sync {
    /// A fresh random password
    fn password(&self) -> String;

    /// Keystore payload for a TLS endpoint answering as `common_name`
    fn keystore(&self, common_name: &str, password: &str) -> Result<Vec<u8>>;
}

/// Random passwords and self-signed certificates
#[derive(Clone, Copy, Debug, Default)]
pub struct GeneratedSecretMaterial;

impl SecretMaterial for GeneratedSecretMaterial {
    fn password(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PASSWORD_LENGTH)
            .map(char::from)
            .collect()
    }

    /// PEM bundle of a self-signed certificate followed by its private key.
    ///
    /// The password is not used for PEM bundles.
    fn keystore(&self, common_name: &str, _password: &str) -> Result<Vec<u8>> {
        let CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec![common_name.to_string()]).map_err(|e| {
                Error::internal_with_context(
                    "keystore",
                    format!("failed to generate certificate for {}: {}", common_name, e),
                )
            })?;
        let mut pem = cert.pem();
        pem.push_str(&key_pair.serialize_pem());
        Ok(pem.into_bytes())
    }
}
