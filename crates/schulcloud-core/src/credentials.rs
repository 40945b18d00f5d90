//! Service-account credentials for external identity stores.
//!
//! Directory clients bind with a service account before running roster
//! queries on behalf of the platform. The password is held behind
//! [`secrecy::SecretString`] so it is redacted from debug output and never
//! serialized.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Credentials for a directory service-account bind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindCredentials {
    /// Distinguished name used for the bind.
    pub bind_dn: String,

    /// Bind password.
    #[serde(skip_serializing)]
    pub password: SecretString,
}

impl BindCredentials {
    /// Create new bind credentials.
    ///
    /// # Arguments
    ///
    /// * `bind_dn` - The distinguished name of the service account
    /// * `password` - The service-account password
    #[must_use]
    pub fn new(bind_dn: impl Into<String>, password: SecretString) -> Self {
        Self {
            bind_dn: bind_dn.into(),
            password,
        }
    }

    /// Get the bind distinguished name.
    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// Get the bind password in the clear.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_return_configured_values() {
        let creds = BindCredentials::new(
            "uid=admin,cn=users,dc=schule,dc=de",
            SecretString::from("geheim".to_string()),
        );
        assert_eq!(creds.bind_dn(), "uid=admin,cn=users,dc=schule,dc=de");
        assert_eq!(creds.password(), "geheim");
    }

    #[test]
    fn debug_output_redacts_password() {
        let creds = BindCredentials::new("cn=admin", SecretString::from("geheim".to_string()));
        let debug = format!("{creds:?}");
        assert!(!debug.contains("geheim"));
    }

    #[test]
    fn serialization_skips_password() {
        let creds = BindCredentials::new("cn=admin", SecretString::from("geheim".to_string()));
        let json = serde_json::to_string(&creds).unwrap();
        assert!(json.contains("cn=admin"));
        assert!(!json.contains("geheim"));
    }
}
