//! Configuration types for directory-server connections.
//!
//! Configs are issued by the platform's configuration store and are
//! immutable once constructed. Validation happens up front: a config that
//! reaches the client is known to carry a well-formed URL, a parsed root
//! path, and explicit (never defaulted) timeout and result-cap values.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

use crate::dn::{DistinguishedName, RelativeDistinguishedName};
use crate::strategy::{self, QueryStrategy};
use schulcloud_core::{BindCredentials, Error, Result};

/// Supported directory-server flavors.
///
/// Each variant selects one query strategy; the mapping is a plain enum
/// match resolved at the call boundary, never a keyed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryVariant {
    /// Schema-agnostic deployments described entirely by configuration.
    General,
    /// Univention Corporate Server (UCS@school) deployments.
    Univention,
    /// IServ school servers (consumed read-only).
    Iserv,
}

impl DirectoryVariant {
    /// Resolves the query strategy for this variant.
    pub(crate) fn strategy(self) -> &'static dyn QueryStrategy {
        match self {
            Self::General => &strategy::GeneralStrategy,
            Self::Univention => &strategy::UniventionStrategy,
            Self::Iserv => &strategy::IservStrategy,
        }
    }
}

/// Connection and operation deadlines, in seconds.
///
/// There are no default values; deployments must choose both explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DirectoryTimeouts {
    /// TCP/TLS connection establishment deadline.
    #[validate(range(min = 1))]
    pub connect_secs: u64,
    /// Deadline for a single bind, search, modify, or unbind.
    #[validate(range(min = 1))]
    pub operation_secs: u64,
}

impl DirectoryTimeouts {
    /// Creates a new timeout pair.
    #[must_use]
    pub const fn new(connect_secs: u64, operation_secs: u64) -> Self {
        Self {
            connect_secs,
            operation_secs,
        }
    }

    /// Returns the connection deadline as a [`Duration`].
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    /// Returns the per-operation deadline as a [`Duration`].
    #[must_use]
    pub const fn operation(&self) -> Duration {
        Duration::from_secs(self.operation_secs)
    }
}

/// Configuration for one directory server.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DirectoryConfig {
    /// Unique identifier of this directory server.
    #[validate(length(min = 1))]
    id: String,

    /// Connection URL (`ldap://` or `ldaps://` scheme, host, port).
    #[validate(url)]
    url: String,

    /// Root distinguished-name path all searches are scoped beneath.
    root_path: DistinguishedName,

    /// Service-account login used to derive the default bind DN.
    #[validate(length(min = 1))]
    search_user: String,

    /// Service-account password.
    #[serde(skip_serializing)]
    search_user_password: SecretString,

    /// Explicit bind credentials overriding the derived default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    explicit_credentials: Option<BindCredentials>,

    /// Directory-server flavor.
    variant: DirectoryVariant,

    /// Required connection and operation deadlines.
    #[validate(nested)]
    timeouts: DirectoryTimeouts,

    /// Required upper bound on buffered search results.
    #[validate(range(min = 1, max = 2_147_483_647))]
    max_results: u32,

    /// Whether to verify TLS certificates on `ldaps://` connections.
    #[serde(default = "default_tls_verify")]
    tls_verify: bool,

    /// Optional custom CA certificate path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tls_ca_cert: Option<PathBuf>,
}

const fn default_tls_verify() -> bool {
    true
}

impl DirectoryConfig {
    /// Creates a new directory configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the URL does not parse and
    /// [`Error::Validation`] if any other field fails validation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        root_path: DistinguishedName,
        search_user: impl Into<String>,
        search_user_password: SecretString,
        variant: DirectoryVariant,
        timeouts: DirectoryTimeouts,
        max_results: u32,
    ) -> Result<Self> {
        let url_string = url.into();
        Url::parse(&url_string)?;

        let config = Self {
            id: id.into(),
            url: url_string,
            root_path,
            search_user: search_user.into(),
            search_user_password,
            explicit_credentials: None,
            variant,
            timeouts,
            max_results,
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the unique identifier of this directory server.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the connection URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the root distinguished-name path.
    #[must_use]
    pub const fn root_path(&self) -> &DistinguishedName {
        &self.root_path
    }

    /// Returns the directory-server flavor.
    #[must_use]
    pub const fn variant(&self) -> DirectoryVariant {
        self.variant
    }

    /// Returns the configured deadlines.
    #[must_use]
    pub const fn timeouts(&self) -> &DirectoryTimeouts {
        &self.timeouts
    }

    /// Returns the upper bound on buffered search results.
    #[must_use]
    pub const fn max_results(&self) -> u32 {
        self.max_results
    }

    /// Returns the credentials used for the service-account bind.
    ///
    /// Unless explicit credentials were supplied, the bind DN is derived as
    /// `uid=<searchUser>,cn=users,<rootPath>` with the configured password.
    #[must_use]
    pub fn bind_credentials(&self) -> BindCredentials {
        if let Some(credentials) = &self.explicit_credentials {
            return credentials.clone();
        }

        let bind_dn = self
            .root_path
            .clone()
            .with_prefix(RelativeDistinguishedName::new("cn", "users"))
            .with_prefix(RelativeDistinguishedName::new("uid", &self.search_user));
        BindCredentials::new(bind_dn.as_str(), self.search_user_password.clone())
    }

    /// Supplies explicit bind credentials, bypassing the derived default.
    #[must_use]
    pub fn with_explicit_credentials(mut self, credentials: BindCredentials) -> Self {
        self.explicit_credentials = Some(credentials);
        self
    }

    /// Returns whether TLS certificate verification is enabled.
    #[must_use]
    pub const fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Optional custom CA certificate path.
    #[must_use]
    pub fn tls_ca_cert(&self) -> Option<&PathBuf> {
        self.tls_ca_cert.as_ref()
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets the custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Ensures the configuration is still structurally sound.
    ///
    /// Constructed configs are already validated; this re-check exists for
    /// configs deserialized from an external store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unparsable URL and
    /// [`Error::Validation`] for any other violation.
    pub fn ensure_valid(&self) -> Result<()> {
        Url::parse(&self.url).map_err(Error::from)?;
        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> DirectoryConfig {
        DirectoryConfig::new(
            "s1",
            "ldap://host",
            DistinguishedName::parse("dc=school").unwrap(),
            "admin",
            SecretString::from("p".to_string()),
            DirectoryVariant::General,
            DirectoryTimeouts::new(5, 20),
            500,
        )
        .unwrap()
    }

    #[test]
    fn derived_bind_dn_matches_convention() {
        let creds = sample_config().bind_credentials();
        assert_eq!(creds.bind_dn(), "uid=admin,cn=users,dc=school");
        assert_eq!(creds.password(), "p");
    }

    #[test]
    fn explicit_credentials_override_derivation() {
        let config = sample_config().with_explicit_credentials(BindCredentials::new(
            "cn=reader,dc=school",
            SecretString::from("other".to_string()),
        ));
        let creds = config.bind_credentials();
        assert_eq!(creds.bind_dn(), "cn=reader,dc=school");
        assert_eq!(creds.password(), "other");
    }

    #[test]
    fn invalid_url_is_a_configuration_error() {
        let err = DirectoryConfig::new(
            "s1",
            "not a url",
            DistinguishedName::parse("dc=school").unwrap(),
            "admin",
            SecretString::from("p".to_string()),
            DirectoryVariant::General,
            DirectoryTimeouts::new(5, 20),
            500,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = DirectoryConfig::new(
            "s1",
            "ldap://host",
            DistinguishedName::parse("dc=school").unwrap(),
            "admin",
            SecretString::from("p".to_string()),
            DirectoryVariant::General,
            DirectoryTimeouts::new(0, 20),
            500,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn zero_result_cap_is_rejected() {
        let err = DirectoryConfig::new(
            "s1",
            "ldap://host",
            DistinguishedName::parse("dc=school").unwrap(),
            "admin",
            SecretString::from("p".to_string()),
            DirectoryVariant::General,
            DirectoryTimeouts::new(5, 20),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn tls_overrides() {
        let config = sample_config()
            .with_tls_verification(false)
            .with_tls_ca_cert(PathBuf::from("/etc/ssl/school-ca.pem"));
        assert!(!config.tls_verify());
        assert_eq!(
            config.tls_ca_cert(),
            Some(&PathBuf::from("/etc/ssl/school-ca.pem"))
        );
    }

    #[test]
    fn timeouts_convert_to_durations() {
        let timeouts = DirectoryTimeouts::new(5, 20);
        assert_eq!(timeouts.connect(), Duration::from_secs(5));
        assert_eq!(timeouts.operation(), Duration::from_secs(20));
    }
}
