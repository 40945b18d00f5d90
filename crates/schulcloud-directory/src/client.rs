//! Directory client implementation.
//!
//! [`DirectoryClient`] owns the connection registry and exposes the
//! operations the platform's route handlers build on: connection
//! acquisition, login delegation, buffered searches, roster listing, and
//! team-group membership changes.

use async_trait::async_trait;
use ldap3::{
    LdapConnAsync, LdapConnSettings, Mod, SearchEntry, SearchOptions as LdapSearchOptions,
};
use native_tls::{Certificate, TlsConnector};
use std::collections::HashSet;
use std::fs;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::DirectoryConfig;
use crate::dn::DistinguishedName;
use crate::entry::DirectoryEntry;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::search::{SearchOptions, SearchScope};
use crate::team::Team;
use schulcloud_core::{Error, Result};

/// A change to a single attribute of a directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeChange {
    /// Add attribute values.
    Add {
        /// Attribute to modify.
        attribute: String,
        /// Values to add.
        values: Vec<String>,
    },
    /// Delete attribute values.
    Delete {
        /// Attribute to modify.
        attribute: String,
        /// Values to delete (empty removes attribute).
        values: Vec<String>,
    },
    /// Replace attribute values.
    Replace {
        /// Attribute to modify.
        attribute: String,
        /// Replacement values.
        values: Vec<String>,
    },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait DirectorySession: Send {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;
    fn is_connected(&self) -> bool;
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: Vec<String>,
    ) -> Result<Vec<DirectoryEntry>>;
    async fn modify(&mut self, dn: &str, changes: &[AttributeChange]) -> Result<()>;
    async fn unbind(&mut self) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait DirectoryConnector: Send + Sync {
    async fn connect(&self, config: &DirectoryConfig) -> Result<Box<dyn DirectorySession>>;
}

/// Directory client with a pluggable LDAP backend.
///
/// One client instance serves every configured directory server; cached
/// connections are keyed by configuration identifier in the client-owned
/// [`ConnectionRegistry`].
pub struct DirectoryClient {
    connector: Box<dyn DirectoryConnector>,
    registry: ConnectionRegistry,
}

impl DirectoryClient {
    /// Creates a client that uses the real LDAP connector.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(ConnectionRegistry::new())
    }

    /// Creates a client around an injected connection registry.
    #[must_use]
    pub fn with_registry(registry: ConnectionRegistry) -> Self {
        Self {
            connector: Box::new(LdapDirectoryConnector),
            registry,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_connector(connector: Box<dyn DirectoryConnector>) -> Self {
        Self {
            connector,
            registry: ConnectionRegistry::new(),
        }
    }

    /// Returns the cached connection for the configuration, establishing and
    /// binding a new one if none is cached or the cached one is stale.
    ///
    /// The default service-account bind DN is derived as
    /// `uid=<searchUser>,cn=users,<rootPath>` unless the configuration
    /// carries explicit credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a malformed configuration,
    /// [`Error::Authentication`] when the server rejects the bind, and
    /// [`Error::Directory`] / [`Error::Timeout`] for transport failures.
    pub async fn connection(&self, config: &DirectoryConfig) -> Result<ConnectionHandle> {
        config.ensure_valid()?;

        let mut handle = self.registry.acquire(config.id()).await;
        if handle.is_connected() {
            debug!(id = config.id(), "reusing cached directory connection");
            return Ok(handle);
        }

        debug!(
            id = config.id(),
            url = config.url(),
            "establishing directory connection"
        );
        let mut session = self.connector.connect(config).await?;
        let credentials = config.bind_credentials();
        session
            .simple_bind(credentials.bind_dn(), credentials.password())
            .await?;
        handle.install(session);
        Ok(handle)
    }

    /// Verifies a user's credentials and returns their directory entry.
    ///
    /// Performs a dedicated bind with the caller-supplied username and
    /// password, bypassing the cached service-account connection, then runs
    /// a subtree self-lookup rooted at the bound DN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] when the bind is rejected and
    /// [`Error::NotFound`] when the self-lookup yields no entry.
    pub async fn authenticate(
        &self,
        config: &DirectoryConfig,
        full_username: &str,
        password: &str,
    ) -> Result<DirectoryEntry> {
        config.ensure_valid()?;

        let bind_dn = DistinguishedName::parse(full_username)
            .map_err(|_| Error::Authentication(format!("malformed bind DN `{full_username}`")))?;

        let mut session = self.connector.connect(config).await?;
        session.simple_bind(bind_dn.as_str(), password).await?;

        let entries = session
            .search(
                bind_dn.as_str(),
                SearchScope::Subtree,
                "(objectClass=*)",
                Vec::new(),
            )
            .await?;
        session.unbind().await?;

        entries
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("no directory entry for `{bind_dn}`")))
    }

    /// Runs a search and returns every matching entry in emission order.
    ///
    /// The result set is buffered in full before returning and bounded by
    /// the configuration's result cap; a search either yields the complete
    /// set or fails without partial results.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Directory`] when the server reports a non-zero
    /// result code or the transport fails mid-search.
    pub async fn search_many(
        &self,
        config: &DirectoryConfig,
        base: &DistinguishedName,
        options: &SearchOptions,
    ) -> Result<Vec<DirectoryEntry>> {
        let mut handle = self.connection(config).await?;
        let session = handle.session()?;
        let entries = session
            .search(
                base.as_str(),
                options.scope,
                &options.filter,
                options.attributes.clone(),
            )
            .await?;
        debug!(
            id = config.id(),
            base = base.as_str(),
            count = entries.len(),
            "directory search completed"
        );
        Ok(entries)
    }

    /// Runs a search and returns the first matching entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the search matches nothing.
    pub async fn search_one(
        &self,
        config: &DirectoryConfig,
        base: &DistinguishedName,
        options: &SearchOptions,
    ) -> Result<DirectoryEntry> {
        let entries = self.search_many(config, base, options).await?;
        entries
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("no directory entry found under `{base}`")))
    }

    /// Lists every school on the configured directory server.
    pub async fn list_schools(&self, config: &DirectoryConfig) -> Result<Vec<DirectoryEntry>> {
        let request = config.variant().strategy().schools_query(config);
        self.search_many(config, &request.base, &request.options)
            .await
    }

    /// Lists the users of one school.
    pub async fn list_users(
        &self,
        config: &DirectoryConfig,
        school: &DirectoryEntry,
    ) -> Result<Vec<DirectoryEntry>> {
        let request = config.variant().strategy().users_query(config, school)?;
        self.search_many(config, &request.base, &request.options)
            .await
    }

    /// Lists the classes of one school.
    pub async fn list_classes(
        &self,
        config: &DirectoryConfig,
        school: &DirectoryEntry,
    ) -> Result<Vec<DirectoryEntry>> {
        let request = config.variant().strategy().classes_query(config, school)?;
        self.search_many(config, &request.base, &request.options)
            .await
    }

    /// Adds a user to the directory group derived from the team.
    ///
    /// # Errors
    ///
    /// Propagates whatever [`Error::Directory`] the variant strategy
    /// surfaces for the membership change.
    pub async fn add_user_to_group(
        &self,
        config: &DirectoryConfig,
        user: &DirectoryEntry,
        team: &Team,
    ) -> Result<()> {
        let member = DistinguishedName::parse(&user.dn)?;
        let group = team.group();
        let mut handle = self.connection(config).await?;
        let session = handle.session()?;
        config
            .variant()
            .strategy()
            .add_user_to_group(session, config, &member, &group)
            .await
    }

    /// Removes a user from the directory group derived from the team.
    ///
    /// # Errors
    ///
    /// Propagates whatever [`Error::Directory`] the variant strategy
    /// surfaces for the membership change.
    pub async fn remove_user_from_group(
        &self,
        config: &DirectoryConfig,
        user: &DirectoryEntry,
        team: &Team,
    ) -> Result<()> {
        let member = DistinguishedName::parse(&user.dn)?;
        let group = team.group();
        let mut handle = self.connection(config).await?;
        let session = handle.session()?;
        config
            .variant()
            .strategy()
            .remove_user_from_group(session, config, &member, &group)
            .await
    }

    /// Unbinds and drops the cached connection for the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when no connection is registered
    /// for the configuration's identifier.
    pub async fn disconnect(&self, config: &DirectoryConfig) -> Result<()> {
        let Some(slot) = self.registry.remove(config.id()).await else {
            return Err(unregistered(config.id()));
        };

        let mut guard = slot.lock().await;
        match guard.session.take() {
            Some(mut session) => {
                debug!(id = config.id(), "closing cached directory connection");
                session.unbind().await
            }
            None => Err(unregistered(config.id())),
        }
    }

    /// Returns true if a connection slot is registered for the configuration.
    pub async fn has_connection(&self, config: &DirectoryConfig) -> bool {
        self.registry.is_registered(config.id()).await
    }
}

impl Default for DirectoryClient {
    fn default() -> Self {
        Self::new()
    }
}

fn unregistered(id: &str) -> Error {
    Error::Configuration(format!("no directory connection registered for `{id}`"))
}

fn directory_error(server_id: &str, err: ldap3::LdapError) -> Error {
    Error::Directory {
        server: server_id.to_string(),
        message: err.to_string(),
    }
}

/// Real LDAP connector backed by `ldap3`.
pub struct LdapDirectoryConnector;

#[async_trait]
impl DirectoryConnector for LdapDirectoryConnector {
    async fn connect(&self, config: &DirectoryConfig) -> Result<Box<dyn DirectorySession>> {
        let settings = build_ldap_settings(config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, config.url())
            .await
            .map_err(|err| directory_error(config.id(), err))?;
        ldap3::drive!(conn);
        Ok(Box::new(LdapDirectorySession {
            inner: ldap,
            server_id: config.id().to_string(),
            operation_timeout: config.timeouts().operation(),
            size_limit: i32::try_from(config.max_results()).unwrap_or(i32::MAX),
            connected: false,
        }))
    }
}

struct LdapDirectorySession {
    inner: ldap3::Ldap,
    server_id: String,
    operation_timeout: Duration,
    size_limit: i32,
    connected: bool,
}

impl LdapDirectorySession {
    fn timed_out(&self, operation: &str) -> Error {
        Error::Timeout(format!(
            "directory {operation} timed out for `{}`",
            self.server_id
        ))
    }
}

#[async_trait]
impl DirectorySession for LdapDirectorySession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let outcome = timeout(self.operation_timeout, self.inner.simple_bind(dn, password)).await;
        let result = match outcome {
            Err(_) => return Err(self.timed_out("bind")),
            Ok(Err(err)) => {
                self.connected = false;
                return Err(directory_error(&self.server_id, err));
            }
            Ok(Ok(result)) => result,
        };

        if result.rc == 0 {
            self.connected = true;
            Ok(())
        } else {
            Err(Error::Authentication(format!(
                "directory `{}` rejected bind for `{dn}`",
                self.server_id
            )))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: Vec<String>,
    ) -> Result<Vec<DirectoryEntry>> {
        let options = LdapSearchOptions::new().sizelimit(self.size_limit);
        let outcome = timeout(
            self.operation_timeout,
            self.inner
                .with_search_options(options)
                .search(base, scope.into(), filter, attributes),
        )
        .await;
        let result = match outcome {
            Err(_) => return Err(self.timed_out("search")),
            Ok(Err(err)) => {
                self.connected = false;
                return Err(directory_error(&self.server_id, err));
            }
            Ok(Ok(result)) => result,
        };

        let (entries, _) = result
            .success()
            .map_err(|err| directory_error(&self.server_id, err))?;
        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| DirectoryEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect())
    }

    async fn modify(&mut self, dn: &str, changes: &[AttributeChange]) -> Result<()> {
        let mods = changes
            .iter()
            .map(|change| match change {
                AttributeChange::Add { attribute, values } => Mod::Add(
                    attribute.clone(),
                    values.iter().cloned().collect::<HashSet<_>>(),
                ),
                AttributeChange::Delete { attribute, values } => Mod::Delete(
                    attribute.clone(),
                    values.iter().cloned().collect::<HashSet<_>>(),
                ),
                AttributeChange::Replace { attribute, values } => Mod::Replace(
                    attribute.clone(),
                    values.iter().cloned().collect::<HashSet<_>>(),
                ),
            })
            .collect::<Vec<_>>();

        let outcome = timeout(self.operation_timeout, self.inner.modify(dn, mods)).await;
        let result = match outcome {
            Err(_) => return Err(self.timed_out("modify")),
            Ok(Err(err)) => {
                self.connected = false;
                return Err(directory_error(&self.server_id, err));
            }
            Ok(Ok(result)) => result,
        };

        result
            .success()
            .map_err(|err| directory_error(&self.server_id, err))?;
        Ok(())
    }

    async fn unbind(&mut self) -> Result<()> {
        self.connected = false;
        let outcome = timeout(self.operation_timeout, self.inner.unbind()).await;
        match outcome {
            Err(_) => Err(self.timed_out("unbind")),
            Ok(Err(err)) => Err(directory_error(&self.server_id, err)),
            Ok(Ok(())) => Ok(()),
        }
    }
}

fn build_ldap_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.timeouts().connect());

    if !config.tls_verify() {
        warn!(
            id = config.id(),
            "TLS verification disabled for directory connection"
        );
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                Error::Configuration(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = config.tls_ca_cert() {
        let pem = fs::read(cert_path).map_err(|err| {
            Error::Configuration(format!(
                "failed to read directory CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::Configuration(format!("invalid directory CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| {
                Error::Configuration(format!("failed to load directory CA certificate: {err}"))
            })?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}
