//! Variant-specific query construction and group mutation.
//!
//! Each supported directory flavor ships one strategy implementing the
//! capability set used by the client: school/user/class query construction
//! plus team-group membership changes. Query construction is pure; the
//! membership operations run against the session the client hands in.

use async_trait::async_trait;

use crate::client::{AttributeChange, DirectorySession};
use crate::config::DirectoryConfig;
use crate::dn::{DistinguishedName, RelativeDistinguishedName};
use crate::entry::DirectoryEntry;
use crate::search::{SearchOptions, SearchRequest, SearchScope};
use crate::team::GroupSpec;
use schulcloud_core::{Error, Result};

/// Capability contract implemented once per directory-server flavor.
#[async_trait]
pub(crate) trait QueryStrategy: Send + Sync {
    /// Builds the search listing every school on the server.
    fn schools_query(&self, config: &DirectoryConfig) -> SearchRequest;

    /// Builds the search listing the users of one school.
    fn users_query(
        &self,
        config: &DirectoryConfig,
        school: &DirectoryEntry,
    ) -> Result<SearchRequest>;

    /// Builds the search listing the classes of one school.
    fn classes_query(
        &self,
        config: &DirectoryConfig,
        school: &DirectoryEntry,
    ) -> Result<SearchRequest>;

    /// Adds a member to the team group, creating server-side state as needed.
    async fn add_user_to_group(
        &self,
        session: &mut dyn DirectorySession,
        config: &DirectoryConfig,
        member: &DistinguishedName,
        group: &GroupSpec,
    ) -> Result<()>;

    /// Removes a member from the team group.
    async fn remove_user_from_group(
        &self,
        session: &mut dyn DirectorySession,
        config: &DirectoryConfig,
        member: &DistinguishedName,
        group: &GroupSpec,
    ) -> Result<()>;
}

fn school_base(school: &DirectoryEntry) -> Result<DistinguishedName> {
    DistinguishedName::parse(&school.dn).map_err(Error::from)
}

/// Strategy for schema-agnostic deployments using conventional containers.
pub(crate) struct GeneralStrategy;

impl GeneralStrategy {
    fn group_dn(config: &DirectoryConfig, group: &GroupSpec) -> DistinguishedName {
        config
            .root_path()
            .clone()
            .with_prefix(RelativeDistinguishedName::new("cn", "groups"))
            .with_prefix(RelativeDistinguishedName::new("cn", &group.name))
    }
}

#[async_trait]
impl QueryStrategy for GeneralStrategy {
    fn schools_query(&self, config: &DirectoryConfig) -> SearchRequest {
        SearchRequest::new(
            config.root_path().clone(),
            SearchOptions::subtree("(objectClass=organizationalUnit)")
                .with_attributes(["ou", "description"]),
        )
    }

    fn users_query(
        &self,
        _config: &DirectoryConfig,
        school: &DirectoryEntry,
    ) -> Result<SearchRequest> {
        Ok(SearchRequest::new(
            school_base(school)?,
            SearchOptions::subtree("(objectClass=person)").with_attributes([
                "uid",
                "givenName",
                "sn",
                "mail",
                "objectClass",
            ]),
        ))
    }

    fn classes_query(
        &self,
        _config: &DirectoryConfig,
        school: &DirectoryEntry,
    ) -> Result<SearchRequest> {
        Ok(SearchRequest::new(
            school_base(school)?,
            SearchOptions::subtree("(objectClass=groupOfNames)").with_attributes([
                "cn",
                "description",
                "member",
            ]),
        ))
    }

    async fn add_user_to_group(
        &self,
        session: &mut dyn DirectorySession,
        config: &DirectoryConfig,
        member: &DistinguishedName,
        group: &GroupSpec,
    ) -> Result<()> {
        let group_dn = Self::group_dn(config, group);
        session
            .modify(
                group_dn.as_str(),
                &[AttributeChange::Add {
                    attribute: "member".to_string(),
                    values: vec![member.as_str().to_string()],
                }],
            )
            .await
    }

    async fn remove_user_from_group(
        &self,
        session: &mut dyn DirectorySession,
        config: &DirectoryConfig,
        member: &DistinguishedName,
        group: &GroupSpec,
    ) -> Result<()> {
        let group_dn = Self::group_dn(config, group);
        session
            .modify(
                group_dn.as_str(),
                &[AttributeChange::Delete {
                    attribute: "member".to_string(),
                    values: vec![member.as_str().to_string()],
                }],
            )
            .await
    }
}

/// Strategy for Univention Corporate Server (UCS@school) deployments.
pub(crate) struct UniventionStrategy;

impl UniventionStrategy {
    fn group_dn(config: &DirectoryConfig, group: &GroupSpec) -> DistinguishedName {
        config
            .root_path()
            .clone()
            .with_prefix(RelativeDistinguishedName::new("cn", "groups"))
            .with_prefix(RelativeDistinguishedName::new("cn", "schulcloud"))
            .with_prefix(RelativeDistinguishedName::new("cn", &group.name))
    }
}

#[async_trait]
impl QueryStrategy for UniventionStrategy {
    fn schools_query(&self, config: &DirectoryConfig) -> SearchRequest {
        SearchRequest::new(
            config.root_path().clone(),
            SearchOptions::subtree("(objectClass=ucsschoolOrganizationalUnit)")
                .with_attributes(["ou", "displayName"]),
        )
    }

    fn users_query(
        &self,
        _config: &DirectoryConfig,
        school: &DirectoryEntry,
    ) -> Result<SearchRequest> {
        Ok(SearchRequest::new(
            school_base(school)?,
            SearchOptions::subtree(
                "(|(objectClass=ucsschoolTeacher)(objectClass=ucsschoolStudent)(objectClass=ucsschoolStaff))",
            )
            .with_attributes([
                "uid",
                "givenName",
                "sn",
                "mailPrimaryAddress",
                "objectClass",
                "memberOf",
            ]),
        ))
    }

    fn classes_query(
        &self,
        _config: &DirectoryConfig,
        school: &DirectoryEntry,
    ) -> Result<SearchRequest> {
        let base = DistinguishedName::parse("cn=klassen,cn=schueler,cn=groups")?
            .join(&school_base(school)?);
        Ok(SearchRequest::new(
            base,
            SearchOptions::subtree("(objectClass=ucsschoolGroup)").with_attributes([
                "cn",
                "description",
                "uniqueMember",
            ]),
        ))
    }

    async fn add_user_to_group(
        &self,
        session: &mut dyn DirectorySession,
        config: &DirectoryConfig,
        member: &DistinguishedName,
        group: &GroupSpec,
    ) -> Result<()> {
        let group_dn = Self::group_dn(config, group);
        // Membership add also refreshes the description, which tracks the
        // team's current display name.
        session
            .modify(
                group_dn.as_str(),
                &[
                    AttributeChange::Replace {
                        attribute: "description".to_string(),
                        values: vec![group.description.clone()],
                    },
                    AttributeChange::Add {
                        attribute: "uniqueMember".to_string(),
                        values: vec![member.as_str().to_string()],
                    },
                ],
            )
            .await
    }

    async fn remove_user_from_group(
        &self,
        session: &mut dyn DirectorySession,
        config: &DirectoryConfig,
        member: &DistinguishedName,
        group: &GroupSpec,
    ) -> Result<()> {
        let group_dn = Self::group_dn(config, group);
        session
            .modify(
                group_dn.as_str(),
                &[AttributeChange::Delete {
                    attribute: "uniqueMember".to_string(),
                    values: vec![member.as_str().to_string()],
                }],
            )
            .await
    }
}

/// Strategy for IServ school servers.
///
/// IServ directories are consumed read-only: rosters are mirrored into the
/// platform, while group membership stays managed on the server itself.
pub(crate) struct IservStrategy;

impl IservStrategy {
    fn read_only_error(config: &DirectoryConfig) -> Error {
        Error::Directory {
            server: config.id().to_string(),
            message: "IServ directories are read-only; group membership is managed on the server"
                .to_string(),
        }
    }
}

#[async_trait]
impl QueryStrategy for IservStrategy {
    fn schools_query(&self, config: &DirectoryConfig) -> SearchRequest {
        SearchRequest::new(
            config.root_path().clone(),
            SearchOptions {
                scope: SearchScope::Base,
                filter: "(objectClass=*)".to_string(),
                attributes: vec!["o".to_string(), "displayName".to_string()],
            },
        )
    }

    fn users_query(
        &self,
        _config: &DirectoryConfig,
        school: &DirectoryEntry,
    ) -> Result<SearchRequest> {
        let base = DistinguishedName::parse("ou=users")?.join(&school_base(school)?);
        Ok(SearchRequest::new(
            base,
            SearchOptions::subtree("(objectClass=person)").with_attributes([
                "uid",
                "givenName",
                "sn",
                "mail",
            ]),
        ))
    }

    fn classes_query(
        &self,
        _config: &DirectoryConfig,
        school: &DirectoryEntry,
    ) -> Result<SearchRequest> {
        let base = DistinguishedName::parse("ou=groups")?.join(&school_base(school)?);
        Ok(SearchRequest::new(
            base,
            SearchOptions::subtree("(objectClass=posixGroup)").with_attributes([
                "cn",
                "description",
                "memberUid",
            ]),
        ))
    }

    async fn add_user_to_group(
        &self,
        _session: &mut dyn DirectorySession,
        config: &DirectoryConfig,
        _member: &DistinguishedName,
        _group: &GroupSpec,
    ) -> Result<()> {
        Err(Self::read_only_error(config))
    }

    async fn remove_user_from_group(
        &self,
        _session: &mut dyn DirectorySession,
        config: &DirectoryConfig,
        _member: &DistinguishedName,
        _group: &GroupSpec,
    ) -> Result<()> {
        Err(Self::read_only_error(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockDirectorySession;
    use crate::config::{DirectoryTimeouts, DirectoryVariant};
    use crate::team::Team;
    use secrecy::SecretString;
    use std::collections::HashMap;

    fn sample_config(variant: DirectoryVariant) -> DirectoryConfig {
        DirectoryConfig::new(
            "s1",
            "ldap://host",
            DistinguishedName::parse("dc=schule,dc=de").unwrap(),
            "admin",
            SecretString::from("p".to_string()),
            variant,
            DirectoryTimeouts::new(5, 20),
            500,
        )
        .unwrap()
    }

    fn school_entry(dn: &str) -> DirectoryEntry {
        DirectoryEntry {
            dn: dn.to_string(),
            attributes: HashMap::new(),
        }
    }

    #[test]
    fn general_queries_scope_under_school() {
        let config = sample_config(DirectoryVariant::General);
        let school = school_entry("ou=schule-1,dc=schule,dc=de");

        let schools = GeneralStrategy.schools_query(&config);
        assert_eq!(schools.base.as_str(), "dc=schule,dc=de");
        assert_eq!(schools.options.filter, "(objectClass=organizationalUnit)");

        let users = GeneralStrategy.users_query(&config, &school).unwrap();
        assert_eq!(users.base.as_str(), "ou=schule-1,dc=schule,dc=de");
        assert_eq!(users.options.filter, "(objectClass=person)");
        assert_eq!(users.options.scope, SearchScope::Subtree);
    }

    #[test]
    fn univention_class_base_is_the_klassen_container() {
        let config = sample_config(DirectoryVariant::Univention);
        let school = school_entry("ou=schule-1,dc=schule,dc=de");

        let classes = UniventionStrategy.classes_query(&config, &school).unwrap();
        assert_eq!(
            classes.base.as_str(),
            "cn=klassen,cn=schueler,cn=groups,ou=schule-1,dc=schule,dc=de"
        );
        assert_eq!(classes.options.filter, "(objectClass=ucsschoolGroup)");
    }

    #[test]
    fn malformed_school_dn_is_a_validation_error() {
        let config = sample_config(DirectoryVariant::General);
        let school = school_entry("not-a-dn");
        let err = GeneralStrategy.users_query(&config, &school).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn general_add_targets_the_derived_group_dn() {
        let config = sample_config(DirectoryVariant::General);
        let member = DistinguishedName::parse("uid=max,cn=users,dc=schule,dc=de").unwrap();
        let group = Team::new("t1", "Mathe 7b").group();

        let mut session = MockDirectorySession::new();
        session
            .expect_modify()
            .withf(|dn, changes| {
                dn == "cn=schulcloud-t1,cn=groups,dc=schule,dc=de"
                    && matches!(
                        changes,
                        [AttributeChange::Add { attribute, values }]
                            if attribute == "member"
                                && values == &["uid=max,cn=users,dc=schule,dc=de".to_string()]
                    )
            })
            .returning(|_, _| Ok(()));

        GeneralStrategy
            .add_user_to_group(&mut session, &config, &member, &group)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn univention_add_refreshes_description() {
        let config = sample_config(DirectoryVariant::Univention);
        let member = DistinguishedName::parse("uid=max,cn=users,dc=schule,dc=de").unwrap();
        let group = Team::new("t1", "Mathe 7b").group();

        let mut session = MockDirectorySession::new();
        session
            .expect_modify()
            .withf(|dn, changes| {
                dn == "cn=schulcloud-t1,cn=schulcloud,cn=groups,dc=schule,dc=de"
                    && matches!(
                        changes,
                        [
                            AttributeChange::Replace { attribute: desc_attr, values: desc },
                            AttributeChange::Add { attribute: member_attr, .. },
                        ] if desc_attr == "description"
                            && desc == &["Mathe 7b".to_string()]
                            && member_attr == "uniqueMember"
                    )
            })
            .returning(|_, _| Ok(()));

        UniventionStrategy
            .add_user_to_group(&mut session, &config, &member, &group)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn iserv_mutations_are_rejected() {
        let config = sample_config(DirectoryVariant::Iserv);
        let member = DistinguishedName::parse("uid=max,ou=users,dc=schule,dc=de").unwrap();
        let group = Team::new("t1", "Mathe 7b").group();

        let mut session = MockDirectorySession::new();
        let err = IservStrategy
            .add_user_to_group(&mut session, &config, &member, &group)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Directory { .. }));
    }
}
