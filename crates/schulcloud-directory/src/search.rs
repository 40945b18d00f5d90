//! Search request types.

use ldap3::Scope;
use serde::{Deserialize, Serialize};

use crate::dn::DistinguishedName;

/// Represents the search scope for directory queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// Options applied to a single search: filter, scope, and attribute list.
///
/// An empty attribute list requests every user attribute from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Search scope relative to the base.
    pub scope: SearchScope,
    /// LDAP filter expression.
    pub filter: String,
    /// Attributes to request.
    pub attributes: Vec<String>,
}

impl SearchOptions {
    /// Creates subtree-scoped options with the given filter.
    #[must_use]
    pub fn subtree(filter: impl Into<String>) -> Self {
        Self {
            scope: SearchScope::Subtree,
            filter: filter.into(),
            attributes: Vec::new(),
        }
    }

    /// Replaces the requested attribute list.
    #[must_use]
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }
}

/// A fully-specified search: base plus options.
///
/// Produced by the variant query strategies and consumed by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Subtree root the search is scoped to.
    pub base: DistinguishedName,
    /// Filter, scope, and attribute selection.
    pub options: SearchOptions,
}

impl SearchRequest {
    /// Creates a new search request.
    #[must_use]
    pub fn new(base: DistinguishedName, options: SearchOptions) -> Self {
        Self { base, options }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_maps_to_ldap3() {
        assert!(matches!(Scope::from(SearchScope::Base), Scope::Base));
        assert!(matches!(Scope::from(SearchScope::OneLevel), Scope::OneLevel));
        assert!(matches!(Scope::from(SearchScope::Subtree), Scope::Subtree));
    }

    #[test]
    fn subtree_options_default_to_all_attributes() {
        let options = SearchOptions::subtree("(objectClass=person)");
        assert_eq!(options.scope, SearchScope::Subtree);
        assert!(options.attributes.is_empty());

        let options = options.with_attributes(["uid", "mail"]);
        assert_eq!(options.attributes, vec!["uid", "mail"]);
    }
}
