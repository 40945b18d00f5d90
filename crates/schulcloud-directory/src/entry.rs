//! Opaque directory entries returned by searches.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single entry returned by a directory search.
///
/// The client never interprets the attribute map; callers (roster sync,
/// login handlers) pick out what they need. Values preserve the order the
/// server emitted them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map.
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first().map(|value| value.as_str()))
    }

    /// Returns all values for the attribute.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .get(attribute)
            .map(|values| values.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> DirectoryEntry {
        let mut attributes = HashMap::new();
        attributes.insert(
            "uid".to_string(),
            vec!["max.mustermann".to_string(), "mmustermann".to_string()],
        );
        DirectoryEntry {
            dn: "uid=max.mustermann,cn=users,dc=schule,dc=de".to_string(),
            attributes,
        }
    }

    #[test]
    fn first_returns_leading_value() {
        let entry = sample_entry();
        assert_eq!(entry.first("uid"), Some("max.mustermann"));
        assert_eq!(entry.first("mail"), None);
    }

    #[test]
    fn values_returns_all_in_order() {
        let entry = sample_entry();
        assert_eq!(
            entry.values("uid").unwrap(),
            &["max.mustermann".to_string(), "mmustermann".to_string()]
        );
        assert!(entry.values("mail").is_none());
    }
}
