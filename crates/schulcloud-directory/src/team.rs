//! Teams and the directory groups derived from them.

use serde::{Deserialize, Serialize};

/// Prefix for directory groups managed by the platform.
const GROUP_PREFIX: &str = "schulcloud-";

/// A platform team whose membership is mirrored into the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Stable team identifier.
    pub id: String,
    /// Display name chosen by the team owners.
    pub name: String,
}

impl Team {
    /// Creates a new team reference.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Derives the synthetic directory group for this team.
    ///
    /// The group name is `schulcloud-<teamId>`; the display name becomes the
    /// group description. The name depends only on the identifier, so renaming
    /// a team never moves its group.
    #[must_use]
    pub fn group(&self) -> GroupSpec {
        GroupSpec {
            name: format!("{GROUP_PREFIX}{}", self.id),
            description: self.name.clone(),
        }
    }
}

/// The directory group derived from a [`Team`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Group common name (`schulcloud-<teamId>`).
    pub name: String,
    /// Group description (the team's display name).
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_name_derives_from_id_only() {
        let team = Team::new("5f2987e020834114b8efd6f8", "Mathe 7b");
        let group = team.group();
        assert_eq!(group.name, "schulcloud-5f2987e020834114b8efd6f8");
        assert_eq!(group.description, "Mathe 7b");
    }

    #[test]
    fn group_name_ignores_name_content() {
        let a = Team::new("t1", "AG Umwelt, 2024 (alle)");
        let b = Team::new("t1", "renamed");
        assert_eq!(a.group().name, b.group().name);
        assert_eq!(a.group().name, "schulcloud-t1");
    }
}
