//! Repository reference carried on every notification

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric GitHub repository id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(pub u64);

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub name: String,
    /// `owner/name`
    pub full_name: String,
    pub owner: String,
    pub private: bool,
    pub html_url: Option<String>,
}

impl Repository {
    /// Owner/name pair used by the repo-scoped API endpoints.
    ///
    /// Falls back to splitting `full_name` when the owner is missing.
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        if !self.owner.is_empty() && !self.name.is_empty() {
            return Some((self.owner.as_str(), self.name.as_str()));
        }
        self.full_name
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_and_name_falls_back_to_full_name() {
        let repository = Repository {
            full_name: "octo/hello".to_string(),
            ..Repository::default()
        };
        assert_eq!(repository.owner_and_name(), Some(("octo", "hello")));
    }

    #[test]
    fn owner_and_name_requires_both_parts() {
        let repository = Repository {
            full_name: "octo/".to_string(),
            ..Repository::default()
        };
        assert_eq!(repository.owner_and_name(), None);
    }
}
