//! Repository → group → trigger endpoint routing
//!
//! Both tables are built once at startup and only read afterwards, so they
//! are plain owned maps shared behind an `Arc` by the server.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutesError {
    #[error("invalid routes JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty {what} in {table} table")]
    EmptyEntry {
        table: &'static str,
        what: &'static str,
    },
}

/// Fully-qualified repository name (`org/name`) → group name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryGroupTable(BTreeMap<String, String>);

impl RepositoryGroupTable {
    /// Exact, case-sensitive lookup.
    pub fn resolve(&self, full_name: &str) -> Option<&str> {
        self.0.get(full_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RepositoryGroupTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Group name → opaque trigger endpoint identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupTriggerTable(BTreeMap<String, String>);

impl GroupTriggerTable {
    pub fn endpoint(&self, group: &str) -> Option<&str> {
        self.0.get(group).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for GroupTriggerTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The two routing tables together.
///
/// JSON form, as read from `HOOK_ROUTES_FILE`:
///
/// ```json
/// {
///   "repositories": { "vitasdk/newlib": "vitasdk" },
///   "groups":       { "vitasdk": "vitasdk/test" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTables {
    pub repositories: RepositoryGroupTable,
    pub groups: GroupTriggerTable,
}

impl RoutingTables {
    pub fn new(repositories: RepositoryGroupTable, groups: GroupTriggerTable) -> Self {
        Self {
            repositories,
            groups,
        }
    }

    /// Tables used when no routes file is configured.
    pub fn vitasdk() -> Self {
        let repositories = [
            "vitasdk/buildscripts",
            "vitasdk/newlib",
            "vitasdk/vita-headers",
            "vitasdk/vita-toolchain",
            "vitasdk/vita-samples",
            "vitasdk/pthread-embedded",
        ]
        .into_iter()
        .map(|repo| (repo, "vitasdk"))
        .collect();

        let groups = [("vitasdk", "vitasdk/test")].into_iter().collect();

        Self::new(repositories, groups)
    }

    pub fn from_json(json: &str) -> Result<Self, RoutesError> {
        let tables: Self = serde_json::from_str(json)?;
        tables.validate()?;
        Ok(tables)
    }

    fn validate(&self) -> Result<(), RoutesError> {
        for (repo, group) in &self.repositories.0 {
            if repo.is_empty() {
                return Err(RoutesError::EmptyEntry {
                    table: "repositories",
                    what: "repository name",
                });
            }
            if group.is_empty() {
                return Err(RoutesError::EmptyEntry {
                    table: "repositories",
                    what: "group name",
                });
            }
        }
        for (group, endpoint) in &self.groups.0 {
            if group.is_empty() {
                return Err(RoutesError::EmptyEntry {
                    table: "groups",
                    what: "group name",
                });
            }
            if endpoint.is_empty() {
                return Err(RoutesError::EmptyEntry {
                    table: "groups",
                    what: "trigger endpoint",
                });
            }
        }
        Ok(())
    }

    /// Group a repository belongs to, if any.
    pub fn resolve(&self, full_name: &str) -> Option<&str> {
        self.repositories.resolve(full_name)
    }

    /// Trigger endpoint for a repository, following both tables.
    pub fn endpoint_for(&self, full_name: &str) -> Option<&str> {
        self.resolve(full_name)
            .and_then(|group| self.groups.endpoint(group))
    }

    /// Endpoints activated by pushes to `repositories`, deduplicated.
    pub fn activate<'a, I>(&self, repositories: I) -> ActivatedTriggerSet
    where
        I: IntoIterator<Item = &'a str>,
    {
        repositories
            .into_iter()
            .filter_map(|repo| self.endpoint_for(repo))
            .collect()
    }

    /// Groups named by the repository table that have no trigger endpoint.
    ///
    /// Repositories in these groups can never activate anything.
    pub fn unrouted_groups(&self) -> Vec<&str> {
        let unrouted: BTreeSet<&str> = self
            .repositories
            .groups()
            .filter(|group| self.groups.endpoint(group).is_none())
            .collect();
        unrouted.into_iter().collect()
    }
}

/// Distinct trigger endpoints computed for a single push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivatedTriggerSet(BTreeSet<String>);

impl ActivatedTriggerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the endpoint was already present.
    pub fn insert(&mut self, endpoint: impl Into<String>) -> bool {
        self.0.insert(endpoint.into())
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.0.contains(endpoint)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ActivatedTriggerSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for ActivatedTriggerSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
