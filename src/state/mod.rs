//! Normalized entity → attribute-set state shared by every domain.
//!
//! Both the CSV loaders and the remote readers produce a [`StateMap`], so the
//! planner and the validator only ever compare two values of the same shape.

mod diff;

pub use diff::{diff_states, ComparisonMode, EntityDiff, StateDiff};

use std::collections::{BTreeMap, BTreeSet};

/// Return `name` stripped and lower-cased for insensitive comparison.
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A single entity (group, entitlement record, IP access list)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState {
    /// Name as written in the CSV or returned by the API
    pub name: String,
    /// Remote identifier, when the entity was read from the API
    pub id: Option<String>,
    /// Normalized attribute values
    pub attributes: BTreeSet<String>,
}

impl EntityState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            attributes: BTreeSet::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.attributes
            .extend(attributes.into_iter().map(|a| normalize(a.as_ref())));
        self
    }
}

/// Entity key (normalized name) → entity state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMap {
    entries: BTreeMap<String, EntityState>,
}

impl StateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity, merging attributes into an existing entry with the
    /// same normalized name. Returns `true` when a merge happened.
    pub fn insert(&mut self, entity: EntityState) -> bool {
        let key = normalize(&entity.name);
        match self.entries.get_mut(&key) {
            Some(existing) => {
                existing.attributes.extend(entity.attributes);
                if existing.id.is_none() {
                    existing.id = entity.id;
                }
                true
            }
            None => {
                self.entries.insert(key, entity);
                false
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&EntityState> {
        self.entries.get(&normalize(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize(key))
    }

    /// Normalized keys in sorted order
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntityState)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attribute set for `key`, empty when the entity is absent
    pub fn attributes_of(&self, key: &str) -> BTreeSet<String> {
        self.get(key)
            .map(|e| e.attributes.clone())
            .unwrap_or_default()
    }
}

impl FromIterator<EntityState> for StateMap {
    fn from_iter<T: IntoIterator<Item = EntityState>>(iter: T) -> Self {
        let mut map = StateMap::new();
        for entity in iter {
            map.insert(entity);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Data-Engineers \t"), "data-engineers");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_insert_merges_case_insensitive_duplicates() {
        let mut map = StateMap::new();
        assert!(!map.insert(EntityState::new("Analysts").with_attributes(["sql_access"])));
        assert!(map.insert(EntityState::new(" analysts ").with_attributes(["CLUSTER_CREATE"])));

        assert_eq!(map.len(), 1);
        let entity = map.get("ANALYSTS").unwrap();
        assert_eq!(entity.name, "Analysts");
        assert_eq!(
            entity.attributes.iter().cloned().collect::<Vec<_>>(),
            vec!["cluster_create".to_string(), "sql_access".to_string()]
        );
    }

    #[test]
    fn test_merge_keeps_first_known_id() {
        let mut map = StateMap::new();
        map.insert(EntityState::new("ops"));
        map.insert(EntityState::new("OPS").with_id("42"));
        assert_eq!(map.get("ops").unwrap().id.as_deref(), Some("42"));
    }

    #[test]
    fn test_attributes_of_missing_entity_is_empty() {
        let map = StateMap::new();
        assert!(map.attributes_of("nobody").is_empty());
    }
}
