use super::StateMap;
use serde::Serialize;
use std::collections::BTreeSet;

/// How two states are compared during validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonMode {
    /// Entity sets must match exactly (group assignment)
    Presence,
    /// Attribute sets must match per entity; an absent entity counts as empty
    Attributes,
}

/// Attribute mismatch for a single entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDiff {
    pub name: String,
    pub only_csv: BTreeSet<String>,
    pub only_remote: BTreeSet<String>,
}

/// Difference between desired (CSV) and actual (remote) state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDiff {
    /// Entities in the CSV but not remote
    pub missing_entities: Vec<String>,
    /// Entities remote but not in the CSV
    pub unexpected_entities: Vec<String>,
    /// Entities whose attribute sets differ
    pub entities: Vec<EntityDiff>,
}

impl StateDiff {
    pub fn matches(&self, mode: ComparisonMode) -> bool {
        match mode {
            ComparisonMode::Presence => {
                self.missing_entities.is_empty()
                    && self.unexpected_entities.is_empty()
                    && self.entities.is_empty()
            }
            ComparisonMode::Attributes => self.entities.is_empty(),
        }
    }
}

/// Compute the symmetric difference between two states.
///
/// Keys are compared normalized; output is sorted by key.
pub fn diff_states(desired: &StateMap, actual: &StateMap) -> StateDiff {
    let desired_keys: BTreeSet<&String> = desired.names().collect();
    let actual_keys: BTreeSet<&String> = actual.names().collect();

    let missing_entities = desired_keys
        .difference(&actual_keys)
        .map(|k| (*k).clone())
        .collect();
    let unexpected_entities = actual_keys
        .difference(&desired_keys)
        .map(|k| (*k).clone())
        .collect();

    let mut entities = Vec::new();
    for key in desired_keys.union(&actual_keys) {
        let csv_set = desired.attributes_of(key);
        let remote_set = actual.attributes_of(key);
        if csv_set != remote_set {
            entities.push(EntityDiff {
                name: (*key).clone(),
                only_csv: csv_set.difference(&remote_set).cloned().collect(),
                only_remote: remote_set.difference(&csv_set).cloned().collect(),
            });
        }
    }

    StateDiff {
        missing_entities,
        unexpected_entities,
        entities,
    }
}
