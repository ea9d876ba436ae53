use crate::state::{EntityState, StateMap};
use serde::Serialize;
use std::collections::BTreeSet;

/// What to do with an entity that is desired but absent remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingEntityPolicy {
    /// Create it (group assignment, IP access lists)
    Create,
    /// Leave it alone and report it (entitlements of unknown groups)
    Skip,
}

/// A change to a single entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityChange {
    /// Normalized name
    pub key: String,
    /// Name as written in the CSV
    pub name: String,
    /// Remote id, when the entity exists remotely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Desired attributes missing remotely
    pub add: BTreeSet<String>,
    /// Remote attributes not in the CSV; reported, never removed
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub extra: BTreeSet<String>,
}

/// The reconciliation plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationPlan {
    /// Entities to create remotely
    pub to_create: Vec<EntityChange>,

    /// Existing entities missing some desired attributes
    pub to_update: Vec<EntityChange>,

    /// Entities that already carry every desired attribute
    pub up_to_date: Vec<EntityChange>,

    /// Entities missing remotely that the domain does not create
    pub skipped: Vec<EntityChange>,

    /// Remote entities not mentioned in the CSV
    pub remote_only: Vec<String>,
}

impl ReconciliationPlan {
    /// Check if anything would be sent to the remote
    pub fn needs_changes(&self) -> bool {
        !self.to_create.is_empty() || !self.to_update.is_empty()
    }
}

/// Build a reconciliation plan from desired (CSV) and actual (remote) state
pub fn build_reconciliation_plan(
    desired: &StateMap,
    actual: &StateMap,
    missing_policy: MissingEntityPolicy,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    for (key, wanted) in desired.iter() {
        match actual.get(key) {
            None => {
                let change = change_for(key, wanted, None);
                match missing_policy {
                    MissingEntityPolicy::Create => plan.to_create.push(change),
                    MissingEntityPolicy::Skip => plan.skipped.push(change),
                }
            }
            Some(remote) => {
                let change = change_for(key, wanted, Some(remote));
                if change.add.is_empty() {
                    plan.up_to_date.push(change);
                } else {
                    plan.to_update.push(change);
                }
            }
        }
    }

    plan.remote_only = actual
        .iter()
        .filter(|(key, _)| !desired.contains(key))
        .map(|(_, entity)| entity.name.clone())
        .collect();

    plan
}

fn change_for(key: &str, wanted: &EntityState, remote: Option<&EntityState>) -> EntityChange {
    let (add, extra, id) = match remote {
        Some(remote) => (
            wanted.attributes.difference(&remote.attributes).cloned().collect(),
            remote.attributes.difference(&wanted.attributes).cloned().collect(),
            remote.id.clone(),
        ),
        None => (wanted.attributes.clone(), BTreeSet::new(), None),
    };

    EntityChange {
        key: key.to_string(),
        name: wanted.name.clone(),
        id,
        add,
        extra,
    }
}
