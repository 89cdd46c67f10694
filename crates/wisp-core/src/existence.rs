//! Per-node secondary view membership.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Records which secondary views contain a node.
///
/// Persisted as a JSON object `{table_name: bool}` on primary-view rows.
/// The inner map is ordered so the serialized form is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExistenceMap(BTreeMap<String, bool>);

impl ExistenceMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map marking every given view present.
    ///
    /// Used for the root, which exists in every view unconditionally.
    pub fn all_true<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tables.into_iter().map(|t| (t.into(), true)).collect())
    }

    /// Marks a view present or absent.
    pub fn set(&mut self, table: &str, present: bool) {
        self.0.insert(table.to_string(), present);
    }

    /// Returns whether the node is present in the given view.
    ///
    /// Views with no entry count as absent.
    pub fn contains(&self, table: &str) -> bool {
        self.0.get(table).copied().unwrap_or(false)
    }

    /// Applies the parent-dependency rule: a node can only be present in a
    /// view its parent is also present in.
    pub fn and(&self, parent: &ExistenceMap) -> ExistenceMap {
        Self(
            self.0
                .iter()
                .map(|(table, present)| (table.clone(), *present && parent.contains(table)))
                .collect(),
        )
    }

    /// Iterates over `(table_name, present)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(t, p)| (t.as_str(), *p))
    }

    /// Returns true if no views are recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes to the persisted JSON form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses the persisted JSON form. An empty string yields an empty map.
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(s)
    }
}
