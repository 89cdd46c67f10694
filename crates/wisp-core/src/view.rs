//! View identity and descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, stable identifier for a view.
///
/// Generated at first configuration and persisted in the lookup table, so
/// it survives process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(String);

impl ViewId {
    /// Mints a fresh random view id.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ViewId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ViewId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Whether a view is the canonical tree or a probabilistic copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    /// The canonical view; every node exists here.
    Primary,
    /// A partial view populated by inclusion draws.
    Secondary,
}

impl ViewKind {
    /// Returns the persisted representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Primary => "primary",
            ViewKind::Secondary => "secondary",
        }
    }

    /// Parses the persisted representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(ViewKind::Primary),
            "secondary" => Some(ViewKind::Secondary),
            _ => None,
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A view as exposed by `list_views`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewInfo {
    /// Stable view identifier
    pub view_id: ViewId,
    /// Backing table name
    pub table_name: String,
    /// Primary or secondary
    pub kind: ViewKind,
}
