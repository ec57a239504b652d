//! Typed, directed relationships between nodes.
//!
//! Edges are directed and the graph is **not** guaranteed acyclic: every
//! traversal must carry its own visited set and depth bound. The legacy
//! untyped "relations" list from earlier systems is deliberately absent —
//! typed edges are the only relationship model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::node_id::NodeId;

// ---------------------------------------------------------------------------
// RelationshipType
// ---------------------------------------------------------------------------

/// The eight relationship types in the edge catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipType {
    /// Containment: parent → child.
    ParentChild,
    /// Scheduling/logical dependency: source depends on target.
    DependsOn,
    /// Informational citation.
    References,
    /// Source replaces target as current truth.
    Supersedes,
    /// Undirected-in-spirit association (stored directed like the rest).
    RelatedTo,
    /// Source realizes target (task implements decision, decision implements goal).
    Implements,
    /// Source prevents progress on target.
    Blocks,
    /// Source reduces the risk carried by target.
    Mitigates,
}

impl RelationshipType {
    /// All known relationship types in catalog order.
    pub const ALL: [Self; 8] = [
        Self::ParentChild,
        Self::DependsOn,
        Self::References,
        Self::Supersedes,
        Self::RelatedTo,
        Self::Implements,
        Self::Blocks,
        Self::Mitigates,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParentChild => "parent-child",
            Self::DependsOn => "depends-on",
            Self::References => "references",
            Self::Supersedes => "supersedes",
            Self::RelatedTo => "related-to",
            Self::Implements => "implements",
            Self::Blocks => "blocks",
            Self::Mitigates => "mitigates",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parent-child" => Ok(Self::ParentChild),
            "depends-on" => Ok(Self::DependsOn),
            "references" => Ok(Self::References),
            "supersedes" => Ok(Self::Supersedes),
            "related-to" => Ok(Self::RelatedTo),
            "implements" => Ok(Self::Implements),
            "blocks" => Ok(Self::Blocks),
            "mitigates" => Ok(Self::Mitigates),
            other => Err(format!("unknown relationship type: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which edge direction a lookup or traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Follow edges held by the node (node → target).
    #[default]
    Outgoing,
    /// Follow edges pointing at the node (source → node).
    Incoming,
    /// Follow both directions.
    Both,
}

impl Direction {
    #[must_use]
    pub const fn includes_outgoing(self) -> bool {
        matches!(self, Self::Outgoing | Self::Both)
    }

    #[must_use]
    pub const fn includes_incoming(self) -> bool {
        matches!(self, Self::Incoming | Self::Both)
    }
}

// ---------------------------------------------------------------------------
// Relationship
// ---------------------------------------------------------------------------

/// A typed directed edge from the owning node to `target`.
///
/// `reverse_type` names the relationship as seen from the target (e.g. a
/// `supersedes` edge may carry `superseded-by` semantics on the far side);
/// it is advisory metadata and does not create a second edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub rel_type: RelationshipType,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_type: Option<RelationshipType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl Relationship {
    /// A plain edge with no reverse type or metadata.
    #[must_use]
    pub const fn new(rel_type: RelationshipType, target: NodeId) -> Self {
        Self {
            rel_type,
            target,
            reverse_type: None,
            metadata: None,
        }
    }
}
