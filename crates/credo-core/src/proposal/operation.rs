//! The operation catalog: every way a proposal can change the graph.
//!
//! Operations form a closed tagged variant. Each carries a typed payload;
//! the discriminant is the `op` field in the JSON form. Consumers match
//! exhaustively, so a new operation kind is a compile-time-checked change,
//! not a silent runtime gap.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::node::{NodeBody, NodeStatus};
use crate::model::node_id::NodeId;
use crate::model::relationship::Relationship;

// ---------------------------------------------------------------------------
// OperationKind
// ---------------------------------------------------------------------------

/// The seven operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    StatusChange,
    InsertText,
    DeleteText,
    Move,
}

impl OperationKind {
    /// All operation kinds in catalog order.
    pub const ALL: [Self; 7] = [
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::StatusChange,
        Self::InsertText,
        Self::DeleteText,
        Self::Move,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::StatusChange => "status-change",
            Self::InsertText => "insert-text",
            Self::DeleteText => "delete-text",
            Self::Move => "move",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Everything needed to materialize a new node. The node comes to life with
/// `status = accepted` and `version = 1` when the owning proposal applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDraft {
    pub id: NodeId,
    #[serde(flatten)]
    pub body: NodeBody,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Intended field changes for an update operation.
///
/// Shared fields are typed options; kind-specific fields travel in `fields`
/// and are validated against the target kind's schema at apply time. Only
/// fields that are present count as "touched" for conflict detection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Full replacement of the node's outgoing edge list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Relationship>>,
    /// Kind-specific overlays, keyed by field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl NodeChanges {
    /// True when no field is touched at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.relationships.is_none()
            && self.fields.is_empty()
    }

    /// The `(field key → intended value)` map used by conflict detection
    /// and merge. Shared and kind-specific fields share one flat keyspace;
    /// the shared keys are reserved and rejected inside `fields` at apply
    /// time, so no collision is possible.
    #[must_use]
    pub fn field_intents(&self) -> BTreeMap<String, serde_json::Value> {
        let mut intents = BTreeMap::new();
        if let Some(title) = &self.title {
            intents.insert("title".to_string(), serde_json::json!(title));
        }
        if let Some(content) = &self.content {
            intents.insert("content".to_string(), serde_json::json!(content));
        }
        if let Some(description) = &self.description {
            intents.insert("description".to_string(), serde_json::json!(description));
        }
        if let Some(tags) = &self.tags {
            intents.insert("tags".to_string(), serde_json::json!(tags));
        }
        if let Some(relationships) = &self.relationships {
            intents.insert(
                "relationships".to_string(),
                serde_json::to_value(relationships).unwrap_or(serde_json::Value::Null),
            );
        }
        for (key, value) in &self.fields {
            intents.insert(key.clone(), value.clone());
        }
        intents
    }
}

/// Shared field names reserved against kind-specific overlays.
pub const RESERVED_FIELD_KEYS: [&str; 7] = [
    "title",
    "content",
    "description",
    "status",
    "tags",
    "relationships",
    "kind",
];

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// One step of a proposal, applied in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Operation {
    /// Materialize a new node.
    Create { node: NodeDraft },
    /// Change fields of an existing node.
    Update { node: NodeId, changes: NodeChanges },
    /// Retire a node. The node is retained with a terminal status for
    /// provenance; nothing is ever physically removed.
    Delete { node: NodeId },
    /// Change a node's lifecycle status.
    StatusChange { node: NodeId, status: NodeStatus },
    /// Insert text into `content` at a char offset.
    InsertText {
        node: NodeId,
        offset: usize,
        text: String,
    },
    /// Remove the char range `start..end` from `content`.
    DeleteText {
        node: NodeId,
        start: usize,
        end: usize,
    },
    /// Re-parent a node under `new_parent` (or detach it when `None`).
    /// Rewires the parent-child edge held by the parent side.
    Move {
        node: NodeId,
        new_parent: Option<NodeId>,
    },
}

impl Operation {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Create { .. } => OperationKind::Create,
            Self::Update { .. } => OperationKind::Update,
            Self::Delete { .. } => OperationKind::Delete,
            Self::StatusChange { .. } => OperationKind::StatusChange,
            Self::InsertText { .. } => OperationKind::InsertText,
            Self::DeleteText { .. } => OperationKind::DeleteText,
            Self::Move { .. } => OperationKind::Move,
        }
    }

    /// The node this operation is primarily about.
    #[must_use]
    pub const fn target(&self) -> &NodeId {
        match self {
            Self::Create { node } => &node.id,
            Self::Update { node, .. }
            | Self::Delete { node }
            | Self::StatusChange { node, .. }
            | Self::InsertText { node, .. }
            | Self::DeleteText { node, .. }
            | Self::Move { node, .. } => node,
        }
    }

    /// A second node the operation touches, if any (the new parent of a
    /// move). The *old* parent is only known against live state; the store
    /// resolves it during apply.
    #[must_use]
    pub const fn secondary_target(&self) -> Option<&NodeId> {
        match self {
            Self::Move {
                new_parent: Some(parent),
                ..
            } => Some(parent),
            _ => None,
        }
    }

    /// Whether this operation changes node structure rather than field
    /// values. Structural overlap with any other operation on the same
    /// node is a node-level conflict.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Create { .. } | Self::Delete { .. } | Self::Move { .. }
        )
    }

    /// The `(field key → intended value)` pairs this operation contributes
    /// to conflict detection. Structural operations contribute none; text
    /// edits touch `content` with the edit itself as the intended value,
    /// so two byte-identical edits compare equal.
    #[must_use]
    pub fn field_intents(&self) -> BTreeMap<String, serde_json::Value> {
        match self {
            Self::Create { .. } | Self::Delete { .. } | Self::Move { .. } => BTreeMap::new(),
            Self::Update { changes, .. } => changes.field_intents(),
            Self::StatusChange { status, .. } => {
                let mut intents = BTreeMap::new();
                intents.insert("status".to_string(), serde_json::json!(status));
                intents
            }
            Self::InsertText { offset, text, .. } => {
                let mut intents = BTreeMap::new();
                intents.insert(
                    "content".to_string(),
                    serde_json::json!({ "insert": { "offset": offset, "text": text } }),
                );
                intents
            }
            Self::DeleteText { start, end, .. } => {
                let mut intents = BTreeMap::new();
                intents.insert(
                    "content".to_string(),
                    serde_json::json!({ "delete": { "start": start, "end": end } }),
                );
                intents
            }
        }
    }
}
