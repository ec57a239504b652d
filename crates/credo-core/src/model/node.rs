//! Typed nodes: the vocabulary every other component speaks.
//!
//! A [`Node`] is a closed tagged variant over nine kinds, each carrying
//! kind-specific fields, plus the shared surface (status, title, content,
//! description, metadata, relationships). Adding a kind is a compile-time
//! change: every consumer matches [`NodeBody`] exhaustively.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::node_id::NodeId;
use super::relationship::{Relationship, RelationshipType};

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// The nine node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Goal,
    Decision,
    Constraint,
    Task,
    Risk,
    Question,
    Context,
    Plan,
    Note,
}

impl NodeKind {
    /// All known kinds in catalog order.
    pub const ALL: [Self; 9] = [
        Self::Goal,
        Self::Decision,
        Self::Constraint,
        Self::Task,
        Self::Risk,
        Self::Question,
        Self::Context,
        Self::Plan,
        Self::Note,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::Decision => "decision",
            Self::Constraint => "constraint",
            Self::Task => "task",
            Self::Risk => "risk",
            Self::Question => "question",
            Self::Context => "context",
            Self::Plan => "plan",
            Self::Note => "note",
        }
    }

    /// Kind-specific field keys accepted by update operations.
    ///
    /// Shared keys (`title`, `content`, `description`, `status`, `tags`,
    /// `relationships`) are handled separately and never appear here.
    #[must_use]
    pub const fn field_keys(self) -> &'static [&'static str] {
        match self {
            Self::Goal => &["objective", "success_criteria"],
            Self::Decision => &["decision", "rationale", "alternatives"],
            Self::Constraint => &["constraint"],
            Self::Task => &["assignee", "due"],
            Self::Risk => &["impact", "likelihood", "mitigation"],
            Self::Question => &["answer"],
            Self::Plan => &["steps"],
            Self::Context | Self::Note => &[],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "goal" => Ok(Self::Goal),
            "decision" => Ok(Self::Decision),
            "constraint" => Ok(Self::Constraint),
            "task" => Ok(Self::Task),
            "risk" => Ok(Self::Risk),
            "question" => Ok(Self::Question),
            "context" => Ok(Self::Context),
            "plan" => Ok(Self::Plan),
            "note" => Ok(Self::Note),
            other => Err(format!("unknown node kind: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeStatus
// ---------------------------------------------------------------------------

/// Shared lifecycle status. Only `accepted` nodes are readable by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Accepted,
    Proposed,
    Rejected,
    Superseded,
}

impl NodeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Proposed => "proposed",
            Self::Rejected => "rejected",
            Self::Superseded => "superseded",
        }
    }

    /// Terminal statuses: the node is retained for provenance but no longer
    /// current truth.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Superseded)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accepted" => Ok(Self::Accepted),
            "proposed" => Ok(Self::Proposed),
            "rejected" => Ok(Self::Rejected),
            "superseded" => Ok(Self::Superseded),
            other => Err(format!("unknown node status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Kind-specific bodies
// ---------------------------------------------------------------------------

/// A rejected alternative preserved on a decision for provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Coarse risk grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Kind-specific payload, internally tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeBody {
    Goal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        objective: Option<String>,
        #[serde(default)]
        success_criteria: Vec<String>,
    },
    Decision {
        decision: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
        #[serde(default)]
        alternatives: Vec<Alternative>,
    },
    Constraint {
        constraint: String,
    },
    Task {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due: Option<DateTime<Utc>>,
    },
    Risk {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        impact: Option<RiskLevel>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        likelihood: Option<RiskLevel>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mitigation: Option<String>,
    },
    Question {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },
    Context {},
    Plan {
        #[serde(default)]
        steps: Vec<String>,
    },
    Note {},
}

impl NodeBody {
    /// The kind this body belongs to.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Goal { .. } => NodeKind::Goal,
            Self::Decision { .. } => NodeKind::Decision,
            Self::Constraint { .. } => NodeKind::Constraint,
            Self::Task { .. } => NodeKind::Task,
            Self::Risk { .. } => NodeKind::Risk,
            Self::Question { .. } => NodeKind::Question,
            Self::Context {} => NodeKind::Context,
            Self::Plan { .. } => NodeKind::Plan,
            Self::Note {} => NodeKind::Note,
        }
    }

    /// Merge kind-specific field overlays into this body.
    ///
    /// Keys must come from [`NodeKind::field_keys`] for the body's kind;
    /// the `kind` discriminant itself can never be changed through an
    /// update. Values are merged through the JSON representation so each
    /// field keeps its typed schema.
    ///
    /// # Errors
    ///
    /// Returns a message when a key is unknown for this kind, when the
    /// caller attempts to change `kind`, or when a value does not match
    /// the field's schema.
    pub fn merge_fields(
        &self,
        overlay: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Self, String> {
        let kind = self.kind();
        for key in overlay.keys() {
            if key == "kind" {
                return Err("the 'kind' of a node cannot be changed".to_string());
            }
            if !kind.field_keys().contains(&key.as_str()) {
                return Err(format!("unknown field '{key}' for kind '{kind}'"));
            }
        }

        let mut value =
            serde_json::to_value(self).map_err(|e| format!("serialize body: {e}"))?;
        let Some(object) = value.as_object_mut() else {
            return Err("node body did not serialize to an object".to_string());
        };
        for (key, field_value) in overlay {
            object.insert(key.clone(), field_value.clone());
        }
        serde_json::from_value(value).map_err(|e| format!("field value mismatch: {e}"))
    }
}

// ---------------------------------------------------------------------------
// NodeMetadata
// ---------------------------------------------------------------------------

/// Provenance and versioning metadata shared by every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub modified_at: DateTime<Utc>,
    pub modified_by: String,
    /// Optimistic-lock counter. Starts at 1 on creation; every applied
    /// proposal that touches the node increments it by exactly 1.
    pub version: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NodeMetadata {
    /// Metadata for a freshly created node at version 1.
    #[must_use]
    pub fn created(by: impl Into<String>, at: DateTime<Utc>) -> Self {
        let by = by.into();
        Self {
            created_at: at,
            created_by: by.clone(),
            modified_at: at,
            modified_by: by,
            version: 1,
            tags: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A node in the context graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(flatten)]
    pub body: NodeBody,
    pub status: NodeStatus,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub metadata: NodeMetadata,
    /// Ordered typed edges held by this node.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// Derived reverse index: ids of nodes holding an edge that targets
    /// this node. Recomputed by the store whenever such an edge changes;
    /// never authoritative, never written by operations.
    #[serde(default)]
    pub referenced_by: Vec<NodeId>,
}

impl Node {
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.body.kind()
    }

    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self.status, NodeStatus::Accepted)
    }

    /// Outgoing edges of one relationship type.
    pub fn relationships_of(
        &self,
        rel_type: RelationshipType,
    ) -> impl Iterator<Item = &Relationship> {
        self.relationships
            .iter()
            .filter(move |r| r.rel_type == rel_type)
    }

    /// Whether this node holds any edge targeting `target`.
    #[must_use]
    pub fn references(&self, target: &NodeId) -> bool {
        self.relationships.iter().any(|r| &r.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::{Alternative, NodeBody, NodeKind, NodeMetadata, NodeStatus, RiskLevel};
    use std::collections::BTreeMap;
    use std::str::FromStr;

    #[test]
    fn kind_display_parse_roundtrips() {
        for kind in NodeKind::ALL {
            let rendered = kind.to_string();
            assert_eq!(NodeKind::from_str(&rendered).unwrap(), kind);
        }
    }

    #[test]
    fn status_terminality() {
        assert!(!NodeStatus::Accepted.is_terminal());
        assert!(!NodeStatus::Proposed.is_terminal());
        assert!(NodeStatus::Rejected.is_terminal());
        assert!(NodeStatus::Superseded.is_terminal());
    }

    #[test]
    fn body_kind_matches_tag() {
        let body = NodeBody::Decision {
            decision: "use sqlite".into(),
            rationale: Some("single-file durability".into()),
            alternatives: vec![Alternative {
                title: "postgres".into(),
                reason: Some("too heavy for embedded use".into()),
            }],
        };
        assert_eq!(body.kind(), NodeKind::Decision);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["kind"], "decision");
        let back: NodeBody = serde_json::from_value(value).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn merge_fields_updates_known_keys() {
        let body = NodeBody::Risk {
            impact: Some(RiskLevel::Low),
            likelihood: None,
            mitigation: None,
        };
        let mut overlay = BTreeMap::new();
        overlay.insert("impact".to_string(), serde_json::json!("high"));
        overlay.insert("mitigation".to_string(), serde_json::json!("add backups"));
        let merged = body.merge_fields(&overlay).unwrap();
        match merged {
            NodeBody::Risk {
                impact, mitigation, ..
            } => {
                assert_eq!(impact, Some(RiskLevel::High));
                assert_eq!(mitigation.as_deref(), Some("add backups"));
            }
            other => panic!("expected risk body, got {other:?}"),
        }
    }

    #[test]
    fn merge_fields_rejects_unknown_key() {
        let body = NodeBody::Note {};
        let mut overlay = BTreeMap::new();
        overlay.insert("decision".to_string(), serde_json::json!("nope"));
        let err = body.merge_fields(&overlay).unwrap_err();
        assert!(err.contains("unknown field"), "got: {err}");
    }

    #[test]
    fn merge_fields_rejects_kind_change() {
        let body = NodeBody::Context {};
        let mut overlay = BTreeMap::new();
        overlay.insert("kind".to_string(), serde_json::json!("note"));
        let err = body.merge_fields(&overlay).unwrap_err();
        assert!(err.contains("cannot be changed"), "got: {err}");
    }

    #[test]
    fn merge_fields_rejects_schema_mismatch() {
        let body = NodeBody::Goal {
            objective: None,
            success_criteria: vec![],
        };
        let mut overlay = BTreeMap::new();
        overlay.insert("success_criteria".to_string(), serde_json::json!(42));
        assert!(body.merge_fields(&overlay).is_err());
    }

    #[test]
    fn created_metadata_starts_at_version_one() {
        let meta = NodeMetadata::created("alice", chrono::Utc::now());
        assert_eq!(meta.version, 1);
        assert_eq!(meta.created_by, "alice");
        assert_eq!(meta.modified_by, "alice");
        assert_eq!(meta.created_at, meta.modified_at);
    }
}
