//! Conflict detection and staleness checks across open proposals.
//!
//! # Overview
//!
//! Two open proposals conflict on a node when their intended changes to it
//! overlap. Overlap is computed over `(node, field)` pairs derived from
//! each proposal's operations; structural operations (create/delete/move)
//! overlap at the node level rather than the field level.
//!
//! # Severity ladder
//!
//! - **field** — both proposals touch the same field of the same node.
//!   Auto-resolvable when every overlapping field carries the identical
//!   intended new value.
//! - **node** — the proposals touch the same node through structurally
//!   different operation shapes (one deletes, one updates; one moves, one
//!   edits text). Auto-resolvable only when both sides perform the exact
//!   same structural operations.
//! - **critical** — both proposals change the node's status to different
//!   values.
//!
//! Proposals that merely touch *disjoint fields* of the same node do not
//! conflict at all: an update to `content` coexists with a status-change
//! on the same node.
//!
//! Conflicts are data, not errors: detection returns them for a human (or
//! a merge attempt, see [`merge`]) to act on; it never mutates anything.
//!
//! # Staleness
//!
//! Staleness is independent of conflicts. A proposal is stale when any
//! node it touches has advanced past the base version recorded at
//! submission — typically because an unrelated proposal applied first.

pub mod merge;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::node_id::NodeId;
use crate::proposal::{Proposal, ProposalId};

// ---------------------------------------------------------------------------
// Conflict types
// ---------------------------------------------------------------------------

/// How severe an overlap between two proposals is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Field,
    Node,
    Critical,
}

impl ConflictSeverity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Node => "node",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One overlapping field with both intended values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: String,
    /// Intended value from the proposal under detection.
    pub ours: serde_json::Value,
    /// Intended value from the other proposal.
    pub theirs: serde_json::Value,
}

impl FieldConflict {
    #[must_use]
    pub fn values_agree(&self) -> bool {
        self.ours == self.theirs
    }
}

/// An overlap between the proposal under detection and one other open
/// proposal, on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub with_proposal: ProposalId,
    pub node: NodeId,
    pub severity: ConflictSeverity,
    /// Overlapping fields with both candidate values. Empty for purely
    /// structural overlaps.
    pub fields: Vec<FieldConflict>,
    /// True only when every overlap is identical in intended outcome.
    pub auto_resolvable: bool,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Compare `proposal` against `others` (the caller supplies the currently
/// open proposals, excluding `proposal` itself) and report every overlap.
///
/// Results are ordered by the other proposal's id, then node id, so
/// repeated detection against unchanged state is deterministic.
#[must_use]
pub fn detect(proposal: &Proposal, others: &[&Proposal]) -> Vec<Conflict> {
    let our_nodes = proposal.touched_nodes();
    let our_intents = proposal.field_intents();

    let mut conflicts = Vec::new();
    for other in others {
        if other.id == proposal.id {
            continue;
        }
        let their_intents = other.field_intents();
        for node in other.touched_nodes().intersection(&our_nodes) {
            let structural =
                proposal.touches_structurally(node) || other.touches_structurally(node);

            if structural {
                let ours: Vec<_> = ops_on(proposal, node);
                let theirs: Vec<_> = ops_on(other, node);
                conflicts.push(Conflict {
                    with_proposal: other.id.clone(),
                    node: node.clone(),
                    severity: ConflictSeverity::Node,
                    fields: Vec::new(),
                    auto_resolvable: ours == theirs,
                });
                continue;
            }

            let empty = std::collections::BTreeMap::new();
            let our_fields = our_intents.get(node).unwrap_or(&empty);
            let their_fields = their_intents.get(node).unwrap_or(&empty);

            let mut fields = Vec::new();
            for (key, ours) in our_fields {
                if let Some(theirs) = their_fields.get(key) {
                    fields.push(FieldConflict {
                        field: key.clone(),
                        ours: ours.clone(),
                        theirs: theirs.clone(),
                    });
                }
            }
            if fields.is_empty() {
                // Disjoint fields of the same node: compatible edits.
                continue;
            }

            let status_differs = fields
                .iter()
                .any(|f| f.field == "status" && !f.values_agree());
            let severity = if status_differs {
                ConflictSeverity::Critical
            } else {
                ConflictSeverity::Field
            };
            let auto_resolvable = fields.iter().all(FieldConflict::values_agree);

            conflicts.push(Conflict {
                with_proposal: other.id.clone(),
                node: node.clone(),
                severity,
                fields,
                auto_resolvable,
            });
        }
    }

    conflicts.sort_by(|a, b| {
        (&a.with_proposal, &a.node).cmp(&(&b.with_proposal, &b.node))
    });
    conflicts
}

fn ops_on<'a>(
    proposal: &'a Proposal,
    node: &NodeId,
) -> Vec<&'a crate::proposal::Operation> {
    proposal
        .operations
        .iter()
        .filter(|op| op.target() == node || op.secondary_target() == Some(node))
        .collect()
}

// ---------------------------------------------------------------------------
// Staleness
// ---------------------------------------------------------------------------

/// One node whose live version moved past the proposal's recorded base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleNode {
    pub node: NodeId,
    pub base: u64,
    pub current: u64,
}

/// Every touched node whose current version differs from the recorded
/// base version. `lookup` resolves a node id to its live version.
#[must_use]
pub fn stale_nodes(
    proposal: &Proposal,
    lookup: impl Fn(&NodeId) -> Option<u64>,
) -> Vec<StaleNode> {
    let mut stale = Vec::new();
    for (node, base) in &proposal.base_versions {
        if let Some(current) = lookup(node) {
            if current != *base {
                stale.push(StaleNode {
                    node: node.clone(),
                    base: *base,
                    current,
                });
            }
        }
    }
    stale
}

/// True iff any touched node's current version differs from the base.
#[must_use]
pub fn is_stale(proposal: &Proposal, lookup: impl Fn(&NodeId) -> Option<u64>) -> bool {
    !stale_nodes(proposal, lookup).is_empty()
}

#[cfg(test)]
mod tests {
    use super::{ConflictSeverity, detect, is_stale, stale_nodes};
    use crate::model::node::NodeStatus;
    use crate::model::node_id::NodeId;
    use crate::proposal::operation::NodeChanges;
    use crate::proposal::{Operation, Proposal, ProposalId, ProposalStatus};
    use std::collections::BTreeMap;

    fn proposal(id: &str, ops: Vec<Operation>) -> Proposal {
        Proposal {
            id: ProposalId::new(id),
            status: ProposalStatus::Open,
            operations: ops,
            base_versions: BTreeMap::new(),
            supersedes: None,
            author: "alice".into(),
            rationale: None,
            created_at: chrono::Utc::now(),
            decided_at: None,
            comments: vec![],
            applied: None,
        }
    }

    fn set_content(node: &str, content: &str) -> Operation {
        Operation::Update {
            node: NodeId::new_unchecked(node),
            changes: NodeChanges {
                content: Some(content.into()),
                ..NodeChanges::default()
            },
        }
    }

    #[test]
    fn disjoint_fields_do_not_conflict() {
        // A sets content, B sets status, same node: compatible edits.
        let a = proposal("p-a", vec![set_content("n1", "hello")]);
        let b = proposal(
            "p-b",
            vec![Operation::StatusChange {
                node: NodeId::new_unchecked("n1"),
                status: NodeStatus::Superseded,
            }],
        );
        assert!(detect(&a, &[&b]).is_empty());
    }

    #[test]
    fn differing_content_is_a_field_conflict() {
        let a = proposal("p-a", vec![set_content("n1", "X")]);
        let c = proposal("p-c", vec![set_content("n1", "Y")]);
        let conflicts = detect(&a, &[&c]);
        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.with_proposal, ProposalId::new("p-c"));
        assert_eq!(conflict.severity, ConflictSeverity::Field);
        assert!(!conflict.auto_resolvable);
        assert_eq!(conflict.fields.len(), 1);
        assert_eq!(conflict.fields[0].field, "content");
    }

    #[test]
    fn identical_values_are_auto_resolvable() {
        let a = proposal("p-a", vec![set_content("n1", "same")]);
        let b = proposal("p-b", vec![set_content("n1", "same")]);
        let conflicts = detect(&a, &[&b]);
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].auto_resolvable);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Field);
    }

    #[test]
    fn conflicting_status_changes_are_critical() {
        let a = proposal(
            "p-a",
            vec![Operation::StatusChange {
                node: NodeId::new_unchecked("n1"),
                status: NodeStatus::Rejected,
            }],
        );
        let b = proposal(
            "p-b",
            vec![Operation::StatusChange {
                node: NodeId::new_unchecked("n1"),
                status: NodeStatus::Superseded,
            }],
        );
        let conflicts = detect(&a, &[&b]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Critical);
        assert!(!conflicts[0].auto_resolvable);
    }

    #[test]
    fn delete_vs_update_is_a_node_conflict() {
        let a = proposal(
            "p-a",
            vec![Operation::Delete {
                node: NodeId::new_unchecked("n1"),
            }],
        );
        let b = proposal("p-b", vec![set_content("n1", "still editing")]);
        let conflicts = detect(&a, &[&b]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Node);
        assert!(!conflicts[0].auto_resolvable);
    }

    #[test]
    fn identical_deletes_auto_resolve() {
        let a = proposal(
            "p-a",
            vec![Operation::Delete {
                node: NodeId::new_unchecked("n1"),
            }],
        );
        let b = proposal(
            "p-b",
            vec![Operation::Delete {
                node: NodeId::new_unchecked("n1"),
            }],
        );
        let conflicts = detect(&a, &[&b]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Node);
        assert!(conflicts[0].auto_resolvable);
    }

    #[test]
    fn different_nodes_never_conflict() {
        let a = proposal("p-a", vec![set_content("n1", "x")]);
        let b = proposal("p-b", vec![set_content("n2", "y")]);
        assert!(detect(&a, &[&b]).is_empty());
    }

    #[test]
    fn detection_skips_self() {
        let a = proposal("p-a", vec![set_content("n1", "x")]);
        assert!(detect(&a, &[&a]).is_empty());
    }

    #[test]
    fn staleness_tracks_version_drift() {
        let mut p = proposal("p-a", vec![set_content("n1", "x")]);
        p.base_versions
            .insert(NodeId::new_unchecked("n1"), 5);

        // Live version matches: fresh.
        assert!(!is_stale(&p, |_| Some(5)));
        // Live version advanced: stale.
        assert!(is_stale(&p, |_| Some(6)));
        let stale = stale_nodes(&p, |_| Some(6));
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].base, 5);
        assert_eq!(stale[0].current, 6);
    }

    #[test]
    fn staleness_and_conflicts_are_independent() {
        // No other proposal touches n1, yet the proposal is stale because
        // the live version advanced underneath it.
        let mut p = proposal("p-a", vec![set_content("n1", "x")]);
        p.base_versions
            .insert(NodeId::new_unchecked("n1"), 1);
        assert!(detect(&p, &[]).is_empty());
        assert!(is_stale(&p, |_| Some(2)));
    }
}
