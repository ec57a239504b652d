//! Reconciliation: merging the field intents of several open proposals.
//!
//! The merge partitions every `(node, field)` intent across the input
//! proposals:
//!
//! - fields with exactly one distinct intended value (touched by one
//!   proposal, or by several that agree) land in `auto_merged`;
//! - fields with two or more distinct intended values become
//!   [`MergeConflict`]s carrying every candidate and its proposal of
//!   origin. When three or more proposals disagree there is no tie-break
//!   order: all candidates are surfaced for manual resolution.
//!
//! Structural operations (create/delete/move) carry no field intents and
//! are outside the merge; they surface through conflict detection instead.
//!
//! The merge never mutates store state. Its output is meant to seed a new
//! proposal, which goes through review like any other.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::node_id::NodeId;
use crate::proposal::{Proposal, ProposalId};

/// One intended value and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeCandidate {
    pub proposal: ProposalId,
    pub value: serde_json::Value,
}

/// A field with irreconcilable intended values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub node: NodeId,
    pub field: String,
    /// One candidate per proposal that touched the field, in input order.
    pub candidates: Vec<MergeCandidate>,
}

/// Result of merging a set of proposals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Proposals that contributed at least one field intent.
    pub merged: Vec<ProposalId>,
    /// Per node, the combined field map every input agrees on.
    pub auto_merged: BTreeMap<NodeId, BTreeMap<String, serde_json::Value>>,
    /// Fields needing manual resolution.
    pub conflicts: Vec<MergeConflict>,
}

impl MergeOutcome {
    /// True when nothing needs manual resolution.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Merge the field intents of `proposals`.
///
/// Order matters only for presentation: candidates are listed in input
/// order, and the `merged` list preserves it. The partition itself is
/// order-independent.
#[must_use]
pub fn merge_proposals(proposals: &[&Proposal]) -> MergeOutcome {
    // (node, field) → candidates in input order.
    let mut intents: BTreeMap<NodeId, BTreeMap<String, Vec<MergeCandidate>>> = BTreeMap::new();
    let mut merged = Vec::new();

    for proposal in proposals {
        let per_node = proposal.field_intents();
        if per_node.is_empty() {
            continue;
        }
        merged.push(proposal.id.clone());
        for (node, fields) in per_node {
            let node_entry = intents.entry(node).or_default();
            for (field, value) in fields {
                node_entry.entry(field).or_default().push(MergeCandidate {
                    proposal: proposal.id.clone(),
                    value,
                });
            }
        }
    }

    let mut outcome = MergeOutcome {
        merged,
        ..MergeOutcome::default()
    };

    for (node, fields) in intents {
        for (field, candidates) in fields {
            let mut distinct: Vec<&serde_json::Value> = Vec::new();
            for candidate in &candidates {
                if !distinct.contains(&&candidate.value) {
                    distinct.push(&candidate.value);
                }
            }
            if distinct.len() == 1 {
                outcome
                    .auto_merged
                    .entry(node.clone())
                    .or_default()
                    .insert(field, candidates[0].value.clone());
            } else {
                outcome.conflicts.push(MergeConflict {
                    node: node.clone(),
                    field,
                    candidates,
                });
            }
        }
    }

    outcome
}
