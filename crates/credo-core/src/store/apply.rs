//! The transactional apply step.
//!
//! # Contract
//!
//! Apply is the only path by which accepted truth changes:
//!
//! 1. the proposal must be `accepted` (re-applying an `applied` proposal
//!    returns the recorded outcome without touching state);
//! 2. the policy collaborator must allow the call — evaluated *before*
//!    the critical section;
//! 3. every recorded base version must still equal the live version
//!    (optimistic lock), else [`StoreError::StaleProposal`];
//! 4. operations execute in order against a buffered overlay; every one
//!    is validated before any arena node mutates;
//! 5. any validation failure aborts the whole apply with nothing changed;
//! 6. on success each touched node's version bumps by exactly 1, created
//!    nodes materialize at version 1 with `status = accepted`, the
//!    derived `referenced_by` index is rebuilt, the head revision
//!    advances, and the proposal records its apply provenance;
//! 7. the durable record batch is written *after* the critical section —
//!    external I/O never runs under the state lock.
//!
//! Steps 3–6 happen behind the write lock as one indivisible unit, so any
//! two applies are serialized (which subsumes the requirement that
//! applies with intersecting touched-node sets are).

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::access::{ActorContext, AuditOutcome, StoreAction};
use crate::error::StoreError;
use crate::model::node::{Node, NodeMetadata, NodeStatus};
use crate::model::node_id::NodeId;
use crate::model::relationship::{Relationship, RelationshipType};
use crate::persist::BatchOp;
use crate::proposal::{
    AppliedInfo, Operation, ProposalDraft, ProposalId, ProposalStatus, RESERVED_FIELD_KEYS,
    RevisionId,
};

use super::{ContextStore, StoreState, node_record, proposal_record};

// ---------------------------------------------------------------------------
// ApplyOutcome
// ---------------------------------------------------------------------------

/// What an apply (or an idempotent re-apply) produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub proposal: ProposalId,
    pub previous_revision: RevisionId,
    pub revision: RevisionId,
    pub applied_at: DateTime<Utc>,
    pub applied_by: String,
}

impl ApplyOutcome {
    fn from_applied(id: &ProposalId, info: &AppliedInfo) -> Self {
        Self {
            proposal: id.clone(),
            previous_revision: info.previous_revision.clone(),
            revision: info.to_revision.clone(),
            applied_at: info.at,
            applied_by: info.by.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft validation (static, at submit time)
// ---------------------------------------------------------------------------

/// Checks that need no store state: operation shape and field keys.
/// Referential integrity is re-validated against live state at apply.
pub(crate) fn validate_draft(draft: &ProposalDraft) -> Result<(), StoreError> {
    if draft.operations.is_empty() {
        return Err(StoreError::InvalidOperation {
            index: 0,
            reason: "a proposal must contain at least one operation".to_string(),
        });
    }
    for (index, op) in draft.operations.iter().enumerate() {
        match op {
            Operation::Create { node } => {
                if node.title.trim().is_empty() {
                    return Err(invalid(index, "created nodes must have a title"));
                }
            }
            Operation::Update { changes, .. } => {
                if changes.is_empty() {
                    return Err(invalid(index, "update touches no fields"));
                }
                for key in changes.fields.keys() {
                    if RESERVED_FIELD_KEYS.contains(&key.as_str()) {
                        return Err(invalid(
                            index,
                            &format!("'{key}' is a shared field, not a kind-specific one"),
                        ));
                    }
                }
            }
            Operation::DeleteText { start, end, .. } => {
                if start > end {
                    return Err(invalid(index, "delete-text range start exceeds end"));
                }
            }
            Operation::Move {
                node, new_parent, ..
            } => {
                if new_parent.as_ref() == Some(node) {
                    return Err(invalid(index, "a node cannot be its own parent"));
                }
            }
            Operation::Delete { .. }
            | Operation::StatusChange { .. }
            | Operation::InsertText { .. } => {}
        }
    }
    Ok(())
}

fn invalid(index: usize, reason: &str) -> StoreError {
    StoreError::InvalidOperation {
        index,
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// ApplyBuffer — the all-or-nothing overlay
// ---------------------------------------------------------------------------

/// Staged copies of every node an apply will commit. Operations validate
/// and mutate the buffer; the arena is untouched until every operation
/// has succeeded.
#[derive(Default)]
struct ApplyBuffer {
    staged: BTreeMap<NodeId, Node>,
    created: BTreeSet<NodeId>,
}

impl ApplyBuffer {
    fn exists(&self, state: &StoreState, id: &NodeId) -> bool {
        self.staged.contains_key(id) || state.node(id).is_some()
    }

    fn resolve<'a>(&'a self, state: &'a StoreState, id: &NodeId) -> Option<&'a Node> {
        self.staged.get(id).or_else(|| state.node(id))
    }

    /// Stage a live node for mutation (copy-on-first-touch).
    fn stage_mut(&mut self, state: &StoreState, id: &NodeId) -> Option<&mut Node> {
        if !self.staged.contains_key(id) {
            let node = state.node(id)?.clone();
            self.staged.insert(id.clone(), node);
        }
        self.staged.get_mut(id)
    }
}

// ---------------------------------------------------------------------------
// apply_proposal
// ---------------------------------------------------------------------------

/// See the module docs for the step-by-step contract.
#[instrument(skip(store, actor), fields(actor = %actor.actor_id))]
pub(crate) fn apply_proposal(
    store: &ContextStore,
    id: &ProposalId,
    actor: &ActorContext,
) -> Result<ApplyOutcome, StoreError> {
    if let Err(denied) = actor.require_apply() {
        store.emit_audit(actor, StoreAction::Apply, id.as_str(), AuditOutcome::Denied);
        return Err(denied);
    }

    // Snapshot for the policy call; everything is re-checked under the
    // write lock afterwards.
    let snapshot = store.get_proposal(id)?;
    if let Some(info) = &snapshot.applied {
        return Ok(ApplyOutcome::from_applied(id, info));
    }
    if snapshot.status != ProposalStatus::Accepted {
        store.emit_audit(actor, StoreAction::Apply, id.as_str(), AuditOutcome::Failed);
        return Err(StoreError::InvalidTransition {
            id: id.clone(),
            from: snapshot.status,
            to: ProposalStatus::Applied,
            reason: "only accepted proposals can be applied",
        });
    }

    let decision = store.policy().evaluate(actor, &snapshot, StoreAction::Apply);
    if !decision.allowed {
        store.emit_audit(actor, StoreAction::Apply, id.as_str(), AuditOutcome::Denied);
        return Err(StoreError::PolicyViolation {
            action: StoreAction::Apply.as_str(),
            violations: decision.violations,
        });
    }

    let now = Utc::now();

    // ---- critical section -------------------------------------------------
    let (outcome, batch, superseded) = {
        let mut state = store.write_state();

        let proposal = state
            .proposals
            .get(id)
            .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))?;
        if let Some(info) = &proposal.applied {
            return Ok(ApplyOutcome::from_applied(id, info));
        }
        if proposal.status != ProposalStatus::Accepted {
            let from = proposal.status;
            drop(state);
            store.emit_audit(actor, StoreAction::Apply, id.as_str(), AuditOutcome::Failed);
            return Err(StoreError::InvalidTransition {
                id: id.clone(),
                from,
                to: ProposalStatus::Applied,
                reason: "only accepted proposals can be applied",
            });
        }

        // Optimistic lock: every base version must still hold.
        let stale = proposal.base_versions.iter().find_map(|(node, base)| {
            let current = state.version_of(node).unwrap_or(0);
            (current != *base).then(|| (node.clone(), *base, current))
        });
        if let Some((node, base, current)) = stale {
            drop(state);
            store.emit_audit(actor, StoreAction::Apply, id.as_str(), AuditOutcome::Failed);
            return Err(StoreError::StaleProposal {
                proposal: id.clone(),
                node,
                base,
                current,
            });
        }

        // Validate and stage every operation before any node mutates.
        let operations = proposal.operations.clone();
        let mut buffer = ApplyBuffer::default();
        for (index, op) in operations.iter().enumerate() {
            if let Err(err) = stage_operation(&state, &mut buffer, index, op, actor, now) {
                drop(state);
                store.emit_audit(actor, StoreAction::Apply, id.as_str(), AuditOutcome::Failed);
                return Err(err);
            }
        }

        // Commit: exactly one version bump per touched pre-existing node.
        let mut touched: BTreeMap<NodeId, u64> = BTreeMap::new();
        let staged: Vec<(NodeId, Node)> = buffer.staged.into_iter().collect();
        for (node_id, mut node) in staged {
            if buffer.created.contains(&node_id) {
                touched.insert(node_id.clone(), node.metadata.version);
                state.insert_node(node);
            } else {
                let live_version = state.version_of(&node_id).unwrap_or(0);
                node.metadata.version = live_version + 1;
                node.metadata.modified_at = now;
                node.metadata.modified_by = actor.actor_id.clone();
                touched.insert(node_id.clone(), node.metadata.version);
                if let Some(slot) = state.node_mut(&node_id) {
                    *slot = node;
                }
            }
        }

        state.rebuild_referenced_by();

        let previous = state.head.clone();
        let revision = RevisionId::derive(&previous, id, &touched);
        state.head = revision.clone();

        let supersedes = {
            let proposal = state
                .proposals
                .get_mut(id)
                .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))?;
            proposal.status = ProposalStatus::Applied;
            proposal.applied = Some(AppliedInfo {
                at: now,
                by: actor.actor_id.clone(),
                from_proposal: None,
                to_revision: revision.clone(),
                previous_revision: previous.clone(),
            });
            proposal.supersedes.clone()
        };

        // An applied superseder marks its still-open target superseded
        // rather than silently leaving it open.
        let mut superseded = None;
        if let Some(target_id) = supersedes {
            if let Some(target) = state.proposals.get_mut(&target_id) {
                if target.status == ProposalStatus::Open {
                    target.status = ProposalStatus::Superseded;
                    target.decided_at = Some(now);
                    superseded = Some(target.clone());
                }
            }
        }

        // Build the durable batch while the state is still consistent.
        let mut batch = Vec::with_capacity(touched.len() + 3);
        for node_id in touched.keys() {
            if let Some(node) = state.node(node_id) {
                batch.push(BatchOp::Put(node_record(node)?));
            }
        }
        let applied_proposal = state
            .proposals
            .get(id)
            .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))?;
        batch.push(BatchOp::Put(proposal_record(applied_proposal)?));
        if let Some(target) = &superseded {
            batch.push(BatchOp::Put(proposal_record(target)?));
        }
        batch.push(BatchOp::Put(crate::persist::Record {
            key: crate::persist::RecordKey::new(crate::persist::RecordKind::Meta, "head"),
            value: serde_json::json!({ "revision": revision.as_str() }),
        }));

        let outcome = ApplyOutcome {
            proposal: id.clone(),
            previous_revision: previous,
            revision,
            applied_at: now,
            applied_by: actor.actor_id.clone(),
        };
        (outcome, batch, superseded)
    };
    // ---- end critical section ---------------------------------------------

    if let Err(err) = store.records().apply_batch(&batch) {
        // In-memory state has committed; durability did not. Surface the
        // failure — the caller decides whether to retry the batch.
        warn!(proposal = %id, error = %err, "durable batch failed after commit");
        store.emit_audit(actor, StoreAction::Apply, id.as_str(), AuditOutcome::Failed);
        return Err(err.into());
    }

    store.emit_audit(actor, StoreAction::Apply, id.as_str(), AuditOutcome::Allowed);
    if let Some(target) = &superseded {
        store.emit_audit(
            actor,
            StoreAction::Supersede,
            target.id.as_str(),
            AuditOutcome::Allowed,
        );
    }
    info!(proposal = %id, revision = %outcome.revision, "proposal applied");
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Operation staging
// ---------------------------------------------------------------------------

fn stage_operation(
    state: &StoreState,
    buffer: &mut ApplyBuffer,
    index: usize,
    op: &Operation,
    actor: &ActorContext,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    match op {
        Operation::Create { node: draft } => {
            if buffer.exists(state, &draft.id) {
                return Err(invalid(
                    index,
                    &format!("node {} already exists", draft.id),
                ));
            }
            // Edge targets must already exist — or have been created
            // earlier in this proposal's operation order.
            for rel in &draft.relationships {
                if !buffer.exists(state, &rel.target) {
                    return Err(invalid(
                        index,
                        &format!("relationship target {} does not exist", rel.target),
                    ));
                }
            }
            let mut metadata = NodeMetadata::created(actor.actor_id.clone(), now);
            metadata.tags = draft.tags.clone();
            let node = Node {
                id: draft.id.clone(),
                body: draft.body.clone(),
                status: NodeStatus::Accepted,
                title: draft.title.clone(),
                content: draft.content.clone(),
                description: draft.description.clone(),
                metadata,
                relationships: draft.relationships.clone(),
                referenced_by: Vec::new(),
            };
            buffer.created.insert(draft.id.clone());
            buffer.staged.insert(draft.id.clone(), node);
            Ok(())
        }

        Operation::Update { node: id, changes } => {
            // Validate replacement edges against the overlay before
            // staging the node itself.
            if let Some(relationships) = &changes.relationships {
                for rel in relationships {
                    if !buffer.exists(state, &rel.target) {
                        return Err(invalid(
                            index,
                            &format!("relationship target {} does not exist", rel.target),
                        ));
                    }
                }
            }
            let merged_body = {
                let node = buffer
                    .resolve(state, id)
                    .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
                if changes.fields.is_empty() {
                    None
                } else {
                    Some(
                        node.body
                            .merge_fields(&changes.fields)
                            .map_err(|reason| invalid(index, &reason))?,
                    )
                }
            };
            let node = buffer
                .stage_mut(state, id)
                .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
            if let Some(title) = &changes.title {
                node.title = title.clone();
            }
            if let Some(content) = &changes.content {
                node.content = content.clone();
            }
            if let Some(description) = &changes.description {
                node.description = Some(description.clone());
            }
            if let Some(tags) = &changes.tags {
                node.metadata.tags = tags.clone();
            }
            if let Some(relationships) = &changes.relationships {
                node.relationships = relationships.clone();
            }
            if let Some(body) = merged_body {
                node.body = body;
            }
            Ok(())
        }

        Operation::Delete { node: id } => {
            let node = buffer
                .stage_mut(state, id)
                .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
            // Retained with a terminal status for provenance; nothing is
            // ever physically removed.
            node.status = NodeStatus::Superseded;
            Ok(())
        }

        Operation::StatusChange { node: id, status } => {
            let node = buffer
                .stage_mut(state, id)
                .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
            if node.status == *status {
                return Err(invalid(
                    index,
                    &format!("node {id} already has status {status}"),
                ));
            }
            node.status = *status;
            Ok(())
        }

        Operation::InsertText {
            node: id,
            offset,
            text,
        } => {
            let node = buffer
                .stage_mut(state, id)
                .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
            let Some(byte) = char_to_byte(&node.content, *offset) else {
                return Err(invalid(
                    index,
                    &format!("insert offset {offset} is past the end of content"),
                ));
            };
            node.content.insert_str(byte, text);
            Ok(())
        }

        Operation::DeleteText {
            node: id,
            start,
            end,
        } => {
            let node = buffer
                .stage_mut(state, id)
                .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
            if start > end {
                return Err(invalid(index, "delete-text range start exceeds end"));
            }
            let (Some(start_byte), Some(end_byte)) = (
                char_to_byte(&node.content, *start),
                char_to_byte(&node.content, *end),
            ) else {
                return Err(invalid(
                    index,
                    &format!("delete range {start}..{end} is out of bounds"),
                ));
            };
            node.content.replace_range(start_byte..end_byte, "");
            Ok(())
        }

        Operation::Move {
            node: id,
            new_parent,
        } => {
            if !buffer.exists(state, id) {
                return Err(StoreError::NodeNotFound(id.clone()));
            }
            if let Some(parent_id) = new_parent {
                if !buffer.exists(state, parent_id) {
                    return Err(StoreError::NodeNotFound(parent_id.clone()));
                }
                if parent_id == id {
                    return Err(invalid(index, "a node cannot be its own parent"));
                }
                // The proposed parent must not be a descendant of the
                // node being moved: walk its parent chain with a visited
                // set (the graph may already be cyclic elsewhere).
                if ancestor_chain_reaches(state, buffer, parent_id, id) {
                    return Err(StoreError::CycleDetected {
                        node: id.clone(),
                        parent: parent_id.clone(),
                    });
                }
            }
            let node = buffer
                .stage_mut(state, id)
                .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
            node.relationships
                .retain(|rel| rel.rel_type != RelationshipType::ParentChild);
            if let Some(parent_id) = new_parent {
                node.relationships.push(Relationship::new(
                    RelationshipType::ParentChild,
                    parent_id.clone(),
                ));
            }
            Ok(())
        }
    }
}

/// Whether `target` is reachable from `start` by following parent edges
/// (the containment edge a child holds toward its parent).
fn ancestor_chain_reaches(
    state: &StoreState,
    buffer: &ApplyBuffer,
    start: &NodeId,
    target: &NodeId,
) -> bool {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![start.clone()];
    while let Some(current) = stack.pop() {
        if &current == target {
            return true;
        }
        if !visited.insert(current.clone()) {
            continue;
        }
        if let Some(node) = buffer.resolve(state, &current) {
            for rel in node.relationships_of(RelationshipType::ParentChild) {
                stack.push(rel.target.clone());
            }
        }
    }
    false
}

/// Byte index of the `chars`-th character; `Some(len)` when `chars` equals
/// the character count, `None` past the end.
fn char_to_byte(s: &str, chars: usize) -> Option<usize> {
    if chars == 0 {
        return Some(0);
    }
    let mut seen = 0usize;
    for (byte_idx, _) in s.char_indices() {
        if seen == chars {
            return Some(byte_idx);
        }
        seen += 1;
    }
    // chars may address one past the final character (append position).
    (seen == chars).then_some(s.len())
}
