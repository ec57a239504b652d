//! The context store: one workspace's accepted truth plus its proposals.
//!
//! # Overview
//!
//! Nodes live in a dense arena (`Vec<Node>` + id index) — adjacency is
//! read off relationship lists, never pointer chains. All mutation flows
//! through the proposal lifecycle: [`ContextStore::submit`] →
//! [`ContextStore::review`] → [`ContextStore::apply`]. Reads (`get`,
//! queries, traversals) run against the committed snapshot behind a
//! shared read lock; apply is the only writer.
//!
//! # Scope
//!
//! A store instance is bound to exactly one [`WorkspaceId`] at
//! construction. No API accepts a foreign workspace, so cross-workspace
//! access is structurally impossible.

pub mod apply;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, info};

use crate::access::{
    ActorContext, AllowAllPolicy, AuditEvent, AuditOutcome, AuditSink, PolicyGate, StoreAction,
    TracingAudit,
};
use crate::config::StoreConfig;
use crate::conflict::{self, Conflict};
use crate::conflict::merge::{MergeOutcome, merge_proposals};
use crate::error::StoreError;
use crate::graph::GraphView;
use crate::graph::reasoning::{
    DecisionRationale, DecisionReasoningOptions, DiscoverOptions, ReasonedPage,
    RelatedNode, RelatednessScorer, ReasoningOptions,
};
use crate::graph::traverse::{ContextChainOptions, PathStep, ReasoningChain, TraversalOptions};
use crate::model::node::Node;
use crate::model::node_id::{NodeId, WorkspaceId};
use crate::model::relationship::RelationshipType;
use crate::persist::{BatchOp, MemoryRecordStore, PersistError, Record, RecordKey, RecordKind, RecordStore};
use crate::proposal::{
    Comment, Proposal, ProposalDraft, ProposalId, ProposalStatus, Review, ReviewAction, ReviewId,
    RevisionId,
};
use crate::query::{NodeQuery, QueryPage};

pub use apply::ApplyOutcome;

// ---------------------------------------------------------------------------
// StoreState
// ---------------------------------------------------------------------------

/// The committed state behind the lock: arena, proposals, reviews, head.
pub(crate) struct StoreState {
    pub(crate) nodes: Vec<Node>,
    pub(crate) index: HashMap<NodeId, usize>,
    pub(crate) proposals: BTreeMap<ProposalId, Proposal>,
    pub(crate) reviews: Vec<Review>,
    pub(crate) head: RevisionId,
}

impl StoreState {
    fn new(workspace: &WorkspaceId) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            proposals: BTreeMap::new(),
            reviews: Vec::new(),
            head: RevisionId::genesis(workspace.as_str()),
        }
    }

    pub(crate) fn node(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).map(|&slot| &self.nodes[slot])
    }

    pub(crate) fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        match self.index.get(id) {
            Some(&slot) => self.nodes.get_mut(slot),
            None => None,
        }
    }

    pub(crate) fn version_of(&self, id: &NodeId) -> Option<u64> {
        self.node(id).map(|n| n.metadata.version)
    }

    /// Insert a node into the arena. The id must be absent.
    pub(crate) fn insert_node(&mut self, node: Node) {
        let slot = self.nodes.len();
        self.index.insert(node.id.clone(), slot);
        self.nodes.push(node);
    }

    /// Recompute the derived `referenced_by` index for every node.
    ///
    /// Full recompute keeps the index trivially consistent with committed
    /// edges; the arena is scanned once per apply. Sources are sorted so
    /// the index is deterministic.
    pub(crate) fn rebuild_referenced_by(&mut self) {
        let mut reverse: HashMap<NodeId, BTreeSet<NodeId>> = HashMap::new();
        for node in &self.nodes {
            for rel in &node.relationships {
                reverse
                    .entry(rel.target.clone())
                    .or_default()
                    .insert(node.id.clone());
            }
        }
        for node in &mut self.nodes {
            node.referenced_by = reverse
                .remove(&node.id)
                .map(|set| set.into_iter().collect())
                .unwrap_or_default();
        }
    }

    /// Currently open proposals, excluding `except`.
    pub(crate) fn open_proposals_except(&self, except: &ProposalId) -> Vec<&Proposal> {
        self.proposals
            .values()
            .filter(|p| p.status == ProposalStatus::Open && &p.id != except)
            .collect()
    }

    /// Base versions for every existing node a draft touches. Nodes the
    /// draft creates have no base version.
    fn base_versions_for(&self, operations: &[crate::proposal::Operation]) -> BTreeMap<NodeId, u64> {
        let mut bases = BTreeMap::new();
        for op in operations {
            for target in std::iter::once(op.target()).chain(op.secondary_target()) {
                if let Some(version) = self.version_of(target) {
                    bases.insert(target.clone(), version);
                }
            }
        }
        bases
    }
}

// ---------------------------------------------------------------------------
// ContextStore
// ---------------------------------------------------------------------------

/// The governed graph store for one workspace.
pub struct ContextStore {
    workspace: WorkspaceId,
    config: StoreConfig,
    policy: Arc<dyn PolicyGate>,
    audit: Arc<dyn AuditSink>,
    records: Arc<dyn RecordStore>,
    proposal_seq: AtomicU64,
    review_seq: AtomicU64,
    state: RwLock<StoreState>,
}

impl ContextStore {
    /// A store with default collaborators: allow-all policy, tracing
    /// audit, in-memory records.
    #[must_use]
    pub fn new(workspace: WorkspaceId) -> Self {
        let state = StoreState::new(&workspace);
        Self {
            workspace,
            config: StoreConfig::default(),
            policy: Arc::new(AllowAllPolicy),
            audit: Arc::new(TracingAudit),
            records: Arc::new(MemoryRecordStore::new()),
            proposal_seq: AtomicU64::new(0),
            review_seq: AtomicU64::new(0),
            state: RwLock::new(state),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn PolicyGate>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn with_records(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = records;
        self
    }

    #[must_use]
    pub fn workspace(&self) -> &WorkspaceId {
        &self.workspace
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetch a node by id, whatever its status.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` when no node with this id exists.
    pub fn get(&self, id: &NodeId) -> Result<Node, StoreError> {
        self.read_state()
            .node(id)
            .cloned()
            .ok_or_else(|| StoreError::NodeNotFound(id.clone()))
    }

    /// Fetch a proposal by id.
    ///
    /// # Errors
    ///
    /// `ProposalNotFound` when no proposal with this id exists.
    pub fn get_proposal(&self, id: &ProposalId) -> Result<Proposal, StoreError> {
        self.read_state()
            .proposals
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))
    }

    /// All recorded reviews of one proposal, in submission order.
    #[must_use]
    pub fn reviews_for(&self, id: &ProposalId) -> Vec<Review> {
        self.read_state()
            .reviews
            .iter()
            .filter(|r| &r.proposal_id == id)
            .cloned()
            .collect()
    }

    /// The current committed revision.
    #[must_use]
    pub fn head_revision(&self) -> RevisionId {
        self.read_state().head.clone()
    }

    /// Filter, sort, and paginate nodes. See [`NodeQuery`] for the filter
    /// surface; unfiltered status defaults to accepted-only.
    #[must_use]
    pub fn query_nodes(&self, query: &NodeQuery) -> QueryPage {
        let state = self.read_state();
        crate::query::run(&state, &self.config.query, query)
    }

    // -----------------------------------------------------------------------
    // Traversals (read-only)
    // -----------------------------------------------------------------------

    /// Follow an explicit ordered sequence of typed steps from `start`.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` when `start` does not exist.
    pub fn traverse_reasoning_chain(
        &self,
        start: &NodeId,
        path: &[PathStep],
        options: &TraversalOptions,
    ) -> Result<ReasoningChain, StoreError> {
        let state = self.read_state();
        let view = GraphView::new(&state);
        crate::graph::traverse::traverse_reasoning_chain(
            &view,
            start,
            path,
            options,
            &self.config.traversal,
        )
    }

    /// Walk relationship types in sequence, stopping early on the caller's
    /// stop kinds; context is grouped by category.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` when `start` does not exist.
    pub fn build_context_chain(
        &self,
        start: &NodeId,
        sequence: &[RelationshipType],
        options: &ContextChainOptions,
    ) -> Result<ReasoningChain, StoreError> {
        let state = self.read_state();
        let view = GraphView::new(&state);
        crate::graph::traverse::build_context_chain(
            &view,
            start,
            sequence,
            options,
            &self.config.traversal,
        )
    }

    /// The fixed rationale recipe for decision nodes: motivating goals,
    /// preserved alternatives, implementing tasks, risks, constraints.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` when the decision does not exist; `InvalidOperation`
    /// when the node is not a decision.
    pub fn follow_decision_reasoning(
        &self,
        decision: &NodeId,
        options: &DecisionReasoningOptions,
    ) -> Result<DecisionRationale, StoreError> {
        let state = self.read_state();
        let view = GraphView::new(&state);
        crate::graph::reasoning::follow_decision_reasoning(&view, decision, options)
    }

    /// Multi-hop neighbor discovery, optionally scored by a pluggable
    /// relatedness scorer.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` when the origin does not exist.
    pub fn discover_related_reasoning(
        &self,
        origin: &NodeId,
        options: &DiscoverOptions,
        scorer: Option<&dyn RelatednessScorer>,
    ) -> Result<Vec<RelatedNode>, StoreError> {
        let state = self.read_state();
        let view = GraphView::new(&state);
        crate::graph::reasoning::discover_related_reasoning(
            &view,
            origin,
            options,
            scorer,
            &self.config.traversal,
        )
    }

    /// Run a query, then a bounded traversal from every hit.
    #[must_use]
    pub fn query_with_reasoning(
        &self,
        query: &NodeQuery,
        reasoning: &ReasoningOptions,
    ) -> ReasonedPage {
        let state = self.read_state();
        crate::graph::reasoning::query_with_reasoning(
            &state,
            &self.config.query,
            query,
            reasoning,
            &self.config.traversal,
        )
    }

    // -----------------------------------------------------------------------
    // Conflict engine entry points
    // -----------------------------------------------------------------------

    /// Compare one proposal's touched `(node, field)` pairs against every
    /// other open proposal.
    ///
    /// # Errors
    ///
    /// `ProposalNotFound` when the proposal does not exist.
    pub fn detect_conflicts(&self, id: &ProposalId) -> Result<Vec<Conflict>, StoreError> {
        let state = self.read_state();
        let proposal = state
            .proposals
            .get(id)
            .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))?;
        let others = state.open_proposals_except(id);
        Ok(conflict::detect(proposal, &others))
    }

    /// Merge the field intents of several proposals. Never mutates store
    /// state: the outcome seeds a new proposal.
    ///
    /// # Errors
    ///
    /// `ProposalNotFound` when any id does not exist.
    pub fn merge_open_proposals(&self, ids: &[ProposalId]) -> Result<MergeOutcome, StoreError> {
        let state = self.read_state();
        let mut proposals = Vec::with_capacity(ids.len());
        for id in ids {
            proposals.push(
                state
                    .proposals
                    .get(id)
                    .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))?,
            );
        }
        Ok(merge_proposals(&proposals))
    }

    /// True iff any touched node's current version differs from the
    /// proposal's recorded base version.
    ///
    /// # Errors
    ///
    /// `ProposalNotFound` when the proposal does not exist.
    pub fn is_proposal_stale(&self, id: &ProposalId) -> Result<bool, StoreError> {
        let state = self.read_state();
        let proposal = state
            .proposals
            .get(id)
            .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))?;
        Ok(conflict::is_stale(proposal, |node| state.version_of(node)))
    }

    /// Re-record an open proposal's base versions against current state,
    /// clearing staleness. Author only.
    ///
    /// # Errors
    ///
    /// `ProposalNotFound`, `PermissionDenied` (not the author), or
    /// `InvalidTransition` (proposal no longer open).
    pub fn refresh_base_versions(
        &self,
        id: &ProposalId,
        actor: &ActorContext,
    ) -> Result<Proposal, StoreError> {
        let mut state = self.write_state();
        let bases = {
            let proposal = state
                .proposals
                .get(id)
                .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))?;
            if proposal.author != actor.actor_id {
                return Err(StoreError::PermissionDenied {
                    actor: actor.actor_id.clone(),
                    reason: "only the author may refresh base versions".to_string(),
                });
            }
            if proposal.status != ProposalStatus::Open {
                return Err(StoreError::InvalidTransition {
                    id: id.clone(),
                    from: proposal.status,
                    to: ProposalStatus::Open,
                    reason: "base versions can only be refreshed while open",
                });
            }
            state.base_versions_for(&proposal.operations)
        };
        let proposal = state
            .proposals
            .get_mut(id)
            .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))?;
        proposal.base_versions = bases;
        let refreshed = proposal.clone();
        drop(state);
        self.persist_proposal(&refreshed)?;
        Ok(refreshed)
    }

    // -----------------------------------------------------------------------
    // Proposal lifecycle
    // -----------------------------------------------------------------------

    /// Open a proposal: validate its operations statically, record base
    /// versions for every existing node it touches, and admit it to the
    /// open set.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` (missing contributor role), `PolicyViolation`,
    /// or `InvalidOperation` for statically malformed operations.
    pub fn submit(
        &self,
        draft: ProposalDraft,
        actor: &ActorContext,
    ) -> Result<Proposal, StoreError> {
        actor.require_submit()?;
        apply::validate_draft(&draft)?;

        let id = ProposalId::new(format!(
            "p-{:06}",
            self.proposal_seq.fetch_add(1, Ordering::SeqCst) + 1
        ));
        let now = Utc::now();

        let provisional = {
            let state = self.read_state();
            Proposal {
                id: id.clone(),
                status: ProposalStatus::Open,
                base_versions: state.base_versions_for(&draft.operations),
                operations: draft.operations,
                supersedes: draft.supersedes,
                author: actor.actor_id.clone(),
                rationale: draft.rationale,
                created_at: now,
                decided_at: None,
                comments: Vec::new(),
                applied: None,
            }
        };

        let decision = self
            .policy
            .evaluate(actor, &provisional, StoreAction::Submit);
        if !decision.allowed {
            self.emit_audit(actor, StoreAction::Submit, id.as_str(), AuditOutcome::Denied);
            return Err(StoreError::PolicyViolation {
                action: StoreAction::Submit.as_str(),
                violations: decision.violations,
            });
        }

        let proposal = {
            let mut state = self.write_state();
            // Base versions are re-read under the write lock so an apply
            // racing between the snapshots cannot leave them behind.
            let mut proposal = provisional;
            proposal.base_versions = state.base_versions_for(&proposal.operations);
            state.proposals.insert(id.clone(), proposal.clone());
            proposal
        };

        self.persist_proposal(&proposal)?;
        self.emit_audit(actor, StoreAction::Submit, id.as_str(), AuditOutcome::Allowed);
        info!(proposal = %id, author = %actor.actor_id, ops = proposal.operations.len(), "proposal submitted");
        Ok(proposal)
    }

    /// Record a review verdict. `accept`/`reject` transition the proposal;
    /// `request-changes` records the review and leaves it open.
    ///
    /// # Errors
    ///
    /// `ProposalNotFound`, `PermissionDenied` (role or agent block),
    /// `PolicyViolation`, or `InvalidTransition` when the proposal is not
    /// open.
    pub fn review(
        &self,
        id: &ProposalId,
        action: ReviewAction,
        actor: &ActorContext,
        operation_ids: Option<Vec<usize>>,
        comment: Option<String>,
    ) -> Result<Review, StoreError> {
        actor.require_review()?;

        let proposal = self.get_proposal(id)?;
        if proposal.status != ProposalStatus::Open {
            return Err(StoreError::InvalidTransition {
                id: id.clone(),
                from: proposal.status,
                to: match action {
                    ReviewAction::Accept => ProposalStatus::Accepted,
                    ReviewAction::Reject => ProposalStatus::Rejected,
                    ReviewAction::RequestChanges => ProposalStatus::Open,
                },
                reason: "only open proposals can be reviewed",
            });
        }

        let decision = self.policy.evaluate(actor, &proposal, StoreAction::Review);
        if !decision.allowed {
            self.emit_audit(actor, StoreAction::Review, id.as_str(), AuditOutcome::Denied);
            return Err(StoreError::PolicyViolation {
                action: StoreAction::Review.as_str(),
                violations: decision.violations,
            });
        }

        let now = Utc::now();
        let review = Review {
            id: ReviewId::new(format!(
                "r-{:06}",
                self.review_seq.fetch_add(1, Ordering::SeqCst) + 1
            )),
            proposal_id: id.clone(),
            reviewer: actor.actor_id.clone(),
            action,
            operation_ids,
            comment,
            at: now,
        };

        let updated = {
            let mut state = self.write_state();
            let proposal = state
                .proposals
                .get_mut(id)
                .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))?;
            // Re-check under the write lock: another reviewer may have
            // decided in between.
            if proposal.status != ProposalStatus::Open {
                return Err(StoreError::InvalidTransition {
                    id: id.clone(),
                    from: proposal.status,
                    to: ProposalStatus::Accepted,
                    reason: "only open proposals can be reviewed",
                });
            }
            match action {
                ReviewAction::Accept => {
                    proposal.status = ProposalStatus::Accepted;
                    proposal.decided_at = Some(now);
                }
                ReviewAction::Reject => {
                    proposal.status = ProposalStatus::Rejected;
                    proposal.decided_at = Some(now);
                }
                ReviewAction::RequestChanges => {}
            }
            state.reviews.push(review.clone());
            state.proposals[id].clone()
        };

        self.persist_review_batch(&updated, &review)?;
        self.emit_audit(actor, StoreAction::Review, id.as_str(), AuditOutcome::Allowed);
        debug!(proposal = %id, action = %action, reviewer = %actor.actor_id, "review recorded");
        Ok(review)
    }

    /// Withdraw an open proposal. Author only.
    ///
    /// # Errors
    ///
    /// `ProposalNotFound`, `PermissionDenied` (not the author),
    /// `PolicyViolation`, or `InvalidTransition` when not open.
    pub fn withdraw(&self, id: &ProposalId, actor: &ActorContext) -> Result<(), StoreError> {
        let proposal = self.get_proposal(id)?;
        if proposal.author != actor.actor_id {
            self.emit_audit(actor, StoreAction::Withdraw, id.as_str(), AuditOutcome::Denied);
            return Err(StoreError::PermissionDenied {
                actor: actor.actor_id.clone(),
                reason: "only the author may withdraw a proposal".to_string(),
            });
        }

        let decision = self
            .policy
            .evaluate(actor, &proposal, StoreAction::Withdraw);
        if !decision.allowed {
            self.emit_audit(actor, StoreAction::Withdraw, id.as_str(), AuditOutcome::Denied);
            return Err(StoreError::PolicyViolation {
                action: StoreAction::Withdraw.as_str(),
                violations: decision.violations,
            });
        }

        let updated = {
            let mut state = self.write_state();
            let proposal = state
                .proposals
                .get_mut(id)
                .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))?;
            proposal
                .status
                .can_transition_to(ProposalStatus::Withdrawn)
                .map_err(|e| StoreError::InvalidTransition {
                    id: id.clone(),
                    from: e.from,
                    to: e.to,
                    reason: e.reason,
                })?;
            proposal.status = ProposalStatus::Withdrawn;
            proposal.decided_at = Some(Utc::now());
            proposal.clone()
        };

        self.persist_proposal(&updated)?;
        self.emit_audit(actor, StoreAction::Withdraw, id.as_str(), AuditOutcome::Allowed);
        info!(proposal = %id, "proposal withdrawn");
        Ok(())
    }

    /// Attach a free-form comment to a proposal.
    ///
    /// # Errors
    ///
    /// `ProposalNotFound` when the proposal does not exist.
    pub fn add_comment(
        &self,
        id: &ProposalId,
        actor: &ActorContext,
        body: impl Into<String>,
    ) -> Result<(), StoreError> {
        let updated = {
            let mut state = self.write_state();
            let proposal = state
                .proposals
                .get_mut(id)
                .ok_or_else(|| StoreError::ProposalNotFound(id.clone()))?;
            proposal.comments.push(Comment {
                author: actor.actor_id.clone(),
                body: body.into(),
                at: Utc::now(),
            });
            proposal.clone()
        };
        self.persist_proposal(&updated)
    }

    /// Apply an accepted proposal: the single transactional step that
    /// turns it into mutated truth. See [`apply`] for the full contract.
    ///
    /// # Errors
    ///
    /// See [`apply::apply_proposal`].
    pub fn apply(
        &self,
        id: &ProposalId,
        actor: &ActorContext,
    ) -> Result<ApplyOutcome, StoreError> {
        apply::apply_proposal(self, id, actor)
    }

    // -----------------------------------------------------------------------
    // Shared plumbing
    // -----------------------------------------------------------------------

    pub(crate) fn emit_audit(
        &self,
        actor: &ActorContext,
        action: StoreAction,
        resource: &str,
        outcome: AuditOutcome,
    ) {
        self.audit.record(AuditEvent {
            actor: actor.actor_id.clone(),
            actor_type: actor.actor_type,
            action,
            resource: resource.to_string(),
            outcome,
            at: Utc::now(),
        });
    }

    pub(crate) fn policy(&self) -> &dyn PolicyGate {
        self.policy.as_ref()
    }

    pub(crate) fn records(&self) -> &dyn RecordStore {
        self.records.as_ref()
    }

    fn persist_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        self.records.put(proposal_record(proposal)?)?;
        Ok(())
    }

    fn persist_review_batch(
        &self,
        proposal: &Proposal,
        review: &Review,
    ) -> Result<(), StoreError> {
        let batch = vec![
            BatchOp::Put(proposal_record(proposal)?),
            BatchOp::Put(Record {
                key: RecordKey::new(RecordKind::Review, review.id.as_str()),
                value: serde_json::to_value(review)
                    .map_err(|e| PersistError::Codec(review.id.to_string(), e))?,
            }),
        ];
        self.records.apply_batch(&batch)?;
        Ok(())
    }
}

pub(crate) fn proposal_record(proposal: &Proposal) -> Result<Record, PersistError> {
    Ok(Record {
        key: RecordKey::new(RecordKind::Proposal, proposal.id.as_str()),
        value: serde_json::to_value(proposal)
            .map_err(|e| PersistError::Codec(proposal.id.to_string(), e))?,
    })
}

pub(crate) fn node_record(node: &Node) -> Result<Record, PersistError> {
    Ok(Record {
        key: RecordKey::new(RecordKind::Node, node.id.to_string()),
        value: serde_json::to_value(node)
            .map_err(|e| PersistError::Codec(node.id.to_string(), e))?,
    })
}
