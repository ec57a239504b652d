//! Proposals, reviews, and the proposal lifecycle state machine.
//!
//! A proposal is an ordered batch of [`Operation`]s plus the base versions
//! of every existing node it touches. Proposals are the only path to
//! mutating accepted truth: they are created open, transition exactly once
//! to accepted/rejected/withdrawn (or superseded, when a superseding
//! proposal applies first), and only an accepted proposal can be applied.

pub mod operation;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::node_id::NodeId;

pub use operation::{NodeChanges, NodeDraft, Operation, OperationKind, RESERVED_FIELD_KEYS};

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Workspace-scoped proposal identifier.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProposalId(String);

impl ProposalId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProposalId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

/// Workspace-scoped review identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(String);

impl ReviewId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RevisionId
// ---------------------------------------------------------------------------

/// Identifier of one committed store revision, in `blake3:<hex>` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    /// The revision of an empty store, before any proposal applied.
    #[must_use]
    pub fn genesis(workspace: &str) -> Self {
        let hash = blake3::hash(format!("genesis:{workspace}").as_bytes());
        Self(format!("blake3:{}", hash.to_hex()))
    }

    /// Derive the successor revision from the predecessor, the applying
    /// proposal, and the `(node, new version)` pairs it committed.
    #[must_use]
    pub fn derive(
        previous: &Self,
        proposal: &ProposalId,
        touched: &BTreeMap<NodeId, u64>,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(previous.0.as_bytes());
        hasher.update(proposal.as_str().as_bytes());
        for (node, version) in touched {
            hasher.update(node.to_string().as_bytes());
            hasher.update(&version.to_le_bytes());
        }
        Self(format!("blake3:{}", hasher.finalize().to_hex()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ProposalStatus
// ---------------------------------------------------------------------------

/// The proposal lifecycle states.
///
/// `accepted` is distinct from `applied`: review admits a proposal, apply
/// commits it. `superseded` is entered when a proposal that declares it
/// supersedes this one is applied while this one is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Open,
    Accepted,
    Rejected,
    Withdrawn,
    Superseded,
    Applied,
}

/// Error returned when a proposal transition is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: ProposalStatus,
    pub to: ProposalStatus,
    pub reason: &'static str,
}

impl ProposalStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
            Self::Superseded => "superseded",
            Self::Applied => "applied",
        }
    }

    /// Terminal states admit no further transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Withdrawn | Self::Superseded | Self::Applied
        )
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// Valid transitions:
    /// - `open -> accepted` (review accept)
    /// - `open -> rejected` (review reject)
    /// - `open -> withdrawn` (author withdraw)
    /// - `open -> superseded` (a superseding proposal applied)
    /// - `accepted -> applied` (apply)
    pub fn can_transition_to(self, target: Self) -> Result<(), InvalidTransition> {
        if self == target {
            return Err(InvalidTransition {
                from: self,
                to: target,
                reason: "no-op transition is not allowed",
            });
        }

        let allowed = matches!(
            (self, target),
            (Self::Open, Self::Accepted)
                | (Self::Open, Self::Rejected)
                | (Self::Open, Self::Withdrawn)
                | (Self::Open, Self::Superseded)
                | (Self::Accepted, Self::Applied)
        );

        if allowed {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self,
                to: target,
                reason: "transition not allowed by lifecycle rules",
            })
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// Review verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewAction {
    Accept,
    Reject,
    /// Leaves the proposal open; recorded for the author to act on.
    RequestChanges,
}

impl ReviewAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::RequestChanges => "request-changes",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded review of a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub proposal_id: ProposalId,
    pub reviewer: String,
    pub action: ReviewAction,
    /// Indices into the proposal's operation list for partial review.
    /// `None` reviews the whole proposal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_ids: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub at: DateTime<Utc>,
}

/// A free-form comment on a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

/// Apply provenance, recorded once when the proposal commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedInfo {
    pub at: DateTime<Utc>,
    pub by: String,
    /// Set when this proposal was produced by merging others.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_proposal: Option<ProposalId>,
    pub to_revision: RevisionId,
    pub previous_revision: RevisionId,
}

/// An ordered batch of operations awaiting (or past) review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub status: ProposalStatus,
    pub operations: Vec<Operation>,
    /// Per touched existing node: the version the proposal was created
    /// against. Apply verifies these still hold (optimistic lock).
    pub base_versions: BTreeMap<NodeId, u64>,
    /// Explicit authored supersession of another proposal; never inferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<ProposalId>,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied: Option<AppliedInfo>,
}

impl Proposal {
    /// Every node this proposal touches: primary targets plus move
    /// destinations. (The *old* parent of a move is resolved against live
    /// state during apply and counted as touched there.)
    #[must_use]
    pub fn touched_nodes(&self) -> BTreeSet<NodeId> {
        let mut nodes = BTreeSet::new();
        for op in &self.operations {
            nodes.insert(op.target().clone());
            if let Some(secondary) = op.secondary_target() {
                nodes.insert(secondary.clone());
            }
        }
        nodes
    }

    /// Merged `(field key → intended value)` map per node. When several
    /// operations in this proposal touch the same field of the same node,
    /// the later operation's intent wins (operations apply in order).
    #[must_use]
    pub fn field_intents(&self) -> BTreeMap<NodeId, BTreeMap<String, serde_json::Value>> {
        let mut per_node: BTreeMap<NodeId, BTreeMap<String, serde_json::Value>> = BTreeMap::new();
        for op in &self.operations {
            let intents = op.field_intents();
            if intents.is_empty() {
                continue;
            }
            per_node
                .entry(op.target().clone())
                .or_default()
                .extend(intents);
        }
        per_node
    }

    /// The operation kinds this proposal uses against `node`.
    #[must_use]
    pub fn operation_kinds_for(&self, node: &NodeId) -> BTreeSet<OperationKind> {
        self.operations
            .iter()
            .filter(|op| op.target() == node || op.secondary_target() == Some(node))
            .map(Operation::kind)
            .collect()
    }

    /// Whether any operation against `node` is structural.
    #[must_use]
    pub fn touches_structurally(&self, node: &NodeId) -> bool {
        self.operations
            .iter()
            .any(|op| (op.target() == node || op.secondary_target() == Some(node)) && op.is_structural())
    }
}

/// Caller input to `submit`: the store assigns id, author, timestamps, and
/// records base versions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub operations: Vec<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<ProposalId>,
}
