//! Error taxonomy and machine-readable error codes.
//!
//! Every failure surfaced by the store maps to a stable `E####` code so
//! automated callers (review bots, reasoning agents) can branch on the code
//! instead of parsing message text.

use std::fmt;

use thiserror::Error;

use crate::model::node_id::NodeId;
use crate::proposal::{ProposalId, ProposalStatus};

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    NodeNotFound,
    ProposalNotFound,
    InvalidOperation,
    InvalidTransition,
    CycleDetected,
    StaleProposal,
    PermissionDenied,
    PolicyViolation,
    PersistenceFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::NodeNotFound => "E2001",
            Self::ProposalNotFound => "E2002",
            Self::InvalidOperation => "E2003",
            Self::InvalidTransition => "E2004",
            Self::CycleDetected => "E2005",
            Self::StaleProposal => "E3001",
            Self::PermissionDenied => "E4001",
            Self::PolicyViolation => "E4002",
            Self::PersistenceFailed => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::NodeNotFound => "Node not found",
            Self::ProposalNotFound => "Proposal not found",
            Self::InvalidOperation => "Invalid or malformed operation",
            Self::InvalidTransition => "Invalid proposal transition",
            Self::CycleDetected => "Move would create a parent cycle",
            Self::StaleProposal => "Proposal base versions are stale",
            Self::PermissionDenied => "Actor lacks the required role",
            Self::PolicyViolation => "Policy gate denied the call",
            Self::PersistenceFailed => "Durable record write failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in credo.toml and retry."),
            Self::NodeNotFound | Self::ProposalNotFound => None,
            Self::InvalidOperation => {
                Some("Validate operation targets and field values before submitting.")
            }
            Self::InvalidTransition => {
                Some("Follow valid transitions: open -> accepted/rejected/withdrawn -> applied.")
            }
            Self::CycleDetected => Some("Pick a new parent outside the node's own subtree."),
            Self::StaleProposal => {
                Some("Refresh the proposal's base versions against current state and re-review.")
            }
            Self::PermissionDenied => Some("Request the reviewer or maintainer role, or use a human actor."),
            Self::PolicyViolation => Some("Inspect the returned violations and amend the proposal."),
            Self::PersistenceFailed => Some("Check the record store is reachable and retry."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Unified error type for all store operations.
///
/// Conflicts are intentionally absent: they are data returned to the caller
/// (`Vec<Conflict>`), not failures. Re-applying an already-applied proposal
/// is a no-op, not an error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{code}: node not found: {0}", code = ErrorCode::NodeNotFound)]
    NodeNotFound(NodeId),

    #[error("{code}: proposal not found: {0}", code = ErrorCode::ProposalNotFound)]
    ProposalNotFound(ProposalId),

    #[error(
        "{code}: invalid operation #{index}: {reason}",
        code = ErrorCode::InvalidOperation
    )]
    InvalidOperation { index: usize, reason: String },

    #[error(
        "{code}: moving {node} under {parent} would create a parent cycle",
        code = ErrorCode::CycleDetected
    )]
    CycleDetected { node: NodeId, parent: NodeId },

    #[error(
        "{code}: proposal {id} cannot go from {from} to {to}: {reason}",
        code = ErrorCode::InvalidTransition
    )]
    InvalidTransition {
        id: ProposalId,
        from: ProposalStatus,
        to: ProposalStatus,
        reason: &'static str,
    },

    #[error(
        "{code}: proposal {proposal} is stale: node {node} is at version {current}, base was {base}",
        code = ErrorCode::StaleProposal
    )]
    StaleProposal {
        proposal: ProposalId,
        node: NodeId,
        base: u64,
        current: u64,
    },

    #[error(
        "{code}: actor '{actor}' denied: {reason}",
        code = ErrorCode::PermissionDenied
    )]
    PermissionDenied { actor: String, reason: String },

    #[error(
        "{code}: policy denied '{action}': {details}",
        code = ErrorCode::PolicyViolation,
        details = .violations.join("; ")
    )]
    PolicyViolation {
        action: &'static str,
        violations: Vec<String>,
    },

    #[error("{code}: {0}", code = ErrorCode::PersistenceFailed)]
    Persistence(#[from] crate::persist::PersistError),
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NodeNotFound(_) => ErrorCode::NodeNotFound,
            Self::ProposalNotFound(_) => ErrorCode::ProposalNotFound,
            Self::InvalidOperation { .. } => ErrorCode::InvalidOperation,
            Self::CycleDetected { .. } => ErrorCode::CycleDetected,
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::StaleProposal { .. } => ErrorCode::StaleProposal,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::PolicyViolation { .. } => ErrorCode::PolicyViolation,
            Self::Persistence(_) => ErrorCode::PersistenceFailed,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
