//! Actor context, RBAC gates, the policy collaborator, and audit events.
//!
//! The store does not implement policy evaluation or audit storage; it
//! defines the collaborator traits, calls the policy gate before admitting
//! review/apply/withdraw, and emits one audit event per state transition.
//!
//! Two rules are enforced here rather than delegated:
//!
//! - role checks (review needs [`Role::Reviewer`], apply needs
//!   [`Role::Maintainer`], withdraw needs authorship), and
//! - agent-typed actors are hard-blocked from review and apply regardless
//!   of role. Agents propose; humans decide.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;
use crate::proposal::Proposal;

// ---------------------------------------------------------------------------
// Actors and roles
// ---------------------------------------------------------------------------

/// Who (or what) is calling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Human,
    Agent,
    System,
}

impl ActorType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles recognized by the store gates. `Admin` implies all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Contributor,
    Reviewer,
    Maintainer,
    Admin,
}

/// Caller-supplied identity and authorization context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: String,
    pub actor_type: ActorType,
    pub roles: BTreeSet<Role>,
}

impl ActorContext {
    #[must_use]
    pub fn new(actor_id: impl Into<String>, actor_type: ActorType, roles: &[Role]) -> Self {
        Self {
            actor_id: actor_id.into(),
            actor_type,
            roles: roles.iter().copied().collect(),
        }
    }

    /// A human with every role; the usual test fixture.
    #[must_use]
    pub fn admin(actor_id: impl Into<String>) -> Self {
        Self::new(actor_id, ActorType::Human, &[Role::Admin])
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&Role::Admin) || self.roles.contains(&role)
    }

    /// Gate for submitting proposals.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when the actor lacks [`Role::Contributor`].
    pub fn require_submit(&self) -> Result<(), StoreError> {
        if self.has_role(Role::Contributor) {
            Ok(())
        } else {
            Err(self.denied("submitting a proposal requires the contributor role"))
        }
    }

    /// Gate for reviewing proposals. Agents are blocked regardless of role.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for agent actors and for actors without
    /// [`Role::Reviewer`].
    pub fn require_review(&self) -> Result<(), StoreError> {
        if matches!(self.actor_type, ActorType::Agent) {
            return Err(self.denied("agent actors may not review proposals"));
        }
        if self.has_role(Role::Reviewer) {
            Ok(())
        } else {
            Err(self.denied("reviewing requires the reviewer role"))
        }
    }

    /// Gate for applying proposals. Agents are blocked regardless of role.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for agent actors and for actors without
    /// [`Role::Maintainer`].
    pub fn require_apply(&self) -> Result<(), StoreError> {
        if matches!(self.actor_type, ActorType::Agent) {
            return Err(self.denied("agent actors may not apply proposals"));
        }
        if self.has_role(Role::Maintainer) {
            Ok(())
        } else {
            Err(self.denied("applying requires the maintainer role"))
        }
    }

    fn denied(&self, reason: &str) -> StoreError {
        StoreError::PermissionDenied {
            actor: self.actor_id.clone(),
            reason: reason.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store actions (shared by policy gate and audit)
// ---------------------------------------------------------------------------

/// The gated/audited store actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreAction {
    Submit,
    Review,
    Apply,
    Withdraw,
    Supersede,
}

impl StoreAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "proposal.submit",
            Self::Review => "proposal.review",
            Self::Apply => "proposal.apply",
            Self::Withdraw => "proposal.withdraw",
            Self::Supersede => "proposal.supersede",
        }
    }
}

impl fmt::Display for StoreAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Policy collaborator
// ---------------------------------------------------------------------------

/// Allow/deny verdict from the policy collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    #[serde(default)]
    pub violations: Vec<String>,
}

impl PolicyDecision {
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            violations: Vec::new(),
        }
    }

    #[must_use]
    pub fn deny(violations: Vec<String>) -> Self {
        Self {
            allowed: false,
            violations,
        }
    }
}

/// External policy evaluation. A deny is fatal to the gated call.
///
/// Implementations must fail fast: the orchestrator evaluates policy
/// *before* entering the apply critical section and will not re-check
/// inside it.
pub trait PolicyGate: Send + Sync {
    fn evaluate(
        &self,
        actor: &ActorContext,
        proposal: &Proposal,
        action: StoreAction,
    ) -> PolicyDecision;
}

/// Default gate: everything is allowed. RBAC checks still apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPolicy;

impl PolicyGate for AllowAllPolicy {
    fn evaluate(
        &self,
        _actor: &ActorContext,
        _proposal: &Proposal,
        _action: StoreAction,
    ) -> PolicyDecision {
        PolicyDecision::allow()
    }
}

// ---------------------------------------------------------------------------
// Audit collaborator
// ---------------------------------------------------------------------------

/// Outcome recorded in an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Allowed,
    Denied,
    Failed,
}

impl AuditOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::Failed => "failed",
        }
    }
}

/// One observable state-transition record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor: String,
    pub actor_type: ActorType,
    pub action: StoreAction,
    /// Resource the action was about (proposal id, node id).
    pub resource: String,
    pub outcome: AuditOutcome,
    pub at: DateTime<Utc>,
}

/// Receives audit events. Storage is the collaborator's concern.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Audit sink that logs through `tracing` and keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, event: AuditEvent) {
        info!(
            actor = %event.actor,
            actor_type = %event.actor_type,
            action = %event.action,
            resource = %event.resource,
            outcome = event.outcome.as_str(),
            "audit"
        );
    }
}

/// In-memory audit sink for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAudit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
