//! Proposal lifecycle integration tests: submit → review → apply, version
//! accounting, idempotent re-apply, RBAC and policy gates, withdrawal,
//! and supersession.

use std::sync::Arc;

use credo_core::access::{
    ActorContext, ActorType, AuditOutcome, MemoryAudit, PolicyDecision, PolicyGate, Role,
    StoreAction,
};
use credo_core::error::StoreError;
use credo_core::model::{NodeBody, NodeId, NodeStatus, Relationship, RelationshipType, WorkspaceId};
use credo_core::proposal::{
    NodeChanges, NodeDraft, Operation, Proposal, ProposalDraft, ProposalId, ProposalStatus,
    ReviewAction,
};
use credo_core::store::ContextStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn store() -> ContextStore {
    ContextStore::new(WorkspaceId::new("test"))
}

fn admin() -> ActorContext {
    ActorContext::admin("alice")
}

fn draft(id: &str, title: &str) -> NodeDraft {
    NodeDraft {
        id: NodeId::new_unchecked(id),
        body: NodeBody::Note {},
        title: title.into(),
        content: String::new(),
        description: None,
        tags: vec![],
        relationships: vec![],
    }
}

fn create_op(id: &str, title: &str) -> Operation {
    Operation::Create {
        node: draft(id, title),
    }
}

fn proposal_of(store: &ContextStore, ops: Vec<Operation>) -> Proposal {
    store
        .submit(
            ProposalDraft {
                operations: ops,
                ..ProposalDraft::default()
            },
            &admin(),
        )
        .expect("submit")
}

/// Submit, accept, and apply in one go. Returns the proposal id.
fn applied(store: &ContextStore, ops: Vec<Operation>) -> ProposalId {
    let proposal = proposal_of(store, ops);
    store
        .review(&proposal.id, ReviewAction::Accept, &admin(), None, None)
        .expect("accept");
    store.apply(&proposal.id, &admin()).expect("apply");
    proposal.id
}

// ---------------------------------------------------------------------------
// Hello world: one decision referencing a goal
// ---------------------------------------------------------------------------

#[test]
fn hello_world_decision_referencing_goal() {
    let store = store();
    let actor = admin();

    // Goal G exists at version 1.
    applied(&store, vec![create_op("goal-g", "Ship v1")]);
    let goal = store.get(&NodeId::new_unchecked("goal-g")).unwrap();
    assert_eq!(goal.metadata.version, 1);

    // Proposal D1: one create-operation for a decision referencing G.
    let decision_draft = NodeDraft {
        id: NodeId::new_unchecked("decision-1"),
        body: NodeBody::Decision {
            decision: "use a typed edge model".into(),
            rationale: Some("compile-checked variants".into()),
            alternatives: vec![],
        },
        title: "Typed edges".into(),
        content: String::new(),
        description: None,
        tags: vec![],
        relationships: vec![Relationship::new(
            RelationshipType::Implements,
            NodeId::new_unchecked("goal-g"),
        )],
    };
    let proposal = proposal_of(
        &store,
        vec![Operation::Create {
            node: decision_draft,
        }],
    );
    store
        .review(&proposal.id, ReviewAction::Accept, &actor, None, None)
        .unwrap();
    let outcome = store.apply(&proposal.id, &actor).unwrap();

    let decision = store.get(&NodeId::new_unchecked("decision-1")).unwrap();
    assert_eq!(decision.status, NodeStatus::Accepted);
    assert_eq!(decision.metadata.version, 1);

    let stored = store.get_proposal(&proposal.id).unwrap();
    assert_eq!(stored.status, ProposalStatus::Applied);
    let info = stored.applied.expect("applied info");
    assert_eq!(info.to_revision, outcome.revision);
    assert_ne!(info.to_revision, info.previous_revision);

    // G's version is unchanged: it was referenced, not touched.
    let goal = store.get(&NodeId::new_unchecked("goal-g")).unwrap();
    assert_eq!(goal.metadata.version, 1);
    // But its derived reverse index now knows about the decision.
    assert!(goal
        .referenced_by
        .contains(&NodeId::new_unchecked("decision-1")));
}

// ---------------------------------------------------------------------------
// Version accounting
// ---------------------------------------------------------------------------

#[test]
fn touched_nodes_bump_by_exactly_one() {
    let store = store();

    applied(&store, vec![create_op("n1", "one"), create_op("n2", "two")]);

    // Touch n1 twice in one proposal; n2 stays untouched.
    applied(
        &store,
        vec![
            Operation::Update {
                node: NodeId::new_unchecked("n1"),
                changes: NodeChanges {
                    title: Some("first pass".into()),
                    ..NodeChanges::default()
                },
            },
            Operation::InsertText {
                node: NodeId::new_unchecked("n1"),
                offset: 0,
                text: "hello".into(),
            },
        ],
    );

    let n1 = store.get(&NodeId::new_unchecked("n1")).unwrap();
    let n2 = store.get(&NodeId::new_unchecked("n2")).unwrap();
    // Two operations, one apply: exactly one bump.
    assert_eq!(n1.metadata.version, 2);
    assert_eq!(n1.title, "first pass");
    assert_eq!(n1.content, "hello");
    assert_eq!(n2.metadata.version, 1);
}

#[test]
fn reapply_is_an_idempotent_noop() {
    let store = store();
    let actor = admin();

    let proposal = proposal_of(&store, vec![create_op("n1", "one")]);
    store
        .review(&proposal.id, ReviewAction::Accept, &actor, None, None)
        .unwrap();
    let first = store.apply(&proposal.id, &actor).unwrap();
    let node_before = store.get(&NodeId::new_unchecked("n1")).unwrap();
    let head_before = store.head_revision();

    let second = store.apply(&proposal.id, &actor).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.head_revision(), head_before);
    let node_after = store.get(&NodeId::new_unchecked("n1")).unwrap();
    assert_eq!(node_before, node_after);
}

#[test]
fn failed_operation_aborts_whole_apply() {
    let store = store();
    let actor = admin();

    applied(&store, vec![create_op("n1", "one")]);

    // Second operation targets a missing node: nothing may change.
    let proposal = proposal_of(
        &store,
        vec![
            Operation::Update {
                node: NodeId::new_unchecked("n1"),
                changes: NodeChanges {
                    title: Some("should not stick".into()),
                    ..NodeChanges::default()
                },
            },
            Operation::Delete {
                node: NodeId::new_unchecked("ghost"),
            },
        ],
    );
    store
        .review(&proposal.id, ReviewAction::Accept, &actor, None, None)
        .unwrap();
    let err = store.apply(&proposal.id, &actor).unwrap_err();
    assert!(matches!(err, StoreError::NodeNotFound(_)));

    let n1 = store.get(&NodeId::new_unchecked("n1")).unwrap();
    assert_eq!(n1.title, "one");
    assert_eq!(n1.metadata.version, 1);
    // The proposal stays accepted; it was not consumed by the failure.
    assert_eq!(
        store.get_proposal(&proposal.id).unwrap().status,
        ProposalStatus::Accepted
    );
}

#[test]
fn edge_target_created_earlier_in_same_proposal_is_valid() {
    let store = store();

    // One proposal creates the goal, then a task pointing at it.
    let mut task = draft("task-1", "implement");
    task.relationships = vec![Relationship::new(
        RelationshipType::Implements,
        NodeId::new_unchecked("goal-1"),
    )];
    applied(
        &store,
        vec![
            create_op("goal-1", "the goal"),
            Operation::Create { node: task },
        ],
    );

    let goal = store.get(&NodeId::new_unchecked("goal-1")).unwrap();
    assert!(goal
        .referenced_by
        .contains(&NodeId::new_unchecked("task-1")));
}

#[test]
fn edge_target_missing_rejects_create() {
    let store = store();
    let actor = admin();

    let mut task = draft("task-1", "implement");
    task.relationships = vec![Relationship::new(
        RelationshipType::Implements,
        NodeId::new_unchecked("nowhere"),
    )];
    let proposal = proposal_of(&store, vec![Operation::Create { node: task }]);
    store
        .review(&proposal.id, ReviewAction::Accept, &actor, None, None)
        .unwrap();
    let err = store.apply(&proposal.id, &actor).unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation { .. }));
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[test]
fn apply_requires_accepted() {
    let store = store();
    let actor = admin();

    let proposal = proposal_of(&store, vec![create_op("n1", "one")]);
    let err = store.apply(&proposal.id, &actor).unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
}

#[test]
fn rejected_proposal_is_terminal() {
    let store = store();
    let actor = admin();

    let proposal = proposal_of(&store, vec![create_op("n1", "one")]);
    store
        .review(&proposal.id, ReviewAction::Reject, &actor, None, None)
        .unwrap();
    assert_eq!(
        store.get_proposal(&proposal.id).unwrap().status,
        ProposalStatus::Rejected
    );
    // A second review cannot resurrect it.
    assert!(store
        .review(&proposal.id, ReviewAction::Accept, &actor, None, None)
        .is_err());
    assert!(store.apply(&proposal.id, &actor).is_err());
    // The node was never created.
    assert!(store.get(&NodeId::new_unchecked("n1")).is_err());
}

#[test]
fn request_changes_leaves_proposal_open() {
    let store = store();
    let actor = admin();

    let proposal = proposal_of(&store, vec![create_op("n1", "one")]);
    let review = store
        .review(
            &proposal.id,
            ReviewAction::RequestChanges,
            &actor,
            Some(vec![0]),
            Some("needs a description".into()),
        )
        .unwrap();
    assert_eq!(review.operation_ids, Some(vec![0]));
    assert_eq!(
        store.get_proposal(&proposal.id).unwrap().status,
        ProposalStatus::Open
    );
    assert_eq!(store.reviews_for(&proposal.id).len(), 1);
}

#[test]
fn withdraw_is_author_only_and_open_only() {
    let store = store();
    let author = admin();
    let other = ActorContext::admin("mallory");

    let proposal = proposal_of(&store, vec![create_op("n1", "one")]);

    let err = store.withdraw(&proposal.id, &other).unwrap_err();
    assert!(matches!(err, StoreError::PermissionDenied { .. }));

    store.withdraw(&proposal.id, &author).unwrap();
    assert_eq!(
        store.get_proposal(&proposal.id).unwrap().status,
        ProposalStatus::Withdrawn
    );
    // Withdrawn is terminal.
    assert!(store.withdraw(&proposal.id, &author).is_err());
}

// ---------------------------------------------------------------------------
// RBAC gates
// ---------------------------------------------------------------------------

#[test]
fn agent_actors_cannot_review_or_apply() {
    let store = store();
    let agent = ActorContext::new("bot", ActorType::Agent, &[Role::Admin]);

    // Agents may propose.
    let proposal = store
        .submit(
            ProposalDraft {
                operations: vec![create_op("n1", "one")],
                ..ProposalDraft::default()
            },
            &agent,
        )
        .unwrap();

    let err = store
        .review(&proposal.id, ReviewAction::Accept, &agent, None, None)
        .unwrap_err();
    assert!(matches!(err, StoreError::PermissionDenied { .. }));

    store
        .review(&proposal.id, ReviewAction::Accept, &admin(), None, None)
        .unwrap();
    let err = store.apply(&proposal.id, &agent).unwrap_err();
    assert!(matches!(err, StoreError::PermissionDenied { .. }));
}

#[test]
fn roles_gate_each_transition() {
    let store = store();
    let contributor = ActorContext::new("carol", ActorType::Human, &[Role::Contributor]);
    let reviewer = ActorContext::new(
        "rhea",
        ActorType::Human,
        &[Role::Contributor, Role::Reviewer],
    );
    let maintainer = ActorContext::new("mike", ActorType::Human, &[Role::Maintainer]);

    let proposal = store
        .submit(
            ProposalDraft {
                operations: vec![create_op("n1", "one")],
                ..ProposalDraft::default()
            },
            &contributor,
        )
        .unwrap();

    // Contributor cannot review; maintainer cannot either.
    assert!(store
        .review(&proposal.id, ReviewAction::Accept, &contributor, None, None)
        .is_err());
    assert!(store
        .review(&proposal.id, ReviewAction::Accept, &maintainer, None, None)
        .is_err());

    store
        .review(&proposal.id, ReviewAction::Accept, &reviewer, None, None)
        .unwrap();

    // Reviewer cannot apply.
    assert!(store.apply(&proposal.id, &reviewer).is_err());
    store.apply(&proposal.id, &maintainer).unwrap();
}

// ---------------------------------------------------------------------------
// Policy gate
// ---------------------------------------------------------------------------

struct DenyApplies;

impl PolicyGate for DenyApplies {
    fn evaluate(
        &self,
        _actor: &ActorContext,
        _proposal: &Proposal,
        action: StoreAction,
    ) -> PolicyDecision {
        if action == StoreAction::Apply {
            PolicyDecision::deny(vec!["applies are frozen".into()])
        } else {
            PolicyDecision::allow()
        }
    }
}

#[test]
fn policy_deny_is_fatal_to_apply() {
    let store = ContextStore::new(WorkspaceId::new("test")).with_policy(Arc::new(DenyApplies));
    let actor = admin();

    let proposal = proposal_of(&store, vec![create_op("n1", "one")]);
    store
        .review(&proposal.id, ReviewAction::Accept, &actor, None, None)
        .unwrap();
    let err = store.apply(&proposal.id, &actor).unwrap_err();
    match err {
        StoreError::PolicyViolation { violations, .. } => {
            assert_eq!(violations, vec!["applies are frozen".to_string()]);
        }
        other => panic!("expected policy violation, got {other}"),
    }
    assert!(store.get(&NodeId::new_unchecked("n1")).is_err());
}

// ---------------------------------------------------------------------------
// Supersession
// ---------------------------------------------------------------------------

#[test]
fn applying_superseder_marks_open_target_superseded() {
    let store = store();
    let actor = admin();

    let first = proposal_of(&store, vec![create_op("n1", "one")]);
    let second = store
        .submit(
            ProposalDraft {
                operations: vec![create_op("n2", "two")],
                supersedes: Some(first.id.clone()),
                ..ProposalDraft::default()
            },
            &actor,
        )
        .unwrap();

    store
        .review(&second.id, ReviewAction::Accept, &actor, None, None)
        .unwrap();
    store.apply(&second.id, &actor).unwrap();

    assert_eq!(
        store.get_proposal(&first.id).unwrap().status,
        ProposalStatus::Superseded
    );
    // The superseded proposal can no longer be reviewed.
    assert!(store
        .review(&first.id, ReviewAction::Accept, &actor, None, None)
        .is_err());
}

#[test]
fn superseding_an_already_decided_proposal_changes_nothing() {
    let store = store();
    let actor = admin();

    let first_id = applied(&store, vec![create_op("n1", "one")]);
    let second = store
        .submit(
            ProposalDraft {
                operations: vec![create_op("n2", "two")],
                supersedes: Some(first_id.clone()),
                ..ProposalDraft::default()
            },
            &actor,
        )
        .unwrap();
    store
        .review(&second.id, ReviewAction::Accept, &actor, None, None)
        .unwrap();
    store.apply(&second.id, &actor).unwrap();

    // The applied proposal keeps its terminal status.
    assert_eq!(
        store.get_proposal(&first_id).unwrap().status,
        ProposalStatus::Applied
    );
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

#[test]
fn every_transition_emits_an_audit_event() {
    let audit = Arc::new(MemoryAudit::new());
    let store = ContextStore::new(WorkspaceId::new("test")).with_audit(audit.clone());
    let actor = admin();

    let proposal = proposal_of(&store, vec![create_op("n1", "one")]);
    store
        .review(&proposal.id, ReviewAction::Accept, &actor, None, None)
        .unwrap();
    store.apply(&proposal.id, &actor).unwrap();

    let events = audit.events();
    let actions: Vec<StoreAction> = events.iter().map(|e| e.action).collect();
    assert!(actions.contains(&StoreAction::Submit));
    assert!(actions.contains(&StoreAction::Review));
    assert!(actions.contains(&StoreAction::Apply));
    assert!(events.iter().all(|e| e.outcome == AuditOutcome::Allowed));
    assert!(events.iter().all(|e| e.actor == "alice"));
}

// ---------------------------------------------------------------------------
// Text and move operations
// ---------------------------------------------------------------------------

#[test]
fn text_operations_edit_content_in_order() {
    let store = store();

    let mut note = draft("n1", "note");
    note.content = "hello world".into();
    applied(&store, vec![Operation::Create { node: note }]);

    applied(
        &store,
        vec![
            Operation::DeleteText {
                node: NodeId::new_unchecked("n1"),
                start: 5,
                end: 11,
            },
            Operation::InsertText {
                node: NodeId::new_unchecked("n1"),
                offset: 5,
                text: ", credo".into(),
            },
        ],
    );

    let node = store.get(&NodeId::new_unchecked("n1")).unwrap();
    assert_eq!(node.content, "hello, credo");
    assert_eq!(node.metadata.version, 2);
}

#[test]
fn out_of_bounds_text_edit_is_invalid() {
    let store = store();
    let actor = admin();

    applied(&store, vec![create_op("n1", "one")]);
    let proposal = proposal_of(
        &store,
        vec![Operation::InsertText {
            node: NodeId::new_unchecked("n1"),
            offset: 999,
            text: "nope".into(),
        }],
    );
    store
        .review(&proposal.id, ReviewAction::Accept, &actor, None, None)
        .unwrap();
    let err = store.apply(&proposal.id, &actor).unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation { .. }));
}

#[test]
fn move_reparents_and_rejects_cycles() {
    let store = store();
    let actor = admin();

    applied(
        &store,
        vec![
            create_op("root", "root goal"),
            create_op("mid", "mid"),
            create_op("leaf", "leaf"),
        ],
    );
    // leaf under mid, mid under root.
    applied(
        &store,
        vec![
            Operation::Move {
                node: NodeId::new_unchecked("mid"),
                new_parent: Some(NodeId::new_unchecked("root")),
            },
            Operation::Move {
                node: NodeId::new_unchecked("leaf"),
                new_parent: Some(NodeId::new_unchecked("mid")),
            },
        ],
    );

    let mid = store.get(&NodeId::new_unchecked("mid")).unwrap();
    assert!(mid
        .relationships_of(RelationshipType::ParentChild)
        .any(|r| r.target == NodeId::new_unchecked("root")));

    // Moving root under leaf would make root its own ancestor.
    let proposal = proposal_of(
        &store,
        vec![Operation::Move {
            node: NodeId::new_unchecked("root"),
            new_parent: Some(NodeId::new_unchecked("leaf")),
        }],
    );
    store
        .review(&proposal.id, ReviewAction::Accept, &actor, None, None)
        .unwrap();
    let err = store.apply(&proposal.id, &actor).unwrap_err();
    assert!(matches!(err, StoreError::CycleDetected { .. }));

    // Detaching clears the parent edge.
    applied(
        &store,
        vec![Operation::Move {
            node: NodeId::new_unchecked("leaf"),
            new_parent: None,
        }],
    );
    let leaf = store.get(&NodeId::new_unchecked("leaf")).unwrap();
    assert_eq!(
        leaf.relationships_of(RelationshipType::ParentChild).count(),
        0
    );
}

#[test]
fn delete_retains_node_with_terminal_status() {
    let store = store();

    applied(&store, vec![create_op("n1", "one")]);
    applied(
        &store,
        vec![Operation::Delete {
            node: NodeId::new_unchecked("n1"),
        }],
    );

    // Still readable by id; terminal status, version bumped.
    let node = store.get(&NodeId::new_unchecked("n1")).unwrap();
    assert_eq!(node.status, NodeStatus::Superseded);
    assert_eq!(node.metadata.version, 2);
}
