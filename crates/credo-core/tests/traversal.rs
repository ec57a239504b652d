//! Traversal engine integration tests: bounded reasoning chains, cycle
//! termination, the decision rationale recipe, neighbor discovery, and
//! query-with-reasoning.

use credo_core::access::ActorContext;
use credo_core::error::StoreError;
use credo_core::graph::reasoning::{
    DecisionReasoningOptions, DiscoverOptions, ReasoningOptions, RelatednessScorer,
};
use credo_core::graph::traverse::{ContextChainOptions, PathStep, TraversalOptions};
use credo_core::model::{
    Alternative, Node, NodeBody, NodeId, NodeKind, Relationship, RelationshipType, WorkspaceId,
};
use credo_core::proposal::{NodeDraft, Operation, ProposalDraft, ReviewAction};
use credo_core::query::NodeQuery;
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

fn id(s: &str) -> NodeId {
    NodeId::new_unchecked(s)
}

fn draft(node_id: &str, body: NodeBody, title: &str, rels: Vec<Relationship>) -> NodeDraft {
    NodeDraft {
        id: id(node_id),
        body,
        title: title.into(),
        content: String::new(),
        description: None,
        tags: vec![],
        relationships: rels,
    }
}

fn rel(rel_type: RelationshipType, target: &str) -> Relationship {
    Relationship::new(rel_type, id(target))
}

fn apply_creates(store: &ContextStore, drafts: Vec<NodeDraft>) {
    let ops = drafts
        .into_iter()
        .map(|node| Operation::Create { node })
        .collect();
    let proposal = store
        .submit(
            ProposalDraft {
                operations: ops,
                ..ProposalDraft::default()
            },
            &admin(),
        )
        .expect("submit");
    store
        .review(&proposal.id, ReviewAction::Accept, &admin(), None, None)
        .expect("accept");
    store.apply(&proposal.id, &admin()).expect("apply");
}

/// A decision graph: goal ← decision ← task, with a risk and constraint
/// attached to the decision.
fn decision_fixture(store: &ContextStore) {
    apply_creates(
        store,
        vec![
            draft("goal-1", NodeBody::Goal { objective: None, success_criteria: vec![] }, "Ship search", vec![]),
            draft(
                "risk-1",
                NodeBody::Risk { impact: None, likelihood: None, mitigation: None },
                "Index corruption",
                vec![],
            ),
            draft(
                "decision-1",
                NodeBody::Decision {
                    decision: "use an inverted index".into(),
                    rationale: Some("fast keyword lookups".into()),
                    alternatives: vec![Alternative {
                        title: "linear scan".into(),
                        reason: Some("too slow beyond toy corpora".into()),
                    }],
                },
                "Inverted index",
                vec![
                    rel(RelationshipType::Implements, "goal-1"),
                    rel(RelationshipType::Mitigates, "risk-1"),
                ],
            ),
            draft(
                "task-1",
                NodeBody::Task { assignee: None, due: None },
                "Build the index",
                vec![rel(RelationshipType::Implements, "decision-1")],
            ),
            draft(
                "constraint-1",
                NodeBody::Constraint { constraint: "memory under 1 GiB".into() },
                "Memory budget",
                vec![rel(RelationshipType::Blocks, "decision-1")],
            ),
        ],
    );
}

// ---------------------------------------------------------------------------
// traverse_reasoning_chain
// ---------------------------------------------------------------------------

#[test]
fn chain_follows_typed_steps_in_order() {
    let store = store();
    decision_fixture(&store);

    // task --implements--> decision --implements--> goal
    let chain = store
        .traverse_reasoning_chain(
            &id("task-1"),
            &[
                PathStep::to_kind(RelationshipType::Implements, NodeKind::Decision),
                PathStep::to_kind(RelationshipType::Implements, NodeKind::Goal),
            ],
            &TraversalOptions {
                include_trace: true,
                collect_context: true,
                ..TraversalOptions::default()
            },
        )
        .unwrap();

    let ids: Vec<String> = chain.nodes.iter().map(|n| n.id.to_string()).collect();
    assert_eq!(ids, vec!["task-1", "decision-1", "goal-1"]);
    assert_eq!(chain.path.len(), 2);
    assert_eq!(chain.path[0].from, id("task-1"));
    assert_eq!(chain.path[1].to, id("goal-1"));

    let trace = chain.trace.expect("trace requested");
    assert_eq!(trace.len(), 2);
    assert!(trace[0].rationale.contains("implements"));

    let context = chain.context.expect("context requested");
    assert_eq!(context.goals.len(), 1);
    assert_eq!(context.decisions.len(), 1);
    assert_eq!(context.tasks.len(), 1);
}

#[test]
fn kind_filter_prunes_hops() {
    let store = store();
    decision_fixture(&store);

    // Asking for implements → risk from the task finds nothing: the
    // target is a decision.
    let chain = store
        .traverse_reasoning_chain(
            &id("task-1"),
            &[PathStep::to_kind(RelationshipType::Implements, NodeKind::Risk)],
            &TraversalOptions::default(),
        )
        .unwrap();
    assert_eq!(chain.nodes.len(), 1);
    assert!(chain.path.is_empty());
}

#[test]
fn missing_start_is_not_found() {
    let store = store();
    let err = store
        .traverse_reasoning_chain(
            &id("ghost"),
            &[PathStep::new(RelationshipType::References)],
            &TraversalOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::NodeNotFound(_)));
}

// ---------------------------------------------------------------------------
// Cycle termination
// ---------------------------------------------------------------------------

fn cycle_fixture(store: &ContextStore) {
    // a → b → c → a, all `references`.
    apply_creates(
        store,
        vec![
            draft("a", NodeBody::Note {}, "a", vec![]),
            draft("b", NodeBody::Note {}, "b", vec![rel(RelationshipType::References, "a")]),
            draft("c", NodeBody::Note {}, "c", vec![rel(RelationshipType::References, "b")]),
        ],
    );
    // Close the cycle: a → c.
    let proposal = store
        .submit(
            ProposalDraft {
                operations: vec![Operation::Update {
                    node: id("a"),
                    changes: credo_core::proposal::NodeChanges {
                        relationships: Some(vec![rel(RelationshipType::References, "c")]),
                        ..credo_core::proposal::NodeChanges::default()
                    },
                }],
                ..ProposalDraft::default()
            },
            &admin(),
        )
        .unwrap();
    store
        .review(&proposal.id, ReviewAction::Accept, &admin(), None, None)
        .unwrap();
    store.apply(&proposal.id, &admin()).unwrap();
}

#[test]
fn cyclic_graph_terminates_within_depth() {
    let store = store();
    cycle_fixture(&store);

    // Far more steps than nodes: the visited set stops the walk.
    let steps: Vec<PathStep> = (0..30)
        .map(|_| PathStep::new(RelationshipType::References))
        .collect();
    let chain = store
        .traverse_reasoning_chain(
            &id("a"),
            &steps,
            &TraversalOptions {
                max_depth: Some(30),
                ..TraversalOptions::default()
            },
        )
        .unwrap();

    // Each node visited exactly once.
    assert_eq!(chain.nodes.len(), 3);
    assert!(chain.path.len() <= 3);
}

#[test]
fn discovery_terminates_on_cycles() {
    let store = store();
    cycle_fixture(&store);

    let related = store
        .discover_related_reasoning(
            &id("a"),
            &DiscoverOptions {
                max_depth: Some(50),
                ..DiscoverOptions::default()
            },
            None,
        )
        .unwrap();
    // b and c, each once; a excluded as the origin.
    assert_eq!(related.len(), 2);
}

#[test]
fn zero_depth_visits_nothing() {
    let store = store();
    cycle_fixture(&store);

    let related = store
        .discover_related_reasoning(
            &id("a"),
            &DiscoverOptions {
                max_depth: Some(0),
                ..DiscoverOptions::default()
            },
            None,
        )
        .unwrap();
    assert!(related.is_empty());
}

// ---------------------------------------------------------------------------
// build_context_chain
// ---------------------------------------------------------------------------

#[test]
fn context_chain_groups_by_category_and_stops() {
    let store = store();
    decision_fixture(&store);

    // From the task, walk implements twice — but stop at decisions, so
    // the goal behind the decision is never reached.
    let chain = store
        .build_context_chain(
            &id("task-1"),
            &[RelationshipType::Implements, RelationshipType::Implements],
            &ContextChainOptions {
                stop_kinds: vec![NodeKind::Decision],
                ..ContextChainOptions::default()
            },
        )
        .unwrap();

    let context = chain.context.expect("context is always built");
    assert_eq!(context.tasks.len(), 1);
    assert_eq!(context.decisions.len(), 1);
    assert!(context.goals.is_empty(), "stop kind must halt expansion");
}

#[test]
fn context_chain_without_stops_reaches_the_goal() {
    let store = store();
    decision_fixture(&store);

    let chain = store
        .build_context_chain(
            &id("task-1"),
            &[RelationshipType::Implements, RelationshipType::Implements],
            &ContextChainOptions::default(),
        )
        .unwrap();
    let context = chain.context.expect("context");
    assert_eq!(context.goals.len(), 1);
}

// ---------------------------------------------------------------------------
// follow_decision_reasoning
// ---------------------------------------------------------------------------

#[test]
fn decision_rationale_bundle() {
    let store = store();
    decision_fixture(&store);

    let rationale = store
        .follow_decision_reasoning(&id("decision-1"), &DecisionReasoningOptions::default())
        .unwrap();

    assert_eq!(rationale.decision.id, id("decision-1"));
    assert_eq!(rationale.motivating_goals.len(), 1);
    assert_eq!(rationale.motivating_goals[0].id, id("goal-1"));
    assert_eq!(rationale.implementing_tasks.len(), 1);
    assert_eq!(rationale.implementing_tasks[0].id, id("task-1"));
    assert_eq!(rationale.risks.len(), 1);
    assert_eq!(rationale.risks[0].id, id("risk-1"));
    assert_eq!(rationale.constraints.len(), 1);
    assert_eq!(rationale.constraints[0].id, id("constraint-1"));
    // Rejected alternatives are preserved for provenance.
    assert_eq!(rationale.alternatives.len(), 1);
    assert_eq!(rationale.alternatives[0].title, "linear scan");
}

#[test]
fn decision_rationale_respects_section_toggles() {
    let store = store();
    decision_fixture(&store);

    let rationale = store
        .follow_decision_reasoning(
            &id("decision-1"),
            &DecisionReasoningOptions {
                include_alternatives: false,
                include_risks: false,
                include_constraints: false,
            },
        )
        .unwrap();
    assert!(rationale.alternatives.is_empty());
    assert!(rationale.risks.is_empty());
    assert!(rationale.constraints.is_empty());
    // Goals and tasks are always part of the recipe.
    assert_eq!(rationale.motivating_goals.len(), 1);
    assert_eq!(rationale.implementing_tasks.len(), 1);
}

#[test]
fn non_decision_is_rejected() {
    let store = store();
    decision_fixture(&store);

    let err = store
        .follow_decision_reasoning(&id("task-1"), &DecisionReasoningOptions::default())
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidOperation { .. }));
}

// ---------------------------------------------------------------------------
// discover_related_reasoning with a scorer
// ---------------------------------------------------------------------------

struct TitleOverlap;

impl RelatednessScorer for TitleOverlap {
    fn score(&self, origin: &Node, candidate: &Node) -> f32 {
        let origin_words: Vec<&str> = origin.title.split_whitespace().collect();
        let shared = candidate
            .title
            .split_whitespace()
            .filter(|w| origin_words.contains(w))
            .count();
        shared as f32 / origin_words.len().max(1) as f32
    }
}

#[test]
fn scored_discovery_sorts_by_score() {
    let store = store();
    apply_creates(
        &store,
        vec![
            draft("origin", NodeBody::Note {}, "search index design", vec![]),
            draft(
                "close",
                NodeBody::Note {},
                "search index notes",
                vec![rel(RelationshipType::RelatedTo, "origin")],
            ),
            draft(
                "far",
                NodeBody::Note {},
                "unrelated writeup",
                vec![rel(RelationshipType::RelatedTo, "origin")],
            ),
        ],
    );

    let related = store
        .discover_related_reasoning(
            &id("origin"),
            &DiscoverOptions {
                direction: credo_core::model::Direction::Both,
                ..DiscoverOptions::default()
            },
            Some(&TitleOverlap),
        )
        .unwrap();

    assert_eq!(related.len(), 2);
    assert_eq!(related[0].node.id, id("close"));
    assert!(related[0].score.unwrap() > related[1].score.unwrap());
}

#[test]
fn discovery_respects_type_filter_and_limit() {
    let store = store();
    decision_fixture(&store);

    // Only implements edges, both directions, from the decision.
    let related = store
        .discover_related_reasoning(
            &id("decision-1"),
            &DiscoverOptions {
                rel_types: Some(vec![RelationshipType::Implements]),
                direction: credo_core::model::Direction::Both,
                max_depth: Some(1),
                limit: Some(1),
            },
            None,
        )
        .unwrap();
    assert_eq!(related.len(), 1);
}

// ---------------------------------------------------------------------------
// query_with_reasoning
// ---------------------------------------------------------------------------

#[test]
fn query_hits_carry_chains_and_context() {
    let store = store();
    decision_fixture(&store);

    let result = store.query_with_reasoning(
        &NodeQuery {
            kinds: Some(vec![NodeKind::Task]),
            ..NodeQuery::default()
        },
        &ReasoningOptions {
            rel_types: Some(vec![RelationshipType::Implements]),
            max_depth: Some(2),
            ..ReasoningOptions::default()
        },
    );

    assert_eq!(result.page.total, 1);
    assert_eq!(result.reasoning.len(), 1);
    let hit = &result.reasoning[0];
    assert_eq!(hit.node.id, id("task-1"));
    // Chain reaches the decision and then the goal.
    let chain_ids: Vec<String> = hit.chain.nodes.iter().map(|n| n.id.to_string()).collect();
    assert!(chain_ids.contains(&"decision-1".to_string()));
    assert!(chain_ids.contains(&"goal-1".to_string()));
    // Accumulated context is grouped by category.
    assert_eq!(result.context.tasks.len(), 1);
    assert_eq!(result.context.decisions.len(), 1);
    assert_eq!(result.context.goals.len(), 1);
}
