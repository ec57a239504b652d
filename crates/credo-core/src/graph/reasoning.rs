//! Higher-level reasoning recipes built on the traversal engine.
//!
//! - [`follow_decision_reasoning`] — the fixed rationale recipe for
//!   decision nodes.
//! - [`discover_related_reasoning`] — multi-hop neighbor discovery with
//!   optional pluggable scoring.
//! - [`query_with_reasoning`] — query engine hits plus a bounded
//!   traversal from each.

use serde::{Deserialize, Serialize};

use std::collections::BTreeSet;

use crate::config::{QueryConfig, TraversalConfig};
use crate::error::StoreError;
use crate::model::node::{Alternative, Node, NodeBody, NodeKind};
use crate::model::node_id::NodeId;
use crate::model::relationship::{Direction, RelationshipType};
use crate::query::{NodeQuery, QueryPage};
use crate::store::StoreState;

use super::GraphView;
use super::traverse::{ContextBundle, EdgeHop, ReasoningChain, effective_depth};

// ---------------------------------------------------------------------------
// Pluggable scoring
// ---------------------------------------------------------------------------

/// Content-based relatedness between two nodes, in `[0.0, 1.0]`.
///
/// The core mandates no algorithm: implementations may use keyword
/// overlap, structural features, or externally computed embeddings. The
/// `credo-score` crate ships the default.
pub trait RelatednessScorer {
    fn score(&self, origin: &Node, candidate: &Node) -> f32;
}

// ---------------------------------------------------------------------------
// follow_decision_reasoning
// ---------------------------------------------------------------------------

/// Which sections of the rationale bundle to assemble.
#[derive(Debug, Clone)]
pub struct DecisionReasoningOptions {
    pub include_alternatives: bool,
    pub include_risks: bool,
    pub include_constraints: bool,
}

impl Default for DecisionReasoningOptions {
    fn default() -> Self {
        Self {
            include_alternatives: true,
            include_risks: true,
            include_constraints: true,
        }
    }
}

/// The assembled rationale for one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRationale {
    pub decision: Node,
    /// Goals the decision implements or references.
    pub motivating_goals: Vec<Node>,
    /// Rejected alternatives preserved on the decision for provenance.
    pub alternatives: Vec<Alternative>,
    /// Tasks holding an `implements` edge to the decision.
    pub implementing_tasks: Vec<Node>,
    /// Risks attached via `mitigates` (either direction).
    pub risks: Vec<Node>,
    /// Constraints attached via `blocks` or referenced by the decision.
    pub constraints: Vec<Node>,
}

/// Gather the rationale bundle for a decision node. Each section follows
/// its dedicated relationship type; results are sorted by node id.
pub(crate) fn follow_decision_reasoning(
    view: &GraphView<'_>,
    decision_id: &NodeId,
    options: &DecisionReasoningOptions,
) -> Result<DecisionRationale, StoreError> {
    let decision = view
        .node(decision_id)
        .ok_or_else(|| StoreError::NodeNotFound(decision_id.clone()))?;
    if decision.kind() != NodeKind::Decision {
        return Err(StoreError::InvalidOperation {
            index: 0,
            reason: format!(
                "node {decision_id} is a {kind}, not a decision",
                kind = decision.kind()
            ),
        });
    }

    let motivating_goals = collect_kind(
        view,
        decision_id,
        &[RelationshipType::Implements, RelationshipType::References],
        Direction::Outgoing,
        NodeKind::Goal,
    );
    let implementing_tasks = collect_kind(
        view,
        decision_id,
        &[RelationshipType::Implements],
        Direction::Incoming,
        NodeKind::Task,
    );
    let risks = if options.include_risks {
        collect_kind(
            view,
            decision_id,
            &[RelationshipType::Mitigates],
            Direction::Both,
            NodeKind::Risk,
        )
    } else {
        Vec::new()
    };
    let constraints = if options.include_constraints {
        collect_kind(
            view,
            decision_id,
            &[RelationshipType::Blocks, RelationshipType::References],
            Direction::Both,
            NodeKind::Constraint,
        )
    } else {
        Vec::new()
    };
    let alternatives = if options.include_alternatives {
        match &decision.body {
            NodeBody::Decision { alternatives, .. } => alternatives.clone(),
            _ => Vec::new(),
        }
    } else {
        Vec::new()
    };

    Ok(DecisionRationale {
        decision: decision.clone(),
        motivating_goals,
        alternatives,
        implementing_tasks,
        risks,
        constraints,
    })
}

/// Single-hop neighbors of one kind over the given relationship types,
/// sorted by id.
fn collect_kind(
    view: &GraphView<'_>,
    from: &NodeId,
    types: &[RelationshipType],
    direction: Direction,
    kind: NodeKind,
) -> Vec<Node> {
    let mut ids: BTreeSet<NodeId> = BTreeSet::new();
    for (_, neighbor) in view.neighbors(from, Some(types), direction) {
        if let Some(node) = view.node(&neighbor) {
            if node.kind() == kind {
                ids.insert(neighbor);
            }
        }
    }
    ids.into_iter()
        .filter_map(|id| view.node(&id).cloned())
        .collect()
}

// ---------------------------------------------------------------------------
// discover_related_reasoning
// ---------------------------------------------------------------------------

/// Options for neighbor discovery.
#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Relationship types to follow; `None` follows all of them.
    pub rel_types: Option<Vec<RelationshipType>>,
    pub direction: Direction,
    pub max_depth: Option<usize>,
    /// Keep only the best `limit` results after sorting.
    pub limit: Option<usize>,
}

/// One discovered node with its hop distance and optional score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedNode {
    pub node: Node,
    pub distance: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Multi-hop discovery from `origin` across the chosen relationship
/// types. With a scorer, results sort by score descending; otherwise by
/// distance ascending. Ties always break by node id.
pub(crate) fn discover_related_reasoning(
    view: &GraphView<'_>,
    origin: &NodeId,
    options: &DiscoverOptions,
    scorer: Option<&dyn RelatednessScorer>,
    config: &TraversalConfig,
) -> Result<Vec<RelatedNode>, StoreError> {
    let origin_node = view
        .node(origin)
        .ok_or_else(|| StoreError::NodeNotFound(origin.clone()))?;

    let depth = effective_depth(options.max_depth, config);
    let reached = view.bfs(
        origin,
        options.rel_types.as_deref(),
        options.direction,
        depth,
    );

    let mut related: Vec<RelatedNode> = reached
        .into_iter()
        .filter_map(|(id, distance)| {
            view.node(&id).map(|node| RelatedNode {
                score: scorer.map(|s| s.score(origin_node, node)),
                node: node.clone(),
                distance,
            })
        })
        .collect();

    related.sort_by(|a, b| {
        let by_score = match (a.score, b.score) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
            _ => std::cmp::Ordering::Equal,
        };
        by_score
            .then(a.distance.cmp(&b.distance))
            .then(a.node.id.cmp(&b.node.id))
    });

    if let Some(limit) = options.limit {
        related.truncate(limit);
    }
    Ok(related)
}

// ---------------------------------------------------------------------------
// query_with_reasoning
// ---------------------------------------------------------------------------

/// How to expand reasoning from each query hit.
#[derive(Debug, Clone, Default)]
pub struct ReasoningOptions {
    /// Relationship types to follow from each hit; `None` follows all.
    pub rel_types: Option<Vec<RelationshipType>>,
    pub direction: Direction,
    pub max_depth: Option<usize>,
}

/// One query hit with its reasoning chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonedHit {
    pub node: Node,
    pub chain: ReasoningChain,
}

/// Combined result: the primary page, per-hit chains, and the context
/// accumulated across every chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonedPage {
    pub page: QueryPage,
    pub reasoning: Vec<ReasonedHit>,
    pub context: ContextBundle,
}

/// Run the query engine, then a bounded breadth-first expansion from
/// every hit.
pub(crate) fn query_with_reasoning(
    state: &StoreState,
    query_config: &QueryConfig,
    query: &NodeQuery,
    reasoning: &ReasoningOptions,
    traversal_config: &TraversalConfig,
) -> ReasonedPage {
    let page = crate::query::run(state, query_config, query);
    let view = GraphView::new(state);
    let depth = effective_depth(reasoning.max_depth, traversal_config);

    let mut context = ContextBundle::default();
    let mut seen: BTreeSet<NodeId> = BTreeSet::new();
    let mut hits = Vec::with_capacity(page.nodes.len());

    for node in &page.nodes {
        let mut chain = ReasoningChain {
            nodes: vec![node.clone()],
            ..ReasoningChain::default()
        };
        if seen.insert(node.id.clone()) {
            context.add(node);
        }
        for (neighbor_id, _) in view.bfs(
            &node.id,
            reasoning.rel_types.as_deref(),
            reasoning.direction,
            depth,
        ) {
            let Some(neighbor) = view.node(&neighbor_id) else {
                continue;
            };
            chain.path.push(EdgeHop {
                from: node.id.clone(),
                rel_type: first_edge_type(&view, &node.id, &neighbor_id, reasoning),
                to: neighbor_id.clone(),
            });
            chain.nodes.push(neighbor.clone());
            if seen.insert(neighbor_id) {
                context.add(neighbor);
            }
        }
        hits.push(ReasonedHit {
            node: node.clone(),
            chain,
        });
    }

    ReasonedPage {
        page,
        reasoning: hits,
        context,
    }
}

/// Best-effort edge label for a hop in an expansion chain: the first
/// matching direct edge, or `related-to` for transitive reachability.
fn first_edge_type(
    view: &GraphView<'_>,
    from: &NodeId,
    to: &NodeId,
    reasoning: &ReasoningOptions,
) -> RelationshipType {
    view.neighbors(from, reasoning.rel_types.as_deref(), reasoning.direction)
        .into_iter()
        .find_map(|(rel_type, neighbor)| (&neighbor == to).then_some(rel_type))
        .unwrap_or(RelationshipType::RelatedTo)
}
