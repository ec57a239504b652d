//! Bounded reasoning-chain traversals.
//!
//! # Overview
//!
//! A reasoning chain is a walk over typed edges that assembles rationale
//! for a node: which goals motivated it, what implements it, what blocks
//! it. Two shapes are provided:
//!
//! - [`traverse_reasoning_chain`] follows an explicit ordered sequence of
//!   `(relationship type, optional target-kind filter)` steps;
//! - [`build_context_chain`] walks several relationship types in
//!   sequence, stops early at caller-specified node kinds, and groups the
//!   collected context by category.
//!
//! # Termination
//!
//! Every walk carries a per-call visited set and a depth bound clamped to
//! the configured cap, so arbitrary cyclic graphs cannot cause
//! non-termination. Depth is the only resource bound: there is no
//! cancellation token.

use serde::{Deserialize, Serialize};

use std::collections::HashSet;

use crate::config::TraversalConfig;
use crate::error::StoreError;
use crate::model::node::{Node, NodeKind};
use crate::model::node_id::NodeId;
use crate::model::relationship::{Direction, RelationshipType};

use super::GraphView;

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

/// One step of an explicit reasoning path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    #[serde(rename = "type")]
    pub rel_type: RelationshipType,
    /// Only accept hops landing on this kind, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_kind: Option<NodeKind>,
}

impl PathStep {
    #[must_use]
    pub const fn new(rel_type: RelationshipType) -> Self {
        Self {
            rel_type,
            target_kind: None,
        }
    }

    #[must_use]
    pub const fn to_kind(rel_type: RelationshipType, kind: NodeKind) -> Self {
        Self {
            rel_type,
            target_kind: Some(kind),
        }
    }
}

/// Options for [`traverse_reasoning_chain`].
#[derive(Debug, Clone, Default)]
pub struct TraversalOptions {
    /// Hop bound; defaults to the configured traversal depth, clamped to
    /// the configured cap either way.
    pub max_depth: Option<usize>,
    /// Record a step-by-step trace with a rationale per hop.
    pub include_trace: bool,
    /// Group visited nodes by category into the chain's context bundle.
    pub collect_context: bool,
}

/// Options for [`build_context_chain`].
#[derive(Debug, Clone, Default)]
pub struct ContextChainOptions {
    /// Node kinds that stop expansion: the stopping node is collected but
    /// never expanded from.
    pub stop_kinds: Vec<NodeKind>,
    pub max_depth: Option<usize>,
    pub include_trace: bool,
}

/// One concrete edge the walk took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeHop {
    pub from: NodeId,
    #[serde(rename = "type")]
    pub rel_type: RelationshipType,
    pub to: NodeId,
}

/// One trace line: the hop plus a human-readable rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: usize,
    pub hop: EdgeHop,
    pub rationale: String,
}

/// Visited nodes grouped by reasoning category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub goals: Vec<Node>,
    pub decisions: Vec<Node>,
    pub tasks: Vec<Node>,
    pub risks: Vec<Node>,
    pub constraints: Vec<Node>,
    pub questions: Vec<Node>,
    /// Context, plan, and note nodes.
    pub other: Vec<Node>,
}

impl ContextBundle {
    pub fn add(&mut self, node: &Node) {
        match node.kind() {
            NodeKind::Goal => self.goals.push(node.clone()),
            NodeKind::Decision => self.decisions.push(node.clone()),
            NodeKind::Task => self.tasks.push(node.clone()),
            NodeKind::Risk => self.risks.push(node.clone()),
            NodeKind::Constraint => self.constraints.push(node.clone()),
            NodeKind::Question => self.questions.push(node.clone()),
            NodeKind::Context | NodeKind::Plan | NodeKind::Note => {
                self.other.push(node.clone());
            }
        }
    }

    /// Merge another bundle into this one.
    pub fn extend(&mut self, other: Self) {
        self.goals.extend(other.goals);
        self.decisions.extend(other.decisions);
        self.tasks.extend(other.tasks);
        self.risks.extend(other.risks);
        self.constraints.extend(other.constraints);
        self.questions.extend(other.questions);
        self.other.extend(other.other);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.goals.len()
            + self.decisions.len()
            + self.tasks.len()
            + self.risks.len()
            + self.constraints.len()
            + self.questions.len()
            + self.other.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a chain traversal: the nodes visited (start first), the
/// concrete edge path, and the optional trace and context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningChain {
    pub nodes: Vec<Node>,
    pub path: Vec<EdgeHop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextBundle>,
}

// ---------------------------------------------------------------------------
// traverse_reasoning_chain
// ---------------------------------------------------------------------------

/// Follow `path` step by step from `start`, fanning out over every edge
/// matching the step's relationship type (and target kind, when given).
///
/// The walk is breadth-first per step: all nodes reached by step *n* form
/// the frontier for step *n + 1*. A node is never visited twice, so
/// cyclic edges terminate. The effective number of steps is additionally
/// clamped by the depth bound.
pub(crate) fn traverse_reasoning_chain(
    view: &GraphView<'_>,
    start: &NodeId,
    path: &[PathStep],
    options: &TraversalOptions,
    config: &TraversalConfig,
) -> Result<ReasoningChain, StoreError> {
    let start_node = view
        .node(start)
        .ok_or_else(|| StoreError::NodeNotFound(start.clone()))?;

    let depth = effective_depth(options.max_depth, config);
    let mut chain = ReasoningChain {
        nodes: vec![start_node.clone()],
        path: Vec::new(),
        trace: options.include_trace.then(Vec::new),
        context: options.collect_context.then(ContextBundle::default),
    };
    if let Some(context) = &mut chain.context {
        context.add(start_node);
    }

    let mut visited: HashSet<NodeId> = HashSet::new();
    visited.insert(start.clone());
    let mut frontier = vec![start.clone()];

    for (step_index, step) in path.iter().take(depth).enumerate() {
        let mut next_frontier = Vec::new();
        for from in &frontier {
            for (rel_type, to) in
                view.neighbors(from, Some(&[step.rel_type]), Direction::Outgoing)
            {
                let Some(target) = view.node(&to) else {
                    continue;
                };
                if let Some(kind) = step.target_kind {
                    if target.kind() != kind {
                        continue;
                    }
                }
                if !visited.insert(to.clone()) {
                    continue;
                }

                let hop = EdgeHop {
                    from: from.clone(),
                    rel_type,
                    to: to.clone(),
                };
                if let Some(trace) = &mut chain.trace {
                    trace.push(TraceEntry {
                        step: step_index,
                        rationale: format!(
                            "followed {rel_type} from '{from}' to {kind} '{to}'",
                            kind = target.kind(),
                        ),
                        hop: hop.clone(),
                    });
                }
                chain.path.push(hop);
                chain.nodes.push(target.clone());
                if let Some(context) = &mut chain.context {
                    context.add(target);
                }
                next_frontier.push(to);
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    Ok(chain)
}

// ---------------------------------------------------------------------------
// build_context_chain
// ---------------------------------------------------------------------------

/// Walk `sequence` relationship types in order, collecting context grouped
/// by category. Nodes whose kind is in `stop_kinds` are collected but not
/// expanded from.
pub(crate) fn build_context_chain(
    view: &GraphView<'_>,
    start: &NodeId,
    sequence: &[RelationshipType],
    options: &ContextChainOptions,
    config: &TraversalConfig,
) -> Result<ReasoningChain, StoreError> {
    let start_node = view
        .node(start)
        .ok_or_else(|| StoreError::NodeNotFound(start.clone()))?;

    let depth = effective_depth(options.max_depth, config);
    let mut context = ContextBundle::default();
    context.add(start_node);

    let mut chain = ReasoningChain {
        nodes: vec![start_node.clone()],
        path: Vec::new(),
        trace: options.include_trace.then(Vec::new),
        context: None,
    };

    let mut visited: HashSet<NodeId> = HashSet::new();
    visited.insert(start.clone());
    let mut frontier = vec![start.clone()];

    for (step_index, rel_type) in sequence.iter().take(depth).enumerate() {
        let mut next_frontier = Vec::new();
        for from in &frontier {
            // A stop-kind node was collected when reached; it contributes
            // no further expansion.
            if let Some(node) = view.node(from) {
                if options.stop_kinds.contains(&node.kind()) && from != start {
                    continue;
                }
            }
            for (rel_type, to) in view.neighbors(from, Some(&[*rel_type]), Direction::Outgoing) {
                let Some(target) = view.node(&to) else {
                    continue;
                };
                if !visited.insert(to.clone()) {
                    continue;
                }
                let hop = EdgeHop {
                    from: from.clone(),
                    rel_type,
                    to: to.clone(),
                };
                if let Some(trace) = &mut chain.trace {
                    trace.push(TraceEntry {
                        step: step_index,
                        rationale: format!(
                            "collected {kind} '{to}' via {rel_type} from '{from}'",
                            kind = target.kind(),
                        ),
                        hop: hop.clone(),
                    });
                }
                chain.path.push(hop);
                chain.nodes.push(target.clone());
                context.add(target);
                next_frontier.push(to);
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    chain.context = Some(context);
    Ok(chain)
}

/// Clamp the requested depth to the configured cap; fall back to the
/// configured default when unset.
pub(crate) fn effective_depth(requested: Option<usize>, config: &TraversalConfig) -> usize {
    requested
        .unwrap_or(config.default_max_depth)
        .min(config.depth_cap)
}
