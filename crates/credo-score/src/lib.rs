#![forbid(unsafe_code)]
//! Pluggable relatedness scoring for credo reasoning discovery.
//!
//! # Overview
//!
//! `discover_related_reasoning` accepts any [`RelatednessScorer`]; this
//! crate ships the default: lexical overlap (content/title keywords and
//! tags, Jaccard) fused with proximity inside the typed-edge graph. No
//! embeddings — the scorer is deterministic, dependency-light, and cheap
//! enough to run per candidate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use credo_score::JaccardScorer;
//!
//! let nodes = /* snapshot of nodes, e.g. from query_nodes */;
//! let scorer = JaccardScorer::from_nodes(&nodes);
//! let related = store.discover_related_reasoning(&origin, &options, Some(&scorer))?;
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use credo_core::graph::reasoning::RelatednessScorer;
use credo_core::model::{Node, NodeId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum BFS hop distance considered for graph proximity.
/// Nodes further apart than this score `0.0` on the proximity feature.
const MAX_HOPS: usize = 5;

// ---------------------------------------------------------------------------
// RelatednessScore
// ---------------------------------------------------------------------------

/// Per-feature relatedness breakdown between two nodes.
///
/// All scores are in `[0.0, 1.0]`. The fields are kept separate so
/// downstream consumers can weight them independently and show
/// per-feature explanations.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatednessScore {
    /// Jaccard similarity of lowercased alphanumeric tokens drawn from
    /// title and content.
    pub keyword_sim: f32,
    /// Jaccard similarity of the two nodes' tag sets.
    pub tag_sim: f32,
    /// `1.0 / (1.0 + shortest_path_distance)` using an undirected BFS up
    /// to [`MAX_HOPS`] hops; `0.0` when unreachable or absent from the
    /// graph.
    pub graph_proximity: f32,
}

impl RelatednessScore {
    /// Uniform average of all feature scores.
    #[must_use]
    pub fn mean(&self) -> f32 {
        (self.keyword_sim + self.tag_sim + self.graph_proximity) / 3.0
    }
}

// ---------------------------------------------------------------------------
// Jaccard
// ---------------------------------------------------------------------------

/// Generic Jaccard similarity: `|A ∩ B| / |A ∪ B|`.
///
/// Returns `0.0` if both sets are empty (to avoid 0/0).
#[must_use]
pub fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union_size = a.union(b).count() as f32;
    if union_size == 0.0 {
        0.0
    } else {
        intersection / union_size
    }
}

fn tokens(node: &Node) -> HashSet<String> {
    format!("{} {}", node.title, node.content)
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_string)
        .collect()
}

fn tags(node: &Node) -> HashSet<String> {
    node.metadata.tags.iter().cloned().collect()
}

// ---------------------------------------------------------------------------
// JaccardScorer
// ---------------------------------------------------------------------------

/// The default scorer: keyword + tag Jaccard fused with graph proximity.
///
/// Built from a snapshot of nodes; the typed-edge graph is materialized
/// once at construction and reused for every proximity lookup.
pub struct JaccardScorer {
    graph: DiGraph<NodeId, ()>,
    indices: HashMap<NodeId, NodeIndex>,
}

impl JaccardScorer {
    /// Build the proximity graph from a node snapshot. Edges whose target
    /// is outside the snapshot are skipped.
    #[must_use]
    pub fn from_nodes(nodes: &[Node]) -> Self {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();
        for node in nodes {
            let index = graph.add_node(node.id.clone());
            indices.insert(node.id.clone(), index);
        }
        for node in nodes {
            let Some(&source) = indices.get(&node.id) else {
                continue;
            };
            for rel in &node.relationships {
                if let Some(&target) = indices.get(&rel.target) {
                    graph.add_edge(source, target, ());
                }
            }
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built proximity graph"
        );
        Self { graph, indices }
    }

    /// Full per-feature breakdown for two nodes.
    #[must_use]
    pub fn breakdown(&self, a: &Node, b: &Node) -> RelatednessScore {
        RelatednessScore {
            keyword_sim: jaccard(&tokens(a), &tokens(b)),
            tag_sim: jaccard(&tags(a), &tags(b)),
            graph_proximity: self.proximity(&a.id, &b.id),
        }
    }

    /// `1.0 / (1.0 + d)` where `d` is the undirected shortest-path hop
    /// distance, or `0.0` beyond [`MAX_HOPS`] / unreachable / unknown.
    #[must_use]
    pub fn proximity(&self, a: &NodeId, b: &NodeId) -> f32 {
        if a == b {
            return 1.0;
        }
        let (Some(&start), Some(&goal)) = (self.indices.get(a), self.indices.get(b)) else {
            return 0.0;
        };

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
        visited.insert(start);
        queue.push_back((start, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= MAX_HOPS {
                continue;
            }
            for neighbor in self.graph.neighbors_undirected(current) {
                if neighbor == goal {
                    return 1.0 / (1.0 + (depth + 1) as f32);
                }
                if visited.insert(neighbor) {
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
        0.0
    }
}

impl RelatednessScorer for JaccardScorer {
    fn score(&self, origin: &Node, candidate: &Node) -> f32 {
        self.breakdown(origin, candidate).mean()
    }
}

#[cfg(test)]
mod tests {
    use super::{JaccardScorer, MAX_HOPS, jaccard};
    use credo_core::graph::reasoning::RelatednessScorer as _;
    use credo_core::model::{
        Node, NodeBody, NodeId, NodeMetadata, NodeStatus, Relationship, RelationshipType,
    };
    use std::collections::HashSet;

    fn node(id: &str, title: &str, tags: &[&str]) -> Node {
        let mut metadata = NodeMetadata::created("tester", chrono_now());
        metadata.tags = tags.iter().map(|t| (*t).to_string()).collect();
        Node {
            id: NodeId::new_unchecked(id),
            body: NodeBody::Note {},
            status: NodeStatus::Accepted,
            title: title.into(),
            content: String::new(),
            description: None,
            metadata,
            relationships: vec![],
            referenced_by: vec![],
        }
    }

    fn chrono_now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }

    fn link(node: &mut Node, rel_type: RelationshipType, target: &str) {
        node.relationships
            .push(Relationship::new(rel_type, NodeId::new_unchecked(target)));
    }

    #[test]
    fn jaccard_basics() {
        let a: HashSet<&str> = ["x", "y", "z"].into_iter().collect();
        let b: HashSet<&str> = ["y", "z", "w"].into_iter().collect();
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-6);

        let empty: HashSet<&str> = HashSet::new();
        assert_eq!(jaccard(&empty, &empty), 0.0);
        assert_eq!(jaccard(&a, &empty), 0.0);
    }

    #[test]
    fn identical_text_scores_high() {
        let a = node("a", "database migration plan", &["infra"]);
        let b = node("b", "database migration plan", &["infra"]);
        let scorer = JaccardScorer::from_nodes(&[a.clone(), b.clone()]);
        let breakdown = scorer.breakdown(&a, &b);
        assert!((breakdown.keyword_sim - 1.0).abs() < 1e-6);
        assert!((breakdown.tag_sim - 1.0).abs() < 1e-6);
        // Not linked: proximity is zero.
        assert_eq!(breakdown.graph_proximity, 0.0);
    }

    #[test]
    fn proximity_decays_with_distance() {
        let mut a = node("a", "", &[]);
        let mut b = node("b", "", &[]);
        let c = node("c", "", &[]);
        link(&mut a, RelationshipType::DependsOn, "b");
        link(&mut b, RelationshipType::DependsOn, "c");
        let scorer = JaccardScorer::from_nodes(&[a, b, c]);

        let direct = scorer.proximity(&NodeId::new_unchecked("a"), &NodeId::new_unchecked("b"));
        let two_hops = scorer.proximity(&NodeId::new_unchecked("a"), &NodeId::new_unchecked("c"));
        assert!((direct - 0.5).abs() < 1e-6);
        assert!((two_hops - 1.0 / 3.0).abs() < 1e-6);
        assert!(direct > two_hops);
    }

    #[test]
    fn proximity_is_undirected() {
        let mut a = node("a", "", &[]);
        let b = node("b", "", &[]);
        link(&mut a, RelationshipType::References, "b");
        let scorer = JaccardScorer::from_nodes(&[a, b]);
        // Edge points a → b, but proximity works both ways.
        assert!(scorer.proximity(&NodeId::new_unchecked("b"), &NodeId::new_unchecked("a")) > 0.0);
    }

    #[test]
    fn distant_nodes_score_zero_proximity() {
        // Chain longer than MAX_HOPS.
        let count = MAX_HOPS + 3;
        let mut nodes: Vec<Node> = (0..count)
            .map(|i| node(&format!("n{i}"), "", &[]))
            .collect();
        for i in 0..count - 1 {
            let target = format!("n{}", i + 1);
            link(&mut nodes[i], RelationshipType::DependsOn, &target);
        }
        let scorer = JaccardScorer::from_nodes(&nodes);
        assert_eq!(
            scorer.proximity(
                &NodeId::new_unchecked("n0"),
                &NodeId::new_unchecked(format!("n{}", count - 1)),
            ),
            0.0
        );
    }

    #[test]
    fn cyclic_graph_terminates() {
        let mut a = node("a", "", &[]);
        let mut b = node("b", "", &[]);
        link(&mut a, RelationshipType::Blocks, "b");
        link(&mut b, RelationshipType::Blocks, "a");
        let scorer = JaccardScorer::from_nodes(&[a.clone(), b.clone()]);
        assert!((scorer.score(&a, &b) - scorer.score(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn unknown_nodes_score_zero_proximity() {
        let a = node("a", "", &[]);
        let scorer = JaccardScorer::from_nodes(&[a]);
        assert_eq!(
            scorer.proximity(&NodeId::new_unchecked("a"), &NodeId::new_unchecked("ghost")),
            0.0
        );
    }
}
