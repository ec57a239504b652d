//! Graph reads over the committed arena.
//!
//! [`GraphView`] materializes nothing: it reads adjacency straight off the
//! relationship lists (outgoing) and the derived `referenced_by` index
//! (incoming). Every walk in [`traverse`] and [`reasoning`] carries an
//! explicit visited set and a depth bound — the graph may be cyclic and
//! termination is structural, never assumed.

pub mod reasoning;
pub mod traverse;

use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::model::node::Node;
use crate::model::node_id::NodeId;
use crate::model::relationship::{Direction, RelationshipType};
use crate::store::StoreState;

/// A read-only adjacency view over one committed snapshot.
pub(crate) struct GraphView<'a> {
    state: &'a StoreState,
}

impl<'a> GraphView<'a> {
    pub(crate) const fn new(state: &'a StoreState) -> Self {
        Self { state }
    }

    pub(crate) fn node(&self, id: &NodeId) -> Option<&'a Node> {
        self.state.node(id)
    }

    /// Typed neighbors of `id`, deduplicated and sorted for deterministic
    /// traversal order.
    ///
    /// `types = None` follows every relationship type.
    pub(crate) fn neighbors(
        &self,
        id: &NodeId,
        types: Option<&[RelationshipType]>,
        direction: Direction,
    ) -> Vec<(RelationshipType, NodeId)> {
        let wanted = |rel_type: RelationshipType| match types {
            Some(list) => list.contains(&rel_type),
            None => true,
        };

        let mut edges: BTreeSet<(RelationshipType, NodeId)> = BTreeSet::new();
        let Some(node) = self.node(id) else {
            return Vec::new();
        };

        if direction.includes_outgoing() {
            for rel in &node.relationships {
                if wanted(rel.rel_type) {
                    edges.insert((rel.rel_type, rel.target.clone()));
                }
            }
        }
        if direction.includes_incoming() {
            for source_id in &node.referenced_by {
                if let Some(source) = self.node(source_id) {
                    for rel in &source.relationships {
                        if rel.target == *id && wanted(rel.rel_type) {
                            edges.insert((rel.rel_type, source_id.clone()));
                        }
                    }
                }
            }
        }

        edges.into_iter().collect()
    }

    /// Breadth-first expansion from `start` (excluded from the result),
    /// bounded by `max_depth` hops. Returns `(node id, distance)` pairs in
    /// discovery order; the visited set makes cycles harmless.
    pub(crate) fn bfs(
        &self,
        start: &NodeId,
        types: Option<&[RelationshipType]>,
        direction: Direction,
        max_depth: usize,
    ) -> Vec<(NodeId, usize)> {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();
        let mut found = Vec::new();

        visited.insert(start.clone());
        queue.push_back((start.clone(), 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (_, neighbor) in self.neighbors(&current, types, direction) {
                if visited.insert(neighbor.clone()) {
                    found.push((neighbor.clone(), depth + 1));
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }

        found
    }
}
