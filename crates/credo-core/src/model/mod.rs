//! The node and edge data model.

pub mod node;
pub mod node_id;
pub mod relationship;

pub use node::{Alternative, Node, NodeBody, NodeKind, NodeMetadata, NodeStatus, RiskLevel};
pub use node_id::{InvalidNodeId, NodeId, WorkspaceId};
pub use relationship::{Direction, Relationship, RelationshipType};
