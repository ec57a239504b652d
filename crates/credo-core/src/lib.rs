#![forbid(unsafe_code)]
//! credo-core: a governed, versioned graph store for organizational truth.
//!
//! Typed decision/goal/task/risk nodes connected by typed relationships,
//! mutated only through a propose → review → apply workflow with conflict
//! detection and optimistic concurrency control, and queried through a
//! filtering/traversal engine that follows chains of rationale through
//! the graph.
//!
//! # Conventions
//!
//! - **Errors**: typed [`error::StoreError`] with stable machine codes;
//!   `anyhow::Result` at outer composition seams (config loading).
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).
//!
//! # Quick start
//!
//! ```
//! use credo_core::access::ActorContext;
//! use credo_core::model::{NodeBody, WorkspaceId};
//! use credo_core::proposal::{NodeDraft, Operation, ProposalDraft, ReviewAction};
//! use credo_core::store::ContextStore;
//!
//! let store = ContextStore::new(WorkspaceId::new("demo"));
//! let admin = ActorContext::admin("alice");
//!
//! let draft = ProposalDraft {
//!     operations: vec![Operation::Create {
//!         node: NodeDraft {
//!             id: "decision-1".parse().unwrap(),
//!             body: NodeBody::Decision {
//!                 decision: "adopt a typed edge model".into(),
//!                 rationale: None,
//!                 alternatives: vec![],
//!             },
//!             title: "Adopt a typed edge model".into(),
//!             content: String::new(),
//!             description: None,
//!             tags: vec![],
//!             relationships: vec![],
//!         },
//!     }],
//!     ..ProposalDraft::default()
//! };
//!
//! let proposal = store.submit(draft, &admin).unwrap();
//! store
//!     .review(&proposal.id, ReviewAction::Accept, &admin, None, None)
//!     .unwrap();
//! let outcome = store.apply(&proposal.id, &admin).unwrap();
//! assert_eq!(outcome.proposal, proposal.id);
//! ```

pub mod access;
pub mod config;
pub mod conflict;
pub mod error;
pub mod graph;
pub mod model;
pub mod persist;
pub mod proposal;
pub mod query;
pub mod store;

pub use access::{ActorContext, ActorType, Role};
pub use error::{ErrorCode, StoreError};
pub use model::{Node, NodeBody, NodeId, NodeKind, NodeStatus, WorkspaceId};
pub use proposal::{Operation, Proposal, ProposalDraft, ProposalId, ProposalStatus};
pub use store::ContextStore;
