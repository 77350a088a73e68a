//! # GHS Core
//!
//! Graph model, message protocol, and error types for the asynchronous
//! Gallager-Humblet-Spira minimum spanning tree simulation.
//!
//! ## Key Types
//!
//! - [`NodeId`]: Dense vertex identity, also the leader tie-break key
//! - [`Edge`]: Weighted undirected edge with a strict total order
//! - [`Graph`]: Simple weighted graph plus a Kruskal reference MST
//! - [`Message`] / [`Envelope`]: Protocol messages and their delivery order
//! - [`GraphError`] / [`ProtocolViolation`]: Load-time and run-time faults

pub mod edge;
pub mod error;
pub mod graph;
pub mod identity;
pub mod message;
pub mod union_find;

// Re-export main types
pub use edge::*;
pub use error::*;
pub use graph::*;
pub use identity::*;
pub use message::*;
pub use union_find::DisjointSets;
