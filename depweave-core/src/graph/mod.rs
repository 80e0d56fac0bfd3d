//! Dependency Graph
//!
//! This module holds the structural side of the engine: which node waits on
//! which, and whether a new registration would close a loop.
//!
//! # Overview
//!
//! - Nodes are identified by name. A name can show up as a dependency long
//!   before it is registered.
//! - Edges point from a dependency to its dependent. Both directions are
//!   indexed; the cycle check walks from dependencies to dependents.
//!
//! # Design Decisions
//!
//! 1. Edges for a new node are staged before the cycle check and rolled back
//!    if a cycle is found, so a failed registration leaves no trace.
//!
//! 2. Adjacency lists keep declaration order, which makes the reported cycle
//!    deterministic.
//!
//! 3. Traversal uses an explicit stack, so deep chains cost heap, not call
//!    depth.
//!
//! 4. The whole module is synchronous and pure; the registry decides when to
//!    call it and holds its lock while doing so.

mod cycle;
mod edges;

pub use cycle::{detect, find_cycle};
pub use edges::{Adjacency, EdgeIndex, StagedEdges};
