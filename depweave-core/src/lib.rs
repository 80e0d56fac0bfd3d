//! Depweave Core
//!
//! This crate provides the engine behind depweave, an asynchronous
//! dependency resolver. Callers register named nodes, each waiting on zero or
//! more other nodes, and optionally a resolver that produces the node's value
//! once everything it waits on is available.
//!
//! It implements:
//!
//! - A registry with forward references (depend on a name before it exists)
//! - Registration-time cycle detection with exact rollback
//! - Settle-once futures for "ready" and "resolved", with failure cascading
//!   from a dependency to everything downstream of it
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `registry`: the node registry and public entry point
//! - `graph`: edge bookkeeping and the cycle detector
//! - `settle`: settle-once futures, the ready conjunction, resolver dispatch
//! - `config`: construction options
//! - `error`: structural and per-node errors
//!
//! # Example
//!
//! ```rust
//! use depweave_core::{Registry, Resolver};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = Registry::<String>::new();
//!
//! // `page` is declared before `theme` exists.
//! registry
//!     .add(
//!         "page",
//!         &["theme"],
//!         Some(Resolver::from_async(|deps: Vec<String>| async move {
//!             Ok(format!("page styled with {}", deps[0]))
//!         })),
//!     )
//!     .unwrap();
//! registry
//!     .add("theme", &[], Some(Resolver::new(|_| Ok("dark".to_string()))))
//!     .unwrap();
//!
//! let page = registry.resolved("page").await.unwrap();
//! assert_eq!(page, "page styled with dark");
//! # }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod registry;
pub mod settle;

pub use config::RegistryConfig;
pub use error::{BoxError, Cause, GraphError, NodeError};
pub use registry::Registry;
pub use settle::{
    Outcome, ReadyFuture, ResolvedFuture, Resolver, ResolverFuture, Settlement, SettlementState,
};
