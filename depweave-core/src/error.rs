//! Error Types
//!
//! Two families of errors come out of the engine:
//!
//! - [`GraphError`] is returned synchronously by registry operations that
//!   change the shape of the graph or settle a node by hand.
//! - [`NodeError`] is the failure side of a node's resolved future. It is
//!   only ever observed by whoever awaits that future.

use std::sync::Arc;

use thiserror::Error;

/// Error type handed in by resolvers and external callers of `resolve`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure cause shared between every waiter of a settled future.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Structural errors raised synchronously by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A node with this name is already registered.
    #[error("duplicate node {name}")]
    DuplicateNode { name: String },

    /// Registering the node would close a dependency cycle.
    ///
    /// `cycle` lists the nodes in prerequisite order and repeats the first
    /// node at the end.
    #[error("dependency cycle found: {}", .cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    /// The node's resolved future has already settled.
    #[error("node {name} is already settled")]
    AlreadySettled { name: String },
}

/// The failure outcome of a node's resolved (or ready) future.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    /// The resolver returned an error, directly or from its future.
    #[error("resolver for node {node} failed: {source}")]
    Resolver {
        node: String,
        #[source]
        source: Cause,
    },

    /// The resolver panicked while running.
    #[error("resolver for node {node} panicked: {message}")]
    Panicked { node: String, message: String },

    /// A dependency failed, so this node can never become ready.
    ///
    /// `dependency` is the direct dependency that failed. `source` is the
    /// failure that started the cascade, shared by every node it reached.
    #[error("dependency {dependency} of node {node} failed")]
    Dependency {
        node: String,
        dependency: String,
        #[source]
        source: Arc<NodeError>,
    },

    /// An external caller settled the node as failed.
    #[error("node {node} was rejected: {source}")]
    Rejected {
        node: String,
        #[source]
        source: Cause,
    },

    /// The resolver returned a pending future but no runtime was available
    /// to drive it.
    #[error("resolver for node {node} did not complete and no async runtime is available")]
    NoRuntime { node: String },
}

impl NodeError {
    /// Name of the node this error was raised for.
    pub fn node(&self) -> &str {
        match self {
            Self::Resolver { node, .. }
            | Self::Panicked { node, .. }
            | Self::Dependency { node, .. }
            | Self::Rejected { node, .. }
            | Self::NoRuntime { node } => node,
        }
    }

    /// Follow `Dependency` wrappers down to the failure that started the
    /// cascade.
    pub fn root_cause(&self) -> &NodeError {
        let mut current = self;
        while let Self::Dependency { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// Shared handle to the failure that started this error's cascade.
    ///
    /// Cascades reuse one allocation instead of nesting one per node, so a
    /// long chain of failed nodes stays flat.
    pub fn origin(&self) -> Arc<NodeError> {
        match self {
            Self::Dependency { source, .. } => Arc::clone(source),
            other => Arc::new(other.clone()),
        }
    }

    /// True if this failure was inherited from a dependency.
    pub fn is_cascade(&self) -> bool {
        matches!(self, Self::Dependency { .. })
    }
}
