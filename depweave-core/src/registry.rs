//! Node Registry
//!
//! The registry is the single source of truth for a graph: which names are
//! registered, which settlement belongs to which name, and (when cycle
//! checking is on) the edge index.
//!
//! # Forward References
//!
//! Two lookups are kept apart on purpose:
//!
//! - `resolved`: every name that has ever been mentioned, mapped to its
//!   resolved settlement. Entries are created lazily, by being named as a
//!   dependency, by [`Registry::resolved`], or by [`Registry::resolve`].
//! - `nodes`: only names registered through [`Registry::add`].
//!
//! [`Registry::has`] and duplicate detection look at `nodes` alone, so a name
//! that is only referenced is not "registered" and can still be added later,
//! at which point it reuses the existing settlement.
//!
//! # Locking
//!
//! One `parking_lot::Mutex` guards the state. `add` holds it across the
//! duplicate check, the cycle check and the insert, then releases it before
//! wiring the resolver. Settling never happens under the lock, so resolvers
//! and settlement callbacks may call back into the registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::config::RegistryConfig;
use crate::error::{BoxError, GraphError, NodeError};
use crate::graph::{self, EdgeIndex};
use crate::settle::{self, Dispatch, ReadyFuture, ResolvedFuture, Resolver, Settlement};

/// A registered node.
struct NodeRecord<T> {
    dependencies: SmallVec<[String; 4]>,
    ready: ReadyFuture<T>,
}

struct State<T> {
    nodes: IndexMap<String, NodeRecord<T>>,
    resolved: HashMap<String, ResolvedFuture<T>>,
    edges: Option<EdgeIndex>,
}

impl<T> State<T>
where
    T: Clone + Send + 'static,
{
    /// Resolved settlement for `name`, created on first mention.
    fn placeholder(&mut self, name: &str) -> ResolvedFuture<T> {
        self.resolved
            .entry(name.to_string())
            .or_insert_with(Settlement::pending)
            .clone()
    }
}

struct Shared<T> {
    config: RegistryConfig,
    dispatch: Dispatch,
    state: Mutex<State<T>>,
}

/// Registry of named nodes and their settlements.
///
/// Cloning a `Registry` gives another handle to the same graph.
///
/// # Example
///
/// ```rust
/// use depweave_core::{Registry, Resolver};
///
/// let registry = Registry::<String>::new();
/// registry.add("config", &[], None).unwrap();
/// registry
///     .add("app", &["config"], Some(Resolver::new(|deps: Vec<String>| Ok(format!("app({})", deps[0])))))
///     .unwrap();
///
/// registry.fulfill("config", "cfg".to_string()).unwrap();
/// assert_eq!(
///     registry.resolved("app").peek().and_then(|o| o.ok()).as_deref(),
///     Some("app(cfg)")
/// );
/// ```
pub struct Registry<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Registry<T>
where
    T: Clone + Send + 'static,
{
    /// Create a registry with the default configuration.
    ///
    /// Resolvers are spawned on the tokio runtime this is called from, if
    /// any; otherwise they run inline.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with the given configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::build(config, Dispatch::detect())
    }

    /// Create a registry whose resolvers are spawned on `runtime`.
    pub fn with_runtime(config: RegistryConfig, runtime: Handle) -> Self {
        Self::build(config, Dispatch::Runtime(runtime))
    }

    fn build(config: RegistryConfig, dispatch: Dispatch) -> Self {
        let edges = config.check_circular.then(EdgeIndex::new);
        Self {
            shared: Arc::new(Shared {
                config,
                dispatch,
                state: Mutex::new(State {
                    nodes: IndexMap::new(),
                    resolved: HashMap::new(),
                    edges,
                }),
            }),
        }
    }

    /// The configuration this registry was built with.
    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }

    /// Register `name` with its dependencies and optional resolver.
    ///
    /// Returns the node's ready future, which fulfills with the dependencies'
    /// values once all of them have fulfilled.
    ///
    /// # Errors
    ///
    /// - [`GraphError::DuplicateNode`] if `name` is already registered.
    /// - [`GraphError::Cycle`] if cycle checking is on and the new edges
    ///   would close a loop.
    ///
    /// On error the registry is left exactly as it was.
    pub fn add(
        &self,
        name: &str,
        dependencies: &[&str],
        resolver: Option<Resolver<T>>,
    ) -> Result<ReadyFuture<T>, GraphError> {
        let (ready, resolved) = {
            let mut state = self.shared.state.lock();

            if state.nodes.contains_key(name) {
                debug!(node = %name, "rejected duplicate node");
                return Err(GraphError::DuplicateNode {
                    name: name.to_string(),
                });
            }

            if let Some(edges) = state.edges.as_mut() {
                let staged = edges.stage(name, dependencies);
                if let Some(cycle) = graph::detect(name, edges) {
                    edges.rollback(staged);
                    debug!(node = %name, cycle = %cycle.join(" -> "), "rejected dependency cycle");
                    return Err(GraphError::Cycle { cycle });
                }
                edges.commit(staged);
            }

            let inputs = dependencies
                .iter()
                .map(|dependency| (dependency.to_string(), state.placeholder(dependency)))
                .collect();
            let ready = settle::all(name, inputs);
            let resolved = state.placeholder(name);

            state.nodes.insert(
                name.to_string(),
                NodeRecord {
                    dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
                    ready: ready.clone(),
                },
            );
            (ready, resolved)
        };

        debug!(
            node = %name,
            dependencies = dependencies.len(),
            resolver = resolver.is_some(),
            "node registered"
        );
        settle::wire(
            name.to_string(),
            &ready,
            resolved,
            resolver,
            self.shared.dispatch.clone(),
        );
        Ok(ready)
    }

    /// Check whether `name` was registered through [`Registry::add`].
    ///
    /// Names that are only referenced as dependencies, or only queried, do
    /// not count.
    pub fn has(&self, name: &str) -> bool {
        self.shared.state.lock().nodes.contains_key(name)
    }

    /// The resolved future of `name`, created unsettled if unknown.
    ///
    /// Every call for the same name returns a handle to the same settlement.
    pub fn resolved(&self, name: &str) -> ResolvedFuture<T> {
        self.shared.state.lock().placeholder(name)
    }

    /// Settle `name` by hand: `Ok` fulfills it, `Err` fails it with
    /// [`NodeError::Rejected`].
    ///
    /// # Errors
    ///
    /// [`GraphError::AlreadySettled`] if the node already has an outcome; the
    /// existing outcome is kept.
    pub fn resolve(&self, name: &str, outcome: Result<T, BoxError>) -> Result<(), GraphError> {
        let target = self.resolved(name);
        let outcome = outcome.map_err(|source| NodeError::Rejected {
            node: name.to_string(),
            source: Arc::from(source),
        });
        let fulfilled = outcome.is_ok();

        if target.try_settle(outcome) {
            trace!(node = %name, fulfilled, "node settled externally");
            Ok(())
        } else {
            Err(GraphError::AlreadySettled {
                name: name.to_string(),
            })
        }
    }

    /// Fulfill `name` with `value`.
    pub fn fulfill(&self, name: &str, value: T) -> Result<(), GraphError> {
        self.resolve(name, Ok(value))
    }

    /// Fail `name` with `cause`.
    pub fn reject(&self, name: &str, cause: impl Into<BoxError>) -> Result<(), GraphError> {
        self.resolve(name, Err(cause.into()))
    }

    /// The ready future of a registered node.
    pub fn ready(&self, name: &str) -> Option<ReadyFuture<T>> {
        self.shared
            .state
            .lock()
            .nodes
            .get(name)
            .map(|record| record.ready.clone())
    }

    /// Declared dependencies of a registered node, in order.
    pub fn dependencies(&self, name: &str) -> Option<Vec<String>> {
        self.shared
            .state
            .lock()
            .nodes
            .get(name)
            .map(|record| record.dependencies.to_vec())
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.shared.state.lock().nodes.keys().cloned().collect()
    }

    /// Registered names whose resolved future has not settled yet.
    pub fn pending(&self) -> Vec<String> {
        let state = self.shared.state.lock();
        state
            .nodes
            .keys()
            .filter(|name| {
                state
                    .resolved
                    .get(name.as_str())
                    .map_or(true, |resolved| !resolved.is_settled())
            })
            .cloned()
            .collect()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.shared.state.lock().nodes.len()
    }

    /// Check whether no node is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of edges tracked for cycle checking, if enabled.
    pub fn edge_count(&self) -> Option<usize> {
        self.shared
            .state
            .lock()
            .edges
            .as_ref()
            .map(EdgeIndex::edge_count)
    }
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Registry<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Registry")
            .field("config", &self.shared.config)
            .field("nodes", &state.nodes.len())
            .field("references", &state.resolved.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settle::SettlementState;

    fn known_names<T>(registry: &Registry<T>) -> usize {
        registry.shared.state.lock().resolved.len()
    }

    #[test]
    fn add_and_has() {
        let registry = Registry::<i32>::new();
        registry.add("a", &[], None).unwrap();

        assert!(registry.has("a"));
        assert!(!registry.has("b"));
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }

    #[test]
    fn duplicate_leaves_registry_untouched() {
        let registry = Registry::<i32>::new();
        registry.add("dup", &[], None).unwrap();
        let edges = registry.edge_count();

        let err = registry.add("dup", &["other"], None).unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode { name: "dup".into() });
        assert_eq!(registry.edge_count(), edges);
        assert_eq!(registry.dependencies("dup"), Some(Vec::new()));
        assert_eq!(known_names(&registry), 1);
    }

    #[test]
    fn forward_reference_is_not_registered() {
        let registry = Registry::<i32>::new();
        registry.add("b", &["a"], None).unwrap();

        assert!(registry.has("b"));
        assert!(!registry.has("a"));
        assert_eq!(known_names(&registry), 2);

        let placeholder = registry.resolved("a");
        registry.add("a", &[], None).unwrap();
        assert!(registry.has("a"));
        assert!(placeholder.ptr_eq(&registry.resolved("a")));
    }

    #[test]
    fn querying_a_name_does_not_register_it() {
        let registry = Registry::<i32>::new();
        let first = registry.resolved("ghost");
        let second = registry.resolved("ghost");

        assert!(first.ptr_eq(&second));
        assert!(!registry.has("ghost"));
        assert!(registry.is_empty());
    }

    #[test]
    fn cycle_is_rejected_and_rolled_back() {
        let registry = Registry::<i32>::new();
        registry.add("b", &["a"], None).unwrap();
        registry.add("c", &["b"], None).unwrap();
        let edges = registry.edge_count();
        let names = known_names(&registry);

        let err = registry.add("a", &["c"], None).unwrap_err();
        assert_eq!(
            err,
            GraphError::Cycle {
                cycle: vec!["a".into(), "b".into(), "c".into(), "a".into()]
            }
        );
        assert_eq!(err.to_string(), "dependency cycle found: a -> b -> c -> a");

        assert!(!registry.has("a"));
        assert_eq!(registry.edge_count(), edges);
        assert_eq!(known_names(&registry), names);
        assert_eq!(registry.names(), vec!["b".to_string(), "c".to_string()]);

        // The graph is still usable after the rejected insert.
        registry.add("a", &[], None).unwrap();
        assert!(registry.has("a"));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let registry = Registry::<i32>::new();
        let err = registry.add("a", &["a"], None).unwrap_err();
        assert_eq!(
            err,
            GraphError::Cycle {
                cycle: vec!["a".into(), "a".into()]
            }
        );
        assert_eq!(known_names(&registry), 0);
    }

    #[test]
    fn disabled_cycle_check_skips_edge_bookkeeping() {
        let config = RegistryConfig::default().with_check_circular(false);
        let registry = Registry::<i32>::with_config(config);
        registry.add("b", &["a"], None).unwrap();
        registry.add("c", &["b"], None).unwrap();
        registry.add("a", &["c"], None).unwrap();

        assert_eq!(registry.edge_count(), None);
        assert_eq!(registry.len(), 3);
        assert!(!registry.config().check_circular);
    }

    #[test]
    fn introspection_reports_declared_shape() {
        let registry = Registry::<i32>::new();
        registry.add("a", &[], None).unwrap();
        registry.add("b", &["a", "a"], None).unwrap();

        assert_eq!(
            registry.dependencies("b"),
            Some(vec!["a".to_string(), "a".to_string()])
        );
        assert_eq!(registry.dependencies("zzz"), None);
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
        assert!(registry.ready("a").is_some());
        assert!(registry.ready("zzz").is_none());
    }

    #[test]
    fn pending_lists_unsettled_nodes() {
        let registry = Registry::<i32>::new();
        registry.add("a", &[], None).unwrap();
        registry
            .add(
                "b",
                &["a"],
                Some(Resolver::new(|deps: Vec<i32>| Ok(deps[0] * 10))),
            )
            .unwrap();
        registry.add("c", &[], None).unwrap();
        assert_eq!(registry.pending(), vec!["a", "b", "c"]);

        registry.fulfill("a", 1).unwrap();
        let known = known_names(&registry);
        assert_eq!(registry.pending(), vec!["c"]);
        assert_eq!(known_names(&registry), known);
        assert_eq!(registry.resolved("b").peek().and_then(|o| o.ok()), Some(10));
    }

    #[test]
    fn second_resolve_is_an_error() {
        let registry = Registry::<i32>::new();
        registry.add("a", &[], None).unwrap();
        registry.fulfill("a", 1).unwrap();

        let err = registry.reject("a", "late").unwrap_err();
        assert_eq!(err, GraphError::AlreadySettled { name: "a".into() });
        assert_eq!(registry.resolved("a").state(), SettlementState::Fulfilled);
    }

    #[test]
    fn clones_share_the_graph() {
        let registry = Registry::<i32>::new();
        let other = registry.clone();
        other.add("a", &[], None).unwrap();
        assert!(registry.has("a"));
    }

    #[test]
    fn resolver_may_register_more_nodes() {
        let registry = Registry::<i32>::new();
        let inner = registry.clone();
        registry
            .add(
                "a",
                &[],
                Some(Resolver::new(move |_| {
                    inner.add("late", &["a"], None).unwrap();
                    Ok(1)
                })),
            )
            .unwrap();

        assert!(registry.has("late"));
        assert_eq!(
            registry.ready("late").and_then(|r| r.peek()).and_then(|o| o.ok()),
            Some(vec![1])
        );
    }
}
