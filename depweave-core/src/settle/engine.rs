//! Wiring between a node's ready and resolved settlements.

use tracing::{debug, trace};

use super::resolver::{Dispatch, Resolver};
use super::settlement::{Outcome, Settlement};

/// Subscribe a node to its own ready settlement.
///
/// - ready fulfilled, resolver present: run the resolver and publish its
///   outcome as the node's resolved outcome
/// - ready fulfilled, no resolver: leave resolved pending for an external
///   `resolve`
/// - ready failed: fail resolved with the same error and never run the
///   resolver
pub fn wire<T>(
    node: String,
    ready: &Settlement<Vec<T>>,
    resolved: Settlement<T>,
    resolver: Option<Resolver<T>>,
    dispatch: Dispatch,
) where
    T: Clone + Send + 'static,
{
    ready.on_settle(move |outcome: &Outcome<Vec<T>>| match outcome {
        Ok(values) => match resolver {
            Some(resolver) => dispatch.run(node, resolver, values.clone(), resolved),
            None => debug!(node = %node, "node ready, waiting for external resolve"),
        },
        Err(err) => {
            if resolved.try_settle(Err(err.clone())) {
                trace!(node = %node, "dependency failure cascaded");
            }
        }
    });
}
