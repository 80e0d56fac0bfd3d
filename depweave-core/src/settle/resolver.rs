//! Resolvers and Dispatch
//!
//! A [`Resolver`] turns the values of a node's dependencies into the node's
//! own value. It can be synchronous ([`Resolver::new`]) or asynchronous
//! ([`Resolver::from_async`]); either way it runs once.
//!
//! Resolver invocation goes through [`Dispatch`]. With a tokio runtime
//! available the resolver runs as a spawned task; without one it runs
//! inline and must finish on its first poll.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use tokio::runtime::Handle;
use tracing::trace;

use super::settlement::{Outcome, Settlement};
use crate::error::{BoxError, NodeError};

/// Future returned by a resolver.
pub type ResolverFuture<T> = BoxFuture<'static, Result<T, BoxError>>;

type ResolverFn<T> = Box<dyn FnOnce(Vec<T>) -> ResolverFuture<T> + Send>;

/// Callback that produces a node's value from its dependencies' values.
pub struct Resolver<T> {
    run: ResolverFn<T>,
}

impl<T> Resolver<T>
where
    T: Send + 'static,
{
    /// Wrap a synchronous resolver.
    ///
    /// # Example
    ///
    /// ```rust
    /// use depweave_core::Resolver;
    ///
    /// let resolver = Resolver::new(|deps: Vec<u32>| Ok(deps.iter().sum()));
    /// # drop(resolver);
    /// ```
    pub fn new<F>(resolve: F) -> Self
    where
        F: FnOnce(Vec<T>) -> Result<T, BoxError> + Send + 'static,
    {
        Self {
            run: Box::new(move |deps| future::ready(resolve(deps)).boxed()),
        }
    }

    /// Wrap an asynchronous resolver.
    pub fn from_async<F, Fut>(resolve: F) -> Self
    where
        F: FnOnce(Vec<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        Self {
            run: Box::new(move |deps| resolve(deps).boxed()),
        }
    }

    /// Build the future that runs this resolver for `node`.
    ///
    /// Nothing runs until the returned future is polled. Errors and panics,
    /// including ones raised before the resolver's own future exists, come
    /// back as [`NodeError`]s.
    pub(crate) fn invoke(self, node: String, args: Vec<T>) -> BoxFuture<'static, Outcome<T>> {
        let run = self.run;
        AssertUnwindSafe(async move { run(args).await })
            .catch_unwind()
            .map(move |result| match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(source)) => Err(NodeError::Resolver {
                    node,
                    source: Arc::from(source),
                }),
                Err(payload) => Err(NodeError::Panicked {
                    node,
                    message: panic_message(payload.as_ref()),
                }),
            })
            .boxed()
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Where resolvers run.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Spawn resolvers on this runtime.
    Runtime(Handle),

    /// Run resolvers on the settling thread.
    Inline,
}

impl Dispatch {
    /// Use the ambient tokio runtime if there is one.
    pub fn detect() -> Self {
        Handle::try_current()
            .map(Self::Runtime)
            .unwrap_or(Self::Inline)
    }

    /// Run `resolver` for `node` and publish its outcome into `target`.
    pub fn run<T>(&self, node: String, resolver: Resolver<T>, args: Vec<T>, target: Settlement<T>)
    where
        T: Clone + Send + 'static,
    {
        let task = resolver.invoke(node.clone(), args);
        match self {
            Self::Runtime(handle) => {
                trace!(node = %node, "spawning resolver");
                handle.spawn(async move {
                    let outcome = task.await;
                    publish(&node, &target, outcome);
                });
            }
            Self::Inline => {
                trace!(node = %node, "running resolver inline");
                let outcome = task
                    .now_or_never()
                    .unwrap_or_else(|| Err(NodeError::NoRuntime { node: node.clone() }));
                publish(&node, &target, outcome);
            }
        }
    }
}

fn publish<T>(node: &str, target: &Settlement<T>, outcome: Outcome<T>)
where
    T: Clone + Send + 'static,
{
    let fulfilled = outcome.is_ok();
    if target.try_settle(outcome) {
        trace!(node = %node, fulfilled, "resolver outcome published");
    } else {
        trace!(node = %node, "node already settled, resolver outcome discarded");
    }
}
