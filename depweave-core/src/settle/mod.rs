//! Settlement Engine
//!
//! Each node owns two settle-once futures:
//!
//! - **ready**: the conjunction of its dependencies' resolved futures. It
//!   fulfills with their values once all of them fulfill, and fails with the
//!   first dependency failure.
//! - **resolved**: the node's own outcome. A resolver settles it after ready
//!   fulfills; without a resolver only an external `resolve` settles it. A
//!   failed ready cascades into resolved.
//!
//! # Implementation Notes
//!
//! Settlement is callback driven. Settling a future runs its subscribers on
//! the settling thread, which in turn settles ready futures downstream and
//! hands resolvers to the [`Dispatch`] for execution. No lock is held while
//! subscribers run, and subscribers are queued per thread rather than nested,
//! so settling the head of a long chain uses constant stack.

mod all;
mod deferred;
mod engine;
mod resolver;
mod settlement;

pub use all::all;
pub use engine::wire;
pub use resolver::{Dispatch, Resolver, ResolverFuture};
pub use settlement::{Outcome, Settlement, SettlementState};

/// A node's resolved future.
pub type ResolvedFuture<T> = Settlement<T>;

/// A node's ready future: the values of its dependencies, in order.
pub type ReadyFuture<T> = Settlement<Vec<T>>;
