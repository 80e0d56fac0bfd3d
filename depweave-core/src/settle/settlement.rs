//! Settle-Once Futures
//!
//! A [`Settlement`] is a shared slot that moves from pending to settled
//! exactly once, either fulfilled with a value or failed with a
//! [`NodeError`].
//!
//! # How Settlements Work
//!
//! 1. Handles are cheap clones of one shared slot. Every clone observes the
//!    same outcome.
//!
//! 2. Consumers either `.await` a handle, or register a callback with
//!    [`Settlement::on_settle`]. Callbacks registered after settlement run
//!    immediately on the caller's thread.
//!
//! 3. [`Settlement::try_settle`] performs the single transition. Losing
//!    attempts return `false` and leave the outcome untouched.
//!
//! # Thread Safety
//!
//! The slot sits behind a `parking_lot::Mutex`. Callbacks and wakers are
//! taken out of the slot under the lock and run after it is released, so a
//! callback may freely settle other settlements or register new callbacks.
//!
//! Callbacks go through the thread's deferred queue. A callback that settles
//! another settlement does not run that settlement's callbacks on top of its
//! own frame; they run next, from the outermost `try_settle` on the thread.

use std::fmt::{self, Debug};
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use super::deferred;
use crate::error::NodeError;

/// The settled result of a node.
pub type Outcome<T> = Result<T, NodeError>;

type Callback<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;

/// Observable state of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementState {
    /// No outcome yet.
    Pending,

    /// Settled with a value.
    Fulfilled,

    /// Settled with a failure.
    Failed,
}

enum Slot<T> {
    Pending {
        callbacks: Vec<Callback<T>>,
        wakers: Vec<Waker>,
    },
    Settled(Outcome<T>),
}

/// A future that settles at most once and can be awaited by many.
pub struct Settlement<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Settlement<T>
where
    T: Clone + Send + 'static,
{
    /// Create an unsettled settlement.
    pub fn pending() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Pending {
                callbacks: Vec::new(),
                wakers: Vec::new(),
            })),
        }
    }

    /// Create a settlement that is already fulfilled.
    pub fn fulfilled(value: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Settled(Ok(value)))),
        }
    }

    /// Current state, without waiting.
    pub fn state(&self) -> SettlementState {
        match &*self.slot.lock() {
            Slot::Pending { .. } => SettlementState::Pending,
            Slot::Settled(Ok(_)) => SettlementState::Fulfilled,
            Slot::Settled(Err(_)) => SettlementState::Failed,
        }
    }

    /// Check whether the outcome is known.
    pub fn is_settled(&self) -> bool {
        self.state() != SettlementState::Pending
    }

    /// Clone of the outcome, if settled.
    pub fn peek(&self) -> Option<Outcome<T>> {
        match &*self.slot.lock() {
            Slot::Pending { .. } => None,
            Slot::Settled(outcome) => Some(outcome.clone()),
        }
    }

    /// Settle with `outcome` unless already settled.
    ///
    /// Returns `true` if this call performed the transition. The outcome is
    /// visible at once; callbacks have all run by the time the outermost
    /// `try_settle` on this thread returns.
    pub fn try_settle(&self, outcome: Outcome<T>) -> bool {
        let (callbacks, wakers) = {
            let mut slot = self.slot.lock();
            let drained = match &mut *slot {
                Slot::Settled(_) => return false,
                Slot::Pending { callbacks, wakers } => (mem::take(callbacks), mem::take(wakers)),
            };
            *slot = Slot::Settled(outcome.clone());
            drained
        };

        for waker in wakers {
            waker.wake();
        }
        if !callbacks.is_empty() {
            deferred::schedule(Box::new(move || {
                for callback in callbacks {
                    callback(&outcome);
                }
            }));
        }
        true
    }

    /// Register a callback to run once with the outcome.
    ///
    /// Runs immediately if the settlement is already settled.
    pub fn on_settle<F>(&self, callback: F)
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let settled = {
            let mut slot = self.slot.lock();
            match &mut *slot {
                Slot::Pending { callbacks, .. } => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                Slot::Settled(outcome) => outcome.clone(),
            }
        };
        callback(&settled);
    }

    /// Number of callbacks waiting for the outcome.
    pub fn subscriber_count(&self) -> usize {
        match &*self.slot.lock() {
            Slot::Pending { callbacks, .. } => callbacks.len(),
            Slot::Settled(_) => 0,
        }
    }

    /// Check whether two handles share the same slot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T> Clone for Settlement<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Future for Settlement<T>
where
    T: Clone,
{
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.lock();
        match &mut *slot {
            Slot::Settled(outcome) => Poll::Ready(outcome.clone()),
            Slot::Pending { wakers, .. } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> Debug for Settlement<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Settlement");
        match &*self.slot.lock() {
            Slot::Pending { callbacks, wakers } => out
                .field("state", &SettlementState::Pending)
                .field("callbacks", &callbacks.len())
                .field("wakers", &wakers.len()),
            Slot::Settled(outcome) => out.field("outcome", outcome),
        };
        out.finish()
    }
}
