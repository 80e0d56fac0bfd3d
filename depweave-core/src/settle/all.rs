//! Conjunction
//!
//! Builds a node's ready settlement out of its dependencies' resolved
//! settlements. The result fulfills with every value, in declaration order,
//! once all inputs have fulfilled, and fails as soon as any input fails.

use std::sync::Arc;

use parking_lot::Mutex;

use super::settlement::{Outcome, Settlement};
use crate::error::NodeError;

/// Values gathered so far, indexed by declaration position.
struct Gather<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
}

/// Combine `dependencies` into one settlement for `node`.
///
/// A failing dependency is reported as [`NodeError::Dependency`] naming the
/// dependency and sharing the failure that started the cascade; only the
/// first failure is kept.
pub fn all<T>(node: &str, dependencies: Vec<(String, Settlement<T>)>) -> Settlement<Vec<T>>
where
    T: Clone + Send + 'static,
{
    if dependencies.is_empty() {
        return Settlement::fulfilled(Vec::new());
    }

    let ready = Settlement::pending();
    let gather = Arc::new(Mutex::new(Gather {
        slots: vec![None; dependencies.len()],
        remaining: dependencies.len(),
    }));

    for (index, (dependency, resolved)) in dependencies.into_iter().enumerate() {
        let ready = ready.clone();
        let gather = Arc::clone(&gather);
        let node = node.to_string();

        resolved.on_settle(move |outcome: &Outcome<T>| match outcome {
            Ok(value) => {
                let values = {
                    let mut gather = gather.lock();
                    if gather.slots[index].is_none() {
                        gather.slots[index] = Some(value.clone());
                        gather.remaining -= 1;
                    }
                    if gather.remaining > 0 {
                        return;
                    }
                    gather.slots.iter_mut().filter_map(Option::take).collect()
                };
                ready.try_settle(Ok(values));
            }
            Err(err) => {
                ready.try_settle(Err(NodeError::Dependency {
                    node,
                    dependency,
                    source: err.origin(),
                }));
            }
        });
    }

    ready
}
