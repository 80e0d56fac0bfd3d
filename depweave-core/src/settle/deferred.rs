//! Deferred Callback Queue
//!
//! Settling a future runs its subscribers, and a subscriber usually settles
//! the next future down the graph. Running them directly would nest one call
//! per node, so a long chain could exhaust the stack.
//!
//! # Implementation
//!
//! Each thread keeps a FIFO of pending jobs. The first [`schedule`] call on a
//! thread becomes the drainer: it runs jobs in a loop until the queue is
//! empty. Calls made while a drain is in progress only enqueue, so the stack
//! depth stays constant however deep the graph is.
//!
//! By the time the outermost `schedule` returns, every job it (transitively)
//! queued has run.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

type Job = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Job>> = RefCell::new(VecDeque::new());
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// Clears the draining flag when dropped.
///
/// Keeps the thread usable even if a job panics.
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.with(|draining| draining.set(false));
    }
}

/// Queue `job` on this thread, and run the queue unless a drain is already
/// in progress further up the stack.
pub(crate) fn schedule(job: Job) {
    QUEUE.with(|queue| queue.borrow_mut().push_back(job));

    if DRAINING.with(|draining| draining.replace(true)) {
        return;
    }
    let _guard = DrainGuard;

    // The borrow ends before the job runs, so jobs may schedule more work.
    while let Some(job) = QUEUE.with(|queue| queue.borrow_mut().pop_front()) {
        job();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn nested_jobs_run_after_the_current_one() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let outer = log.clone();
        schedule(Box::new(move || {
            let inner = outer.clone();
            schedule(Box::new(move || inner.borrow_mut().push("inner")));
            outer.borrow_mut().push("outer");
        }));

        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn long_job_chains_do_not_grow_the_stack() {
        fn step(remaining: usize, count: Rc<Cell<usize>>) {
            count.set(count.get() + 1);
            if remaining > 0 {
                schedule(Box::new(move || step(remaining - 1, count)));
            }
        }

        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        schedule(Box::new(move || step(100_000, counter)));
        assert_eq!(count.get(), 100_001);
    }

    #[test]
    fn panicking_job_leaves_the_queue_usable() {
        let result = std::panic::catch_unwind(|| schedule(Box::new(|| panic!("job failed"))));
        assert!(result.is_err());

        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        schedule(Box::new(move || flag.set(true)));
        assert!(ran.get());
    }
}
