//! Cycle Detection
//!
//! Depth-first search from a single start node. The walk keeps the current
//! path as an explicit stack of frames, so graph depth never turns into call
//! depth; reaching a node that is already on the path means a cycle, and the
//! path from that node onward (closed by repeating it) is the witness.
//!
//! Successors are visited in the order they appear in the adjacency list, so
//! the first cycle found under declaration order is the one reported.

use std::collections::HashSet;

use super::edges::{Adjacency, EdgeIndex};

/// Search for a cycle reachable from `start`.
///
/// Returns the closed witness, e.g. `["a", "b", "c", "a"]`, in the direction
/// the edges were followed.
pub fn find_cycle(start: &str, edges: &Adjacency) -> Option<Vec<String>> {
    Search {
        edges,
        visited: HashSet::new(),
        on_path: HashSet::new(),
        path: Vec::new(),
    }
    .run(start)
}

/// Check whether the edges around `node` contain a cycle.
///
/// Walks dependency -> dependents from `node`, so the witness reads in
/// prerequisite order: every name must settle before the next one.
///
/// The index is acyclic before `node`'s edges are staged, and every staged
/// edge touches `node`, so any cycle passes through `node` and this walk
/// finds it. A second walk over dependent -> dependencies could only report
/// the same cycle reversed, so it is not run.
pub fn detect(node: &str, edges: &EdgeIndex) -> Option<Vec<String>> {
    find_cycle(node, edges.dependents())
}

struct Search<'a> {
    edges: &'a Adjacency,
    visited: HashSet<&'a str>,
    on_path: HashSet<&'a str>,
    path: Vec<Frame<'a>>,
}

/// A node on the current path and the index of its next unvisited successor.
struct Frame<'a> {
    name: &'a str,
    cursor: usize,
}

impl<'a> Search<'a> {
    fn run(mut self, start: &'a str) -> Option<Vec<String>> {
        let edges = self.edges;
        self.enter(start);

        while let Some(frame) = self.path.last_mut() {
            let successors = edges.get(frame.name).map(Vec::as_slice).unwrap_or_default();
            let Some(next) = successors.get(frame.cursor) else {
                if let Some(done) = self.path.pop() {
                    self.on_path.remove(done.name);
                }
                continue;
            };
            frame.cursor += 1;

            let next = next.as_str();
            if !self.visited.contains(next) {
                self.enter(next);
            } else if self.on_path.contains(next) {
                return Some(self.witness(next));
            }
        }

        None
    }

    fn enter(&mut self, name: &'a str) {
        self.visited.insert(name);
        self.on_path.insert(name);
        self.path.push(Frame { name, cursor: 0 });
    }

    /// Path slice from `repeated` onward, closed by repeating it.
    fn witness(&self, repeated: &str) -> Vec<String> {
        let position = self
            .path
            .iter()
            .position(|frame| frame.name == repeated)
            .unwrap_or(0);
        let mut cycle: Vec<String> = self.path[position..]
            .iter()
            .map(|frame| frame.name.to_string())
            .collect();
        cycle.push(repeated.to_string());
        cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency(entries: &[(&str, &[&str])]) -> Adjacency {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn names(cycle: &[&str]) -> Vec<String> {
        cycle.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn acyclic_graph_has_no_witness() {
        let edges = adjacency(&[("a", &["b", "c"]), ("b", &["c"]), ("c", &[])]);
        assert_eq!(find_cycle("a", &edges), None);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let edges = adjacency(&[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"])]);
        assert_eq!(find_cycle("a", &edges), None);
    }

    #[test]
    fn triangle_is_reported_from_start() {
        let edges = adjacency(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        assert_eq!(find_cycle("a", &edges), Some(names(&["a", "b", "c", "a"])));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let edges = adjacency(&[("a", &["a"])]);
        assert_eq!(find_cycle("a", &edges), Some(names(&["a", "a"])));
    }

    #[test]
    fn witness_starts_at_the_revisited_node() {
        let edges = adjacency(&[("s", &["a"]), ("a", &["b"]), ("b", &["a"])]);
        assert_eq!(find_cycle("s", &edges), Some(names(&["a", "b", "a"])));
    }

    #[test]
    fn declaration_order_decides_which_cycle_is_reported() {
        let edges = adjacency(&[
            ("a", &["x", "b"]),
            ("x", &["y"]),
            ("y", &["a"]),
            ("b", &["a"]),
        ]);
        assert_eq!(find_cycle("a", &edges), Some(names(&["a", "x", "y", "a"])));
    }

    #[test]
    fn deep_chain_is_walked_without_recursion() {
        let len = 200_000;
        let mut edges: Adjacency = (0..len)
            .map(|i| (format!("n{i}"), vec![format!("n{}", i + 1)]))
            .collect();
        assert_eq!(find_cycle("n0", &edges), None);

        edges.insert(format!("n{len}"), vec!["n0".to_string()]);
        let cycle = find_cycle("n0", &edges).unwrap();
        assert_eq!(cycle.len(), len + 2);
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn missing_entries_are_leaves() {
        let edges = adjacency(&[("a", &["ghost"])]);
        assert_eq!(find_cycle("a", &edges), None);
        assert_eq!(find_cycle("nowhere", &edges), None);
    }

    #[test]
    fn detect_reads_in_prerequisite_order() {
        let mut edges = EdgeIndex::new();
        for (node, deps) in [("b", vec!["a"]), ("c", vec!["b"]), ("a", vec!["c"])] {
            let staged = edges.stage(node, &deps);
            edges.commit(staged);
        }

        assert_eq!(detect("a", &edges), Some(names(&["a", "b", "c", "a"])));
    }

    #[test]
    fn detect_finds_cycles_closed_by_an_earlier_dependent() {
        let mut edges = EdgeIndex::new();
        let staged = edges.stage("b", &["a"]);
        edges.commit(staged);
        let staged = edges.stage("a", &["b"]);

        assert_eq!(detect("a", &edges), Some(names(&["a", "b", "a"])));
        edges.rollback(staged);
        assert_eq!(edges.edge_count(), 1);
    }

    #[test]
    fn detect_on_acyclic_index_is_none() {
        let mut edges = EdgeIndex::new();
        for (node, deps) in [("b", vec!["a"]), ("c", vec!["a", "b"]), ("a", vec![])] {
            let staged = edges.stage(node, &deps);
            edges.commit(staged);
        }

        assert_eq!(detect("a", &edges), None);
        assert_eq!(detect("c", &edges), None);
    }
}
