//! Edge Bookkeeping
//!
//! Edges are kept in two adjacency maps, one per direction. The cycle
//! detector walks `dependents`; `dependencies` backs edge counting and keeps
//! each node's outgoing list for exact rollback:
//!
//! - `dependencies`: dependent -> the names it waits on
//! - `dependents`: dependency -> the names waiting on it
//!
//! Both maps preserve insertion order, so traversal follows declaration order.
//! Names referenced only as dependencies appear as keys in `dependents` but
//! have no entry in `dependencies` until they are registered themselves.

use indexmap::IndexMap;

/// Adjacency lists keyed by node name.
pub type Adjacency = IndexMap<String, Vec<String>>;

/// Bidirectional edge index.
#[derive(Debug, Default, Clone)]
pub struct EdgeIndex {
    dependencies: Adjacency,
    dependents: Adjacency,
}

/// Record of edges appended for one registration attempt.
///
/// Each entry remembers how long a list was before the attempt, or that the
/// list did not exist at all, so the attempt can be undone exactly.
#[derive(Debug)]
#[must_use = "staged edges must be committed or rolled back"]
pub struct StagedEdges {
    touched_dependencies: Vec<Touched>,
    touched_dependents: Vec<Touched>,
}

#[derive(Debug)]
struct Touched {
    key: String,
    previous_len: Option<usize>,
}

impl EdgeIndex {
    /// Create an empty edge index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependent -> dependencies map.
    pub fn dependencies(&self) -> &Adjacency {
        &self.dependencies
    }

    /// Dependency -> dependents map.
    pub fn dependents(&self) -> &Adjacency {
        &self.dependents
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(Vec::len).sum()
    }

    /// Append the edges of `node` and return what is needed to undo them.
    pub fn stage<S: AsRef<str>>(&mut self, node: &str, dependencies: &[S]) -> StagedEdges {
        let mut staged = StagedEdges {
            touched_dependencies: Vec::new(),
            touched_dependents: Vec::new(),
        };

        staged
            .touched_dependencies
            .push(touch(&mut self.dependencies, node));

        for dependency in dependencies {
            let dependency = dependency.as_ref();

            if let Some(list) = self.dependencies.get_mut(node) {
                list.push(dependency.to_string());
            }

            if !staged.touched_dependents.iter().any(|t| t.key == dependency) {
                staged
                    .touched_dependents
                    .push(touch(&mut self.dependents, dependency));
            }
            if let Some(list) = self.dependents.get_mut(dependency) {
                list.push(node.to_string());
            }
        }

        staged
    }

    /// Undo a staging step, restoring both maps to their previous state.
    ///
    /// Staged edges must be rolled back in reverse order of staging if more
    /// than one attempt is outstanding.
    pub fn rollback(&mut self, staged: StagedEdges) {
        restore(&mut self.dependencies, staged.touched_dependencies);
        restore(&mut self.dependents, staged.touched_dependents);
    }

    /// Keep the staged edges.
    pub fn commit(&mut self, staged: StagedEdges) {
        drop(staged);
    }
}

fn touch(map: &mut Adjacency, key: &str) -> Touched {
    let previous_len = map.get(key).map(Vec::len);
    if previous_len.is_none() {
        map.insert(key.to_string(), Vec::new());
    }
    Touched {
        key: key.to_string(),
        previous_len,
    }
}

fn restore(map: &mut Adjacency, touched: Vec<Touched>) {
    for entry in touched.into_iter().rev() {
        match entry.previous_len {
            Some(len) => {
                if let Some(list) = map.get_mut(&entry.key) {
                    list.truncate(len);
                }
            }
            None => {
                // Keys created by this attempt are always the most recent
                // ones, so removing them keeps the insertion order intact.
                map.shift_remove(&entry.key);
            }
        }
    }
}
