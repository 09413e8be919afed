//! Weighted simple-path ranking.
//!
//! Depth-first enumeration of every simple path (no repeated node) from a
//! start entity to a target over outgoing edges. Each complete path is
//! scored by folding its edge weights with the graph's [`PathWeighting`];
//! paths are returned strongest first.
//!
//! Parallel edges between the same ordered pair collapse to their highest
//! weight before the search. With non-negative weights both combinators
//! are monotone, so this never hides a better path.
//!
//! Cost is exponential in fan-out × depth. There is no bound, timeout or
//! cancellation; keep it to graphs of a few hundred nodes.

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::model::{PathWeighting, RankedPath};
use super::KnowledgeGraph;

/// Successors of one node with the strongest weight per successor,
/// in first-seen edge order.
type Successors<'g> = SmallVec<[(&'g str, f64); 4]>;
type Adjacency<'g> = HashMap<&'g str, Successors<'g>>;

impl KnowledgeGraph {
    /// Up to `amount` simple paths from `start` to `target`, strongest
    /// first, as lists of entity names.
    ///
    /// Empty when either endpoint is absent or nothing connects them.
    pub fn find_paths(&self, start: &str, target: &str, amount: usize) -> Vec<Vec<String>> {
        self.rank_paths(start, target, amount)
            .into_iter()
            .map(|p| p.nodes)
            .collect()
    }

    /// Like [`find_paths`](Self::find_paths) but keeps each path's
    /// accumulated weight.
    ///
    /// Ties keep discovery order. `start == target` yields the one-node
    /// path with the combinator's identity weight.
    pub fn rank_paths(&self, start: &str, target: &str, amount: usize) -> Vec<RankedPath> {
        if amount == 0 || !self.contains(target) {
            return Vec::new();
        }
        // Borrow the graph-owned key so every name on the trail lives as long as the graph.
        let Some((start, _)) = self.nodes.get_key_value(start) else {
            return Vec::new();
        };

        let adjacency = self.adjacency();
        let weighting = self.config().path_weighting;
        let mut search = PathSearch {
            target,
            weighting,
            visited: HashSet::new(),
            trail: Vec::new(),
            found: Vec::new(),
        };
        search.walk(&adjacency, start.as_str(), weighting.identity());

        let mut found = search.found;
        found.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        found.truncate(amount);
        found
    }

    /// Weight of the strongest path, if any connects the two entities.
    pub fn best_path_weight(&self, start: &str, target: &str) -> Option<f64> {
        self.rank_paths(start, target, 1).first().map(|p| p.weight)
    }

    fn adjacency(&self) -> Adjacency<'_> {
        let mut adjacency: Adjacency<'_> = HashMap::new();
        for edge in self.edges() {
            let successors = adjacency.entry(edge.start.as_str()).or_default();
            match successors.iter_mut().find(|(name, _)| *name == edge.end) {
                Some((_, weight)) => *weight = weight.max(edge.weight),
                None => successors.push((edge.end.as_str(), edge.weight)),
            }
        }
        adjacency
    }
}

/// Per-call DFS state. The visited set is what keeps paths simple.
struct PathSearch<'g, 'q> {
    target: &'q str,
    weighting: PathWeighting,
    visited: HashSet<&'g str>,
    trail: Vec<&'g str>,
    found: Vec<RankedPath>,
}

impl<'g> PathSearch<'g, '_> {
    fn walk(&mut self, adjacency: &Adjacency<'g>, node: &'g str, acc: f64) {
        self.visited.insert(node);
        self.trail.push(node);

        if node == self.target {
            self.found.push(RankedPath {
                nodes: self.trail.iter().map(|n| n.to_string()).collect(),
                weight: acc,
            });
        } else if let Some(successors) = adjacency.get(node) {
            for &(next, weight) in successors {
                if !self.visited.contains(next) {
                    self.walk(adjacency, next, self.weighting.combine(acc, weight));
                }
            }
        }

        self.trail.pop();
        self.visited.remove(node);
    }
}
