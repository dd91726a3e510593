//! Explanatory path queries between named entities.

use petgraph::algo::all_simple_paths;
use petgraph::graph::NodeIndex;

use super::store::KnowledgeGraph;

impl KnowledgeGraph {
    /// All simple directed paths of at most `max_hops` edges from any entity
    /// named `a_name` to any entity named `b_name`, as entity-name sequences.
    ///
    /// Parallel relations produce one path each, so a pair linked twice yields
    /// the same name sequence twice.
    pub fn paths_between(&self, a_name: &str, b_name: &str, max_hops: usize) -> Vec<Vec<String>> {
        if max_hops == 0 {
            return Vec::new();
        }
        let mut paths = Vec::new();
        for &a in self.nodes_named(a_name) {
            for &b in self.nodes_named(b_name) {
                if a == b {
                    continue;
                }
                let found = all_simple_paths::<Vec<NodeIndex>, _>(
                    self.inner(),
                    a,
                    b,
                    0,
                    Some(max_hops - 1),
                );
                for path in found {
                    paths.push(path.into_iter().map(|n| self.name_of(n).to_string()).collect());
                }
            }
        }
        paths
    }
}
