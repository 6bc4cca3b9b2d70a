//! Undirected "readers also liked" graph over ISBNs.
//!
//! Each edge is stored twice, once in each endpoint's neighbor set. Neighbor
//! sets keep insertion order, which makes the BFS discovery order (and so the
//! recommendation list) deterministic.

use std::collections::{HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};

/// Recommendation cut-off used when the caller does not pick one.
pub const DEFAULT_RECOMMENDATIONS: usize = 5;

#[derive(Debug, Default)]
pub struct SimilarityGraph {
    adjacency: IndexMap<String, IndexSet<String>>,
}

impl SimilarityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false` if the node already exists.
    pub fn add_node(&mut self, id: &str) -> bool {
        if self.adjacency.contains_key(id) {
            return false;
        }
        self.adjacency.insert(id.to_string(), IndexSet::new());
        true
    }

    /// Connect `a` and `b`. Both must exist and differ. Re-adding an edge is
    /// accepted and changes nothing.
    pub fn add_edge(&mut self, a: &str, b: &str) -> bool {
        if a == b || !self.adjacency.contains_key(a) || !self.adjacency.contains_key(b) {
            return false;
        }
        if let Some(neighbors) = self.adjacency.get_mut(a) {
            neighbors.insert(b.to_string());
        }
        if let Some(neighbors) = self.adjacency.get_mut(b) {
            neighbors.insert(a.to_string());
        }
        true
    }

    /// `true` if an edge was actually removed.
    pub fn remove_edge(&mut self, a: &str, b: &str) -> bool {
        let removed = self
            .adjacency
            .get_mut(a)
            .is_some_and(|neighbors| neighbors.shift_remove(b));
        if let Some(neighbors) = self.adjacency.get_mut(b) {
            neighbors.shift_remove(a);
        }
        removed
    }

    /// Drop the node and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> bool {
        let Some(neighbors) = self.adjacency.shift_remove(id) else {
            return false;
        };
        for neighbor in &neighbors {
            if let Some(set) = self.adjacency.get_mut(neighbor) {
                set.shift_remove(id);
            }
        }
        true
    }

    /// Breadth-first walk from `id`, excluding `id` itself, cut at `limit`.
    pub fn recommend(&self, id: &str, limit: usize) -> Vec<String> {
        if !self.adjacency.contains_key(id) || limit == 0 {
            return Vec::new();
        }

        let mut visited: HashSet<&str> = HashSet::from([id]);
        let mut queue: VecDeque<&str> = VecDeque::from([id]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            let Some(neighbors) = self.adjacency.get(current) else {
                continue;
            };
            for neighbor in neighbors {
                if visited.insert(neighbor.as_str()) {
                    found.push(neighbor.clone());
                    if found.len() == limit {
                        return found;
                    }
                    queue.push_back(neighbor.as_str());
                }
            }
        }
        found
    }

    /// Direct neighbors only, in the order they were linked.
    pub fn neighbors(&self, id: &str) -> Vec<String> {
        self.adjacency
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adjacency.contains_key(id)
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        self.adjacency
            .get(a)
            .is_some_and(|neighbors| neighbors.contains(b))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(IndexSet::len).sum::<usize>() / 2
    }

    /// Replace the graph with `ids` and the `edges` between them. Edges
    /// naming an unknown id are skipped.
    pub fn rebuild<'a, N, E>(&mut self, ids: N, edges: E)
    where
        N: IntoIterator<Item = &'a str>,
        E: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.adjacency.clear();
        for id in ids {
            self.add_node(id);
        }
        for (a, b) in edges {
            self.add_edge(a, b);
        }
    }

    /// Every edge once, as `(smaller, larger)` pairs.
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges = Vec::new();
        for (id, neighbors) in &self.adjacency {
            for neighbor in neighbors {
                if id < neighbor {
                    edges.push((id.clone(), neighbor.clone()));
                }
            }
        }
        edges
    }
}
