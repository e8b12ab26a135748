//! Shortest paths over the relationship graph.
//!
//! Edges are treated as undirected and weighted by inverse strength, so a
//! chain of strong relationships is cheaper than a single weak one.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Undirected weighted adjacency over node indices.
#[derive(Debug, Default)]
pub struct Adjacency {
    neighbors: HashMap<usize, Vec<(usize, f32)>>,
}

impl Adjacency {
    /// Add an undirected edge of the given strength. Non-positive strengths
    /// are ignored.
    pub fn add_edge(&mut self, a: usize, b: usize, strength: f32) {
        if strength <= 0.0 || a == b {
            return;
        }
        self.neighbors.entry(a).or_default().push((b, strength));
        self.neighbors.entry(b).or_default().push((a, strength));
    }

    pub fn degree(&self, node: usize) -> usize {
        self.neighbors.get(&node).map_or(0, Vec::len)
    }
}

/// Result of a successful search.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath {
    pub nodes: Vec<usize>,
    pub total_cost: f32,
    /// Strength of each traversed edge, in path order.
    pub strengths: Vec<f32>,
}

impl ShortestPath {
    pub fn mean_strength(&self) -> f32 {
        if self.strengths.is_empty() {
            return 0.0;
        }
        self.strengths.iter().sum::<f32>() / self.strengths.len() as f32
    }
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    node: usize,
    cost: f32,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.cost == other.cost
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the cheapest entry first.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Dijkstra from `start` to `goal`. `None` when unreachable or when
/// `start == goal`.
pub fn shortest_path(adjacency: &Adjacency, start: usize, goal: usize) -> Option<ShortestPath> {
    if start == goal {
        return None;
    }

    let mut best: HashMap<usize, f32> = HashMap::new();
    let mut came_from: HashMap<usize, (usize, f32)> = HashMap::new();
    let mut heap = BinaryHeap::new();

    best.insert(start, 0.0);
    heap.push(QueueEntry { node: start, cost: 0.0 });

    while let Some(QueueEntry { node, cost }) = heap.pop() {
        if node == goal {
            let mut nodes = vec![goal];
            let mut strengths = Vec::new();
            let mut current = goal;
            while let Some(&(parent, strength)) = came_from.get(&current) {
                nodes.push(parent);
                strengths.push(strength);
                current = parent;
            }
            nodes.reverse();
            strengths.reverse();
            return Some(ShortestPath {
                nodes,
                total_cost: cost,
                strengths,
            });
        }

        if cost > best.get(&node).copied().unwrap_or(f32::INFINITY) {
            continue;
        }

        let Some(edges) = adjacency.neighbors.get(&node) else {
            continue;
        };
        for &(next, strength) in edges {
            let next_cost = cost + 1.0 / strength;
            if next_cost < best.get(&next).copied().unwrap_or(f32::INFINITY) {
                best.insert(next, next_cost);
                came_from.insert(next, (node, strength));
                heap.push(QueueEntry {
                    node: next,
                    cost: next_cost,
                });
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_edge() {
        let mut adj = Adjacency::default();
        adj.add_edge(0, 1, 0.8);
        let path = shortest_path(&adj, 0, 1).unwrap();
        assert_eq!(path.nodes, vec![0, 1]);
        assert!((path.total_cost - 1.25).abs() < 1e-5);
        assert_eq!(path.strengths, vec![0.8]);
    }

    #[test]
    fn test_prefers_strong_chain_over_weak_edge() {
        let mut adj = Adjacency::default();
        // weak direct edge: cost 1/0.1 = 10
        adj.add_edge(0, 2, 0.1);
        // strong two-hop chain: cost 1 + 1 = 2
        adj.add_edge(0, 1, 1.0);
        adj.add_edge(1, 2, 1.0);

        let path = shortest_path(&adj, 0, 2).unwrap();
        assert_eq!(path.nodes, vec![0, 1, 2]);
        assert!((path.total_cost - 2.0).abs() < 1e-5);
        assert!((path.mean_strength() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_undirected() {
        let mut adj = Adjacency::default();
        adj.add_edge(3, 1, 0.5);
        assert_eq!(shortest_path(&adj, 1, 3).unwrap().nodes, vec![1, 3]);
    }

    #[test]
    fn test_unreachable() {
        let mut adj = Adjacency::default();
        adj.add_edge(0, 1, 0.9);
        adj.add_edge(2, 3, 0.9);
        assert!(shortest_path(&adj, 0, 3).is_none());
    }

    #[test]
    fn test_same_start_and_goal() {
        let mut adj = Adjacency::default();
        adj.add_edge(0, 1, 0.9);
        assert!(shortest_path(&adj, 0, 0).is_none());
    }

    #[test]
    fn test_degree_and_ignored_edges() {
        let mut adj = Adjacency::default();
        adj.add_edge(0, 1, 0.9);
        adj.add_edge(0, 2, 0.0);
        adj.add_edge(0, 0, 0.9);
        assert_eq!(adj.degree(0), 1);
        assert_eq!(adj.degree(1), 1);
        assert_eq!(adj.degree(2), 0);
    }
}
