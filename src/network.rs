//! All-pairs shortest paths over the facility network.
//!
//! The network is given as a dense adjacency matrix where `0` means "no
//! edge". Distances between nodes that are not connected are reported as
//! `f64::INFINITY`, never as `0`.

use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Dense `n x n` matrix of shortest-path distances.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.data[from * self.n + to]
    }

    pub fn is_reachable(&self, from: usize, to: usize) -> bool {
        self.get(from, to).is_finite()
    }

    /// Every disconnected pair `(a, b)` with `a < b`.
    pub fn unreachable_pairs(&self) -> Vec<(usize, usize)> {
        (0..self.n)
            .flat_map(|a| (a + 1..self.n).map(move |b| (a, b)))
            .filter(|&(a, b)| !self.is_reachable(a, b))
            .collect()
    }
}

/// Build the undirected graph described by `adjacency`.
///
/// An edge exists when either `adjacency[i][j]` or `adjacency[j][i]` is
/// non-zero; when both are, the lighter one wins.
fn build_graph(adjacency: &[Vec<f64>]) -> Result<UnGraph<(), f64>> {
    let n = adjacency.len();
    let mut graph: UnGraph<(), f64> = UnGraph::with_capacity(n, n);
    let nodes: Vec<NodeIndex> = (0..n).map(|_| graph.add_node(())).collect();

    for (i, row) in adjacency.iter().enumerate() {
        if row.len() != n {
            return Err(Error::invalid(format!(
                "network row {i} has {} entries, expected {n}",
                row.len()
            )));
        }
        if let Some(w) = row.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(Error::invalid(format!(
                "network row {i} has invalid weight {w}; weights must be finite and non-negative"
            )));
        }
    }

    for i in 0..n {
        for j in i + 1..n {
            let weight = match (adjacency[i][j], adjacency[j][i]) {
                (0.0, 0.0) => continue,
                (w, 0.0) | (0.0, w) => w,
                (a, b) => a.min(b),
            };
            graph.add_edge(nodes[i], nodes[j], weight);
        }
    }

    Ok(graph)
}

/// Compute shortest-path distances between every pair of nodes.
pub fn shortest_paths(adjacency: &[Vec<f64>]) -> Result<DistanceMatrix> {
    let graph = build_graph(adjacency)?;
    let n = graph.node_count();
    debug!(nodes = n, edges = graph.edge_count(), "computing all-pairs shortest paths");

    let mut data = vec![f64::INFINITY; n * n];
    for source in graph.node_indices() {
        let reached = dijkstra(&graph, source, None, |e| *e.weight());
        let row = &mut data[source.index() * n..(source.index() + 1) * n];
        for (target, distance) in reached {
            row[target.index()] = distance;
        }
        row[source.index()] = 0.0;
    }

    let matrix = DistanceMatrix { n, data };
    let unreachable = matrix.unreachable_pairs().len();
    if unreachable > 0 {
        warn!(pairs = unreachable, "network is disconnected; affected pairs are excluded");
    }
    Ok(matrix)
}
