//! Graph adapter traits.
//!
//! Every operator in this crate reads graphs through these traits. Node ids are `0..n`
//! where `n = node_count()`; output vectors are indexed the same way.
//!
//! Dense inputs (`AdjacencyMatrix`, `ndarray::Array2<f64>`) treat an entry of exactly `0.0`
//! as "no edge". They may also be rectangular (biadjacency matrices), which is why
//! `shape()` exists: square-only operators check it instead of trusting `node_count()`.

use ndarray::Array2;

pub trait Graph {
    fn node_count(&self) -> usize;

    /// Outgoing neighbors of `node`.
    fn neighbors(&self, node: usize) -> Vec<usize>;

    fn out_degree(&self, node: usize) -> usize {
        self.neighbors(node).len()
    }

    /// `(rows, cols)` of the underlying matrix. Always square for true graphs.
    fn shape(&self) -> (usize, usize) {
        let n = self.node_count();
        (n, n)
    }

    fn is_square(&self) -> bool {
        let (rows, cols) = self.shape();
        rows == cols
    }
}

pub trait WeightedGraph: Graph {
    fn edge_weight(&self, source: usize, target: usize) -> f64;
}

/// Borrowed dense adjacency matrix, one `Vec` per row.
#[derive(Debug, Clone, Copy)]
pub struct AdjacencyMatrix<'a>(pub &'a [Vec<f64>]);

impl Graph for AdjacencyMatrix<'_> {
    fn node_count(&self) -> usize {
        self.0.len()
    }

    fn neighbors(&self, node: usize) -> Vec<usize> {
        self.0[node]
            .iter()
            .enumerate()
            .filter(|(_, &w)| w != 0.0)
            .map(|(j, _)| j)
            .collect()
    }

    /// Uniform rows report their common length. Ragged rows have no width, so `cols` is
    /// forced away from `rows` and they never pass `is_square`.
    fn shape(&self) -> (usize, usize) {
        let rows = self.0.len();
        let Some(first) = self.0.first() else {
            return (0, 0);
        };
        let width = first.len();
        let cols = if self.0.iter().all(|r| r.len() == width) {
            width
        } else {
            self.0.iter().map(Vec::len).max().unwrap_or(0).max(rows + 1)
        };
        (rows, cols)
    }
}

impl WeightedGraph for AdjacencyMatrix<'_> {
    fn edge_weight(&self, source: usize, target: usize) -> f64 {
        self.0[source].get(target).copied().unwrap_or(0.0)
    }
}

impl Graph for Array2<f64> {
    fn node_count(&self) -> usize {
        self.nrows()
    }

    fn neighbors(&self, node: usize) -> Vec<usize> {
        self.row(node)
            .iter()
            .enumerate()
            .filter(|(_, &w)| w != 0.0)
            .map(|(j, _)| j)
            .collect()
    }

    fn shape(&self) -> (usize, usize) {
        self.dim()
    }
}

impl WeightedGraph for Array2<f64> {
    fn edge_weight(&self, source: usize, target: usize) -> f64 {
        self[[source, target]]
    }
}

/// `graph` with every edge reversed: out-neighbors of `v` here are the in-neighbors of `v`
/// there, so distances from `s` here are distances to `s` in the original.
#[derive(Debug, Clone)]
pub struct Reversed<'a, G> {
    graph: &'a G,
    in_neighbors: Vec<Vec<usize>>,
}

impl<'a, G: Graph> Reversed<'a, G> {
    pub fn new(graph: &'a G) -> Self {
        let n = graph.node_count();
        let mut in_neighbors = vec![Vec::new(); n];
        for u in 0..n {
            for v in graph.neighbors(u) {
                if v < n {
                    in_neighbors[v].push(u);
                }
            }
        }
        Self {
            graph,
            in_neighbors,
        }
    }
}

impl<G: Graph> Graph for Reversed<'_, G> {
    fn node_count(&self) -> usize {
        self.in_neighbors.len()
    }

    fn neighbors(&self, node: usize) -> Vec<usize> {
        self.in_neighbors[node].clone()
    }

    fn shape(&self) -> (usize, usize) {
        let (rows, cols) = self.graph.shape();
        (cols, rows)
    }
}

impl<G: WeightedGraph> WeightedGraph for Reversed<'_, G> {
    fn edge_weight(&self, source: usize, target: usize) -> f64 {
        self.graph.edge_weight(target, source)
    }
}

#[cfg(feature = "petgraph")]
mod petgraph_impls {
    use super::{Graph, WeightedGraph};
    use petgraph::graph::{Graph as PetGraph, IndexType, NodeIndex};
    use petgraph::EdgeType;

    impl<N, E, Ty, Ix> Graph for PetGraph<N, E, Ty, Ix>
    where
        Ty: EdgeType,
        Ix: IndexType,
    {
        fn node_count(&self) -> usize {
            PetGraph::node_count(self)
        }

        fn neighbors(&self, node: usize) -> Vec<usize> {
            PetGraph::neighbors(self, NodeIndex::new(node))
                .map(|v| v.index())
                .collect()
        }
    }

    impl<N, E, Ty, Ix> WeightedGraph for PetGraph<N, E, Ty, Ix>
    where
        E: Copy + Into<f64>,
        Ty: EdgeType,
        Ix: IndexType,
    {
        fn edge_weight(&self, source: usize, target: usize) -> f64 {
            self.find_edge(NodeIndex::new(source), NodeIndex::new(target))
                .and_then(|e| self.edge_weight(e))
                .map(|&w| w.into())
                .unwrap_or(0.0)
        }
    }
}
