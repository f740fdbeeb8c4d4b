//! All-sources shortest paths.
//!
//! Output row `k` holds the distances from `sources[k]` to every node, following outgoing
//! edges. Unreachable targets are `f64::INFINITY`, never `0.0`, so `1.0 / d` is `0.0` for them.
//! Rows are independent, which is what the `parallel` feature fans out over.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use ndarray::Array2;

use crate::graph::WeightedGraph;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShortestPathConfig {
    /// Worker count. `None`: serial. `Some(-1)`: every core. `Some(k)`: `k` threads.
    /// Ignored without the `parallel` feature.
    pub n_jobs: Option<isize>,
    /// Count hops instead of summing edge weights.
    pub unweighted: bool,
}

impl ShortestPathConfig {
    pub fn validate(&self) -> Result<()> {
        match self.n_jobs {
            Some(k) if k == 0 || k < -1 => Err(Error::InvalidParameter(format!(
                "n_jobs must be None, -1 or a positive integer (got {k})"
            ))),
            _ => Ok(()),
        }
    }
}

/// Distances from each of `sources` to every node: a `sources.len() x n` matrix.
pub fn shortest_path<G>(graph: &G, sources: &[usize], config: ShortestPathConfig) -> Result<Array2<f64>>
where
    G: WeightedGraph + Sync,
{
    config.validate()?;
    let n = graph.node_count();
    if let Some(&bad) = sources.iter().find(|&&s| s >= n) {
        return Err(Error::IndexOutOfBounds(bad));
    }
    if !config.unweighted {
        check_weights(graph)?;
    }

    let rows = compute_rows(graph, sources, config);
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((sources.len(), n), flat)
        .map_err(|e| Error::InvalidParameter(format!("distance matrix shape: {e}")))
}

fn check_weights<G: WeightedGraph>(graph: &G) -> Result<()> {
    for u in 0..graph.node_count() {
        for v in graph.neighbors(u) {
            let w = graph.edge_weight(u, v);
            if !w.is_finite() {
                return Err(Error::InvalidParameter(
                    "edge weights must be finite".to_string(),
                ));
            }
            if w < 0.0 {
                return Err(Error::InvalidParameter(
                    "edge weights must be non-negative".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn single_source<G: WeightedGraph>(graph: &G, source: usize, unweighted: bool) -> Vec<f64> {
    if unweighted {
        bfs(graph, source)
    } else {
        dijkstra(graph, source)
    }
}

#[cfg(not(feature = "parallel"))]
fn compute_rows<G>(graph: &G, sources: &[usize], config: ShortestPathConfig) -> Vec<Vec<f64>>
where
    G: WeightedGraph + Sync,
{
    sources
        .iter()
        .map(|&s| single_source(graph, s, config.unweighted))
        .collect()
}

#[cfg(feature = "parallel")]
fn compute_rows<G>(graph: &G, sources: &[usize], config: ShortestPathConfig) -> Vec<Vec<f64>>
where
    G: WeightedGraph + Sync,
{
    use rayon::prelude::*;

    let unweighted = config.unweighted;
    let run = || -> Vec<Vec<f64>> {
        sources
            .par_iter()
            .map(|&s| single_source(graph, s, unweighted))
            .collect()
    };
    match config.n_jobs {
        None => sources
            .iter()
            .map(|&s| single_source(graph, s, unweighted))
            .collect(),
        Some(-1) => run(),
        Some(k) => match rayon::ThreadPoolBuilder::new()
            .num_threads(k as usize)
            .build()
        {
            Ok(pool) => pool.install(run),
            Err(e) => {
                tracing::warn!(error = %e, n_jobs = k, "thread pool unavailable, using global pool");
                run()
            }
        },
    }
}

fn bfs<G: WeightedGraph>(graph: &G, source: usize) -> Vec<f64> {
    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut queue = VecDeque::new();
    dist[source] = 0.0;
    queue.push_back(source);
    while let Some(u) = queue.pop_front() {
        for v in graph.neighbors(u) {
            if v < n && dist[v].is_infinite() {
                dist[v] = dist[u] + 1.0;
                queue.push_back(v);
            }
        }
    }
    dist
}

#[derive(Debug, PartialEq)]
struct State {
    cost: f64,
    node: usize,
}

impl Eq for State {}

impl Ord for State {
    // Min-heap on cost; costs are finite and non-negative here.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn dijkstra<G: WeightedGraph>(graph: &G, source: usize) -> Vec<f64> {
    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut heap = BinaryHeap::new();
    dist[source] = 0.0;
    heap.push(State {
        cost: 0.0,
        node: source,
    });
    while let Some(State { cost, node: u }) = heap.pop() {
        if cost > dist[u] {
            continue;
        }
        for v in graph.neighbors(u) {
            if v >= n {
                continue;
            }
            let next = cost + graph.edge_weight(u, v);
            if next < dist[v] {
                dist[v] = next;
                heap.push(State { cost: next, node: v });
            }
        }
    }
    dist
}
