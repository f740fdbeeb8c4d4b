//! Closeness centrality for connected graphs.
//!
//! `c(i) = (n - 1) / sum_j d(i, j)`, over outgoing paths as in harmonic centrality. The
//! approximate method samples target nodes and rescales, which is the usual trade for
//! large graphs. Any unreachable pair makes the
//! score undefined, so such graphs are rejected rather than scored.

use rand::{rngs::StdRng, seq::index::sample, SeedableRng};

use crate::graph::{Reversed, WeightedGraph};
use crate::ranking::{check_square, Ranking};
use crate::shortest_path::{shortest_path, ShortestPathConfig};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClosenessMethod {
    #[default]
    Exact,
    Approximate,
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClosenessConfig {
    pub method: ClosenessMethod,
    /// Target precision of the approximate method.
    pub tolerance: f64,
    pub n_jobs: Option<isize>,
    pub unweighted: bool,
    pub seed: u64,
}

impl Default for ClosenessConfig {
    fn default() -> Self {
        Self {
            method: ClosenessMethod::Exact,
            tolerance: 1e-1,
            n_jobs: None,
            unweighted: false,
            seed: 0,
        }
    }
}

impl ClosenessConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(Error::InvalidParameter(
                "tolerance must be finite and > 0".to_string(),
            ));
        }
        self.shortest_path().validate()
    }

    fn shortest_path(&self) -> ShortestPathConfig {
        ShortestPathConfig {
            n_jobs: self.n_jobs,
            unweighted: self.unweighted,
        }
    }

    /// Number of sampled sources for `n` nodes.
    fn sample_size(&self, n: usize) -> usize {
        match self.method {
            ClosenessMethod::Exact => n,
            ClosenessMethod::Approximate => {
                let k = ((n as f64).ln() / (self.tolerance * self.tolerance)).ceil();
                (k.max(1.0) as usize).min(n)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Closeness {
    config: ClosenessConfig,
    score: Option<Vec<f64>>,
}

impl Closeness {
    pub fn new(config: ClosenessConfig) -> Self {
        Self {
            config,
            score: None,
        }
    }
}

impl Ranking for Closeness {
    fn fit<G: WeightedGraph + Sync>(&mut self, graph: &G) -> Result<&mut Self> {
        check_square(graph)?;
        self.config.validate()?;
        let n = graph.node_count();
        if n <= 1 {
            self.score = Some(vec![0.0; n]);
            return Ok(self);
        }

        let k = self.config.sample_size(n);
        let sources: Vec<usize> = if k == n {
            (0..n).collect()
        } else {
            let mut rng = StdRng::seed_from_u64(self.config.seed);
            let mut picked = sample(&mut rng, n, k).into_vec();
            picked.sort_unstable();
            picked
        };

        let paths = if k == n {
            shortest_path(graph, &sources, self.config.shortest_path())?
        } else {
            // Row s holds d(j, s) for every j.
            shortest_path(&Reversed::new(graph), &sources, self.config.shortest_path())?
        };
        if paths.iter().any(|d| d.is_infinite()) {
            return Err(Error::NotConnected);
        }

        let score = if k == n {
            // Row s is the distance profile of source s.
            paths
                .rows()
                .into_iter()
                .map(|row| (n as f64 - 1.0) / row.sum())
                .collect()
        } else {
            // Column j holds the distances from j to the sampled targets; scale the
            // partial sum up to n.
            let scale = n as f64 / k as f64;
            paths
                .columns()
                .into_iter()
                .map(|col| (n as f64 - 1.0) / (col.sum() * scale))
                .collect()
        };
        tracing::debug!(nodes = n, sources = k, "closeness centrality computed");
        self.score = Some(score);
        Ok(self)
    }

    fn score(&self) -> Option<&[f64]> {
        self.score.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AdjacencyMatrix;
    use ndarray::Array2;

    fn star(n: usize) -> Vec<Vec<f64>> {
        let mut adj = vec![vec![0.0; n]; n];
        for i in 1..n {
            adj[0][i] = 1.0;
            adj[i][0] = 1.0;
        }
        adj
    }

    #[test]
    fn star_center_is_closest() {
        let adj = star(5);
        let score = Closeness::default()
            .fit_transform(&AdjacencyMatrix(&adj))
            .unwrap();
        assert_eq!(score[0], 1.0);
        // leaves: 1 + 2 * 3 = 7
        assert!((score[1] - 4.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn disconnected_graph_is_rejected() {
        let adj = Array2::<f64>::eye(3);
        let err = Closeness::default().fit(&adj).map(|_| ()).unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[test]
    fn approximate_is_seeded_and_finite() {
        let adj = star(30);
        let config = ClosenessConfig {
            method: ClosenessMethod::Approximate,
            tolerance: 0.5,
            seed: 7,
            ..Default::default()
        };
        let g = AdjacencyMatrix(&adj);
        let a = Closeness::new(config).fit_transform(&g).unwrap();
        let b = Closeness::new(config).fit_transform(&g).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|x| x.is_finite() && *x > 0.0));
    }

    #[test]
    fn approximate_follows_outgoing_paths_on_directed_graphs() {
        // 0 -> every node, 1 -> 2 -> ... -> 19 -> 0
        let n = 20;
        let mut adj = vec![vec![0.0; n]; n];
        for j in 1..n {
            adj[0][j] = 1.0;
        }
        for i in 1..n - 1 {
            adj[i][i + 1] = 1.0;
        }
        adj[n - 1][0] = 1.0;
        let g = AdjacencyMatrix(&adj);

        let exact = Closeness::default().fit_transform(&g).unwrap();
        assert_eq!(exact[0], 1.0);

        let config = ClosenessConfig {
            method: ClosenessMethod::Approximate,
            tolerance: 0.6,
            ..Default::default()
        };
        assert!(config.sample_size(n) < n);
        let approx = Closeness::new(config).fit_transform(&g).unwrap();
        assert!((approx[0] - exact[0]).abs() < 0.1, "{}", approx[0]);
        for i in 1..n {
            assert!(exact[0] > exact[i]);
            assert!(approx[0] > approx[i], "node {i}: {}", approx[i]);
        }
    }

    #[test]
    fn single_node_scores_zero() {
        let adj = vec![vec![0.0]];
        let score = Closeness::default()
            .fit_transform(&AdjacencyMatrix(&adj))
            .unwrap();
        assert_eq!(score, vec![0.0]);
    }

    #[test]
    fn rejects_bad_tolerance() {
        let config = ClosenessConfig {
            tolerance: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
