//! Harmonic centrality.
//!
//! \[
//!   h(i) = \sum_{j \ne i} \frac{1}{d(i, j)}
//! \]
//!
//! computed over outgoing paths, with `1 / inf = 0` for unreachable targets.
//! Unlike closeness, it is well defined on disconnected graphs.
//!
//! Reference: Marchiori & Latora, "Harmony in the small-world", Physica A 285 (2000).

use ndarray::Array1;

use crate::graph::WeightedGraph;
use crate::ranking::{check_square, Ranking};
use crate::shortest_path::{shortest_path, ShortestPathConfig};
use crate::Result;

#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HarmonicConfig {
    /// See [`ShortestPathConfig::n_jobs`].
    pub n_jobs: Option<isize>,
    pub unweighted: bool,
}

impl HarmonicConfig {
    pub fn validate(&self) -> Result<()> {
        self.shortest_path().validate()
    }

    fn shortest_path(&self) -> ShortestPathConfig {
        ShortestPathConfig {
            n_jobs: self.n_jobs,
            unweighted: self.unweighted,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Harmonic {
    config: HarmonicConfig,
    score: Option<Vec<f64>>,
}

impl Harmonic {
    pub fn new(config: HarmonicConfig) -> Self {
        Self {
            config,
            score: None,
        }
    }

    pub fn config(&self) -> &HarmonicConfig {
        &self.config
    }
}

impl Ranking for Harmonic {
    fn fit<G: WeightedGraph + Sync>(&mut self, graph: &G) -> Result<&mut Self> {
        check_square(graph)?;
        self.config.validate()?;
        let n = graph.node_count();
        let sources: Vec<usize> = (0..n).collect();

        let mut paths = shortest_path(graph, &sources, self.config.shortest_path())?;

        // Self-distance is 0; go through 1 so the reciprocal stays finite, then drop it.
        paths.diag_mut().fill(1.0);
        let mut inv = paths.mapv(|d| 1.0 / d);
        inv.diag_mut().fill(0.0);

        let score = inv.dot(&Array1::<f64>::ones(n));
        tracing::debug!(nodes = n, "harmonic centrality computed");
        self.score = Some(score.to_vec());
        Ok(self)
    }

    fn score(&self) -> Option<&[f64]> {
        self.score.as_deref()
    }
}

/// One-shot harmonic centrality.
pub fn harmonic_centrality<G: WeightedGraph + Sync>(
    graph: &G,
    config: HarmonicConfig,
) -> Result<Vec<f64>> {
    Harmonic::new(config).fit_transform(graph)
}
