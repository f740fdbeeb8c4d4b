//! Shared surface of the ranking estimators.
//!
//! A ranking is fitted once per graph and then exposes one score per node.
//! Square-only estimators reject biadjacency matrices; convert those first with
//! [`bipartite2undirected`].

use ndarray::{s, Array2};

use crate::graph::{Graph, WeightedGraph};
use crate::{Error, Result};

pub trait Ranking {
    /// Compute scores for `graph`, replacing any previous result.
    fn fit<G: WeightedGraph + Sync>(&mut self, graph: &G) -> Result<&mut Self>;

    /// Scores from the last successful `fit`, indexed by node id.
    fn score(&self) -> Option<&[f64]>;

    fn fit_transform<G: WeightedGraph + Sync>(&mut self, graph: &G) -> Result<Vec<f64>> {
        let fitted = self.fit(graph)?;
        fitted
            .score()
            .map(<[f64]>::to_vec)
            .ok_or(Error::NotFitted("score"))
    }
}

pub(crate) fn check_square<G: Graph>(graph: &G) -> Result<()> {
    let (rows, cols) = graph.shape();
    if rows != cols {
        return Err(Error::NotSquare { rows, cols });
    }
    Ok(())
}

/// Symmetric adjacency of a bipartite graph.
///
/// A `n x p` biadjacency `B` becomes the `(n + p) x (n + p)` matrix `[[0, B], [B^T, 0]]`:
/// row nodes keep ids `0..n`, column nodes get ids `n..n + p`.
pub fn bipartite2undirected(biadjacency: &Array2<f64>) -> Array2<f64> {
    let (n, p) = biadjacency.dim();
    let mut adjacency = Array2::zeros((n + p, n + p));
    adjacency.slice_mut(s![..n, n..]).assign(biadjacency);
    adjacency.slice_mut(s![n.., ..n]).assign(&biadjacency.t());
    adjacency
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn bipartite2undirected_is_symmetric_and_square() {
        let b = array![[1.0, 0.0, 2.0], [0.0, 3.0, 0.0]];
        let a = bipartite2undirected(&b);
        assert_eq!(a.dim(), (5, 5));
        assert_eq!(a, a.t());
        assert_eq!(a[[0, 2]], 1.0);
        assert_eq!(a[[4, 0]], 2.0);
        assert_eq!(a[[1, 3]], 3.0);
        assert_eq!(a[[0, 1]], 0.0);
    }

    #[test]
    fn check_square_reports_shape() {
        let b = Array2::<f64>::zeros((2, 3));
        let err = check_square(&b).unwrap_err();
        assert!(matches!(err, Error::NotSquare { rows: 2, cols: 3 }));
    }
}
