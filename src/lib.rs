//! `graphlearn`: graph ranking and graph neural network node classification.
//!
//! Two independent surfaces:
//! - **Ranking**: [`Harmonic`] and [`Closeness`] centrality, both built on the
//!   all-sources [`shortest_path()`] oracle and fitted through the [`Ranking`] trait.
//! - **GNN**: [`gnn::GnnModel`], a stack of graph convolution layers with a
//!   fit / transform / predict lifecycle.
//!
//! Public invariants (must not drift):
//! - **Node order**: outputs are indexed by node id \(0..n-1\) consistent with the input graph's
//!   adapter semantics (row index for dense matrices, `NodeIndex::index()` with `petgraph`).
//! - **Unreachable is infinite**: the oracle encodes unreachable pairs as `f64::INFINITY`, so
//!   their reciprocal contributes exactly `0` to harmonic scores.
//! - **Determinism**: outputs are deterministic given identical inputs + configs (including
//!   `random_state` / `seed` where randomness is involved). `n_jobs` never changes results.
//! - **No partial state**: a failed `fit` leaves the estimator as it was.
//!
//! Swappable (allowed to change without breaking the contract):
//! - iteration strategy (serial vs parallel)
//! - internal data structures (so long as invariants hold)

pub mod closeness;
pub mod gnn;
pub mod graph;
pub mod harmonic;
pub mod ranking;
pub mod shortest_path;

pub use closeness::{Closeness, ClosenessConfig, ClosenessMethod};
pub use graph::{AdjacencyMatrix, Graph, Reversed, WeightedGraph};
pub use harmonic::{harmonic_centrality, Harmonic, HarmonicConfig};
pub use ranking::{bipartite2undirected, Ranking};
pub use shortest_path::{shortest_path, ShortestPathConfig};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(usize),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error(
        "adjacency is not square ({rows}x{cols}); convert biadjacency matrices with \
         `bipartite2undirected` first"
    )]
    NotSquare { rows: usize, cols: usize },
    #[error("not fitted: {0} is only available after fit")]
    NotFitted(&'static str),
    #[error("graph must be connected")]
    NotConnected,
    #[error("non-finite values at iteration {iteration}")]
    NonFinite { iteration: usize },
    #[error("non-finite values in inference output")]
    NonFiniteOutput,
}

pub type Result<T> = std::result::Result<T, Error>;
