//! Lifecycle shared by GNN node classifiers.
//!
//! `fit` has no default: a type is only a classifier once it says how to train. The
//! provided methods build `fit_transform`, `fit_predict` and the fitted-state guard on top.
//!
//! ```compile_fail
//! use graphlearn::gnn::GnnClassifier;
//! use ndarray::Array2;
//!
//! struct Untrained;
//!
//! // Missing `fit`.
//! impl GnnClassifier for Untrained {
//!     fn embedding(&self) -> Option<&Array2<f64>> {
//!         None
//!     }
//! }
//! ```

use ndarray::{Array2, ArrayView1};

use super::model::FitConfig;
use crate::{Error, Result};

pub trait GnnClassifier: Sized {
    /// Train on `adjacency` (`n x n`), `features` (`n x d`) and per-node `labels`
    /// (`None` = unlabelled). On error, any previously fitted state is left as it was.
    fn fit(
        &mut self,
        adjacency: &Array2<f64>,
        features: &Array2<f64>,
        labels: &[Option<usize>],
        config: &FitConfig,
    ) -> Result<&mut Self>;

    /// Output of the last layer for every node, once fitted.
    fn embedding(&self) -> Option<&Array2<f64>>;

    /// `Ok(self)` if fitted, `Error::NotFitted` otherwise.
    fn check_fitted(&self) -> Result<&Self> {
        match self.embedding() {
            Some(_) => Ok(self),
            None => Err(Error::NotFitted("embedding")),
        }
    }

    fn fit_transform(
        &mut self,
        adjacency: &Array2<f64>,
        features: &Array2<f64>,
        labels: &[Option<usize>],
        config: &FitConfig,
    ) -> Result<Array2<f64>> {
        self.fit(adjacency, features, labels, config)?;
        self.check_fitted()?
            .embedding()
            .cloned()
            .ok_or(Error::NotFitted("embedding"))
    }

    /// Hard label per node: arg-max over the last layer's output.
    fn fit_predict(
        &mut self,
        adjacency: &Array2<f64>,
        features: &Array2<f64>,
        labels: &[Option<usize>],
        config: &FitConfig,
    ) -> Result<Vec<usize>> {
        let embedding = self.fit_transform(adjacency, features, labels, config)?;
        Ok(argmax_rows(&embedding))
    }
}

pub(crate) fn argmax(row: ArrayView1<'_, f64>) -> usize {
    let mut best = 0usize;
    let mut best_value = f64::NEG_INFINITY;
    for (j, &x) in row.iter().enumerate() {
        if x > best_value {
            best = j;
            best_value = x;
        }
    }
    best
}

/// First maximal column of each row.
pub(crate) fn argmax_rows(matrix: &Array2<f64>) -> Vec<usize> {
    matrix.rows().into_iter().map(argmax).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Constant {
        embedding: Option<Array2<f64>>,
    }

    impl GnnClassifier for Constant {
        fn fit(
            &mut self,
            adjacency: &Array2<f64>,
            _features: &Array2<f64>,
            _labels: &[Option<usize>],
            _config: &FitConfig,
        ) -> Result<&mut Self> {
            let n = adjacency.nrows();
            let mut e = Array2::zeros((n, 2));
            e.column_mut(1).fill(1.0);
            self.embedding = Some(e);
            Ok(self)
        }

        fn embedding(&self) -> Option<&Array2<f64>> {
            self.embedding.as_ref()
        }
    }

    #[test]
    fn provided_methods_follow_fit() {
        let mut c = Constant { embedding: None };
        assert!(matches!(c.check_fitted(), Err(Error::NotFitted(_))));
        let a = Array2::<f64>::zeros((3, 3));
        let pred = c.fit_predict(&a, &a, &[None; 3], &FitConfig::default()).unwrap();
        assert_eq!(pred, vec![1, 1, 1]);
        assert!(c.check_fitted().is_ok());
    }

    #[test]
    fn argmax_takes_first_maximum() {
        let m = array![[0.2, 0.5, 0.5], [3.0, -1.0, 0.0]];
        assert_eq!(argmax_rows(&m), vec![1, 0]);
    }
}
