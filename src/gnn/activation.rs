//! Layer activation functions.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Axis};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Activation {
    Identity,
    Relu,
    Sigmoid,
    Softmax,
}

impl Activation {
    pub const ALL: [Activation; 4] = [
        Activation::Identity,
        Activation::Relu,
        Activation::Sigmoid,
        Activation::Softmax,
    ];

    /// Lowercased name, as used in the model's string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Identity => "identity",
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Softmax => "softmax",
        }
    }

    pub fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Identity => z.clone(),
            Activation::Relu => z.mapv(|x| x.max(0.0)),
            Activation::Sigmoid => z.mapv(|x| 1.0 / (1.0 + (-x).exp())),
            Activation::Softmax => softmax(z),
        }
    }

    /// Gradient with respect to the pre-activation `z`, given the activation output `h`
    /// and the upstream gradient `grad` (all `n x width`).
    pub fn backward(&self, z: &Array2<f64>, h: &Array2<f64>, grad: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Identity => grad.clone(),
            Activation::Relu => {
                let mut out = grad.clone();
                out.zip_mut_with(z, |g, &x| {
                    if x <= 0.0 {
                        *g = 0.0;
                    }
                });
                out
            }
            Activation::Sigmoid => grad * &h.mapv(|s| s * (1.0 - s)),
            Activation::Softmax => {
                // Row-wise Jacobian-vector product: s * (g - <g, s>).
                let dot = (grad * h).sum_axis(Axis(1)).insert_axis(Axis(1));
                h * &(grad - &dot)
            }
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        Activation::ALL
            .into_iter()
            .find(|a| a.as_str() == lower)
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "unsupported activation '{s}' (expected one of: identity, relu, sigmoid, softmax)"
                ))
            })
    }
}

/// Numerically stable row-wise softmax.
pub(crate) fn softmax(z: &Array2<f64>) -> Array2<f64> {
    let mut out = z.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
        row.mapv_inplace(|x| (x - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|x| x / sum);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Relu".parse::<Activation>().unwrap(), Activation::Relu);
        assert_eq!("SOFTMAX".parse::<Activation>().unwrap(), Activation::Softmax);
        assert_eq!(Activation::Sigmoid.to_string(), "sigmoid");
    }

    #[test]
    fn rejects_unknown_name() {
        let err = "tanh".parse::<Activation>().unwrap_err();
        assert!(format!("{err}").contains("unsupported activation 'tanh'"));
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let z = array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 1000.0]];
        let s = Activation::Softmax.apply(&z);
        for row in s.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!((s[[1, 0]] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn relu_backward_masks_negative_inputs() {
        let z = array![[-1.0, 2.0]];
        let h = Activation::Relu.apply(&z);
        let g = Activation::Relu.backward(&z, &h, &array![[5.0, 5.0]]);
        assert_eq!(g, array![[0.0, 5.0]]);
    }

    #[test]
    fn softmax_backward_matches_finite_difference() {
        let z = array![[0.3, -0.2, 0.5]];
        let upstream = array![[1.0, -2.0, 0.5]];
        let h = softmax(&z);
        let analytic = Activation::Softmax.backward(&z, &h, &upstream);
        let eps = 1e-6;
        for j in 0..3 {
            let mut zp = z.clone();
            zp[[0, j]] += eps;
            let mut zm = z.clone();
            zm[[0, j]] -= eps;
            let fp = (&softmax(&zp) * &upstream).sum();
            let fm = (&softmax(&zm) * &upstream).sum();
            let numeric = (fp - fm) / (2.0 * eps);
            assert!((numeric - analytic[[0, j]]).abs() < 1e-6);
        }
    }
}
