//! Parameter update rules.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptimizerKind {
    /// Parameters stay at their initial values.
    None,
    /// Plain gradient descent.
    Gd,
    #[default]
    Adam,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptimizerKind::None => "None",
            OptimizerKind::Gd => "GD",
            OptimizerKind::Adam => "Adam",
        })
    }
}

impl FromStr for OptimizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(OptimizerKind::None),
            "gd" => Ok(OptimizerKind::Gd),
            "adam" => Ok(OptimizerKind::Adam),
            _ => Err(Error::InvalidParameter(format!(
                "unsupported optimizer '{s}' (expected None, GD or Adam)"
            ))),
        }
    }
}

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

/// Optimizer state for one fit. Parameters are addressed by a stable slot index.
#[derive(Debug)]
pub(crate) struct Optimizer {
    kind: OptimizerKind,
    learning_rate: f64,
    t: i32,
    moments: Vec<Option<(Array2<f64>, Array2<f64>)>>,
}

impl Optimizer {
    pub(crate) fn new(kind: OptimizerKind, learning_rate: f64) -> Self {
        Self {
            kind,
            learning_rate,
            t: 0,
            moments: Vec::new(),
        }
    }

    pub(crate) fn is_noop(&self) -> bool {
        self.kind == OptimizerKind::None
    }

    /// Start a new update step. Call once per iteration, before `update`.
    pub(crate) fn tick(&mut self) {
        self.t = self.t.saturating_add(1);
    }

    pub(crate) fn update(&mut self, slot: usize, param: &mut Array2<f64>, grad: &Array2<f64>) {
        match self.kind {
            OptimizerKind::None => {}
            OptimizerKind::Gd => param.scaled_add(-self.learning_rate, grad),
            OptimizerKind::Adam => {
                if self.moments.len() <= slot {
                    self.moments.resize(slot + 1, None);
                }
                let (m, v) = self.moments[slot].get_or_insert_with(|| {
                    (Array2::zeros(param.raw_dim()), Array2::zeros(param.raw_dim()))
                });
                *m = &*m * BETA1 + grad * (1.0 - BETA1);
                *v = &*v * BETA2 + &grad.mapv(|g| g * g) * (1.0 - BETA2);
                let m_hat = &*m / (1.0 - BETA1.powi(self.t));
                let v_hat = &*v / (1.0 - BETA2.powi(self.t));
                let step = m_hat / (v_hat.mapv(f64::sqrt) + EPSILON);
                param.scaled_add(-self.learning_rate, &step);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn gd_steps_against_gradient() {
        let mut opt = Optimizer::new(OptimizerKind::Gd, 0.5);
        let mut p = array![[1.0, 1.0]];
        opt.tick();
        opt.update(0, &mut p, &array![[2.0, -2.0]]);
        assert_eq!(p, array![[0.0, 2.0]]);
    }

    #[test]
    fn adam_first_step_is_learning_rate_sized() {
        let mut opt = Optimizer::new(OptimizerKind::Adam, 0.01);
        let mut p = array![[1.0]];
        opt.tick();
        opt.update(3, &mut p, &array![[4.0]]);
        assert!((p[[0, 0]] - 0.99).abs() < 1e-6);
    }

    #[test]
    fn none_leaves_parameters() {
        let mut opt = Optimizer::new(OptimizerKind::None, 1.0);
        let mut p = array![[1.0]];
        opt.tick();
        opt.update(0, &mut p, &array![[4.0]]);
        assert_eq!(p, array![[1.0]]);
        assert!(opt.is_noop());
    }

    #[test]
    fn parses_names() {
        assert_eq!("adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert_eq!("GD".parse::<OptimizerKind>().unwrap(), OptimizerKind::Gd);
        assert!("sgd".parse::<OptimizerKind>().is_err());
    }
}
