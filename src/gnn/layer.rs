//! Graph convolution layers.
//!
//! A layer is a [`LayerSpec`] (fixed at construction) plus the parameters learned by the
//! last fit. The forward map is
//!
//! ```text
//! H' = act(Â (H W) + b)
//! ```
//!
//! where `Â` is the adjacency (plus identity when `self_loops`) normalised by out-degree
//! according to [`Normalization`]. Kipf & Welling, ICLR 2017.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, Axis};
use rand::Rng;

use super::activation::Activation;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayerKind {
    #[default]
    GcnConv,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::GcnConv => f.write_str("GCNConv"),
        }
    }
}

impl FromStr for LayerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gcnconv" | "gcn" => Ok(LayerKind::GcnConv),
            _ => Err(Error::InvalidParameter(format!(
                "unsupported layer type '{s}' (expected GCNConv)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Normalization {
    /// `D^-1 A`
    Left,
    /// `A D^-1`
    Right,
    /// `D^-1/2 A D^-1/2`
    #[default]
    Both,
}

impl Normalization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Normalization::Left => "left",
            Normalization::Right => "right",
            Normalization::Both => "both",
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Normalization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Normalization::Left),
            "right" => Ok(Normalization::Right),
            "both" => Ok(Normalization::Both),
            _ => Err(Error::InvalidParameter(format!(
                "unsupported normalization '{s}' (expected left, right or both)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerSpec {
    pub kind: LayerKind,
    pub out_channels: usize,
    pub activation: Activation,
    pub use_bias: bool,
    pub normalization: Normalization,
    pub self_loops: bool,
}

impl LayerSpec {
    /// A `GCNConv` spec with bias, `both` normalisation and self-loops.
    pub fn new(out_channels: usize, activation: Activation) -> Self {
        Self {
            kind: LayerKind::GcnConv,
            out_channels,
            activation,
            use_bias: true,
            normalization: Normalization::Both,
            self_loops: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.out_channels == 0 {
            return Err(Error::InvalidParameter(
                "out_channels must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn py_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(out_channels: {}, activation: {}, use_bias: {}, norm: {}, self_loops: {})",
            self.kind,
            self.out_channels,
            self.activation,
            py_bool(self.use_bias),
            self.normalization,
            py_bool(self.self_loops),
        )
    }
}

/// Learned parameters of one layer. The bias is a `1 x out` row so it broadcasts.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub weight: Array2<f64>,
    pub bias: Option<Array2<f64>>,
}

impl Parameters {
    fn is_finite(&self) -> bool {
        self.weight.iter().all(|x| x.is_finite())
            && self
                .bias
                .as_ref()
                .map_or(true, |b| b.iter().all(|x| x.is_finite()))
    }
}

/// Intermediate values of one forward pass, kept for back-propagation.
#[derive(Debug)]
pub(crate) struct ForwardCache {
    /// `Â H`
    pub aggregated: Array2<f64>,
    pub pre_activation: Array2<f64>,
    pub output: Array2<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    spec: LayerSpec,
    params: Option<Parameters>,
}

impl Layer {
    pub fn new(spec: LayerSpec) -> Self {
        Self { spec, params: None }
    }

    pub fn spec(&self) -> &LayerSpec {
        &self.spec
    }

    pub fn activation(&self) -> Activation {
        self.spec.activation
    }

    pub fn out_channels(&self) -> usize {
        self.spec.out_channels
    }

    /// Parameters of the last successful fit.
    pub fn parameters(&self) -> Option<&Parameters> {
        self.params.as_ref()
    }

    pub(crate) fn parameters_mut(&mut self) -> Option<&mut Parameters> {
        self.params.as_mut()
    }

    pub(crate) fn has_finite_parameters(&self) -> bool {
        self.params.as_ref().map_or(true, Parameters::is_finite)
    }

    /// Glorot-uniform weights and zero bias for `in_channels` inputs.
    pub(crate) fn initialize<R: Rng>(&mut self, in_channels: usize, rng: &mut R) {
        let out = self.spec.out_channels;
        let limit = (6.0 / (in_channels + out) as f64).sqrt();
        let weight = Array2::from_shape_fn((in_channels, out), |_| rng.gen_range(-limit..=limit));
        let bias = self.spec.use_bias.then(|| Array2::zeros((1, out)));
        self.params = Some(Parameters { weight, bias });
    }

    /// `Â` for this layer's normalisation and self-loop setting.
    pub(crate) fn propagation_matrix(&self, adjacency: &Array2<f64>) -> Array2<f64> {
        normalize(adjacency, self.spec.normalization, self.spec.self_loops)
    }

    pub(crate) fn forward(&self, propagation: &Array2<f64>, input: &Array2<f64>) -> Result<ForwardCache> {
        let params = self.params.as_ref().ok_or(Error::NotFitted("layer parameters"))?;
        if input.ncols() != params.weight.nrows() {
            return Err(Error::InvalidParameter(format!(
                "layer expects {} input channels, got {}",
                params.weight.nrows(),
                input.ncols()
            )));
        }
        let aggregated = propagation.dot(input);
        let mut pre_activation = aggregated.dot(&params.weight);
        if let Some(bias) = &params.bias {
            pre_activation += bias;
        }
        let output = self.spec.activation.apply(&pre_activation);
        Ok(ForwardCache {
            aggregated,
            pre_activation,
            output,
        })
    }

    /// Gradients of the parameters and of the layer input, given the gradient with
    /// respect to this layer's pre-activation.
    pub(crate) fn backward(
        &self,
        propagation: &Array2<f64>,
        cache: &ForwardCache,
        grad_pre: &Array2<f64>,
    ) -> Result<(Parameters, Array2<f64>)> {
        let params = self.params.as_ref().ok_or(Error::NotFitted("layer parameters"))?;
        let weight = cache.aggregated.t().dot(grad_pre);
        let bias = params
            .bias
            .as_ref()
            .map(|_| grad_pre.sum_axis(Axis(0)).insert_axis(Axis(0)));
        let grad_input = propagation.t().dot(&grad_pre.dot(&params.weight.t()));
        Ok((Parameters { weight, bias }, grad_input))
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.spec, f)
    }
}

/// Degree-normalised adjacency. Rows with zero degree stay zero.
pub fn normalize(adjacency: &Array2<f64>, normalization: Normalization, self_loops: bool) -> Array2<f64> {
    let n = adjacency.nrows();
    let mut a = adjacency.clone();
    if self_loops {
        a += &Array2::<f64>::eye(n);
    }
    let degree = a.sum_axis(Axis(1));
    let inverse = |power: f64| -> Array1<f64> {
        degree.mapv(|d| if d > 0.0 { d.powf(-power) } else { 0.0 })
    };
    match normalization {
        Normalization::Left => {
            let d = inverse(1.0).insert_axis(Axis(1));
            a *= &d;
        }
        Normalization::Right => {
            let d = inverse(1.0).insert_axis(Axis(0));
            a *= &d;
        }
        Normalization::Both => {
            let d = inverse(0.5);
            a *= &d.view().insert_axis(Axis(1));
            a *= &d.view().insert_axis(Axis(0));
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn spec_display_lists_fields_in_order() {
        let spec = LayerSpec::new(8, Activation::Relu);
        assert_eq!(
            spec.to_string(),
            "GCNConv(out_channels: 8, activation: relu, use_bias: True, norm: both, self_loops: True)"
        );
        let spec = LayerSpec {
            use_bias: false,
            self_loops: false,
            normalization: Normalization::Left,
            ..LayerSpec::new(2, Activation::Softmax)
        };
        assert_eq!(
            spec.to_string(),
            "GCNConv(out_channels: 2, activation: softmax, use_bias: False, norm: left, self_loops: False)"
        );
    }

    #[test]
    fn left_normalization_is_row_stochastic() {
        let a = array![[0.0, 1.0, 1.0], [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]];
        let p = normalize(&a, Normalization::Left, true);
        for row in p.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        let p = normalize(&a, Normalization::Left, false);
        assert_eq!(p.row(2).sum(), 0.0);
    }

    #[test]
    fn both_normalization_is_symmetric_on_undirected_input() {
        let a = array![[0.0, 1.0, 1.0], [1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let p = normalize(&a, Normalization::Both, true);
        assert_eq!(p, p.t());
        assert!((p[[0, 0]] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn forward_before_initialize_is_an_error() {
        let layer = Layer::new(LayerSpec::new(2, Activation::Relu));
        let x = Array2::<f64>::ones((3, 2));
        let p = layer.propagation_matrix(&Array2::zeros((3, 3)));
        assert!(matches!(layer.forward(&p, &x), Err(Error::NotFitted(_))));
    }

    #[test]
    fn forward_shapes() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = Layer::new(LayerSpec::new(4, Activation::Sigmoid));
        layer.initialize(3, &mut rng);
        let a = Array2::<f64>::zeros((5, 5));
        let p = layer.propagation_matrix(&a);
        let cache = layer.forward(&p, &Array2::ones((5, 3))).unwrap();
        assert_eq!(cache.output.dim(), (5, 4));
        assert!(layer.parameters().unwrap().bias.is_some());
    }

    #[test]
    fn weight_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut layer = Layer::new(LayerSpec::new(2, Activation::Sigmoid));
        layer.initialize(3, &mut rng);
        let a = array![[0.0, 1.0, 0.0], [1.0, 0.0, 1.0], [0.0, 1.0, 0.0]];
        let x = array![[1.0, 0.5, -0.5], [0.2, -1.0, 0.3], [0.0, 0.4, 0.9]];
        let p = layer.propagation_matrix(&a);

        // Loss = sum(output), so upstream gradient is all ones.
        let cache = layer.forward(&p, &x).unwrap();
        let ones = Array2::<f64>::ones(cache.output.raw_dim());
        let grad_pre = layer
            .activation()
            .backward(&cache.pre_activation, &cache.output, &ones);
        let (grads, _) = layer.backward(&p, &cache, &grad_pre).unwrap();

        let eps = 1e-6;
        for i in 0..3 {
            for j in 0..2 {
                let mut plus = layer.clone();
                plus.parameters_mut().unwrap().weight[[i, j]] += eps;
                let mut minus = layer.clone();
                minus.parameters_mut().unwrap().weight[[i, j]] -= eps;
                let fp = plus.forward(&p, &x).unwrap().output.sum();
                let fm = minus.forward(&p, &x).unwrap().output.sum();
                let numeric = (fp - fm) / (2.0 * eps);
                assert!((numeric - grads.weight[[i, j]]).abs() < 1e-6);
            }
        }
    }
}
