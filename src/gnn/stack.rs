//! Layer stack construction.
//!
//! Two ways in, one normalised form out (`Vec<LayerSpec>` in stack order):
//! - [`LayerStack`]: typed specs, either one spec repeated or an explicit list.
//! - [`LayerParams`]: named parameters, each either a single value broadcast to every
//!   layer or one value per layer. All per-layer sequences must have the same length.
//!
//! Everything is validated here, before a model exists.

use super::activation::Activation;
use super::layer::{LayerKind, LayerSpec, Normalization};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum LayerStack {
    Uniform { spec: LayerSpec, depth: usize },
    Explicit(Vec<LayerSpec>),
}

impl LayerStack {
    pub fn into_specs(self) -> Result<Vec<LayerSpec>> {
        let specs = match self {
            LayerStack::Uniform { spec, depth } => vec![spec; depth],
            LayerStack::Explicit(specs) => specs,
        };
        if specs.is_empty() {
            return Err(Error::InvalidParameter(
                "a model needs at least one layer".to_string(),
            ));
        }
        for spec in &specs {
            spec.validate()?;
        }
        Ok(specs)
    }
}

impl From<LayerSpec> for LayerStack {
    fn from(spec: LayerSpec) -> Self {
        LayerStack::Uniform { spec, depth: 1 }
    }
}

impl From<Vec<LayerSpec>> for LayerStack {
    fn from(specs: Vec<LayerSpec>) -> Self {
        LayerStack::Explicit(specs)
    }
}

/// A parameter given once for all layers, or once per layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Param<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> Param<T> {
    pub fn one(value: impl Into<T>) -> Self {
        Param::One(value.into())
    }

    pub fn many<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<T>,
    {
        Param::Many(values.into_iter().map(Into::into).collect())
    }

    fn len(&self) -> Option<usize> {
        match self {
            Param::One(_) => None,
            Param::Many(v) => Some(v.len()),
        }
    }

    fn at(&self, index: usize) -> T {
        match self {
            Param::One(v) => v.clone(),
            Param::Many(v) => v[index].clone(),
        }
    }
}

impl<T> From<Vec<T>> for Param<T> {
    fn from(values: Vec<T>) -> Self {
        Param::Many(values)
    }
}

/// Layer configuration by name, as parallel sequences.
///
/// Names are parsed case-insensitively: `layer` into [`LayerKind`], `activation` into
/// [`Activation`], `normalization` into [`Normalization`].
#[derive(Debug, Clone, PartialEq)]
pub struct LayerParams {
    pub layer: Param<String>,
    pub n_hidden: Param<usize>,
    pub activation: Param<String>,
    pub use_bias: Param<bool>,
    pub normalization: Param<String>,
    pub self_loops: Param<bool>,
}

impl Default for LayerParams {
    fn default() -> Self {
        Self {
            layer: Param::one("GCNConv"),
            n_hidden: Param::One(2),
            activation: Param::one("Softmax"),
            use_bias: Param::One(true),
            normalization: Param::one("both"),
            self_loops: Param::One(true),
        }
    }
}

impl LayerParams {
    /// Number of layers these parameters describe.
    pub fn depth(&self) -> Result<usize> {
        let lengths = [
            ("layer", self.layer.len()),
            ("n_hidden", self.n_hidden.len()),
            ("activation", self.activation.len()),
            ("use_bias", self.use_bias.len()),
            ("normalization", self.normalization.len()),
            ("self_loops", self.self_loops.len()),
        ];
        let given: Vec<(&str, usize)> = lengths
            .iter()
            .filter_map(|&(name, len)| len.map(|l| (name, l)))
            .collect();
        let Some(&(_, depth)) = given.first() else {
            return Ok(1);
        };
        if given.iter().any(|&(_, l)| l != depth) {
            let listed: Vec<String> = given
                .iter()
                .map(|(name, l)| format!("{name}={l}"))
                .collect();
            return Err(Error::InvalidParameter(format!(
                "per-layer parameters must have the same length ({})",
                listed.join(", ")
            )));
        }
        if depth == 0 {
            return Err(Error::InvalidParameter(
                "a model needs at least one layer".to_string(),
            ));
        }
        Ok(depth)
    }

    pub fn into_specs(self) -> Result<Vec<LayerSpec>> {
        let depth = self.depth()?;
        let specs = (0..depth)
            .map(|i| -> Result<LayerSpec> {
                Ok(LayerSpec {
                    kind: self.layer.at(i).parse::<LayerKind>()?,
                    out_channels: self.n_hidden.at(i),
                    activation: self.activation.at(i).parse::<Activation>()?,
                    use_bias: self.use_bias.at(i),
                    normalization: self.normalization.at(i).parse::<Normalization>()?,
                    self_loops: self.self_loops.at(i),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        LayerStack::Explicit(specs).into_specs()
    }
}

impl TryFrom<LayerParams> for LayerStack {
    type Error = Error;

    fn try_from(params: LayerParams) -> Result<Self> {
        Ok(LayerStack::Explicit(params.into_specs()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_make_one_layer() {
        let specs = LayerParams {
            n_hidden: Param::One(4),
            activation: Param::one("Relu"),
            ..Default::default()
        }
        .into_specs()
        .unwrap();
        assert_eq!(specs, vec![LayerSpec::new(4, Activation::Relu)]);
    }

    #[test]
    fn scalars_broadcast_across_sequences() {
        let specs = LayerParams {
            n_hidden: Param::many([8usize, 2]),
            activation: Param::many(["Relu", "Softmax"]),
            use_bias: Param::One(false),
            ..Default::default()
        }
        .into_specs()
        .unwrap();
        assert_eq!(specs.len(), 2);
        assert!(specs.iter().all(|s| !s.use_bias));
        assert_eq!(specs[0].activation, Activation::Relu);
        assert_eq!(specs[1].out_channels, 2);
    }

    #[test]
    fn mismatched_lengths_name_every_sequence() {
        let err = LayerParams {
            layer: Param::many(["GCNConv", "GCNConv", "GCNConv"]),
            n_hidden: Param::many([20usize, 8, 2]),
            activation: Param::many(["Relu", "Sigmoid"]),
            ..Default::default()
        }
        .into_specs()
        .unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("layer=3"), "{msg}");
        assert!(msg.contains("activation=2"), "{msg}");
    }

    #[test]
    fn unknown_names_are_rejected() {
        let bad_layer = LayerParams {
            layer: Param::one("GATConv"),
            ..Default::default()
        };
        assert!(bad_layer.into_specs().is_err());
        let bad_norm = LayerParams {
            normalization: Param::one("sym"),
            ..Default::default()
        };
        assert!(bad_norm.into_specs().is_err());
    }

    #[test]
    fn empty_stacks_are_rejected() {
        assert!(LayerStack::Explicit(Vec::new()).into_specs().is_err());
        let uniform = LayerStack::Uniform {
            spec: LayerSpec::new(2, Activation::Relu),
            depth: 0,
        };
        assert!(uniform.into_specs().is_err());
        let params = LayerParams {
            n_hidden: Param::Many(Vec::new()),
            ..Default::default()
        };
        assert!(params.into_specs().is_err());
    }

    #[test]
    fn zero_width_layer_is_rejected() {
        let stack = LayerStack::from(LayerSpec::new(0, Activation::Relu));
        assert!(stack.into_specs().is_err());
    }
}
