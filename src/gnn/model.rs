//! GCN node classifier.
//!
//! The model owns an ordered stack of [`Layer`]s. Fitting trains a fresh copy of the stack
//! (softmax cross-entropy on the training nodes, back-propagated through every layer) and
//! commits it together with the embedding only if every iteration stayed finite, so a
//! failed fit never clobbers an earlier one.

use std::fmt;

use ndarray::Array2;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, warn};

use super::activation::{softmax, Activation};
use super::base::{argmax, argmax_rows, GnnClassifier};
use super::layer::{ForwardCache, Layer};
use super::optimizer::{Optimizer, OptimizerKind};
use super::split::{train_val_split, Split};
use super::stack::{LayerParams, LayerStack};
use crate::{Error, Result};

/// Floor applied to probabilities inside `ln` so the loss stays finite.
const PROB_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitConfig {
    /// Fraction of labelled nodes held out for validation, in `[0, 1)`.
    pub val_size: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub optimizer: OptimizerKind,
    /// Stop once validation accuracy has not improved for `patience` iterations.
    pub early_stopping: bool,
    pub patience: usize,
    /// Seed for the split and weight initialisation. `None` draws from entropy.
    pub random_state: Option<u64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            val_size: 0.1,
            max_iter: 100,
            learning_rate: 1e-2,
            optimizer: OptimizerKind::Adam,
            early_stopping: true,
            patience: 10,
            random_state: None,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.val_size.is_finite() || !(0.0..1.0).contains(&self.val_size) {
            return Err(Error::InvalidParameter(
                "val_size must be in [0, 1)".to_string(),
            ));
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter(
                "max_iter must be > 0".to_string(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::InvalidParameter(
                "learning_rate must be finite and > 0".to_string(),
            ));
        }
        if self.early_stopping && self.patience == 0 {
            return Err(Error::InvalidParameter(
                "patience must be > 0 when early_stopping is set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-iteration training metrics. Accuracies are `NaN` for an empty node set.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainingHistory {
    pub loss: Vec<f64>,
    pub train_accuracy: Vec<f64>,
    pub val_accuracy: Vec<f64>,
}

impl TrainingHistory {
    pub fn iterations(&self) -> usize {
        self.loss.len()
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    embedding: Array2<f64>,
    labels: Vec<usize>,
    history: TrainingHistory,
    split: Split,
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Unfitted,
    Fitted(Fitted),
}

#[derive(Debug, Clone)]
pub struct GnnModel {
    layers: Vec<Layer>,
    state: State,
}

impl GnnModel {
    pub fn new(stack: impl Into<LayerStack>) -> Result<Self> {
        let specs = stack.into().into_specs()?;
        Ok(Self {
            layers: specs.into_iter().map(Layer::new).collect(),
            state: State::Unfitted,
        })
    }

    pub fn from_params(params: LayerParams) -> Result<Self> {
        Self::new(LayerStack::Explicit(params.into_specs()?))
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// `conv1`, `conv2`, ... paired with the layers in stack order.
    pub fn named_layers(&self) -> impl Iterator<Item = (String, &Layer)> + '_ {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, layer)| (layer_name(i), layer))
    }

    /// Width of the embedding (and number of admissible classes).
    pub fn output_width(&self) -> usize {
        self.layers.last().map_or(0, Layer::out_channels)
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, State::Fitted(_))
    }

    fn fitted(&self) -> Result<&Fitted> {
        match &self.state {
            State::Fitted(f) => Ok(f),
            State::Unfitted => Err(Error::NotFitted("embedding")),
        }
    }

    /// Predicted label per node from the last fit.
    pub fn labels(&self) -> Result<&[usize]> {
        Ok(&self.fitted()?.labels)
    }

    pub fn history(&self) -> Result<&TrainingHistory> {
        Ok(&self.fitted()?.history)
    }

    /// Node ids used for training and validation in the last fit.
    pub fn split(&self) -> Result<&Split> {
        Ok(&self.fitted()?.split)
    }

    /// Run the trained stack on another graph with the same feature width.
    pub fn predict(&self, adjacency: &Array2<f64>, features: &Array2<f64>) -> Result<Vec<usize>> {
        self.fitted()?;
        check_inputs(adjacency, features)?;
        let output = forward_all(&self.layers, adjacency, features)?
            .pop()
            .map(|cache| cache.output)
            .ok_or(Error::NotFitted("layers"))?;
        if !output.iter().all(|x| x.is_finite()) {
            return Err(Error::NonFiniteOutput);
        }
        Ok(argmax_rows(&output))
    }

    fn train(
        &self,
        adjacency: &Array2<f64>,
        features: &Array2<f64>,
        labels: &[Option<usize>],
        config: &FitConfig,
    ) -> Result<(Vec<Layer>, Fitted)> {
        config.validate()?;
        check_inputs(adjacency, features)?;
        let n = adjacency.nrows();
        if labels.len() != n {
            return Err(Error::InvalidParameter(format!(
                "labels length must equal node_count (len={} node_count={n})",
                labels.len()
            )));
        }
        let width = self.output_width();
        if let Some(&bad) = labels.iter().flatten().find(|&&l| l >= width) {
            return Err(Error::InvalidParameter(format!(
                "label {bad} does not fit the last layer ({width} output channels)"
            )));
        }

        let split = train_val_split(labels, config.val_size, config.random_state)?;
        let mut rng = match config.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut layers = self.layers.clone();
        let mut in_channels = features.ncols();
        for layer in &mut layers {
            layer.initialize(in_channels, &mut rng);
            in_channels = layer.out_channels();
        }
        let propagation: Vec<Array2<f64>> = layers
            .iter()
            .map(|l| l.propagation_matrix(adjacency))
            .collect();

        let mut optimizer = Optimizer::new(config.optimizer, config.learning_rate);
        let mut history = TrainingHistory::default();
        let mut best_val = f64::NEG_INFINITY;
        let mut stall = 0usize;

        for iteration in 0..config.max_iter {
            let caches = forward_cached(&layers, &propagation, features)?;
            let last = caches.last().ok_or(Error::NotFitted("layers"))?;
            if !last.output.iter().all(|x| x.is_finite()) {
                return Err(Error::NonFinite { iteration });
            }

            let last_activation = layers[layers.len() - 1].activation();
            let probs = if last_activation == Activation::Softmax {
                last.output.clone()
            } else {
                softmax(&last.output)
            };
            let loss = cross_entropy(&probs, labels, &split.train);
            let train_acc = accuracy(&last.output, labels, &split.train);
            let val_acc = accuracy(&last.output, labels, &split.validation);
            debug!(iteration, loss, train_acc, val_acc, "gnn training step");
            history.loss.push(loss);
            history.train_accuracy.push(train_acc);
            history.val_accuracy.push(val_acc);

            if !optimizer.is_noop() {
                backpropagate(
                    &mut layers,
                    &propagation,
                    &caches,
                    &probs,
                    labels,
                    &split.train,
                    &mut optimizer,
                )?;
                if !layers.iter().all(Layer::has_finite_parameters) {
                    return Err(Error::NonFinite { iteration });
                }
            }

            if config.early_stopping && !split.validation.is_empty() {
                if val_acc > best_val {
                    best_val = val_acc;
                    stall = 0;
                } else {
                    stall += 1;
                    if stall >= config.patience {
                        warn!(iteration, best_val, "early stopping: validation accuracy stalled");
                        break;
                    }
                }
            }
        }

        let embedding = forward_cached(&layers, &propagation, features)?
            .pop()
            .map(|cache| cache.output)
            .ok_or(Error::NotFitted("layers"))?;
        if !embedding.iter().all(|x| x.is_finite()) {
            return Err(Error::NonFinite {
                iteration: history.iterations(),
            });
        }
        let predicted = argmax_rows(&embedding);
        info!(
            nodes = n,
            iterations = history.iterations(),
            loss = history.loss.last().copied().unwrap_or(f64::NAN),
            "gnn fit complete"
        );
        Ok((
            layers,
            Fitted {
                embedding,
                labels: predicted,
                history,
                split,
            },
        ))
    }
}

impl GnnClassifier for GnnModel {
    fn fit(
        &mut self,
        adjacency: &Array2<f64>,
        features: &Array2<f64>,
        labels: &[Option<usize>],
        config: &FitConfig,
    ) -> Result<&mut Self> {
        let (layers, fitted) = self.train(adjacency, features, labels, config)?;
        self.layers = layers;
        self.state = State::Fitted(fitted);
        Ok(self)
    }

    fn embedding(&self) -> Option<&Array2<f64>> {
        match &self.state {
            State::Fitted(f) => Some(&f.embedding),
            State::Unfitted => None,
        }
    }
}

impl fmt::Display for GnnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GNNModel(")?;
        for layer in &self.layers {
            writeln!(f, "    {layer}")?;
        }
        write!(f, ")")
    }
}

/// Positional attribute-style name of the layer at `index` (0-based).
pub fn layer_name(index: usize) -> String {
    format!("conv{}", index + 1)
}

fn check_inputs(adjacency: &Array2<f64>, features: &Array2<f64>) -> Result<()> {
    let (rows, cols) = adjacency.dim();
    if rows != cols {
        return Err(Error::NotSquare { rows, cols });
    }
    if features.nrows() != rows {
        return Err(Error::InvalidParameter(format!(
            "features must have one row per node (rows={} node_count={rows})",
            features.nrows()
        )));
    }
    Ok(())
}

fn forward_cached(
    layers: &[Layer],
    propagation: &[Array2<f64>],
    features: &Array2<f64>,
) -> Result<Vec<ForwardCache>> {
    let mut caches: Vec<ForwardCache> = Vec::with_capacity(layers.len());
    for (layer, p) in layers.iter().zip(propagation) {
        let cache = match caches.last() {
            Some(prev) => layer.forward(p, &prev.output)?,
            None => layer.forward(p, features)?,
        };
        caches.push(cache);
    }
    Ok(caches)
}

fn forward_all(
    layers: &[Layer],
    adjacency: &Array2<f64>,
    features: &Array2<f64>,
) -> Result<Vec<ForwardCache>> {
    let propagation: Vec<Array2<f64>> = layers
        .iter()
        .map(|l| l.propagation_matrix(adjacency))
        .collect();
    forward_cached(layers, &propagation, features)
}

/// Mean negative log-likelihood over `nodes`.
fn cross_entropy(probs: &Array2<f64>, labels: &[Option<usize>], nodes: &[usize]) -> f64 {
    let total: f64 = nodes
        .iter()
        .filter_map(|&i| labels[i].map(|y| -probs[[i, y]].max(PROB_FLOOR).ln()))
        .sum();
    total / nodes.len() as f64
}

fn accuracy(output: &Array2<f64>, labels: &[Option<usize>], nodes: &[usize]) -> f64 {
    if nodes.is_empty() {
        return f64::NAN;
    }
    let correct = nodes
        .iter()
        .filter(|&&i| labels[i] == Some(argmax(output.row(i))))
        .count();
    correct as f64 / nodes.len() as f64
}

fn backpropagate(
    layers: &mut [Layer],
    propagation: &[Array2<f64>],
    caches: &[ForwardCache],
    probs: &Array2<f64>,
    labels: &[Option<usize>],
    train: &[usize],
    optimizer: &mut Optimizer,
) -> Result<()> {
    let depth = layers.len();
    let m = train.len() as f64;

    // d(loss)/d(probs) composed with softmax: (p - y) / m on training rows, 0 elsewhere.
    let mut grad = Array2::<f64>::zeros(probs.raw_dim());
    for &i in train {
        if let Some(y) = labels[i] {
            let mut row = grad.row_mut(i);
            row.assign(&probs.row(i));
            row[y] -= 1.0;
            row.mapv_inplace(|g| g / m);
        }
    }
    let last = &caches[depth - 1];
    let mut grad_pre = match layers[depth - 1].activation() {
        Activation::Softmax => grad,
        act => act.backward(&last.pre_activation, &last.output, &grad),
    };

    let mut updates = Vec::with_capacity(depth);
    for l in (0..depth).rev() {
        let (params, grad_input) = layers[l].backward(&propagation[l], &caches[l], &grad_pre)?;
        updates.push((l, params));
        if l > 0 {
            let prev = &caches[l - 1];
            grad_pre = layers[l - 1]
                .activation()
                .backward(&prev.pre_activation, &prev.output, &grad_input);
        }
    }

    optimizer.tick();
    for (l, grads) in updates {
        if let Some(params) = layers[l].parameters_mut() {
            optimizer.update(2 * l, &mut params.weight, &grads.weight);
            if let (Some(bias), Some(g)) = (params.bias.as_mut(), grads.bias.as_ref()) {
                optimizer.update(2 * l + 1, bias, g);
            }
        }
    }
    Ok(())
}
