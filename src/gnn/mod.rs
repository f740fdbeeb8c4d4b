//! Graph neural network node classification.
//!
//! A [`GnnModel`] is an ordered stack of graph convolution layers built from a
//! [`LayerStack`] or from per-layer [`LayerParams`]. It starts unfitted; `fit`,
//! `fit_transform` and `fit_predict` (from [`GnnClassifier`]) train it and store the
//! node embedding. Every post-fit accessor goes through [`GnnClassifier::check_fitted`]
//! semantics and fails with [`crate::Error::NotFitted`] before that.

pub mod activation;
pub mod base;
pub mod layer;
pub mod model;
pub mod optimizer;
pub mod split;
pub mod stack;

pub use activation::Activation;
pub use base::GnnClassifier;
pub use layer::{normalize, Layer, LayerKind, LayerSpec, Normalization, Parameters};
pub use model::{layer_name, FitConfig, GnnModel, TrainingHistory};
pub use optimizer::OptimizerKind;
pub use split::{train_val_split, Split};
pub use stack::{LayerParams, LayerStack, Param};
