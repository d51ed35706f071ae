//! Model module for CNN architectures using the Burn framework
//!
//! This module provides:
//! - The [`ImageClassifier`] trait implemented by every model the tools accept
//! - Forward-pass tracing with per-layer FLOP counting ([`trace`])
//! - The reference face-mask CNN ([`cnn`])

pub mod cnn;
pub mod trace;

use burn::tensor::{backend::Backend, Tensor};

// Re-export main types for convenience
pub use cnn::{ConvBlock, MaskClassifier, MaskClassifierConfig};
pub use trace::{ForwardTrace, LayerKind, LayerRecord, ParamInfo, ParamSource};

/// An image classifier usable by the evaluation harness and the inference demo
///
/// Input tensors are `[batch, channels, height, width]`; outputs are
/// `[batch, num_classes]` logits.
pub trait ImageClassifier<B: Backend> {
    /// Plain forward pass
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Forward pass that records every leaf layer into `trace`
    ///
    /// Must compute the same function as [`ImageClassifier::forward`].
    fn forward_traced(&self, x: Tensor<B, 4>, trace: &mut ForwardTrace) -> Tensor<B, 2>;

    /// All parameter tensors of the model, in declaration order
    fn parameters(&self) -> Vec<ParamInfo>;

    /// Number of output classes
    fn num_classes(&self) -> usize;
}
