//! Evaluation module for model size and speed measurements
//!
//! This module provides:
//! - Parameter counting (total and trainable)
//! - FLOP estimation from a traced forward pass
//! - Average inference latency with device synchronization
//! - A per-layer architecture summary
//!
//! All measurements are driven by [`ModelEvaluator`], which owns the model
//! and the device it was placed on.

pub mod evaluator;
pub mod report;
pub mod summary;

use serde::{Deserialize, Serialize};

use crate::model::ParamInfo;
use crate::utils::error::{MaskClassifierError, Result};
use crate::{INPUT_CHANNELS, INPUT_SIZE};

// Re-export main types for convenience
pub use evaluator::ModelEvaluator;
pub use report::EvaluationReport;
pub use summary::{ModelSummary, SummaryRow};

/// Shape of a single input image, without the batch dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Default for InputShape {
    fn default() -> Self {
        Self {
            channels: INPUT_CHANNELS,
            height: INPUT_SIZE,
            width: INPUT_SIZE,
        }
    }
}

impl InputShape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Full tensor shape for a batch of `batch_size` images
    pub fn batched(&self, batch_size: usize) -> [usize; 4] {
        [batch_size, self.channels, self.height, self.width]
    }

    /// Number of scalar elements in one image
    pub fn numel(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Reject shapes with a zero-sized dimension
    pub fn validate(&self) -> Result<()> {
        if self.numel() == 0 {
            return Err(MaskClassifierError::InvalidInput(format!(
                "input shape {} has a zero-sized dimension",
                self
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for InputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}

/// Total and trainable parameter element counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterCounts {
    pub total: usize,
    pub trainable: usize,
}

impl ParameterCounts {
    /// Count elements over a parameter inventory
    pub fn from_params(params: &[ParamInfo]) -> Self {
        params.iter().fold(Self::default(), |mut counts, param| {
            let numel = param.numel();
            counts.total += numel;
            if param.trainable {
                counts.trainable += numel;
            }
            counts
        })
    }

    pub fn non_trainable(&self) -> usize {
        self.total - self.trainable
    }
}
