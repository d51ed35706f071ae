//! # Mask Classifier
//!
//! Evaluation and inference tooling for a small face-mask image classifier
//! built with the Burn framework.
//!
//! ## Modules
//!
//! - `model`: the `ImageClassifier` trait, forward-pass tracing and the reference CNN
//! - `evaluation`: parameter counts, FLOPs, latency and layer summaries
//! - `inference`: weight loading, preprocessing, single-image and webcam inference
//! - `config`: JSON configuration shared by the CLI commands
//! - `utils`: error type, logging and formatting helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mask_classifier::backend::{default_device, TrainingBackend};
//! use mask_classifier::evaluation::{InputShape, ModelEvaluator};
//! use mask_classifier::model::{MaskClassifier, MaskClassifierConfig};
//!
//! let device = default_device();
//! let model = MaskClassifier::<TrainingBackend>::new(&MaskClassifierConfig::new(), &device);
//! let evaluator = ModelEvaluator::new(model, device);
//! evaluator.evaluate_all(InputShape::default(), 100)?;
//! ```

pub mod backend;
pub mod config;
pub mod evaluation;
pub mod inference;
pub mod model;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::AppConfig;
pub use evaluation::{EvaluationReport, InputShape, ModelEvaluator, ModelSummary, ParameterCounts};
pub use inference::{LabelSet, PredictionResult, Predictor, Preprocessor};
pub use model::{ForwardTrace, ImageClassifier, MaskClassifier, MaskClassifierConfig};
pub use utils::error::{MaskClassifierError, Result};

/// Input resolution expected by the classifier (square images)
pub const INPUT_SIZE: usize = 112;

/// Number of input channels (RGB)
pub const INPUT_CHANNELS: usize = 3;

/// Default number of forward passes when measuring latency
pub const DEFAULT_ITERATIONS: usize = 100;

/// Default location of the trained weights
pub const DEFAULT_WEIGHTS_PATH: &str = "mask_classifier.pth";

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
