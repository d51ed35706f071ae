//! Model Evaluator
//!
//! Measures the size and speed of an [`ImageClassifier`] on a given device.
//!
//! The evaluator keeps the autodiff (trainable) version of the model so that
//! trainable parameters can be counted. Every measurement that runs the model
//! uses its `valid()` copy on the inner backend: Burn's evaluation mode, in
//! which dropout is disabled, batch norm uses running statistics and no
//! gradient graph is recorded.

use std::time::Instant;

use burn::{
    module::{AutodiffModule, Module},
    tensor::{
        backend::{AutodiffBackend, Backend},
        Distribution, Tensor,
    },
};
use tracing::{debug, info};

use super::{EvaluationReport, InputShape, ModelSummary, ParameterCounts};
use crate::model::{ForwardTrace, ImageClassifier};
use crate::utils::error::{MaskClassifierError, Result};
use crate::utils::format_number;

/// Evaluation harness holding a model and its device
pub struct ModelEvaluator<B: AutodiffBackend, M> {
    model: M,
    device: B::Device,
}

impl<B, M> ModelEvaluator<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + ImageClassifier<B>,
    M::InnerModule: ImageClassifier<B::InnerBackend>,
{
    /// Create an evaluator, moving the model onto `device`
    ///
    /// `fork` keeps parameters as gradient-requiring leaves; `to_device`
    /// would record the move and leave none of them trainable.
    pub fn new(model: M, device: B::Device) -> Self {
        info!("Placing model on device {:?}", device);
        let model = model.fork(&device);
        Self { model, device }
    }

    /// The evaluated model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The device the model lives on
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Count parameter elements, total and trainable
    pub fn evaluate_model_size(&self) -> ParameterCounts {
        let counts = ParameterCounts::from_params(&self.model.parameters());

        println!("Total Parameters: {}", format_number(counts.total));
        println!("Trainable Parameters: {}", format_number(counts.trainable));

        counts
    }

    /// Count the FLOPs of one forward pass over a random input of shape `input`
    pub fn evaluate_flops(&self, input: InputShape) -> Result<f64> {
        let trace = self.trace(input)?;
        let total_flops = trace.total_flops() as f64;

        println!("FLOPs: {:.2} MFLOPs", total_flops / 1e6);

        Ok(total_flops)
    }

    /// Average wall-clock seconds per forward pass over `iterations` passes
    ///
    /// The timed block is fenced by device synchronization so queued work on
    /// asynchronous backends is included. Dispatch overhead is part of the
    /// measurement.
    pub fn evaluate_inference_speed(&self, input: InputShape, iterations: usize) -> Result<f64> {
        if iterations == 0 {
            return Err(MaskClassifierError::InvalidInput(
                "iterations must be greater than 0".to_string(),
            ));
        }

        let model = self.model.valid();
        let x = self.random_input(input)?;

        <B::InnerBackend as Backend>::sync(&self.device);

        let start = Instant::now();
        for _ in 0..iterations {
            let _ = model.forward(x.clone());
        }
        <B::InnerBackend as Backend>::sync(&self.device);
        let elapsed = start.elapsed();

        let avg_time_per_inference = elapsed.as_secs_f64() / iterations as f64;
        debug!(
            "{} forward passes in {:.3}s",
            iterations,
            elapsed.as_secs_f64()
        );

        println!(
            "Average Inference Time: {:.2} ms",
            avg_time_per_inference * 1000.0
        );

        Ok(avg_time_per_inference)
    }

    /// Print and return the per-layer summary for `input`
    pub fn summarize_model(&self, input: InputShape) -> Result<ModelSummary> {
        println!("\n===== Model Summary =====");

        let trace = self.trace(input)?;
        let summary = ModelSummary::new(input, trace.layers(), &self.model.parameters());
        println!("{}", summary);

        Ok(summary)
    }

    /// Run every measurement in sequence with shared arguments
    pub fn evaluate_all(&self, input: InputShape, iterations: usize) -> Result<EvaluationReport> {
        println!("\n===== Model Evaluation =====");

        let parameters = self.evaluate_model_size();
        let flops = self.evaluate_flops(input)?;
        let avg_inference_secs = self.evaluate_inference_speed(input, iterations)?;
        let summary = self.summarize_model(input)?;

        Ok(EvaluationReport {
            input_shape: input,
            iterations,
            parameters,
            flops,
            avg_inference_secs,
            summary,
            backend: std::any::type_name::<B::InnerBackend>().to_string(),
            device: format!("{:?}", self.device),
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Standard-normal input batch of one image
    fn random_input(&self, input: InputShape) -> Result<Tensor<B::InnerBackend, 4>> {
        input.validate()?;

        Ok(Tensor::random(
            input.batched(1),
            Distribution::Normal(0.0, 1.0),
            &self.device,
        ))
    }

    /// Trace one evaluation-mode forward pass
    fn trace(&self, input: InputShape) -> Result<ForwardTrace> {
        let model = self.model.valid();
        let x = self.random_input(input)?;

        let mut trace = ForwardTrace::new();
        let output = model.forward_traced(x, &mut trace);
        debug!("Traced forward pass: output {:?}", output.dims());

        if trace.is_empty() {
            return Err(MaskClassifierError::Model(
                "forward pass did not report any layers".to_string(),
            ));
        }

        Ok(trace)
    }
}
