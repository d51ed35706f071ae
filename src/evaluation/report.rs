//! Combined evaluation report
//!
//! Collects the results of a full evaluation run so they can be saved as JSON
//! and compared across models or devices.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{InputShape, ModelSummary, ParameterCounts};
use crate::utils::error::Result;

/// Results of [`super::ModelEvaluator::evaluate_all`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Input shape used for FLOPs, latency and summary
    pub input_shape: InputShape,

    /// Number of timed forward passes
    pub iterations: usize,

    /// Parameter counts
    pub parameters: ParameterCounts,

    /// Total FLOPs of one forward pass
    pub flops: f64,

    /// Average wall-clock seconds per forward pass
    pub avg_inference_secs: f64,

    /// Layer summary
    pub summary: ModelSummary,

    /// Backend type the model ran on
    pub backend: String,

    /// Device the model was placed on
    pub device: String,

    /// Timestamp of when the evaluation was run
    pub timestamp: String,
}

impl EvaluationReport {
    /// FLOPs in millions
    pub fn mflops(&self) -> f64 {
        self.flops / 1e6
    }

    /// Average latency in milliseconds
    pub fn avg_inference_ms(&self) -> f64 {
        self.avg_inference_secs * 1000.0
    }

    /// Save results to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Get a summary string
    pub fn summary_line(&self) -> String {
        format!(
            "Params: {} | FLOPs: {:.2} MFLOPs | Latency: {:.2} ms ({} iterations, {})",
            crate::utils::format_number(self.parameters.total),
            self.mflops(),
            self.avg_inference_ms(),
            self.iterations,
            self.input_shape
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_report() -> EvaluationReport {
        let input_shape = InputShape::default();
        EvaluationReport {
            input_shape,
            iterations: 100,
            parameters: ParameterCounts {
                total: 32386,
                trainable: 32386,
            },
            flops: 35_043_840.0,
            avg_inference_secs: 0.00125,
            summary: ModelSummary::new(input_shape, &[], &[]),
            backend: "NdArray".to_string(),
            device: "Cpu".to_string(),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_unit_conversions() {
        let report = sample_report();
        assert!((report.mflops() - 35.04384).abs() < 1e-9);
        assert!((report.avg_inference_ms() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_summary_line() {
        let line = sample_report().summary_line();
        assert!(line.contains("Params: 32,386"));
        assert!(line.contains("FLOPs: 35.04 MFLOPs"));
        assert!(line.contains("Latency: 1.25 ms"));
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports").join("eval.json");

        sample_report().save(&path).unwrap();
        let json = std::fs::read_to_string(&path).unwrap();
        let loaded: EvaluationReport = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.parameters.total, 32386);
        assert_eq!(loaded.iterations, 100);
    }
}
