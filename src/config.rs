//! Application configuration
//!
//! One JSON document configures both tools. Every section and field has a
//! default, so a partial file (or none at all) is valid. Command-line flags
//! override whatever the file sets.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::evaluation::InputShape;
use crate::inference::{LabelSet, Preprocessor, WeightSource};
use crate::model::MaskClassifierConfig;
use crate::utils::error::{MaskClassifierError, Result, ResultExt};
use crate::{DEFAULT_ITERATIONS, DEFAULT_WEIGHTS_PATH};

/// Settings for `evaluate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Input shape for FLOPs, latency and summary
    pub input_shape: InputShape,

    /// Forward passes timed by the latency measurement
    pub iterations: usize,

    /// Weights to evaluate; a freshly initialized model when unset
    pub weights: Option<PathBuf>,

    /// Where to write the JSON report, if anywhere
    pub report_path: Option<PathBuf>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            input_shape: InputShape::default(),
            iterations: DEFAULT_ITERATIONS,
            weights: None,
            report_path: None,
        }
    }
}

/// Settings shared by `infer` and `webcam`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Trained weights (`.pth`/`.pt` or a Burn record)
    pub weights_path: PathBuf,

    /// Regex remaps for PyTorch state dict keys, `(pattern, replacement)`
    pub key_remaps: Vec<(String, String)>,

    /// Preprocessing parameters
    pub preprocess: Preprocessor,

    /// Explicit class names, in output order
    pub labels: Option<Vec<String>>,

    /// Label file (JSON array or one name per line)
    pub labels_file: Option<PathBuf>,

    /// Image-folder dataset root whose sub-directories name the classes
    pub data_dir: Option<PathBuf>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::from(DEFAULT_WEIGHTS_PATH),
            key_remaps: Vec::new(),
            preprocess: Preprocessor::default(),
            labels: None,
            labels_file: None,
            data_dir: None,
        }
    }
}

impl InferenceConfig {
    /// Resolve the label set: explicit list, then label file, then dataset
    /// directory, then the built-in mask labels
    pub fn label_set(&self) -> Result<LabelSet> {
        if let Some(names) = &self.labels {
            return Ok(LabelSet::from_names(names.iter().cloned()));
        }
        if let Some(path) = &self.labels_file {
            return LabelSet::from_file(path);
        }
        if let Some(dir) = &self.data_dir {
            return LabelSet::from_image_folder(dir);
        }
        Ok(LabelSet::default())
    }

    pub fn weight_source(&self) -> WeightSource {
        WeightSource::new(self.weights_path.clone()).with_key_remaps(self.key_remaps.clone())
    }
}

/// Settings for `webcam`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebcamConfig {
    /// Capture device index (`/dev/video<N>` on Linux)
    pub device_index: u32,

    /// Title of the display window
    pub window_title: String,

    /// How long to wait for a frame before treating the read as failed
    pub read_timeout_ms: u64,
}

impl Default for WebcamConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            window_title: crate::inference::WINDOW_TITLE.to_string(),
            read_timeout_ms: 5000,
        }
    }
}

fn default_model() -> MaskClassifierConfig {
    MaskClassifierConfig::new()
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_model")]
    pub model: MaskClassifierConfig,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub webcam: WebcamConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            evaluation: EvaluationConfig::default(),
            inference: InferenceConfig::default(),
            webcam: WebcamConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MaskClassifierError::PathNotFound(path.to_path_buf()));
        }

        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| MaskClassifierError::Config(format!("{:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map(Self::load).unwrap_or_else(|| Ok(Self::default()))
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("cannot write configuration to {:?}", path))
    }

    /// Check values that would otherwise fail deep inside a command
    pub fn validate(&self) -> Result<()> {
        if self.model.num_classes == 0 {
            return Err(MaskClassifierError::Config(
                "model.num_classes must be greater than 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.model.dropout_rate) {
            return Err(MaskClassifierError::Config(
                "model.dropout_rate must be in range [0.0, 1.0)".to_string(),
            ));
        }

        if self.evaluation.iterations == 0 {
            return Err(MaskClassifierError::Config(
                "evaluation.iterations must be greater than 0".to_string(),
            ));
        }

        self.evaluation
            .input_shape
            .validate()
            .map_err(|e| MaskClassifierError::Config(e.to_string()))?;

        if self.inference.preprocess.image_size == 0 {
            return Err(MaskClassifierError::Config(
                "inference.preprocess.image_size must be greater than 0".to_string(),
            ));
        }

        if self.inference.preprocess.std.iter().any(|&s| s == 0.0) {
            return Err(MaskClassifierError::Config(
                "inference.preprocess.std must not contain zeros".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.model.num_classes, 2);
        assert_eq!(config.evaluation.iterations, 100);
        assert_eq!(config.evaluation.input_shape, InputShape::new(3, 112, 112));
        assert_eq!(config.inference.weights_path, PathBuf::from("mask_classifier.pth"));
        assert_eq!(config.inference.preprocess.image_size, 112);
        assert_eq!(config.webcam.device_index, 0);
        assert_eq!(config.webcam.window_title, "Webcam Inference");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "evaluation": { "iterations": 10 }, "webcam": { "device_index": 2 } }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.evaluation.iterations, 10);
        assert_eq!(config.evaluation.input_shape, InputShape::default());
        assert_eq!(config.webcam.device_index, 2);
        assert_eq!(config.webcam.read_timeout_ms, 5000);
        assert_eq!(config.model.num_classes, 2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::default();
        config.inference.labels = Some(vec!["mask".to_string(), "no_mask".to_string()]);
        config.evaluation.report_path = Some(PathBuf::from("reports/eval.json"));
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.inference.labels, config.inference.labels);
        assert_eq!(loaded.evaluation.report_path, config.evaluation.report_path);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "evaluation": { "iterations": 0 } }"#).unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(MaskClassifierError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(MaskClassifierError::Config(_))
        ));
        assert!(matches!(
            AppConfig::load(&dir.path().join("missing.json")),
            Err(MaskClassifierError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_label_set_resolution_order() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();

        let mut config = InferenceConfig::default();
        assert_eq!(config.label_set().unwrap(), LabelSet::default());

        config.data_dir = Some(dir.path().to_path_buf());
        assert_eq!(config.label_set().unwrap(), LabelSet::from_names(["a", "b"]));

        config.labels = Some(vec!["x".to_string()]);
        assert_eq!(config.label_set().unwrap(), LabelSet::from_names(["x"]));
    }
}
