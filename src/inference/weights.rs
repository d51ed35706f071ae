//! Weight loading
//!
//! `.pth`/`.pt` files are PyTorch state dicts read through `burn-import`;
//! anything else is treated as a Burn record written by `CompactRecorder`
//! (which appends `.mpk` itself).

use std::path::PathBuf;

use burn::{module::Module, record::CompactRecorder, tensor::backend::Backend};
use tracing::info;

use crate::model::{MaskClassifier, MaskClassifierConfig};
use crate::utils::error::{MaskClassifierError, Result};

/// Where and how to read trained weights
#[derive(Debug, Clone)]
pub struct WeightSource {
    pub path: PathBuf,
    /// Regex key remaps applied to PyTorch state dict names, `(pattern, replacement)`
    pub key_remaps: Vec<(String, String)>,
}

impl WeightSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key_remaps: Vec::new(),
        }
    }

    pub fn with_key_remaps(mut self, key_remaps: Vec<(String, String)>) -> Self {
        self.key_remaps = key_remaps;
        self
    }

    /// Whether the file is a PyTorch checkpoint
    pub fn is_pytorch(&self) -> bool {
        matches!(
            self.path.extension().and_then(|ext| ext.to_str()),
            Some("pth") | Some("pt")
        )
    }

    fn exists(&self) -> bool {
        self.path.exists() || (!self.is_pytorch() && self.path.with_extension("mpk").exists())
    }

    fn load_error(&self, reason: impl std::fmt::Display) -> MaskClassifierError {
        MaskClassifierError::WeightLoad {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Build the classifier on `device` and load trained weights into it
pub fn load_classifier<B: Backend>(
    config: &MaskClassifierConfig,
    source: &WeightSource,
    device: &B::Device,
) -> Result<MaskClassifier<B>> {
    if !source.exists() {
        return Err(MaskClassifierError::PathNotFound(source.path.clone()));
    }

    info!("Loading weights from {:?}", source.path);
    let model = MaskClassifier::new(config, device);

    let model = if source.is_pytorch() {
        load_pytorch(model, source, device)?
    } else {
        model
            .load_file(source.path.clone(), &CompactRecorder::new(), device)
            .map_err(|e| source.load_error(format!("{:?}", e)))?
    };

    info!("Model loaded ({} classes)", config.num_classes);
    Ok(model)
}

#[cfg(feature = "pytorch")]
fn load_pytorch<B: Backend>(
    model: MaskClassifier<B>,
    source: &WeightSource,
    device: &B::Device,
) -> Result<MaskClassifier<B>> {
    use burn::record::{FullPrecisionSettings, Recorder};
    use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

    let mut args = LoadArgs::new(source.path.clone());
    for (pattern, replacement) in &source.key_remaps {
        args = args.with_key_remap(pattern, replacement);
    }

    let record = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(args, device)
        .map_err(|e| source.load_error(format!("{:?}", e)))?;

    Ok(model.load_record(record))
}

#[cfg(not(feature = "pytorch"))]
fn load_pytorch<B: Backend>(
    _model: MaskClassifier<B>,
    source: &WeightSource,
    _device: &B::Device,
) -> Result<MaskClassifier<B>> {
    Err(source.load_error("built without the `pytorch` feature"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageClassifier;
    use burn_ndarray::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray;

    #[test]
    fn test_pytorch_detection() {
        assert!(WeightSource::new("mask_classifier.pth").is_pytorch());
        assert!(WeightSource::new("model.pt").is_pytorch());
        assert!(!WeightSource::new("model.mpk").is_pytorch());
        assert!(!WeightSource::new("model").is_pytorch());
    }

    #[test]
    fn test_missing_weights() {
        let device = Default::default();
        let result = load_classifier::<TestBackend>(
            &MaskClassifierConfig::new(),
            &WeightSource::new("/nonexistent/mask_classifier.pth"),
            &device,
        );

        assert!(matches!(result, Err(MaskClassifierError::PathNotFound(_))));
    }

    #[test]
    fn test_compact_record_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model");
        let device = Default::default();
        let config = MaskClassifierConfig::new();

        MaskClassifier::<TestBackend>::new(&config, &device)
            .save_file(path.clone(), &CompactRecorder::new())
            .unwrap();
        assert!(path.with_extension("mpk").exists());

        let model =
            load_classifier::<TestBackend>(&config, &WeightSource::new(path), &device).unwrap();
        assert_eq!(model.num_classes(), 2);
    }

    #[test]
    fn test_corrupt_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.mpk");
        std::fs::write(&path, b"garbage").unwrap();
        let device = Default::default();

        let result = load_classifier::<TestBackend>(
            &MaskClassifierConfig::new(),
            &WeightSource::new(path),
            &device,
        );
        assert!(matches!(result, Err(MaskClassifierError::WeightLoad { .. })));
    }
}
