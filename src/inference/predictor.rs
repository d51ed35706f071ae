//! Inference Predictor Module
//!
//! Runs a trained classifier on single images: decode, preprocess, one
//! forward pass, arg-max, label lookup.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use burn::tensor::{activation::softmax, backend::Backend, Tensor};
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{LabelSet, Preprocessor};
use crate::model::ImageClassifier;
use crate::utils::error::{MaskClassifierError, Result};

/// Number of entries kept in [`PredictionResult::top_k`]
const TOP_K: usize = 5;

/// Index of the largest score; the first maximum wins on ties
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, best_score)) if score.total_cmp(&best_score).is_le() => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Path to the input image (if applicable)
    pub image_path: Option<PathBuf>,

    /// Predicted class index
    pub predicted_class: usize,

    /// Predicted class name
    pub label: String,

    /// Probability of the predicted class
    pub confidence: f32,

    /// Full probability distribution over all classes
    pub probabilities: Vec<f32>,

    /// Top-k predictions with their probabilities
    pub top_k: Vec<(usize, String, f32)>,

    /// Inference time in milliseconds
    pub inference_time_ms: f64,
}

impl PredictionResult {
    /// Build a result from raw scores and their softmax probabilities
    ///
    /// The predicted class is the arg-max of `scores`, so ties resolve the
    /// same way as on the raw model output.
    pub fn new(
        scores: &[f32],
        probabilities: Vec<f32>,
        labels: &LabelSet,
        inference_time: Duration,
        image_path: Option<PathBuf>,
    ) -> Result<Self> {
        let predicted_class = argmax(scores)
            .ok_or_else(|| MaskClassifierError::Inference("model produced no scores".to_string()))?;
        let label = labels.get(predicted_class)?.to_string();
        let confidence = probabilities.get(predicted_class).copied().unwrap_or(0.0);

        let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

        let top_k = indexed
            .into_iter()
            .take(TOP_K)
            .map(|(idx, prob)| {
                let name = labels.get(idx).unwrap_or("Unknown").to_string();
                (idx, name, prob)
            })
            .collect();

        Ok(Self {
            image_path,
            predicted_class,
            label,
            confidence,
            probabilities,
            top_k,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        })
    }

    /// Pretty print the prediction result
    pub fn display(&self) -> String {
        let mut output = String::new();

        if let Some(path) = &self.image_path {
            output.push_str(&format!("Image: {:?}\n", path));
        }

        output.push_str(&format!(
            "Prediction: {} (class {})\n",
            self.label, self.predicted_class
        ));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence * 100.0));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));

        output.push_str(&format!("\nTop-{} predictions:\n", self.top_k.len()));
        for (i, (idx, name, prob)) in self.top_k.iter().enumerate() {
            output.push_str(&format!(
                "  {}. {} (class {}) - {:.2}%\n",
                i + 1,
                name,
                idx,
                prob * 100.0
            ));
        }

        output
    }
}

/// Predictor for running inference with a trained model
///
/// `B` is expected to be a non-autodiff backend, on which Burn modules run in
/// inference mode.
pub struct Predictor<B: Backend, M> {
    model: M,
    device: B::Device,
    preprocessor: Preprocessor,
    labels: LabelSet,
}

impl<B, M> Predictor<B, M>
where
    B: Backend,
    M: ImageClassifier<B>,
{
    /// Create a predictor for a model already placed on `device`
    pub fn new(model: M, labels: LabelSet, device: B::Device) -> Self {
        if labels.len() != model.num_classes() {
            warn!(
                "Label set has {} entries but the model predicts {} classes",
                labels.len(),
                model.num_classes()
            );
        }

        Self {
            model,
            device,
            preprocessor: Preprocessor::default(),
            labels,
        }
    }

    /// Configure the preprocessing pipeline
    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Run one forward pass on a preprocessed `[1, C, H, W]` tensor
    pub fn predict_tensor(
        &self,
        input: Tensor<B, 4>,
        image_path: Option<PathBuf>,
    ) -> Result<PredictionResult> {
        let start = Instant::now();
        let output = self.model.forward(input);
        let probabilities = softmax(output.clone(), 1);

        let scores = tensor_to_vec(output)?;
        let probabilities = tensor_to_vec(probabilities)?;
        let inference_time = start.elapsed();

        debug!("Scores {:?} in {:?}", scores, inference_time);

        PredictionResult::new(&scores, probabilities, &self.labels, inference_time, image_path)
    }

    /// Predict on an RGB image
    pub fn predict_rgb(&self, image: &RgbImage) -> Result<PredictionResult> {
        let input = self.preprocessor.rgb_to_tensor::<B>(image, &self.device);
        self.predict_tensor(input, None)
    }

    /// Predict on a decoded image of any color type
    pub fn predict_image(&self, image: &DynamicImage) -> Result<PredictionResult> {
        let input = self.preprocessor.to_tensor::<B>(image, &self.device);
        self.predict_tensor(input, None)
    }

    /// Predict on an image from a file path
    pub fn predict_file(&self, path: &Path) -> Result<PredictionResult> {
        let image = load_image(path)?;
        let input = self.preprocessor.to_tensor::<B>(&image, &self.device);
        self.predict_tensor(input, Some(path.to_path_buf()))
    }

    /// Classify one image file, printing and returning its label
    pub fn infer_image(&self, path: &Path) -> Result<String> {
        let result = self.predict_file(path)?;
        println!("Prediction: {}", result.label);
        Ok(result.label)
    }
}

/// Open and decode an image file
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(MaskClassifierError::PathNotFound(path.to_path_buf()));
    }

    image::open(path)
        .map_err(|e| MaskClassifierError::ImageLoadError(path.to_path_buf(), e.to_string()))
}

/// Flatten a `[1, N]` output into a vector of f32
fn tensor_to_vec<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| MaskClassifierError::Inference(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MaskClassifier, MaskClassifierConfig};
    use burn_ndarray::NdArray;
    use image::Rgb;
    use tempfile::tempdir;

    type TestBackend = NdArray;

    fn predictor() -> Predictor<TestBackend, MaskClassifier<TestBackend>> {
        let device = Default::default();
        let model = MaskClassifierConfig::new().init::<TestBackend>(&device);
        Predictor::new(model, LabelSet::default(), device)
    }

    #[test]
    fn test_argmax_first_maximum_wins() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[-3.0, -1.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_prediction_result_new() {
        let labels = LabelSet::from_names(["a", "b", "c"]);
        let result = PredictionResult::new(
            &[0.5, 2.0, -1.0],
            vec![0.2, 0.75, 0.05],
            &labels,
            Duration::from_millis(4),
            None,
        )
        .unwrap();

        assert_eq!(result.predicted_class, 1);
        assert_eq!(result.label, "b");
        assert_eq!(result.confidence, 0.75);
        assert_eq!(result.top_k.len(), 3);
        assert_eq!(result.top_k[1].1, "a");
        assert!((result.inference_time_ms - 4.0).abs() < 1e-9);
        assert!(result.display().contains("Prediction: b (class 1)"));
    }

    #[test]
    fn test_prediction_outside_label_set() {
        let labels = LabelSet::from_names(["only"]);
        let result = PredictionResult::new(
            &[0.0, 1.0],
            vec![0.3, 0.7],
            &labels,
            Duration::ZERO,
            None,
        );

        assert!(matches!(result, Err(MaskClassifierError::LabelOutOfRange { .. })));
    }

    #[test]
    fn test_infer_image_returns_known_label() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("face.png");
        RgbImage::from_pixel(64, 48, Rgb([180, 140, 120])).save(&path).unwrap();

        let predictor = predictor();
        let label = predictor.infer_image(&path).unwrap();
        assert!(predictor.labels().contains(&label));
    }

    #[test]
    fn test_predict_file_probabilities() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("face.png");
        RgbImage::from_pixel(200, 200, Rgb([10, 20, 30])).save(&path).unwrap();

        let result = predictor().predict_file(&path).unwrap();
        let total: f32 = result.probabilities.iter().sum();

        assert_eq!(result.probabilities.len(), 2);
        assert!((total - 1.0).abs() < 1e-4);
        assert_eq!(result.image_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_same_image_same_prediction() {
        let predictor = predictor();
        let image = RgbImage::from_pixel(112, 112, Rgb([90, 60, 30]));

        let first = predictor.predict_rgb(&image).unwrap();
        let second = predictor.predict_rgb(&image).unwrap();
        assert_eq!(first.predicted_class, second.predicted_class);
        assert_eq!(first.probabilities, second.probabilities);
    }

    #[test]
    fn test_missing_file() {
        let result = predictor().infer_image(Path::new("/nonexistent/face.jpg"));
        assert!(matches!(result, Err(MaskClassifierError::PathNotFound(_))));
    }

    #[test]
    fn test_undecodable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let result = predictor().infer_image(&path);
        assert!(matches!(result, Err(MaskClassifierError::ImageLoadError(_, _))));
    }
}
