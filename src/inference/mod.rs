//! Inference module for the classification demo
//!
//! This module provides:
//! - Weight loading for PyTorch checkpoints and Burn records
//! - The fixed preprocessing pipeline shared by every input path
//! - Single-image prediction and label lookup
//! - The webcam loop with a label overlay
//!
//! ## Camera and display
//!
//! The webcam loop works against the [`FrameSource`] and [`FrameDisplay`]
//! traits. GStreamer implementations are available with the `webcam` feature.

#[cfg(feature = "webcam")]
pub mod camera;
pub mod labels;
pub mod overlay;
pub mod predictor;
pub mod preprocess;
pub mod weights;
pub mod webcam;

// Re-export main types for convenience
#[cfg(feature = "webcam")]
pub use camera::{GstCamera, GstWindow};
pub use labels::LabelSet;
pub use overlay::LabelOverlay;
pub use predictor::{argmax, load_image, PredictionResult, Predictor};
pub use preprocess::Preprocessor;
pub use weights::{load_classifier, WeightSource};
pub use webcam::{
    run_webcam, start_owned, BgrFrame, DisplayEvent, FrameDisplay, FrameSource, StopReason,
    WebcamOutcome, QUIT_KEY, WINDOW_TITLE,
};

/// Image extensions picked up when classifying a directory
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// Whether `path` has one of the [`IMAGE_EXTENSIONS`]
pub fn is_image_file(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("data/with_mask/example.jpg")));
        assert!(is_image_file(Path::new("face.PNG")));
        assert!(!is_image_file(Path::new("labels.txt")));
        assert!(!is_image_file(Path::new("no_extension")));
    }
}
