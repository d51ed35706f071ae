//! Error Handling Module
//!
//! Defines the error type shared by the evaluation harness and the inference demo.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for mask classifier operations
#[derive(Error, Debug)]
pub enum MaskClassifierError {
    /// Error loading or decoding an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoadError(PathBuf, String),

    /// Error reading a weight file into the model
    #[error("Failed to load weights from '{path}': {reason}")]
    WeightLoad { path: PathBuf, reason: String },

    /// Error with model operations
    #[error("Model error: {0}")]
    Model(String),

    /// Error with inference
    #[error("Inference error: {0}")]
    Inference(String),

    /// Predicted index has no entry in the label set
    #[error("Class index {index} is out of range for a label set of {len} entries")]
    LabelOutOfRange { index: usize, len: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Device/hardware error
    #[error("Device error: {0}")]
    Device(String),

    /// Camera could not be opened or read
    #[error("Camera error: {0}")]
    Camera(String),

    /// Display window could not be created or updated
    #[error("Display error: {0}")]
    Display(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl From<serde_json::Error> for MaskClassifierError {
    fn from(err: serde_json::Error) -> Self {
        MaskClassifierError::Serialization(err.to_string())
    }
}

/// Convenience Result type for mask classifier operations
pub type Result<T> = std::result::Result<T, MaskClassifierError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| MaskClassifierError::InvalidInput(format!("{}: {}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| MaskClassifierError::InvalidInput(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MaskClassifierError::Inference("test error".to_string());
        assert_eq!(format!("{}", err), "Inference error: test error");
    }

    #[test]
    fn test_image_load_error() {
        let path = PathBuf::from("/path/to/image.jpg");
        let err = MaskClassifierError::ImageLoadError(path, "file not found".to_string());
        assert!(format!("{}", err).contains("image.jpg"));
    }

    #[test]
    fn test_label_out_of_range_display() {
        let err = MaskClassifierError::LabelOutOfRange { index: 5, len: 2 };
        assert_eq!(
            err.to_string(),
            "Class index 5 is out of range for a label set of 2 entries"
        );
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<i32, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));

        let with_context = result.with_context(|| "Failed to read file".to_string());
        match with_context {
            Err(MaskClassifierError::InvalidInput(msg)) => {
                assert_eq!(msg, "Failed to read file: file not found")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_option_context() {
        let opt: Option<i32> = None;
        let with_context = opt.with_context(|| "Value was None".to_string());
        assert!(with_context.is_err());
    }
}
