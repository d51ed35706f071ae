//! Image preprocessing
//!
//! The fixed pipeline shared by single-image and webcam inference: resize,
//! scale to `[0, 1]`, per-channel normalization, CHW layout and a batch
//! dimension.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::INPUT_SIZE;

/// Per-channel mean used for normalization
pub const NORMALIZE_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
/// Per-channel standard deviation used for normalization
pub const NORMALIZE_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Resize and normalize images into model input tensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preprocessor {
    /// Target width and height
    pub image_size: u32,
    /// Per-channel mean (RGB)
    pub mean: [f32; 3],
    /// Per-channel standard deviation (RGB)
    pub std: [f32; 3],
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            image_size: INPUT_SIZE as u32,
            mean: NORMALIZE_MEAN,
            std: NORMALIZE_STD,
        }
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the target image size
    pub fn with_image_size(mut self, size: u32) -> Self {
        self.image_size = size;
        self
    }

    /// Resize an RGB image to the target size (bilinear)
    pub fn resize(&self, image: &RgbImage) -> RgbImage {
        image::imageops::resize(image, self.image_size, self.image_size, FilterType::Triangle)
    }

    /// Normalize an RGB image to a flat CHW vector
    ///
    /// Pixels are scaled to `[0, 1]` and then mapped through
    /// `(x - mean) / std` per channel.
    pub fn normalize(&self, image: &RgbImage) -> Vec<f32> {
        let (width, height) = image.dimensions();
        let num_pixels = (width * height) as usize;

        let mut normalized = vec![0.0f32; 3 * num_pixels];

        for (i, pixel) in image.pixels().enumerate() {
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                normalized[c * num_pixels + i] = (value - self.mean[c]) / self.std[c];
            }
        }

        normalized
    }

    /// Resize and normalize, returning a flat `[3, size, size]` vector
    pub fn transform(&self, image: &RgbImage) -> Vec<f32> {
        self.normalize(&self.resize(image))
    }

    /// Full pipeline for any decoded image: RGB conversion, transform, batch dimension
    pub fn to_tensor<B: Backend>(&self, image: &DynamicImage, device: &B::Device) -> Tensor<B, 4> {
        self.rgb_to_tensor(&image.to_rgb8(), device)
    }

    /// Full pipeline for an RGB image: transform and add the batch dimension
    pub fn rgb_to_tensor<B: Backend>(&self, image: &RgbImage, device: &B::Device) -> Tensor<B, 4> {
        let size = self.image_size as usize;
        let data = TensorData::new(self.transform(image), [1, 3, size, size]);
        Tensor::from_data(data, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use image::Rgb;

    type TestBackend = NdArray;

    #[test]
    fn test_output_shape_is_fixed_regardless_of_input_size() {
        let preprocessor = Preprocessor::new();

        for (w, h) in [(20, 30), (112, 112), (640, 480)] {
            let image = RgbImage::from_pixel(w, h, Rgb([10, 200, 30]));
            assert_eq!(preprocessor.transform(&image).len(), 3 * 112 * 112);
        }
    }

    #[test]
    fn test_values_are_normalized_to_unit_range() {
        let preprocessor = Preprocessor::new();

        let black = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        let white = RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]));

        assert!(preprocessor.transform(&black).iter().all(|&v| (v + 1.0).abs() < 1e-6));
        assert!(preprocessor.transform(&white).iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_chw_layout() {
        let preprocessor = Preprocessor::new().with_image_size(2);
        let image = RgbImage::from_pixel(2, 2, Rgb([255, 0, 255]));

        let values = preprocessor.normalize(&image);
        assert_eq!(values, vec![1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_tensor_has_batch_dimension() {
        let device = Default::default();
        let image = DynamicImage::new_rgba8(300, 200);

        let tensor = Preprocessor::new().to_tensor::<TestBackend>(&image, &device);
        assert_eq!(tensor.dims(), [1, 3, 112, 112]);

        let values: Vec<f32> = tensor.into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
    }
}
