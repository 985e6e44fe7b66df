//! Raw image to classifier inputs.
//!
//! [`Preprocessor::prepare`] produces the three tensors the classifier
//! consumes:
//!
//! - the image resized to `img_size x img_size` and normalized per channel;
//! - a Canny edge map of the resized grayscale image, with hysteresis
//!   thresholds at 0.7x and 1.3x its median intensity, scaled to `[0, 1]`;
//! - a zero-filled token id vector of length `max_tokens`.

use std::io::Cursor;
use std::path::Path;

use dfd_core::PreparedInput;
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{GrayImage, Luma, RgbImage};
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InputError;

/// Per-channel normalization constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    /// Channel means in `[0, 1]` pixel units.
    pub mean: [f32; 3],
    /// Channel standard deviations in `[0, 1]` pixel units.
    pub std: [f32; 3],
}

impl Default for Normalization {
    /// ImageNet statistics.
    fn default() -> Self {
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

/// Converts decoded images into [`PreparedInput`]s.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    img_size: usize,
    max_tokens: usize,
    normalization: Normalization,
}

impl Preprocessor {
    /// Preprocessor for `img_size x img_size` inputs and `max_tokens` token ids.
    #[must_use]
    pub fn new(img_size: usize, max_tokens: usize) -> Self {
        Self {
            img_size,
            max_tokens,
            normalization: Normalization::default(),
        }
    }

    /// Replace the normalization constants.
    #[must_use]
    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Spatial size of prepared tensors.
    pub fn img_size(&self) -> usize {
        self.img_size
    }

    /// Length of the token id vector.
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Normalization constants in use.
    pub fn normalization(&self) -> &Normalization {
        &self.normalization
    }

    /// Decode an in-memory image to RGB.
    pub fn decode(bytes: &[u8]) -> Result<RgbImage, InputError> {
        if bytes.is_empty() {
            return Err(InputError::Empty);
        }
        let image = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .decode()
            .map_err(|e| InputError::Decode(e.to_string()))?
            .to_rgb8();
        ensure_pixels(image)
    }

    /// Decode an image file to RGB, sniffing the format from its content.
    pub fn decode_file(path: impl AsRef<Path>) -> Result<RgbImage, InputError> {
        let image = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| InputError::Decode(e.to_string()))?
            .to_rgb8();
        ensure_pixels(image)
    }

    /// Bilinear resize to `img_size x img_size`.
    pub fn resize(&self, image: &RgbImage) -> RgbImage {
        let size = self.img_size as u32;
        if image.dimensions() == (size, size) {
            return image.clone();
        }
        image::imageops::resize(image, size, size, FilterType::Triangle)
    }

    /// Build the three classifier inputs from a decoded image.
    pub fn prepare(&self, image: &RgbImage) -> Result<PreparedInput, InputError> {
        let resized = self.resize(image);
        let color = self.normalize(&resized);
        let edge = edge_map(&resized);
        let tokens = Array1::<i64>::zeros(self.max_tokens);

        debug!(
            original = ?image.dimensions(),
            size = self.img_size,
            edge_pixels = edge.iter().filter(|&&v| v > 0.0).count(),
            "prepared inputs"
        );
        Ok(PreparedInput::new(color, edge, tokens)?)
    }

    /// Channel-first normalized tensor `(3, h, w)`.
    pub fn normalize(&self, image: &RgbImage) -> Array3<f32> {
        let (width, height) = image.dimensions();
        let Normalization { mean, std } = self.normalization;
        Array3::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
            let value = f32::from(image.get_pixel(x as u32, y as u32)[c]) / 255.0;
            (value - mean[c]) / std[c]
        })
    }
}

fn ensure_pixels(image: RgbImage) -> Result<RgbImage, InputError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(InputError::Decode("image has no pixels".to_string()));
    }
    Ok(image)
}

/// ITU-R BT.601 luma, rounded to the nearest integer.
pub fn grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Median pixel intensity; the mean of the two middle values for even counts.
pub fn median_intensity(gray: &GrayImage) -> f32 {
    let mut histogram = [0usize; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }
    let count: usize = histogram.iter().sum();
    if count == 0 {
        return 0.0;
    }

    let nth = |n: usize| -> f32 {
        let mut seen = 0;
        for (value, &freq) in histogram.iter().enumerate() {
            seen += freq;
            if seen > n {
                return value as f32;
            }
        }
        255.0
    };

    if count % 2 == 1 {
        nth(count / 2)
    } else {
        (nth(count / 2 - 1) + nth(count / 2)) / 2.0
    }
}

/// Smallest hysteresis threshold; zero-strength pixels never count as edges.
pub const MIN_THRESHOLD: f32 = 1.0;

/// Canny hysteresis thresholds `(low, high)` derived from the median.
///
/// Both are floored at [`MIN_THRESHOLD`], so a dark image yields an empty
/// edge map instead of flooding the whole frame.
pub fn adaptive_thresholds(median: f32) -> (f32, f32) {
    let low = (0.7 * median).trunc().max(MIN_THRESHOLD);
    let high = (1.3 * median).min(255.0).trunc().max(MIN_THRESHOLD);
    (low, high)
}

/// Edge map of an RGB image with values in `{0, 1}`.
pub fn edge_map(image: &RgbImage) -> Array2<f32> {
    let gray = grayscale(image);
    let median = median_intensity(&gray);
    let (low, high) = adaptive_thresholds(median);
    let edges = imageproc::edges::canny(&gray, low, high);

    let (width, height) = edges.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        f32::from(edges.get_pixel(x as u32, y as u32)[0]) / 255.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb};

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    fn checkerboard(size: u32, cell: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([230, 230, 230])
            } else {
                Rgb([20, 20, 20])
            }
        })
    }

    #[test]
    fn test_normalization_default() {
        let norm = Normalization::default();
        assert_eq!(norm.mean, [0.485, 0.456, 0.406]);
        assert_eq!(norm.std, [0.229, 0.224, 0.225]);
    }

    #[test]
    fn test_normalization_serde() {
        let json = r#"{"mean":[0.5,0.5,0.5],"std":[0.25,0.25,0.25]}"#;
        let norm: Normalization = serde_json::from_str(json).unwrap();
        assert_eq!(norm.mean, [0.5; 3]);
        assert_eq!(norm.std, [0.25; 3]);
    }

    #[test]
    fn test_prepare_shapes() {
        let pre = Preprocessor::new(64, 16);
        let image = RgbImage::from_pixel(300, 200, Rgb([128, 128, 128]));
        let prepared = pre.prepare(&image).unwrap();

        assert_eq!(prepared.image.dim(), (3, 64, 64));
        assert_eq!(prepared.edge.dim(), (64, 64));
        assert_eq!(prepared.tokens.len(), 16);
        assert!(prepared.tokens.iter().all(|&t| t == 0));
    }

    #[test]
    fn test_normalize_values() {
        let pre = Preprocessor::new(2, 4);
        let image = RgbImage::from_pixel(2, 2, Rgb([255, 0, 128]));
        let tensor = pre.normalize(&image);

        assert!((tensor[[0, 0, 0]] - (1.0 - 0.485) / 0.229).abs() < 1e-5);
        assert!((tensor[[1, 1, 1]] - (0.0 - 0.456) / 0.224).abs() < 1e-5);
        assert!((tensor[[2, 0, 1]] - (128.0 / 255.0 - 0.406) / 0.225).abs() < 1e-5);
    }

    #[test]
    fn test_edge_map_binary_in_unit_range() {
        let edge = edge_map(&checkerboard(64, 8));
        assert!(edge.iter().all(|&v| v == 0.0 || v == 1.0));
        assert!(edge.iter().any(|&v| v == 1.0));
    }

    #[test]
    fn test_uniform_image_has_no_edges() {
        let image = RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]));
        assert!(edge_map(&image).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_median_intensity() {
        let odd = GrayImage::from_raw(3, 1, vec![10, 200, 50]).unwrap();
        assert_eq!(median_intensity(&odd), 50.0);

        let even = GrayImage::from_raw(4, 1, vec![10, 20, 30, 41]).unwrap();
        assert_eq!(median_intensity(&even), 25.0);
    }

    #[test]
    fn test_adaptive_thresholds_clipped() {
        assert_eq!(adaptive_thresholds(100.0), (70.0, 130.0));
        assert_eq!(adaptive_thresholds(250.0), (175.0, 255.0));
        assert_eq!(adaptive_thresholds(0.0), (1.0, 1.0));
        assert_eq!(adaptive_thresholds(1.0), (1.0, 1.0));
    }

    #[test]
    fn test_black_image_has_no_edges() {
        let image = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        assert!(edge_map(&image).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_mostly_black_image() {
        let mut image = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        for y in 24..40 {
            for x in 24..40 {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let edge = edge_map(&image);
        assert_eq!(edge.dim(), (64, 64));
        assert!(edge.iter().all(|&v| v == 0.0 || v == 1.0));
        assert!(edge.iter().any(|&v| v == 1.0));
        // Frame border is never marked.
        assert!(edge.row(0).iter().all(|&v| v == 0.0));
        assert!(edge.column(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_prepare_dark_scan() {
        let pre = Preprocessor::new(32, 8);
        let mut image = RgbImage::from_pixel(300, 300, Rgb([0, 0, 0]));
        image.put_pixel(150, 150, Rgb([255, 255, 255]));
        let prepared = pre.prepare(&image).unwrap();
        assert_eq!(prepared.edge.dim(), (32, 32));
    }

    #[test]
    fn test_grayscale_bt601() {
        let image = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        assert_eq!(grayscale(&image).get_pixel(0, 0)[0], 76);
    }

    #[test]
    fn test_decode_png() {
        let image = checkerboard(20, 4);
        let decoded = Preprocessor::decode(&png_bytes(&image)).unwrap();
        assert_eq!(decoded.dimensions(), (20, 20));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = Preprocessor::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, InputError::Decode(_)));

        let err = Preprocessor::decode(&[]).unwrap_err();
        assert!(matches!(err, InputError::Empty));
    }
}
