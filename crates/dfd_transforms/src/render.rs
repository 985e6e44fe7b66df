//! Overlay rendering and transport encoding.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dfd_core::ImportanceMap;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, ImageOutputFormat, Luma, Rgb, RgbImage};
use tracing::debug;

use crate::colormap::jet;
use crate::error::RenderError;

/// Default heatmap weight in the blend.
pub const DEFAULT_ALPHA: f32 = 0.4;

/// Blended visualization and its base64 PNG encoding.
#[derive(Debug, Clone)]
pub struct RenderedOverlay {
    /// Original image blended with the colorized heatmap.
    pub image: RgbImage,
    /// Base64 of the PNG-encoded `image`.
    pub encoded: String,
}

/// Blends a colorized [`ImportanceMap`] over the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayRenderer {
    alpha: f32,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl OverlayRenderer {
    /// Renderer weighting the heatmap by `alpha`, clamped to `[0, 1]`.
    #[must_use]
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    /// Heatmap weight.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// `(1 - alpha) * original + alpha * jet(map)`, at the original's size.
    pub fn blend(&self, original: &RgbImage, map: &ImportanceMap) -> Result<RgbImage, RenderError> {
        let (width, height) = original.dimensions();
        let intensity = heatmap_intensity(map, width, height)?;
        let alpha = self.alpha;

        Ok(RgbImage::from_fn(width, height, |x, y| {
            let heat = jet(intensity.get_pixel(x, y)[0]);
            let base = original.get_pixel(x, y);
            Rgb(std::array::from_fn(|c| {
                let v = (1.0 - alpha) * f32::from(base[c]) + alpha * f32::from(heat[c]);
                v.round().clamp(0.0, 255.0) as u8
            }))
        }))
    }

    /// Blend and encode.
    pub fn render(
        &self,
        original: &RgbImage,
        map: &ImportanceMap,
    ) -> Result<RenderedOverlay, RenderError> {
        let image = self.blend(original, map)?;
        let encoded = encode_png_base64(&image)?;
        debug!(
            size = ?image.dimensions(),
            encoded_len = encoded.len(),
            "rendered overlay"
        );
        Ok(RenderedOverlay { image, encoded })
    }
}

/// 8-bit heatmap intensity at `width x height`.
///
/// The map is resized bilinearly when its shape differs; values are then
/// scaled by 255 and truncated.
pub fn heatmap_intensity(
    map: &ImportanceMap,
    width: u32,
    height: u32,
) -> Result<GrayImage, RenderError> {
    let [map_h, map_w] = map.shape();
    let raw: Vec<f32> = map.values().iter().copied().collect();
    let values = raw.len();
    let buffer = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(map_w as u32, map_h as u32, raw)
        .ok_or(RenderError::Shape {
            values,
            width: map_w as u32,
            height: map_h as u32,
        })?;

    let buffer = if (map_w as u32, map_h as u32) == (width, height) {
        buffer
    } else {
        image::imageops::resize(&buffer, width, height, FilterType::Triangle)
    };

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let v = buffer.get_pixel(x, y)[0].clamp(0.0, 1.0);
        Luma([(255.0 * v) as u8])
    }))
}

/// PNG-encode an RGB image and wrap it in standard base64.
pub fn encode_png_base64(image: &RgbImage) -> Result<String, RenderError> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(STANDARD.encode(cursor.into_inner()))
}

/// Inverse of [`encode_png_base64`].
pub fn decode_png_base64(encoded: &str) -> Result<RgbImage, RenderError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| RenderError::Decode(e.to_string()))?;
    let image = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)
        .map_err(|e| RenderError::Decode(e.to_string()))?;
    Ok(image.to_rgb8())
}
