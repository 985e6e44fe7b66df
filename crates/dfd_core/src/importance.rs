//! Rescaled attribution heatmaps.

use ndarray::Array2;
use tracing::warn;

/// Single-channel importance map with values in `[0, 1]`.
///
/// Built from a raw (non-negative) class activation map by subtracting the
/// minimum and dividing by the resulting maximum. A raw map with no spread
/// becomes the all-zero map rather than a division by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceMap {
    values: Array2<f32>,
}

impl ImportanceMap {
    /// Rescale a raw map into `[0, 1]`.
    ///
    /// Non-finite entries are treated as zero.
    pub fn rescale(raw: Array2<f32>) -> Self {
        let mut values = raw.mapv(|v| if v.is_finite() { v } else { 0.0 });

        let min = values.iter().copied().fold(f32::INFINITY, f32::min);
        if min.is_finite() {
            values.mapv_inplace(|v| v - min);
        }

        let max = values.iter().copied().fold(0.0f32, f32::max);
        if max > 0.0 {
            values.mapv_inplace(|v| (v / max).clamp(0.0, 1.0));
        } else {
            warn!(
                shape = ?values.dim(),
                "importance map is all zeros; no region contributes positively to the class"
            );
            values.fill(0.0);
        }

        Self { values }
    }

    /// An all-zero map of the given `(height, width)`.
    #[must_use]
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            values: Array2::zeros((height, width)),
        }
    }

    /// The rescaled values, indexed `[row, col]`.
    #[must_use]
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// `[height, width]` of the map.
    #[must_use]
    pub fn shape(&self) -> [usize; 2] {
        let (h, w) = self.values.dim();
        [h, w]
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    /// Whether every value is zero.
    #[must_use]
    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Number of strictly positive pixels.
    #[must_use]
    pub fn nonzero_count(&self) -> usize {
        self.values.iter().filter(|&&v| v > 0.0).count()
    }

    /// Mean importance.
    #[must_use]
    pub fn mean(&self) -> f32 {
        self.values.mean().unwrap_or(0.0)
    }
}
