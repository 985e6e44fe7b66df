//! Response payloads.

use dfd_core::Prediction;
use serde::{Deserialize, Serialize};

/// 1x1 PNG returned when no heatmap could be produced.
pub const FALLBACK_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Inference mode reported in every prediction.
pub const MODE_ML: &str = "ML";

/// Which image the `gradcam` field carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visualization {
    /// Heatmap overlay of the predicted class.
    Gradcam,
    /// [`FALLBACK_PNG`].
    Placeholder,
}

/// Result of one prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Uploaded file name.
    pub filename: String,
    /// Classification.
    pub prediction: Prediction,
    /// Base64 PNG visualization.
    pub gradcam: String,
    /// Importance map `[height, width]`.
    pub gradcam_shape: [usize; 2],
    /// Always `"ML"`.
    pub mode: String,
    /// Whether `gradcam` is a real overlay.
    pub visualization: Visualization,
}

impl PredictResponse {
    /// Whether attribution fell back to the placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.visualization == Visualization::Placeholder
    }
}

/// Service status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always `"ok"`: the service itself is up.
    pub status: String,
    /// Compute device.
    pub device: String,
    /// Whether predictions can be served.
    pub model_loaded: bool,
    /// Configured checkpoint location.
    pub model_path: String,
    /// `"ML"` when loaded, `"unavailable"` otherwise.
    pub mode: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_wire_format() {
        let prediction = Prediction::from_logits(&[0.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        let response = PredictResponse {
            filename: "id.png".into(),
            prediction,
            gradcam: FALLBACK_PNG.into(),
            gradcam_shape: [256, 256],
            mode: MODE_ML.into(),
            visualization: Visualization::Placeholder,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["filename"], "id.png");
        assert_eq!(json["prediction"]["classId"], 1);
        assert_eq!(json["prediction"]["className"], "copy_move");
        assert_eq!(json["prediction"]["scores"].as_array().unwrap().len(), 7);
        assert_eq!(json["gradcam_shape"], serde_json::json!([256, 256]));
        assert_eq!(json["mode"], "ML");
        assert_eq!(json["visualization"], "placeholder");
        assert!(response.is_placeholder());
    }
}
