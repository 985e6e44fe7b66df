//! The forgery detection service.
//!
//! One [`ForgeryService::predict`] call runs the whole pipeline for one
//! upload, synchronously:
//!
//! ```text
//! Received -> Preprocessed -> Classified -> Explained | Unexplained -> Responded
//! ```
//!
//! Failures before `Classified` abort the request. Failures after it only
//! replace the visualization with [`FALLBACK_PNG`].

use std::time::Instant;

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use dfd_core::{ForgeryClassifier, ModelInputs, PreparedInput, Prediction};
use dfd_explain::{GradCam, MultiInputAdapter};
use dfd_models::{load_forgery_net, ForgeryNet};
use dfd_transforms::{InputError, OverlayRenderer, Preprocessor, RenderedOverlay};
use image::RgbImage;
use tracing::{debug, error, info};

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::response::{HealthStatus, PredictResponse, Visualization, FALLBACK_PNG, MODE_ML};
use crate::upload::{validate_content_type, StagedUpload, Upload};

/// Outcome of the attribution stage.
#[derive(Debug)]
pub enum Attribution {
    /// A heatmap overlay was produced.
    Explained {
        /// Rendered overlay.
        overlay: RenderedOverlay,
        /// Importance map `[height, width]`.
        shape: [usize; 2],
        /// Class the map explains.
        class_id: usize,
    },
    /// No heatmap; the prediction stands on its own.
    Unexplained {
        /// What went wrong.
        reason: String,
    },
}

enum ModelState<B: AutodiffBackend, M: AutodiffModule<B>> {
    Ready { model: M, inference: M::InnerModule },
    Unavailable { reason: String },
}

/// Classifies uploads and explains the decision.
///
/// Weights are read-only after construction. Attribution state lives inside
/// each call, so one service can serve concurrent requests.
pub struct ForgeryService<B: AutodiffBackend, M: AutodiffModule<B> = ForgeryNet<B>> {
    config: ServiceConfig,
    device: B::Device,
    preprocessor: Preprocessor,
    renderer: OverlayRenderer,
    engine: GradCam,
    state: ModelState<B, M>,
}

impl<B: AutodiffBackend> ForgeryService<B, ForgeryNet<B>> {
    /// Load the checkpoint named by `config`.
    ///
    /// Never fails: a checkpoint that cannot be loaded leaves the service
    /// up but unavailable, and every prediction is rejected.
    pub fn load(config: ServiceConfig, device: B::Device) -> Self {
        info!(path = %config.model_path.display(), "loading model");
        match load_forgery_net::<B>(&config.model, &config.model_path, &device) {
            Ok(model) => Self::from_model(config, model, device),
            Err(err) => {
                error!(
                    path = %config.model_path.display(),
                    error = %err,
                    "failed to load model; predictions will be rejected"
                );
                Self::unavailable(config, device, err.to_string())
            }
        }
    }
}

impl<B, M> ForgeryService<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + ForgeryClassifier<B>,
    M::InnerModule: ForgeryClassifier<B::InnerBackend>,
{
    /// Ready service around an in-memory model.
    pub fn from_model(config: ServiceConfig, model: M, device: B::Device) -> Self {
        let inference = model.valid();
        info!(device = ?device, "model ready");
        Self::with_state(config, device, ModelState::Ready { model, inference })
    }

    /// Service that rejects every prediction.
    pub fn unavailable(
        config: ServiceConfig,
        device: B::Device,
        reason: impl Into<String>,
    ) -> Self {
        Self::with_state(
            config,
            device,
            ModelState::Unavailable {
                reason: reason.into(),
            },
        )
    }

    fn with_state(config: ServiceConfig, device: B::Device, state: ModelState<B, M>) -> Self {
        Self {
            preprocessor: config.preprocessor(),
            renderer: config.renderer(),
            engine: config.engine(),
            config,
            device,
            state,
        }
    }

    /// Service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Whether predictions can be served.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready { .. })
    }

    /// Status report.
    pub fn health(&self) -> HealthStatus {
        info!("health check requested");
        let ready = self.is_ready();
        HealthStatus {
            status: "ok".to_string(),
            device: format!("{:?}", self.device).to_lowercase(),
            model_loaded: ready,
            model_path: self.config.model_path.display().to_string(),
            mode: if ready { MODE_ML } else { "unavailable" }.to_string(),
        }
    }

    /// Classify an upload and explain the decision.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Input`] for non-image content types, empty or
    /// undecodable files; [`ServiceError::ModelUnavailable`] when no model is
    /// loaded; [`ServiceError::Inference`] if classification fails. The
    /// staged temporary file is removed on every path.
    pub fn predict(&self, upload: &Upload) -> Result<PredictResponse> {
        let start = Instant::now();
        info!(
            filename = %upload.filename,
            content_type = %upload.content_type,
            bytes = upload.bytes.len(),
            "new prediction request"
        );

        if let Err(err) = validate_content_type(&upload.content_type) {
            error!(content_type = %upload.content_type, "invalid file type");
            return Err(err.into());
        }
        let (model, inference) = self.ready()?;
        if upload.bytes.is_empty() {
            return Err(InputError::Empty.into());
        }

        let staged = StagedUpload::stage(upload)?;
        info!(path = %staged.path().display(), "saved to temp file");
        let image = Preprocessor::decode_file(staged.path()).map_err(|err| {
            error!(filename = %upload.filename, error = %err, "cannot decode upload");
            ServiceError::from(err)
        })?;
        info!(width = image.width(), height = image.height(), "image decoded");

        let response = self.run(&upload.filename, &image, model, inference)?;
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "total request time"
        );
        Ok(response)
    }

    /// Classify an already decoded image and explain the decision.
    pub fn predict_image(&self, filename: &str, image: &RgbImage) -> Result<PredictResponse> {
        let (model, inference) = self.ready()?;
        self.run(filename, image, model, inference)
    }

    fn ready(&self) -> Result<(&M, &M::InnerModule)> {
        match &self.state {
            ModelState::Ready { model, inference } => Ok((model, inference)),
            ModelState::Unavailable { reason } => {
                error!("model not loaded; cannot proceed with analysis");
                Err(ServiceError::ModelUnavailable(reason.clone()))
            }
        }
    }

    fn run(
        &self,
        filename: &str,
        image: &RgbImage,
        model: &M,
        inference: &M::InnerModule,
    ) -> Result<PredictResponse> {
        let prepared = self.preprocessor.prepare(image)?;

        let pred_start = Instant::now();
        let prediction = self.classify(inference, &prepared)?;
        info!(
            class_id = prediction.class_id,
            class_name = %prediction.class_name,
            confidence = prediction.confidence,
            elapsed_ms = pred_start.elapsed().as_millis() as u64,
            "prediction complete"
        );

        let attr_start = Instant::now();
        let (gradcam, gradcam_shape, visualization) =
            match self.attribute(model, &prepared, image, prediction.class_id) {
                Attribution::Explained {
                    overlay,
                    shape,
                    class_id,
                } => {
                    info!(
                        class_id,
                        shape = ?shape,
                        base64_len = overlay.encoded.len(),
                        elapsed_ms = attr_start.elapsed().as_millis() as u64,
                        "Grad-CAM generated"
                    );
                    (overlay.encoded, shape, Visualization::Gradcam)
                }
                Attribution::Unexplained { reason } => {
                    error!(reason = %reason, "Grad-CAM generation failed; using placeholder");
                    (
                        FALLBACK_PNG.to_string(),
                        self.config.fallback_shape,
                        Visualization::Placeholder,
                    )
                }
            };

        Ok(PredictResponse {
            filename: filename.to_string(),
            prediction,
            gradcam,
            gradcam_shape,
            mode: MODE_ML.to_string(),
            visualization,
        })
    }

    /// Forward pass without gradient tracking.
    fn classify(
        &self,
        inference: &M::InnerModule,
        prepared: &PreparedInput,
    ) -> Result<Prediction> {
        let inputs = ModelInputs::<B::InnerBackend>::from_prepared(prepared, &self.device);
        let logits = inference.forward(inputs.image, inputs.edge, inputs.tokens);
        let [_, num_classes] = logits.dims();
        let row = logits
            .slice([0..1, 0..num_classes])
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ServiceError::Inference(format!("{:?}", e)))?;
        debug!(logits = ?row, "classifier logits");
        Ok(Prediction::from_logits(&row)?)
    }

    /// Grad-CAM of `class_id` rendered over the original image.
    ///
    /// Builds its own adapter and capture state from `prepared`, so nothing
    /// is shared with other requests.
    pub fn attribute(
        &self,
        model: &M,
        prepared: &PreparedInput,
        image: &RgbImage,
        class_id: usize,
    ) -> Attribution {
        let inputs = ModelInputs::<B>::from_prepared(prepared, &self.device);
        let (adapter, image_tensor) = MultiInputAdapter::split(model, inputs);

        let activation = match self.engine.explain(&adapter, image_tensor, Some(class_id)) {
            Ok(activation) => activation,
            Err(err) => {
                return Attribution::Unexplained {
                    reason: err.to_string(),
                }
            }
        };
        debug!(
            nonzero = activation.map.nonzero_count(),
            mean = activation.map.mean(),
            "importance map"
        );

        let shape = activation.map.shape();
        match self.renderer.render(image, &activation.map) {
            Ok(overlay) => Attribution::Explained {
                overlay,
                shape,
                class_id: activation.class_id,
            },
            Err(err) => Attribution::Unexplained {
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::nn::{Linear, LinearConfig};
    use burn::prelude::*;
    use dfd_core::backend::NdArrayAutodiff;
    use dfd_core::{FeatureStage, Seed};
    use dfd_models::{save_forgery_net, ForgeryNetConfig};
    use image::{DynamicImage, ImageOutputFormat, Rgb};
    use std::io::Cursor;

    type TestBackend = NdArrayAutodiff;

    fn small_config() -> ServiceConfig {
        ServiceConfig::default().with_model(
            ForgeryNetConfig::new(32)
                .with_backbone_channels(vec![8, 16])
                .with_hidden_dims([32, 16])
                .with_max_tokens(8),
        )
    }

    fn ready_service() -> ForgeryService<TestBackend> {
        let config = small_config();
        let device = Default::default();
        Seed::new(9).seed_backend::<TestBackend>();
        let model = config.model.init::<TestBackend>(&device);
        ForgeryService::from_model(config, model, device)
    }

    fn unavailable_service() -> ForgeryService<TestBackend> {
        ForgeryService::unavailable(small_config(), Default::default(), "no weights")
    }

    fn png_upload(width: u32, height: u32) -> Upload {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7) as u8, (y * 5) as u8, 90])
        });
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        Upload::new("doc.png", "image/png", cursor.into_inner())
    }

    /// Routes the logits around the tapped backbone output.
    #[derive(Module, Debug)]
    struct DetachedLayer<B: Backend> {
        head: Linear<B>,
    }

    impl<B: Backend> ForgeryClassifier<B> for DetachedLayer<B> {
        fn forward_tapped(
            &self,
            image: Tensor<B, 4>,
            _edge: Tensor<B, 4>,
            _tokens: Tensor<B, 2, Int>,
            tap: &mut dyn FnMut(FeatureStage, Tensor<B, 4>) -> Tensor<B, 4>,
        ) -> Tensor<B, 2> {
            let _ignored = tap(FeatureStage::Backbone, image.clone());
            let [batch, channels, _, _] = image.dims();
            self.head
                .forward(image.mean_dim(3).mean_dim(2).reshape([batch, channels]))
        }
    }

    #[test]
    fn test_predict_produces_overlay() {
        let service = ready_service();
        let response = service.predict(&png_upload(40, 24)).unwrap();

        assert_eq!(response.filename, "doc.png");
        assert_eq!(response.mode, "ML");
        assert_eq!(response.visualization, Visualization::Gradcam);
        assert_eq!(response.gradcam_shape, [32, 32]);
        assert!(response.prediction.class_id < 7);
        let decoded = dfd_transforms::decode_png_base64(&response.gradcam).unwrap();
        assert_eq!(decoded.dimensions(), (40, 24));
    }

    #[test]
    fn test_dark_page_is_explained() {
        let service = ready_service();
        let mut page = RgbImage::from_pixel(300, 300, Rgb([0, 0, 0]));
        for y in 120..180 {
            for x in 120..180 {
                page.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }

        let response = service.predict_image("dark.png", &page).unwrap();
        assert_eq!(response.visualization, Visualization::Gradcam);
        let decoded = dfd_transforms::decode_png_base64(&response.gradcam).unwrap();
        assert_eq!(decoded.dimensions(), (300, 300));
    }

    #[test]
    fn test_rejects_non_image_content_type() {
        let service = ready_service();
        let upload = Upload::new("notes.txt", "text/plain", b"hello".to_vec());
        let err = service.predict(&upload).unwrap_err();
        assert!(err.is_client_error());
        assert!(matches!(
            err,
            ServiceError::Input(InputError::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn test_rejects_undecodable_image() {
        let service = ready_service();
        let upload = Upload::new("fake.png", "image/png", b"not really a png".to_vec());
        let err = service.predict(&upload).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_unavailable_model() {
        let service = unavailable_service();
        assert!(!service.is_ready());

        let err = service.predict(&png_upload(8, 8)).unwrap_err();
        assert!(matches!(err, ServiceError::ModelUnavailable(_)));
        assert_eq!(err.status_code(), 500);

        let health = service.health();
        assert_eq!(health.status, "ok");
        assert!(!health.model_loaded);
        assert_eq!(health.mode, "unavailable");
    }

    #[test]
    fn test_content_type_checked_before_model() {
        let service = unavailable_service();
        let upload = Upload::new("notes.txt", "text/plain", b"hello".to_vec());
        assert!(service.predict(&upload).unwrap_err().is_client_error());
    }

    #[test]
    fn test_load_missing_checkpoint_is_unavailable() {
        let config = small_config().with_model_path("/nonexistent/forgery_net");
        let service = ForgeryService::<TestBackend>::load(config, Default::default());
        assert!(!service.is_ready());
        assert_eq!(service.health().model_path, "/nonexistent/forgery_net");
    }

    #[test]
    fn test_load_saved_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net");
        let config = small_config().with_model_path(&path);
        let device = Default::default();

        let model = config.model.init::<TestBackend>(&device);
        save_forgery_net(&model, &config.model, &path).unwrap();

        let service = ForgeryService::<TestBackend>::load(config, device);
        let health = service.health();
        assert!(health.model_loaded);
        assert_eq!(health.mode, "ML");
        assert_eq!(health.device, "cpu");
    }

    #[test]
    fn test_detached_layer_falls_back_to_placeholder() {
        let device = Default::default();
        let model = DetachedLayer::<TestBackend> {
            head: LinearConfig::new(3, 7).init(&device),
        };
        let service = ForgeryService::<TestBackend, _>::from_model(small_config(), model, device);

        let response = service.predict(&png_upload(16, 16)).unwrap();
        assert_eq!(response.visualization, Visualization::Placeholder);
        assert_eq!(response.gradcam, FALLBACK_PNG);
        assert_eq!(response.gradcam_shape, [256, 256]);
        assert_eq!(response.mode, "ML");

        let sum: f32 = response.prediction.scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}
