//! Service errors and their transport mapping.

use dfd_transforms::InputError;
use thiserror::Error;

/// Errors that abort a request.
///
/// Attribution failures never appear here: they degrade the visualization
/// and the request still succeeds.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Bad upload: wrong content type, empty or undecodable.
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    /// Weights failed to load at startup.
    #[error("ML model failed to load, cannot analyze documents without model: {0}")]
    ModelUnavailable(String),

    /// Classification failed.
    #[error("prediction failed: {0}")]
    Inference(String),

    /// Configuration could not be read.
    #[error("configuration error: {0}")]
    Config(String),

    /// Staging the upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Input(_) => 400,
            Self::ModelUnavailable(_) | Self::Inference(_) | Self::Config(_) | Self::Io(_) => 500,
        }
    }

    /// Whether the caller is at fault.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<dfd_core::CoreError> for ServiceError {
    fn from(err: dfd_core::CoreError) -> Self {
        Self::Inference(err.to_string())
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let input = ServiceError::from(InputError::Empty);
        assert_eq!(input.status_code(), 400);
        assert!(input.is_client_error());

        let unavailable = ServiceError::ModelUnavailable("missing weights".into());
        assert_eq!(unavailable.status_code(), 500);
        assert!(!unavailable.is_client_error());

        let inference = ServiceError::from(dfd_core::CoreError::EmptyLogits);
        assert!(matches!(inference, ServiceError::Inference(_)));
        assert_eq!(inference.status_code(), 500);
    }
}
