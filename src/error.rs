//! Error handling

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::info;

/// definitions for the icongen application.
#[derive(Debug)]
pub enum GeneratorError {
    /// The request didn't pass validation
    BadRequest(String),
    /// Upstream rejected our credential (HTTP 401)
    InvalidCredential,
    /// Upstream is rate limiting us (HTTP 429)
    RateLimited,
    /// Upstream refused the request for this credential (HTTP 403)
    Forbidden,
    /// Any other image generation failure, with the upstream detail if we have one
    GenerationFailed(String),
    /// The generated image couldn't be fetched
    DownloadFailed(String),
    /// The generated image is bigger than the configured cap
    DownloadTooLarge(u64),
    /// Decoding, resizing or encoding failed
    ProcessingFailed(String),
    /// Local filesystem failure
    Storage(std::io::Error),
    /// One of the record store endpoints was hit while logging is off
    LoggingDisabled,
    /// When a requested resource is not found
    NotFound(String),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl GeneratorError {
    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            GeneratorError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GeneratorError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GeneratorError::InvalidCredential
            | GeneratorError::Forbidden
            | GeneratorError::GenerationFailed(_)
            | GeneratorError::DownloadFailed(_)
            | GeneratorError::DownloadTooLarge(_) => StatusCode::BAD_GATEWAY,
            GeneratorError::LoggingDisabled | GeneratorError::NotFound(_) => StatusCode::NOT_FOUND,
            GeneratorError::ProcessingFailed(_)
            | GeneratorError::Storage(_)
            | GeneratorError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(message) => f.write_str(message),
            Self::InvalidCredential => write!(
                f,
                "Invalid API key for the image generation service. Check IMAGE_API_KEY."
            ),
            Self::RateLimited => write!(
                f,
                "Rate limit exceeded on the image generation service. Please retry later."
            ),
            Self::Forbidden => write!(
                f,
                "Access forbidden: the API key is not allowed to use this model."
            ),
            Self::GenerationFailed(detail) => write!(f, "Image generation failed: {detail}"),
            Self::DownloadFailed(detail) => {
                write!(f, "Failed to download the generated image: {detail}")
            }
            Self::DownloadTooLarge(limit) => write!(
                f,
                "Generated image exceeds the maximum download size of {limit} bytes"
            ),
            Self::ProcessingFailed(detail) => write!(f, "Image processing failed: {detail}"),
            Self::Storage(err) => write!(f, "Failed to store image: {err}"),
            Self::LoggingDisabled => write!(f, "database logging is disabled"),
            Self::NotFound(what) => write!(f, "Not found: {what}"),
            Self::InternalServerError(message) => write!(f, "Internal server error: {message}"),
        }
    }
}

impl std::error::Error for GeneratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GeneratorError {
    fn from(err: std::io::Error) -> Self {
        GeneratorError::Storage(err)
    }
}

impl From<image::ImageError> for GeneratorError {
    fn from(err: image::ImageError) -> Self {
        GeneratorError::ProcessingFailed(err.to_string())
    }
}

/// The failure envelope every JSON endpoint responds with.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    /// Always false
    pub success: bool,
    /// Human readable message
    pub error: String,
}

impl IntoResponse for GeneratorError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!("{} {}", status.as_u16(), message);
        } else {
            info!("{} {}", status.as_u16(), message);
        }
        (
            status,
            Json(ErrorEnvelope {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}
