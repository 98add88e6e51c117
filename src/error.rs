use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::classifier::ClassifierError;
use crate::models::ErrorResponse;

/// Failure of a single request. Every variant renders as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("Unsupported file type")]
    UnsupportedFileType,

    #[error("Malformed upload: {0}")]
    Multipart(String),

    #[error("Invalid image")]
    InvalidImage(#[source] image::ImageError),

    #[error("{0}")]
    Inference(#[from] ClassifierError),

    #[error("{0}")]
    Internal(String),

    #[error("File not found: {0}")]
    AssetNotFound(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFile
            | ApiError::UnsupportedFileType
            | ApiError::Multipart(_)
            | ApiError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            ApiError::AssetNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Inference(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

/// Errors that prevent the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not read {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse label map {}: {}", .path.display(), .source)]
    LabelMap {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} contains no labels", .0.display())]
    NoClasses(PathBuf),

    #[error("could not load model: {0}")]
    Model(#[from] ClassifierError),
}
