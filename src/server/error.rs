//! Error types for the server

use crate::error::TransitError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Pipeline(#[from] TransitError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ServerError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.clone())
            }
            ServerError::Pipeline(err) => {
                let status = match err {
                    TransitError::SchemaMismatch { .. }
                    | TransitError::DataError(_)
                    | TransitError::ShapeError { .. }
                    | TransitError::Json(_) => StatusCode::BAD_REQUEST,
                    TransitError::EmptyDataset
                    | TransitError::InsufficientData { .. }
                    | TransitError::MissingFocusFeature(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    TransitError::ModelNotLoaded => StatusCode::CONFLICT,
                    TransitError::CorruptArtifact(_)
                    | TransitError::ComputationError(_)
                    | TransitError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(detail = %err, "pipeline error");
                }
                (status, err.kind(), err.to_string())
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": true,
            "kind": kind,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
