use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request body did not match the feature schema.
    #[error("{message}")]
    Validation { status: StatusCode, message: String },
    #[error("feature '{0}' is not part of the request schema")]
    UnknownFeature(String),
    #[error("feature shape mismatch: model expects {expected} columns, got {actual}")]
    FeatureShape { expected: usize, actual: usize },
    #[error("model execution failed: {0}")]
    Model(String),
    #[error("invalid model artifact: {0}")]
    Artifact(String),
    #[error("object storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn unprocessable(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation { .. } => "validation",
            ServiceError::UnknownFeature(_) | ServiceError::FeatureShape { .. } => "projection",
            ServiceError::Model(_) => "model",
            ServiceError::Artifact(_) => "artifact",
            ServiceError::Storage(_) => "storage",
            ServiceError::Io(_) => "io",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if let ServiceError::Validation { status, message } = self {
            let body = serde_json::json!({ "detail": message });
            return (status, axum::Json(body)).into_response();
        }

        tracing::error!(kind = self.kind(), error = %self, "prediction failed");

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
    }
}
