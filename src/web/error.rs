use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::db::DbError;
use crate::llm::LlmError;
use crate::sql::{GenerationError, Violation};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    violation: Option<Violation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts: Option<u32>,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Generation(GenerationError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Generation(GenerationError::GenerationFailure { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Generation(GenerationError::Upstream(LlmError::Timeout(_))) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ApiError::Generation(GenerationError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Database(err) => match err {
                DbError::Execution(_) | DbError::InvalidIdentifier(_) | DbError::InvalidUpload(_) => {
                    StatusCode::BAD_REQUEST
                }
                DbError::TableNotFound(_) | DbError::DatabaseNotFound(_) => StatusCode::NOT_FOUND,
                DbError::Pool(_) | DbError::Io(_) | DbError::Task(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Generation(err) => err.kind(),
            ApiError::Database(err) => err.kind(),
            ApiError::BadRequest(_) => "invalid_input",
            ApiError::Unavailable(_) => "unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self);
        } else {
            warn!("Request rejected ({}): {}", status, self);
        }

        let (violation, last_response, attempts) = match &self {
            ApiError::Generation(GenerationError::GenerationFailure {
                violation,
                last_response,
                attempts,
            }) => (Some(*violation), Some(last_response.clone()), Some(*attempts)),
            _ => (None, None, None),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
                violation,
                last_response,
                attempts,
            },
        };

        (status, Json(body)).into_response()
    }
}
