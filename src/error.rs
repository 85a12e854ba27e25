use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::{envelope::Envelope, validation::FieldErrors};

/// Every failure a handler can report. Rendered as the standard envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidToken(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Email already verified")]
    AlreadyVerified,

    #[error("Failed to create {entity}")]
    Creation {
        entity: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// `map_err` adapter that keeps the cause for the log and shows `message` to the client.
    pub fn internal<E>(message: impl Into<String>) -> impl FnOnce(E) -> AppError
    where
        E: Into<anyhow::Error>,
    {
        let message = message.into();
        move |e| AppError::Internal {
            message,
            source: e.into(),
        }
    }

    pub fn creation<E>(entity: &'static str) -> impl FnOnce(E) -> AppError
    where
        E: Into<anyhow::Error>,
    {
        move |e| AppError::Creation {
            entity,
            source: e.into(),
        }
    }

    pub fn field(field: &str, message: impl Into<String>) -> AppError {
        let mut errors = FieldErrors::default();
        errors.insert(field, message);
        AppError::Validation(errors)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) | AppError::InvalidToken(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::AlreadyVerified => StatusCode::CONFLICT,
            AppError::Creation { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::Validation(errors) => Envelope::failure(self.to_string(), json!(errors)),
            AppError::Creation { source, .. } | AppError::Internal { source, .. } => {
                let cause = format!("{source:#}");
                tracing::error!(error = %cause, %status, "{}", self);
                Envelope::failure(self.to_string(), json!({}))
            }
            _ => Envelope::failure(self.to_string(), json!({})),
        };
        (status, Json(body)).into_response()
    }
}
