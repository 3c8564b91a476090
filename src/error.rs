use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KebunError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The incised row was settled earlier; nothing was written.
    #[error("Already settled: {0}")]
    AlreadySettled(String),

    #[error("{0}")]
    Business(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KebunError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            KebunError::Validation(_) => StatusCode::BAD_REQUEST,
            KebunError::NotFound(_) => StatusCode::NOT_FOUND,
            KebunError::AlreadySettled(_) | KebunError::Business(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Serialize for KebunError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type KebunResult<T> = Result<T, KebunError>;

impl IntoResponse for KebunError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            KebunError::Validation(ref msg)
            | KebunError::NotFound(ref msg)
            | KebunError::AlreadySettled(ref msg)
            | KebunError::Business(ref msg) => {
                tracing::warn!(status = %status, "Request rejected: {}", msg);
                json!({
                    "success": false,
                    "error": msg,
                })
            }
            KebunError::Database(ref e) => {
                tracing::error!("Database Error: {:?}", e);
                json!({
                    "success": false,
                    "error": "A system error occurred; no changes were saved.",
                    "detail": e.to_string(),
                })
            }
            ref other => {
                tracing::error!("Unhandled Error: {:?}", other);
                json!({
                    "success": false,
                    "error": "A system error occurred; no changes were saved.",
                    "detail": other.to_string(),
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_map_to_client_statuses() {
        assert_eq!(
            KebunError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            KebunError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            KebunError::AlreadySettled("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            KebunError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn serializes_as_display_string() {
        let err = KebunError::NotFound("Incised #7".into());
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value, serde_json::json!("Not found: Incised #7"));
    }
}
