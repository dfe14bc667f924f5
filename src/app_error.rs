use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::aliases::DieselError;

/// Error taxonomy shared by every handler. Validation, permission and
/// not-found errors are raised before any mutation, so the enclosing DB
/// transaction rolls back without partial state.
#[derive(Debug, Error)]
pub enum AppError {
    /// 400 with a field-to-message object body, e.g.
    /// `{"quantity": "Insufficient stock for Napa"}`.
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    ForbiddenResource(String),
    #[error("resource not found")]
    NotFound,
    /// A broken invariant (e.g. two CURRENT delivery rows). Not retryable,
    /// logged loudly, surfaced as 500.
    #[error("consistency violation: {0}")]
    Consistency(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn field_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(BTreeMap::from([(field.into(), message.into())]))
    }
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AppError::NotFound,
            other => AppError::Other(other.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(fields) => {
                (StatusCode::BAD_REQUEST, Json(json!(fields))).into_response()
            }
            AppError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
            AppError::ForbiddenResource(detail) => {
                (StatusCode::FORBIDDEN, Json(json!({ "detail": detail }))).into_response()
            }
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "detail": "Not found." })),
            )
                .into_response(),
            AppError::Consistency(detail) => {
                tracing::error!("Consistency violation: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal consistency error." })),
                )
                    .into_response()
            }
            AppError::Other(err) => {
                tracing::error!("Unhandled error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error." })),
                )
                    .into_response()
            }
        }
    }
}

/// Standard `{ data, message }` envelope used by every successful response.
#[derive(Serialize, ToSchema)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        Json(json!({ "data": self.data, "message": self.message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_render_as_field_message_objects() {
        let err = AppError::field_validation("quantity", "Insufficient stock for Napa");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn diesel_not_found_maps_to_404() {
        let err: AppError = DieselError::NotFound.into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn consistency_errors_are_internal() {
        let err = AppError::Consistency("two CURRENT delivery rows".into());
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
