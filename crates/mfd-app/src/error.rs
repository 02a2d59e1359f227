use axum::response::{IntoResponse, Response};
use http::StatusCode;
use tracing::error;

use crate::store::error::StoreError;

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Not authenticated")]
    Unauthorized,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Database error: {0}")]
    DatabaseError(mfd_dal::Error),
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Multipart error: {0}")]
    MultipartError(#[from] axum::extract::multipart::MultipartError),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<mfd_dal::Error> for ApiError {
    fn from(value: mfd_dal::Error) -> Self {
        match value {
            mfd_dal::Error::RecordNotFound(what) => ApiError::ResourceNotFound(what),
            mfd_dal::Error::DatabaseError(mfd_dal::SqlxError::RowNotFound) => {
                ApiError::ResourceNotFound("Record".to_string())
            }
            mfd_dal::Error::InvalidCredentials => ApiError::Unauthorized,
            mfd_dal::Error::InvalidOrderByField(field) => {
                ApiError::InvalidQuery(format!("Cannot order by {field}"))
            }
            other => ApiError::DatabaseError(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidQuery(_)
            | ApiError::InvalidRequest(_)
            | ApiError::MultipartError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ApiError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::StoreError(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::StoreError(StoreError::InvalidPath) => StatusCode::BAD_REQUEST,
            ApiError::DatabaseError(_)
            | ApiError::StoreError(_)
            | ApiError::SerializationError(_)
            | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Server error: {self}");
            (status, "Internal server error".to_string()).into_response()
        } else {
            (status, self.to_string()).into_response()
        }
    }
}
