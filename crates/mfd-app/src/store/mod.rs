use axum::{
    RequestPartsExt as _,
    body::Body,
    extract::{FromRequestParts, Path as UrlPath, State},
    http::HeaderMap,
    response::IntoResponse,
};
use http::{StatusCode, request::Parts};
use time::Date;
use tracing::debug;

pub mod error;
pub mod file_store;

use error::{StoreError, StoreResult};

use crate::{error::ApiError, state::AppState};

const MAX_PATH_LEN: usize = 4095;
const MAX_SEGMENT_LEN: usize = 255;
const MAX_PATH_DEPTH: usize = 10;
const PATH_INVALID_CHARS: &str = r#"\:"#;

fn validate_path(path: &str) -> StoreResult<()> {
    if path.is_empty() || path.len() > MAX_PATH_LEN {
        return Err(StoreError::InvalidPath);
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(StoreError::InvalidPath);
    }
    let segments = path.split('/').collect::<Vec<_>>();
    if segments.len() > MAX_PATH_DEPTH {
        return Err(StoreError::InvalidPath);
    }
    let invalid_path = segments.into_iter().any(|s| {
        s.is_empty()
            || s.starts_with('.')
            || s.len() > MAX_SEGMENT_LEN
            || s.chars()
                .any(|c| PATH_INVALID_CHARS.contains(c) || c.is_ascii_control())
    });
    if invalid_path {
        Err(StoreError::InvalidPath)
    } else {
        Ok(())
    }
}

/// Relative path within the media store, checked against traversal and junk.
#[derive(Debug, Clone)]
pub struct ValidatedPath(String);

impl ValidatedPath {
    pub fn new(path: impl Into<String>) -> StoreResult<Self> {
        let path = path.into();
        validate_path(path.as_str()).inspect_err(|_| debug!("Invalid path: {path}"))?;
        Ok(ValidatedPath(path))
    }
}

impl AsRef<str> for ValidatedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for ValidatedPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let UrlPath(path) = parts
            .extract::<UrlPath<String>>()
            .await
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let path = ValidatedPath::new(path)?;
        Ok(path)
    }
}

/// Attachment files live in a directory keyed by the owning film.
pub fn attachment_path(film_id: i64, file_name: &str) -> StoreResult<ValidatedPath> {
    ValidatedPath::new(format!("films/{film_id}/{file_name}"))
}

/// Posters are bucketed by upload date.
pub fn poster_path(date: Date, file_name: &str) -> StoreResult<ValidatedPath> {
    ValidatedPath::new(format!(
        "posters/{}/{:02}/{file_name}",
        date.year(),
        u8::from(date.month())
    ))
}

#[derive(Debug)]
pub struct StoreInfo {
    /// final path where the file is stored, can differ from the requested path
    pub final_path: String,
    pub size: u64,
}

/// Raw media passthrough - only mounted outside production deployments.
pub async fn serve_media(
    State(state): State<AppState>,
    path: ValidatedPath,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store();
    let stream = store.load_data(&path).await?;
    let size = store.size(&path).await?;
    let body = Body::from_stream(stream);

    let mime = new_mime_guess::from_path(path.as_ref())
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        mime.parse().unwrap(), // safe as MIME is ASCII
    );
    headers.insert(
        http::header::CONTENT_LENGTH,
        size.to_string().parse().unwrap(), // safe - number is ASCII
    );

    Ok((StatusCode::OK, headers, body))
}
