use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use http::{StatusCode, header};
use mfd_dal::film::{FilmRepository, FilmShort};
use mfd_types::claim::{Authorization as _, UserClaim};
use serde::Serialize;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

const HOME_CACHE_KEY: &str = "home_summary";

#[derive(Debug, Serialize)]
struct HomeSummary {
    num_films: i64,
    films: Vec<FilmShort>,
}

/// Home page numbers: catalog size and the three best rated films.
pub async fn summary(
    State(state): State<AppState>,
    repository: FilmRepository,
) -> ApiResult<impl IntoResponse> {
    if let Some(cached) = state.cache().get(HOME_CACHE_KEY) {
        return Ok((StatusCode::OK, Json(cached)));
    }
    let num_films = repository.count().await?;
    let films = repository.top_rated(3).await?;
    let value = serde_json::to_value(HomeSummary { num_films, films })?;
    state.cache().put(HOME_CACHE_KEY, value.clone());
    Ok((StatusCode::OK, Json(value)))
}

/// Full flush of the process wide cache, superusers only. The response itself
/// must never be cached downstream.
pub async fn clear_cache(claim: UserClaim, State(state): State<AppState>) -> ApiResult<Response> {
    if !claim.is_superuser() {
        return Err(ApiError::PermissionDenied);
    }
    state.cache().clear();
    info!("Cache cleared by {}", claim.username);
    Ok((
        StatusCode::OK,
        [(header::CACHE_CONTROL, "no-store")],
        "Cache has been cleared",
    )
        .into_response())
}
