use axum::{
    Json,
    extract::{Path, Query},
    response::IntoResponse,
    routing::{get, post},
};
use http::StatusCode;
use mfd_dal::review::{CreateReview, ReviewRepository};
use mfd_types::claim::{Authorization as _, UserClaim};

use crate::{
    error::{ApiError, ApiResult},
    rest_api::{Page, Paging},
    state::AppState,
    validate::Garde,
};

const REVIEW_PAGE_SIZE: u32 = 20;

/// Back office listing of all reviews, superusers only.
pub async fn list(
    claim: UserClaim,
    repository: ReviewRepository,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    if !claim.is_superuser() {
        return Err(ApiError::PermissionDenied);
    }
    let page_size = paging.page_size(REVIEW_PAGE_SIZE);
    let params = paging.into_listing_params(REVIEW_PAGE_SIZE)?;
    let batch = repository.list(params).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch, page_size))))
}

pub async fn list_for_film(
    Path(film_id): Path<i64>,
    repository: ReviewRepository,
) -> ApiResult<impl IntoResponse> {
    let reviews = repository.list_for_film(film_id).await?;
    Ok((StatusCode::OK, Json(reviews)))
}

/// Any authenticated user may review, authorship comes from the session.
pub async fn create(
    Path(film_id): Path<i64>,
    claim: UserClaim,
    repository: ReviewRepository,
    Garde(Json(payload)): Garde<Json<CreateReview>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.create(film_id, claim.id, payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list))
        .route("/film/{film_id}", get(list_for_film).post(create))
}
