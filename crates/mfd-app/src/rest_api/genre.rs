use axum::{
    Json,
    extract::Path,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use http::StatusCode;
use mfd_dal::genre::{CreateGenre, GenreRepository};
use mfd_types::claim::Permission;

use crate::{
    auth::permission::RequiredPermissionLayer, error::ApiResult, state::AppState,
    validate::Garde,
};

pub async fn list(repository: GenreRepository) -> ApiResult<impl IntoResponse> {
    let genres = repository.list().await?;
    Ok((StatusCode::OK, Json(genres)))
}

pub async fn get_genre(
    Path(id): Path<i64>,
    repository: GenreRepository,
) -> ApiResult<impl IntoResponse> {
    let record = repository.get(id).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn create(
    repository: GenreRepository,
    Garde(Json(payload)): Garde<Json<CreateGenre>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update(
    Path(id): Path<i64>,
    repository: GenreRepository,
    Garde(Json(payload)): Garde<Json<CreateGenre>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.update(id, payload).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn delete_genre(
    Path(id): Path<i64>,
    repository: GenreRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete(id).await?;
    Ok((StatusCode::NO_CONTENT, ()))
}

// One permission layer per write route, merged so the guards do not stack.
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list))
        .route("/{id}", get(get_genre))
        .merge(
            axum::Router::new()
                .route("/", post(create))
                .layer(RequiredPermissionLayer::new(Permission::AddGenre)),
        )
        .merge(
            axum::Router::new()
                .route("/{id}", put(update))
                .layer(RequiredPermissionLayer::new(Permission::ChangeGenre)),
        )
        .merge(
            axum::Router::new()
                .route("/{id}", delete(delete_genre))
                .layer(RequiredPermissionLayer::new(Permission::DeleteGenre)),
        )
}
