use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use futures::TryStreamExt as _;
use garde::Validate;
use http::StatusCode;
use mfd_dal::film::{CreateFilm, FilmRepository, UpdateFilm};
use mfd_types::claim::Permission;
use serde::Serialize;
use tracing::warn;

use crate::{
    auth::permission::RequiredPermissionLayer,
    error::{ApiError, ApiResult},
    rest_api::{Page, Paging},
    state::AppState,
    store::{self, error::StoreError},
    validate::Garde,
};

/// Listing pages are deliberately small, sized for the catalog screens.
pub const FILM_PAGE_SIZE: u32 = 3;
pub const NEW_FILMS_PAGE_SIZE: u32 = 2;
const TOP_TEN_CACHE_KEY: &str = "top_ten";

#[derive(Debug, Clone, Validate, serde::Deserialize)]
pub struct FilmListQuery {
    #[garde(dive)]
    #[serde(flatten)]
    paging: Paging,
    #[garde(length(min = 1, max = 50))]
    genre: Option<String>,
}

/// Listing plus the human label shown above it.
#[derive(Debug, Serialize)]
pub struct FilmListing {
    pub label: String,
    #[serde(flatten)]
    page: Page<mfd_dal::film::FilmShort>,
}

async fn list_films(
    repository: &FilmRepository,
    paging: Paging,
    genre: Option<String>,
) -> ApiResult<FilmListing> {
    let page_size = paging.page_size(FILM_PAGE_SIZE);
    let params = paging.into_listing_params(FILM_PAGE_SIZE)?;
    let batch = repository.list(params, genre.as_deref()).await?;
    let label = match genre {
        Some(name) => format!("Žánr filmu: {name}"),
        None => "Přehled filmů".to_string(),
    };
    Ok(FilmListing {
        label,
        page: Page::from_batch(batch, page_size),
    })
}

pub async fn list(
    repository: FilmRepository,
    Garde(Query(query)): Garde<Query<FilmListQuery>>,
) -> ApiResult<impl IntoResponse> {
    let listing = list_films(&repository, query.paging, query.genre).await?;
    Ok((StatusCode::OK, Json(listing)))
}

pub async fn list_by_genre(
    Path(genre_name): Path<String>,
    repository: FilmRepository,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let listing = list_films(&repository, paging, Some(genre_name)).await?;
    Ok((StatusCode::OK, Json(listing)))
}

/// Detail carries the owned attachments and reviews as well.
#[derive(Debug, Serialize)]
pub struct FilmDetail {
    #[serde(flatten)]
    film: mfd_dal::film::Film,
    attachments: Vec<mfd_dal::attachment::Attachment>,
    reviews: Vec<mfd_dal::review::Review>,
}

pub async fn get_film(
    Path(id): Path<i64>,
    repository: FilmRepository,
    attachments: mfd_dal::attachment::AttachmentRepository,
    reviews: mfd_dal::review::ReviewRepository,
) -> ApiResult<impl IntoResponse> {
    let film = repository.get(id).await?;
    let attachments = attachments.list_for_film(id).await?;
    let reviews = reviews.list_for_film(id).await?;
    Ok((
        StatusCode::OK,
        Json(FilmDetail {
            film,
            attachments,
            reviews,
        }),
    ))
}

pub async fn top_ten(
    State(state): State<AppState>,
    repository: FilmRepository,
) -> ApiResult<impl IntoResponse> {
    if let Some(cached) = state.cache().get(TOP_TEN_CACHE_KEY) {
        return Ok((StatusCode::OK, Json(cached)));
    }
    let films = repository.top_rated(10).await?;
    let value = serde_json::to_value(films)?;
    state.cache().put(TOP_TEN_CACHE_KEY, value.clone());
    Ok((StatusCode::OK, Json(value)))
}

pub async fn new_films(
    repository: FilmRepository,
    Garde(Query(paging)): Garde<Query<Paging>>,
) -> ApiResult<impl IntoResponse> {
    let page_size = paging.page_size(NEW_FILMS_PAGE_SIZE);
    let params = paging.into_listing_params(NEW_FILMS_PAGE_SIZE)?;
    let batch = repository.newest(params).await?;
    Ok((StatusCode::OK, Json(Page::from_batch(batch, page_size))))
}

pub async fn create(
    repository: FilmRepository,
    Garde(Json(payload)): Garde<Json<CreateFilm>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update(
    Path(id): Path<i64>,
    repository: FilmRepository,
    Garde(Json(payload)): Garde<Json<UpdateFilm>>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.update(id, payload).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn delete_film(
    Path(id): Path<i64>,
    repository: FilmRepository,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    repository.delete(id).await?;
    // attachment rows are gone via FK cascade, files go with the directory
    if let Err(e) = state.store().remove_film_dir(id).await {
        warn!("Failed to remove attachment files of film {id}: {e}");
    }
    Ok((StatusCode::NO_CONTENT, ()))
}

pub async fn upload_poster(
    Path(id): Path<i64>,
    repository: FilmRepository,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    // film must exist before anything lands on disk
    repository.get(id).await?;
    if let Some(field) = multipart.next_field().await? {
        let file_name = field
            .file_name()
            .ok_or_else(|| ApiError::InvalidRequest("Missing file name".into()))?
            .to_string();
        let today = time::OffsetDateTime::now_utc().date();
        let dest_path = store::poster_path(today, &file_name)?;
        let stream = field.map_err(|e| {
            StoreError::StreamError(format!("Error reading multipart field in request: {e}"))
        });
        let info = state.store().store_stream(&dest_path, stream).await?;
        repository.set_poster(id, &info.final_path).await?;
        let film = repository.get(id).await?;
        Ok((StatusCode::OK, Json(film)))
    } else {
        Err(ApiError::InvalidRequest("Missing file field".into()))
    }
}

// Each write route gets exactly the one permission the operation needs, so the
// guarded sub-routers are merged instead of layered on top of each other.
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list))
        .route("/top-ten", get(top_ten))
        .route("/new", get(new_films))
        .route("/genre/{genre_name}", get(list_by_genre))
        .route("/{id}", get(get_film))
        .merge(
            axum::Router::new()
                .route("/", post(create))
                .layer(RequiredPermissionLayer::new(Permission::AddFilm)),
        )
        .merge(
            axum::Router::new()
                .route("/{id}", put(update))
                .route("/{id}/poster", post(upload_poster))
                .layer(RequiredPermissionLayer::new(Permission::ChangeFilm)),
        )
        .merge(
            axum::Router::new()
                .route("/{id}", delete(delete_film))
                .layer(RequiredPermissionLayer::new(Permission::DeleteFilm)),
        )
}
