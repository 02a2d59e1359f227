use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
};
use futures::TryStreamExt as _;
use garde::Validate as _;
use http::StatusCode;
use mfd_dal::attachment::{AttachmentKind, AttachmentRepository, CreateAttachment};
use mfd_dal::film::FilmRepository;
use mfd_types::claim::Permission;
use tracing::{debug, warn};

use crate::{
    auth::permission::RequiredPermissionLayer,
    error::{ApiError, ApiResult},
    state::AppState,
    store::{self, ValidatedPath, error::StoreError},
};

#[derive(Debug, serde::Deserialize)]
pub struct UploadQuery {
    title: Option<String>,
    kind: Option<AttachmentKind>,
}

/// Multipart upload of one file, stored under the owning film's directory.
pub async fn upload(
    Path(film_id): Path<i64>,
    State(state): State<AppState>,
    films: FilmRepository,
    repository: AttachmentRepository,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    // the owning film must exist, FK would reject the record only after the upload
    films.get(film_id).await?;

    if let Some(field) = multipart.next_field().await? {
        let file_name = field
            .file_name()
            .ok_or_else(|| ApiError::InvalidRequest("Missing file name".into()))?
            .to_string();
        // title rules are checked before the file lands on disk, the stored
        // path and size are filled in afterwards
        let mut payload = CreateAttachment {
            title: query.title.unwrap_or_else(|| file_name.clone()),
            kind: query.kind.unwrap_or_default(),
            file: None,
            size: None,
        };
        payload
            .validate()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let dest_path = store::attachment_path(film_id, &file_name)?;
        debug!("Uploading attachment {file_name} of film {film_id} to {dest_path:?}");
        let stream = field.map_err(|e| {
            StoreError::StreamError(format!("Error reading multipart field in request: {e}"))
        });
        let info = state.store().store_stream(&dest_path, stream).await?;

        payload.file = Some(info.final_path);
        payload.size = Some(info.size as i64);
        let record = repository.create(film_id, payload).await?;
        Ok((StatusCode::CREATED, Json(record)))
    } else {
        Err(ApiError::InvalidRequest("Missing file field".into()))
    }
}

pub async fn get_attachment(
    Path(id): Path<i64>,
    repository: AttachmentRepository,
) -> ApiResult<impl IntoResponse> {
    let record = repository.get(id).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn list_for_film(
    Path(film_id): Path<i64>,
    repository: AttachmentRepository,
) -> ApiResult<impl IntoResponse> {
    let records = repository.list_for_film(film_id).await?;
    Ok((StatusCode::OK, Json(records)))
}

pub async fn delete_attachment(
    Path(id): Path<i64>,
    repository: AttachmentRepository,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.get(id).await?;
    repository.delete(id).await?;
    if let Some(file) = record.file {
        match ValidatedPath::new(file) {
            Ok(path) => {
                if let Err(e) = state.store().remove(&path).await {
                    warn!("Failed to remove attachment file: {e}");
                }
            }
            Err(e) => warn!("Stored attachment path is invalid: {e}"),
        }
    }
    Ok((StatusCode::NO_CONTENT, ()))
}

// One permission layer per write route, merged so the guards do not stack.
pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/{id}", get(get_attachment))
        .route("/film/{film_id}", get(list_for_film))
        .merge(
            axum::Router::new()
                .route("/film/{film_id}", post(upload))
                .layer(RequiredPermissionLayer::new(Permission::AddAttachment)),
        )
        .merge(
            axum::Router::new()
                .route("/{id}", delete(delete_attachment))
                .layer(RequiredPermissionLayer::new(Permission::DeleteAttachment)),
        )
}
