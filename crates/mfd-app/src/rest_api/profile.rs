use axum::{Json, response::IntoResponse, routing::get};
use http::StatusCode;
use mfd_dal::user::{UpdateProfile, UserRepository};
use mfd_types::claim::UserClaim;

use crate::{error::ApiResult, state::AppState, validate::Garde};

/// Profiles are strictly personal - both handlers act on the session user.
pub async fn get_profile(
    claim: UserClaim,
    repository: UserRepository,
) -> ApiResult<impl IntoResponse> {
    let profile = repository.get_profile(claim.id).await?;
    Ok((StatusCode::OK, Json(profile)))
}

pub async fn update_profile(
    claim: UserClaim,
    repository: UserRepository,
    Garde(Json(payload)): Garde<Json<UpdateProfile>>,
) -> ApiResult<impl IntoResponse> {
    let profile = repository.update_profile(claim.id, payload).await?;
    Ok((StatusCode::OK, Json(profile)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/", get(get_profile).put(update_profile))
}
