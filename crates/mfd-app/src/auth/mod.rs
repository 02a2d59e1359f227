use axum::{
    Form, Json,
    extract::{FromRequestParts, FromRequest as _, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    RequestPartsExt as _,
};
use http::{StatusCode, request::Parts};
use mfd_dal::user::{CreateUser, UserRepository};
use mfd_types::claim::UserClaim;
use tower_cookies::Cookies;
use tower_sessions::Session;
use tracing::{debug, error, warn};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    validate::Garde,
};

pub const SESSION_COOKIE_NAME: &str = "mfd";
pub const SESSION_USER_KEY: &str = "user";
pub const SESSION_EXPIRY_SECS: i64 = 3600;

pub mod permission;

impl FromRequestParts<AppState> for UserClaim {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts.extract::<Session>().await.map_err(|e| {
            error!("Cannot get session: {}", e.1);
            ApiError::Unauthorized
        })?;
        let claim = session
            .get::<UserClaim>(SESSION_USER_KEY)
            .await
            .map_err(|e| {
                error!("Failed to get user from session: {e}");
                ApiError::InternalError(e.to_string())
            })?;
        match claim {
            Some(claim) => Ok(claim),
            None => {
                debug!("No user in session");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct LoginCredentials {
    username: String,
    password: String,
}

async fn login(
    user_registry: UserRepository,
    session: Session,
    request: axum::extract::Request,
) -> Result<impl IntoResponse, StatusCode> {
    let content_type = request
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;
    // media type only, parameters like charset are fine
    let content_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let credentials = if content_type == "application/json" {
        let Json(data) = Json::<LoginCredentials>::from_request(request, &())
            .await
            .map_err(|e| {
                error!("Failed to get login credentials: {e}");
                StatusCode::BAD_REQUEST
            })?;
        data
    } else if content_type == "application/x-www-form-urlencoded" {
        let Form(data) = Form::<LoginCredentials>::from_request(request, &())
            .await
            .map_err(|e| {
                error!("Failed to get login credentials: {e}");
                StatusCode::BAD_REQUEST
            })?;
        data
    } else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let user = user_registry
        .check_password(&credentials.username, &credentials.password)
        .await
        .map_err(|e| {
            debug!("User check error: {e}");
            StatusCode::UNAUTHORIZED
        })?;

    let claim = UserClaim::from(user);
    session
        .insert(SESSION_USER_KEY, claim.clone())
        .await
        .map_err(|e| {
            error!("Failed to store user in session: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(claim))
}

/// Self service registration - never grants permissions or superuser.
async fn signup(
    repository: UserRepository,
    Garde(Json(mut payload)): Garde<Json<CreateUser>>,
) -> ApiResult<impl IntoResponse> {
    payload.superuser = false;
    payload.permissions = None;
    let user = repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn logout(
    session: Session,
    state: State<AppState>,
    cookies: Cookies,
) -> Result<impl IntoResponse, ApiError> {
    let redirect_url = state.build_url("/")?;
    session
        .delete()
        .await
        .unwrap_or_else(|e| warn!("Failed to delete session: {e}"));

    cookies.remove(tower_cookies::Cookie::new(SESSION_COOKIE_NAME, ""));

    Ok(Redirect::temporary(redirect_url.as_str()))
}

/// Builds authentication router - must be nested on /auth path!
pub fn auth_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/logout", get(logout))
}
