use crate::config::ServerConfig;
use crate::error::Result;
use crate::pages;
use axum::http::StatusCode;
use axum::{Router, extract::DefaultBodyLimit, response::IntoResponse, response::Redirect, routing::get};
use futures::FutureExt;
use mfd_app::auth::{SESSION_COOKIE_NAME, SESSION_EXPIRY_SECS, auth_router};
use mfd_app::cache::Cache;
use mfd_app::rest_api;
use mfd_app::state::{AppConfig, AppState};
use mfd_app::store::{self, file_store::FileStore};
use mfd_dal::user::{CreateUser, UserRepository};
use tracing::{debug, info, warn};

pub async fn run(args: ServerConfig) -> Result<()> {
    let state = build_state(&args).await?;
    run_with_state(args, state).await
}

pub async fn run_with_state(args: ServerConfig, state: AppState) -> Result<()> {
    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    run_graceful_with_state(args, state, shutdown).await
}

pub async fn run_graceful_with_state<S>(
    args: ServerConfig,
    state: AppState,
    shutdown_signal: S,
) -> Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let app = main_router(state, &args);

    let ip: std::net::IpAddr = args.listen_address.parse()?;
    let addr = std::net::SocketAddr::from((ip, args.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    debug!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

pub fn main_router(state: AppState, args: &ServerConfig) -> Router<()> {
    let session_store = tower_sessions::MemoryStore::default();
    let session_layer = tower_sessions::SessionManagerLayer::new(session_store)
        .with_name(SESSION_COOKIE_NAME)
        .with_secure(false)
        .with_expiry(tower_sessions::Expiry::OnInactivity(
            time::Duration::seconds(SESSION_EXPIRY_SECS),
        ));

    let mut router = Router::new()
        .nest("/api/film", rest_api::film::router())
        .nest("/api/genre", rest_api::genre::router())
        .nest("/api/attachment", rest_api::attachment::router())
        .nest("/api/review", rest_api::review::router())
        .nest("/api/profile", rest_api::profile::router())
        .route("/api/home", get(rest_api::home::summary))
        .route("/clear_cache", get(rest_api::home::clear_cache))
        .nest("/auth", auth_router())
        .layer(DefaultBodyLimit::max(args.upload_limit_mb * 1024 * 1024))
        .layer(session_layer)
        .layer(tower_cookies::CookieManagerLayer::new())
        // public routes below are session free
        .route("/", get(root))
        .route("/health", get(health));

    if args.dev {
        // manual smoke testing of the error surfaces and raw media serving,
        // never mounted in production deployments
        router = router
            .route("/media/{*path}", get(store::serve_media))
            .route("/400", get(pages::error_400))
            .route("/403", get(pages::error_403))
            .route("/404", get(pages::error_404))
            .route("/500", get(pages::error_500));
    }

    router.fallback(pages::error_404).with_state(state)
}

async fn root() -> impl IntoResponse {
    Redirect::temporary("/api/home")
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let data_dir = config.data_dir();
    if !data_dir.is_dir() {
        tokio::fs::create_dir_all(&data_dir).await?;
        info!("Created data directory {data_dir:?}");
    }
    let media_dir = config.media_dir();
    if !media_dir.is_dir() {
        tokio::fs::create_dir_all(&media_dir).await?;
        info!("Created directory for media files");
    }

    let pool = mfd_dal::new_pool(&config.database_url()).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    bootstrap_admin(&pool, config).await?;

    let app_config = AppConfig {
        base_url: config.base_url.clone(),
        media_dir: media_dir.clone(),
    };
    Ok(AppState::new(
        app_config,
        pool,
        FileStore::new(media_dir),
        Cache::new(),
    ))
}

/// First start on an empty database gets a superuser, otherwise nobody could
/// grant permissions at all.
async fn bootstrap_admin(pool: &mfd_dal::Pool, config: &ServerConfig) -> Result<()> {
    let users = UserRepository::new(pool.clone());
    if users.count().await? > 0 {
        return Ok(());
    }
    match &config.admin_password {
        Some(password) => {
            users
                .create(CreateUser {
                    username: "admin".to_string(),
                    email: "admin@example.com".to_string(),
                    password: Some(password.clone()),
                    superuser: true,
                    permissions: None,
                })
                .await?;
            info!("Created initial admin user");
        }
        None => warn!("No users exist and no admin password configured, writes will be rejected"),
    }
    Ok(())
}
