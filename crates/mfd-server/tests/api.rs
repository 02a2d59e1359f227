use axum::Router;
use axum::body::Body;
use futures::TryStreamExt as _;
use http::{Request, StatusCode, header};
use mfd_app::cache::Cache;
use mfd_app::state::{AppConfig, AppState};
use mfd_app::store::file_store::FileStore;
use mfd_dal::user::{CreateUser, UserRepository};
use mfd_server::config::{Parser as _, ServerConfig};
use sqlx::Executor;
use tower::ServiceExt as _;

const TEST_DATA: &str = r#"
INSERT INTO genre (id, name) VALUES (1, 'Komedie');
INSERT INTO genre (id, name) VALUES (2, 'Drama');
INSERT INTO genre (id, name) VALUES (3, 'Sci-fi');

INSERT INTO film (id, title, plot, release_date, runtime, rate)
VALUES (1, 'Pelisky', 'Dve rodiny v jednom dome', '1999-04-08', 116, 8.7);
INSERT INTO film (id, title, plot, release_date, runtime, rate)
VALUES (2, 'Akumulator 1', NULL, '1994-01-27', 102, 7.1);
INSERT INTO film (id, title, plot, release_date, runtime, rate)
VALUES (3, 'Ikarie XB 1', NULL, '1963-07-26', 88, 7.8);
INSERT INTO film (id, title, plot, release_date, runtime, rate)
VALUES (4, 'Vesnicko ma strediskova', NULL, '1985-10-01', 98, 8.2);

INSERT INTO film_genres (film_id, genre_id) VALUES (1, 1);
INSERT INTO film_genres (film_id, genre_id) VALUES (1, 2);
INSERT INTO film_genres (film_id, genre_id) VALUES (2, 1);
INSERT INTO film_genres (film_id, genre_id) VALUES (4, 1);

INSERT INTO attachment (id, title, file, size, kind, film_id)
VALUES (1, 'Trailer', 'films/1/trailer.mp4', 734003200, 'video', 1);
"#;

struct TestApp {
    router: Router,
    state: AppState,
    _media_dir: tempfile::TempDir,
}

async fn test_app() -> TestApp {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    pool.execute("PRAGMA foreign_keys = ON").await.unwrap();
    sqlx::migrate!("../../migrations").run(&pool).await.unwrap();
    pool.execute_many(TEST_DATA)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    let users = UserRepository::new(pool.clone());
    for (username, superuser, permissions) in [
        ("admin", true, None),
        (
            "editor",
            false,
            Some(vec!["add_film".to_string(), "change_film".to_string()]),
        ),
        ("changer", false, Some(vec!["change_film".to_string()])),
        ("deleter", false, Some(vec!["delete_film".to_string()])),
        ("viewer", false, None),
    ] {
        users
            .create(CreateUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: Some("testovaci heslo".to_string()),
                superuser,
                permissions,
            })
            .await
            .unwrap();
    }

    let media_dir = tempfile::tempdir().unwrap();
    let state = AppState::new(
        AppConfig {
            base_url: "http://localhost:3000".parse().unwrap(),
            media_dir: media_dir.path().to_path_buf(),
        },
        pool,
        FileStore::new(media_dir.path()),
        Cache::new(),
    );

    let args = ServerConfig::try_parse_from(["mfd-server", "--dev"]).unwrap();
    TestApp {
        router: mfd_server::main_router(state.clone(), &args),
        state,
        _media_dir: media_dir,
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn get(router: &Router, uri: &str) -> axum::response::Response {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn get_with_session(router: &Router, uri: &str, cookie: &str) -> axum::response::Response {
    router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn send_empty(
    router: &Router,
    method: &str,
    uri: &str,
    cookie: &str,
) -> axum::response::Response {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn send_json(
    router: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: serde_json::Value,
) -> axum::response::Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    router
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

/// Logs in and returns the session cookie for subsequent requests.
async fn login(router: &Router, username: &str) -> String {
    let response = send_json(
        router,
        "POST",
        "/auth/login",
        None,
        serde_json::json!({"username": username, "password": "testovaci heslo"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login must set session cookie")
        .to_str()
        .unwrap();
    cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn test_home_count_matches_listing_total() {
    let app = test_app().await;

    let home = body_json(get(&app.router, "/api/home").await).await;
    let listing = body_json(get(&app.router, "/api/film").await).await;

    assert_eq!(home["num_films"], 4);
    assert_eq!(home["num_films"], listing["total"]);
    assert_eq!(home["films"].as_array().unwrap().len(), 3);
    assert_eq!(home["films"][0]["title"], "Pelisky");
}

#[tokio::test]
async fn test_film_listing_labels_and_paging() {
    let app = test_app().await;

    let response = get(&app.router, "/api/film").await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["label"], "Přehled filmů");
    assert_eq!(listing["rows"].as_array().unwrap().len(), 3);
    assert_eq!(listing["total"], 4);
    assert_eq!(listing["total_pages"], 2);

    let filtered = body_json(get(&app.router, "/api/film?genre=Komedie").await).await;
    assert_eq!(filtered["label"], "Žánr filmu: Komedie");
    assert_eq!(filtered["total"], 3);

    // path form of the same screen
    let by_path = body_json(get(&app.router, "/api/film/genre/Komedie").await).await;
    assert_eq!(by_path["total"], 3);

    let new_films = body_json(get(&app.router, "/api/film/new").await).await;
    assert_eq!(new_films["rows"].as_array().unwrap().len(), 2);
    assert_eq!(new_films["rows"][0]["title"], "Ikarie XB 1");
}

#[tokio::test]
async fn test_film_detail_and_not_found() {
    let app = test_app().await;

    let detail = body_json(get(&app.router, "/api/film/1").await).await;
    assert_eq!(detail["title"], "Pelisky");
    assert_eq!(detail["release_year"], 1999);
    assert_eq!(detail["rate_percent"], "87 %");
    assert_eq!(detail["genres"][0]["name"], "Drama");
    assert_eq!(detail["attachments"][0]["filesize"], "700.00 MB");

    let response = get(&app.router, "/api/film/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_film_requires_permission() {
    let app = test_app().await;
    let payload = serde_json::json!({"title": "Kolja", "genres": [2]});

    let response = send_json(&app.router, "POST", "/api/film", None, payload.clone()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let viewer = login(&app.router, "viewer").await;
    let response =
        send_json(&app.router, "POST", "/api/film", Some(&viewer), payload.clone()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    // nothing was written
    let listing = body_json(get(&app.router, "/api/film").await).await;
    assert_eq!(listing["total"], 4);

    let editor = login(&app.router, "editor").await;
    let response = send_json(&app.router, "POST", "/api/film", Some(&editor), payload).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    // unspecified rate defaults to 5
    assert_eq!(created["rate"], 5.0);
    assert_eq!(created["genres"][0]["name"], "Drama");
}

#[tokio::test]
async fn test_strict_update_validation() {
    let app = test_app().await;
    let editor = login(&app.router, "editor").await;

    let bad = serde_json::json!({
        "title": "Pelisky",
        "release_date": "1999-04-08",
        "runtime": 1001,
        "rate": 8.7,
    });
    let response = send_json(&app.router, "PUT", "/api/film/1", Some(&editor), bad).await;
    assert!(response.status().is_client_error());
    // rejected update must not touch the record
    let detail = body_json(get(&app.router, "/api/film/1").await).await;
    assert_eq!(detail["runtime"], 116);

    let good = serde_json::json!({
        "title": "Pelisky",
        "release_date": "1999-04-08",
        "runtime": 1000,
        "rate": 10.0,
        "genres": [1, 2],
    });
    let response = send_json(&app.router, "PUT", "/api/film/1", Some(&editor), good).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["runtime"], 1000);
    assert_eq!(updated["rate"], 10.0);
}

#[tokio::test]
async fn test_delete_film_cascades() {
    let app = test_app().await;
    let admin = login(&app.router, "admin").await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/film/1")
                .header(header::COOKIE, &admin)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        get(&app.router, "/api/film/1").await.status(),
        StatusCode::NOT_FOUND
    );
    let attachments = body_json(get(&app.router, "/api/attachment/film/1").await).await;
    assert!(attachments.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_top_ten_ordering() {
    let app = test_app().await;

    let films = body_json(get(&app.router, "/api/film/top-ten").await).await;
    let films = films.as_array().unwrap().clone();
    assert!(films.len() <= 10);
    let rates: Vec<f64> = films.iter().map(|f| f["rate"].as_f64().unwrap()).collect();
    assert!(rates.windows(2).all(|w| w[0] >= w[1]));

    // second call is served from the cache and must be identical
    let cached = body_json(get(&app.router, "/api/film/top-ten").await).await;
    assert_eq!(cached.as_array().unwrap(), &films);
}

#[tokio::test]
async fn test_clear_cache_permissions() {
    let app = test_app().await;

    // prime the cache
    get(&app.router, "/api/home").await;
    assert!(!app.state.cache().is_empty());

    let response = get(&app.router, "/clear_cache").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let viewer = login(&app.router, "viewer").await;
    let response = get_with_session(&app.router, "/clear_cache", &viewer).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    // denied call left cached values intact
    assert!(!app.state.cache().is_empty());

    let admin = login(&app.router, "admin").await;
    let response = get_with_session(&app.router, "/clear_cache", &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
    assert_eq!(body_text(response).await, "Cache has been cleared");
    assert!(app.state.cache().is_empty());
}

#[tokio::test]
async fn test_reviews_need_authentication() {
    let app = test_app().await;
    let payload = serde_json::json!({"rate": 9.0, "comment": "Klasika"});

    let response = send_json(
        &app.router,
        "POST",
        "/api/review/film/1",
        None,
        payload.clone(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let viewer = login(&app.router, "viewer").await;
    let response =
        send_json(&app.router, "POST", "/api/review/film/1", Some(&viewer), payload).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let review = body_json(response).await;
    assert_eq!(review["author"], "viewer");
    assert_eq!(review["film_title"], "Pelisky");

    // admin only listing
    let response = get_with_session(&app.router, "/api/review", &viewer).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let admin = login(&app.router, "admin").await;
    let listing = body_json(get_with_session(&app.router, "/api/review", &admin).await).await;
    assert_eq!(listing["total"], 1);
}

#[tokio::test]
async fn test_own_profile_update() {
    let app = test_app().await;
    let viewer = login(&app.router, "viewer").await;

    let profile = body_json(get_with_session(&app.router, "/api/profile", &viewer).await).await;
    assert!(profile["bio"].is_null());

    let response = send_json(
        &app.router,
        "PUT",
        "/api/profile",
        Some(&viewer),
        serde_json::json!({
            "bio": "Mam rad ceske filmy",
            "location": "Brno",
            "birth_date": "1990-01-01",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let profile = body_json(response).await;
    assert_eq!(profile["location"], "Brno");
}

#[tokio::test]
async fn test_error_pages_and_fallback() {
    let app = test_app().await;

    for (uri, status) in [
        ("/400", StatusCode::BAD_REQUEST),
        ("/403", StatusCode::FORBIDDEN),
        ("/404", StatusCode::NOT_FOUND),
        ("/500", StatusCode::INTERNAL_SERVER_ERROR),
    ] {
        let response = get(&app.router, uri).await;
        assert_eq!(response.status(), status);
        let body = body_text(response).await;
        assert!(body.contains(status.as_str()));
    }

    let response = get(&app.router, "/neexistujici/stranka").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_single_write_permission_is_sufficient() {
    let app = test_app().await;

    let changer = login(&app.router, "changer").await;
    let update = serde_json::json!({
        "title": "Akumulator 1",
        "release_date": "1994-01-27",
        "runtime": 102,
        "rate": 7.5,
        "genres": [1, 3],
    });
    let response = send_json(&app.router, "PUT", "/api/film/2", Some(&changer), update).await;
    assert_eq!(response.status(), StatusCode::OK);
    // change_film alone grants neither create nor delete
    let response = send_json(
        &app.router,
        "POST",
        "/api/film",
        Some(&changer),
        serde_json::json!({"title": "Kolja"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = send_empty(&app.router, "DELETE", "/api/film/2", &changer).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let deleter = login(&app.router, "deleter").await;
    let response = send_json(
        &app.router,
        "PUT",
        "/api/film/3",
        Some(&deleter),
        serde_json::json!({
            "title": "Ikarie XB 1",
            "rate": 7.8,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = send_empty(&app.router, "DELETE", "/api/film/2", &deleter).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        get(&app.router, "/api/film/2").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_login_accepts_content_type_with_charset() {
    let app = test_app().await;

    let body = serde_json::json!({"username": "viewer", "password": "testovaci heslo"});
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_some());
}

fn multipart_upload(uri: &str, cookie: &str) -> Request<Body> {
    const BOUNDARY: &str = "xYzZY";
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"ukazka.mp4\"\r\n\
         Content-Type: video/mp4\r\n\r\n\
         nejaka data\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_attachment_upload_validates_title() {
    let app = test_app().await;
    let admin = login(&app.router, "admin").await;

    let long_title = "a".repeat(201);
    let response = app
        .router
        .clone()
        .oneshot(multipart_upload(
            &format!("/api/attachment/film/1?title={long_title}&kind=video"),
            &admin,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // rejected upload leaves the attachment list as it was
    let attachments = body_json(get(&app.router, "/api/attachment/film/1").await).await;
    assert_eq!(attachments.as_array().unwrap().len(), 1);

    let response = app
        .router
        .clone()
        .oneshot(multipart_upload(
            "/api/attachment/film/1?title=Ukazka&kind=video",
            &admin,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let record = body_json(response).await;
    assert_eq!(record["title"], "Ukazka");
    assert_eq!(record["file"], "films/1/ukazka.mp4");
    assert_eq!(record["size"], 11);
}

#[tokio::test]
async fn test_genre_listing_public_write_gated() {
    let app = test_app().await;

    let genres = body_json(get(&app.router, "/api/genre").await).await;
    let names: Vec<&str> = genres
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Drama", "Komedie", "Sci-fi"]);

    let editor = login(&app.router, "editor").await;
    // editor has film permissions only
    let response = send_json(
        &app.router,
        "POST",
        "/api/genre",
        Some(&editor),
        serde_json::json!({"name": "Horor"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = login(&app.router, "admin").await;
    let response = send_json(
        &app.router,
        "POST",
        "/api/genre",
        Some(&admin),
        serde_json::json!({"name": "Horor"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}
