use axum::response::{Html, IntoResponse};
use http::StatusCode;

// Dedicated renderers for the error surfaces, one per status class the
// application distinguishes. The fallback route goes to [`error_404`].

const PAGE_400: &str = "<!DOCTYPE html>\n<html><head><title>400</title></head>\
<body><h1>400 - Chybný požadavek</h1><p>Server požadavku nerozuměl.</p></body></html>";
const PAGE_403: &str = "<!DOCTYPE html>\n<html><head><title>403</title></head>\
<body><h1>403 - Přístup odepřen</h1><p>K této akci nemáte oprávnění.</p></body></html>";
const PAGE_404: &str = "<!DOCTYPE html>\n<html><head><title>404</title></head>\
<body><h1>404 - Nenalezeno</h1><p>Požadovaná stránka neexistuje.</p></body></html>";
const PAGE_500: &str = "<!DOCTYPE html>\n<html><head><title>500</title></head>\
<body><h1>500 - Chyba serveru</h1><p>Něco se pokazilo, zkuste to prosím později.</p></body></html>";

pub async fn error_400() -> impl IntoResponse {
    (StatusCode::BAD_REQUEST, Html(PAGE_400))
}

pub async fn error_403() -> impl IntoResponse {
    (StatusCode::FORBIDDEN, Html(PAGE_403))
}

pub async fn error_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(PAGE_404))
}

pub async fn error_500() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, Html(PAGE_500))
}
