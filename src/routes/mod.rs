use axum::http::{HeaderMap, HeaderValue};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::files::{serve_path, CONTENTS_ROOT, UPLOADS_ROOT};
use crate::{auth::AuthenticatedEmployee, state::AppState};

pub mod auth;
pub mod employees;
pub mod generate;
pub mod health;
pub mod todos;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout));

    let employees_routes = Router::new()
        .route("/", get(employees::index).post(employees::create))
        .route(
            "/:id",
            get(employees::show)
                .put(employees::update)
                .patch(employees::patch)
                .delete(employees::destroy),
        )
        .route("/:id/avatar", post(employees::upload_avatar));

    let todos_routes = Router::new()
        .route("/", get(todos::index).post(todos::create))
        .route(
            "/:id",
            get(todos::show)
                .put(todos::update)
                .patch(todos::patch)
                .delete(todos::destroy),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/employees", employees_routes)
        .nest("/todos", todos_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedEmployee, _>(protected_state));

    let storage_root = state.config.storage_root.clone();

    Router::new()
        .merge(protected_routes)
        .merge(auth_routes)
        .route("/health", get(health::health_check))
        .route("/llm/gen", post(generate::generate))
        .with_state(state)
        .nest_service(
            "/uploads",
            ServeDir::new(serve_path(&storage_root, UPLOADS_ROOT)),
        )
        .nest_service(
            "/contents",
            ServeDir::new(serve_path(&storage_root, CONTENTS_ROOT)),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024 * 32))
}

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size", rename = "pageSize")]
    pub page_size: i64,
}

impl PageQuery {
    /// Clamped page/pageSize plus the resulting row offset.
    pub fn normalized(&self) -> (i64, i64, i64) {
        let page = self.page.max(1);
        let page_size = self.page_size.max(1);
        (page, page_size, (page - 1) * page_size)
    }
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Serialize)]
pub struct Page<T> {
    pub page: i64,
    #[serde(rename = "pageSize")]
    pub page_size: i64,
    pub total: i64,
    pub items: Vec<T>,
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

pub(crate) fn request_base_url(headers: &HeaderMap, host: &str) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    format!("{scheme}://{host}")
}
