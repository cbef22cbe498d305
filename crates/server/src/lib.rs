use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;

use services::{mailer::Mailer, storage::ImageStore};

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
    pub images: ImageStore,
    /// `None` when mail delivery is not configured.
    pub mailer: Option<Arc<dyn Mailer>>,
}

pub fn build_router(state: AppState) -> Router {
    let api_router = Router::new()
        .nest("/auth", routes::auth::router())
        .nest("/articles", routes::articles::router())
        .nest("/projects", routes::projects::router());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_router)
        .nest_service("/uploads", ServeDir::new(state.images.base_path()))
        .merge(routes::pages::router())
        .merge(routes::admin::router())
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origin))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = match origin.trim() {
        "*" | "" => AllowOrigin::any(),
        exact => match HeaderValue::from_str(exact) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!(origin = %exact, "Invalid ALLOW_ORIGIN, allowing any origin");
                AllowOrigin::any()
            }
        },
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn health_check() -> &'static str {
    "OK"
}
