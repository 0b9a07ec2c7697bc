use crate::config::Config;
use crate::handlers;
use crate::state::AppState;
use crate::storage::open_storage;
use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use hyper::Server;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

/// Create the HTTP router with all public, AJAX and admin routes
pub fn create_server(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .nest_service("/static", ServeDir::new(static_dir))
        // AJAX query endpoints
        .route("/ajax", post(handlers::ajax))
        .route(handlers::GET_PLACES_PATH, post(handlers::get_places))
        .route(handlers::GET_PLACES_JSON_PATH, post(handlers::get_places_json))
        // Suggestion form
        .route(handlers::SUBMIT_PATH, post(handlers::submit))
        // Admin endpoints
        .route(
            "/admin/settings",
            get(handlers::admin_settings_page).post(handlers::admin_save_settings),
        )
        .route(
            "/admin/categories",
            get(handlers::admin_list_categories).post(handlers::admin_create_category),
        )
        .route("/admin/places", post(handlers::admin_create_place))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(cors))
}

/// Open the content store and serve until the process is stopped
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(&config.database.path)?;
    let state = AppState::new(config, storage)?;
    let app = create_server(state, &config.server.static_dir);

    let addr: SocketAddr = config.bind_addr().parse()?;

    info!("HTTP server running on http://{}", addr);
    info!("Public pages at {}", config.server.public_url);
    info!("Health check: http://{}/health", addr);

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
