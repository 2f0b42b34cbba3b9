pub mod error;
pub mod handlers;
pub mod query;

use crate::config::Config;
use crate::sync::SyncService;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub type SharedState = Arc<AppState>;

// Shared state handed to every handler
pub struct AppState {
    pub config: Config,
    pub db: PgPool,
    pub sync: Arc<SyncService>,
}

impl AppState {
    pub fn new(config: Config, db: PgPool, sync: Arc<SyncService>) -> Self {
        Self { config, db, sync }
    }
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let Some(origin) = frontend_url else {
        return CorsLayer::permissive();
    };

    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!("Invalid FRONTEND_URL '{}', allowing any origin", origin);
            CorsLayer::permissive()
        }
    }
}

pub fn router(state: SharedState) -> Router {
    let cors = cors_layer(state.config.frontend_url.as_deref());

    let api = Router::new()
        .route("/test", get(handlers::api_test))
        .route("/matches", get(handlers::list_matches))
        .route("/matches/with-features", get(handlers::list_matches_with_features))
        .route("/teams", get(handlers::list_teams))
        .route("/teams/:team_id/matches", get(handlers::team_matches))
        .route("/stats", get(handlers::match_summary))
        .route("/update-data", post(handlers::update_data))
        .route("/query", post(handlers::run_query));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
