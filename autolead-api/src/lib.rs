use axum::{
    http::{header, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod analytics;
pub mod auth;
pub mod cars;
pub mod clients;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod inventory;
pub mod middleware;
pub mod search;
pub mod state;
pub mod webhooks;

pub use state::AppState;

use middleware::{admin_auth_middleware, rate_limit_middleware};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::USER_AGENT]);

    let admin = axum::middleware::from_fn_with_state(state.clone(), admin_auth_middleware);

    // Admin-only surfaces
    let admin_routes = Router::new()
        .merge(inventory::routes())
        .merge(analytics::routes())
        .route_layer(admin);

    Router::new()
        .route("/health", get(health))
        .merge(auth::routes())
        .merge(clients::routes(state.clone()))
        .merge(cars::routes())
        .merge(search::routes())
        .merge(webhooks::routes())
        .merge(admin_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": chrono::Utc::now() }))
}
