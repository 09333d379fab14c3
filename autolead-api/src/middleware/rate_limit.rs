use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use crate::error::AppError;
use crate::state::AppState;

const WINDOW_SECONDS: u64 = 60;

/// Per-IP fixed window. A limiter outage lets traffic through.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let limit = state.business_rules.rate_limit_per_minute;
    match state.rate_limiter.check(&ip, limit, WINDOW_SECONDS).await {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => {
            tracing::warn!(%ip, "Rate limit exceeded");
            Err(AppError::RateLimited)
        }
        Err(e) => {
            // Fail open
            tracing::warn!("Rate limiter unavailable: {}", e);
            Ok(next.run(req).await)
        }
    }
}
