use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::AppError,
    extract::ValidJson,
    middleware::auth::{issue_token, AdminClaims, ROLE_ADMIN},
    state::AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1))]
    pub api_key: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    expires_in: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/auth/token", post(issue_admin_token))
}

/// POST /api/auth/token
/// Exchanges the configured admin API key for a short-lived admin JWT.
async fn issue_admin_token(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<TokenRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if req.api_key != state.auth.admin_api_key {
        tracing::warn!("Rejected admin token request with invalid API key");
        return Err(AppError::AuthenticationError("Invalid API key".to_string()));
    }

    let claims = AdminClaims::new("admin", ROLE_ADMIN, state.auth.expiration);
    let token = issue_token(&state.auth, &claims)?;

    Ok(Json(AuthResponse {
        token,
        expires_in: state.auth.expiration,
    }))
}
