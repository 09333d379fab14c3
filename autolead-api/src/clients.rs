use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use autolead_core::client::{Client, ClientPage, ClientQuery, ClientUpsert, ContactMethod, LeadStatus};
use autolead_core::interaction::{Interaction, NewInteraction};
use autolead_core::search::BodyType;

use crate::{
    dashboard,
    error::AppError,
    extract::{AppJson, ValidJson},
    middleware::admin_auth_middleware,
    state::AppState,
};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct ClientRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(length(min = 10, max = 20))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    pub preferred_body_type: Option<BodyType>,
    #[validate(length(min = 2, max = 50))]
    pub preferred_brand: Option<String>,
    #[validate(range(min = 0.0))]
    pub min_price: Option<f64>,
    #[validate(range(min = 0.0))]
    pub max_price: Option<f64>,
    #[validate(length(min = 3, max = 30))]
    pub preferred_color: Option<String>,
    #[validate(range(min = 0.0))]
    pub max_mileage: Option<f64>,
    pub contact_method: Option<ContactMethod>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(max = 50))]
    pub source: Option<String>,
    pub session_id: Option<String>,
}

impl From<ClientRequest> for ClientUpsert {
    fn from(req: ClientRequest) -> Self {
        ClientUpsert {
            name: req.name,
            phone: req.phone,
            email: req.email,
            preferred_body_type: req.preferred_body_type.map(|b| b.to_string()),
            preferred_brand: req.preferred_brand,
            min_price: req.min_price,
            max_price: req.max_price,
            preferred_color: req.preferred_color,
            max_mileage: req.max_mileage,
            contact_method: req.contact_method,
            notes: req.notes,
            source: req.source,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClientResponse {
    pub message: &'static str,
    pub client: Client,
    pub is_new: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InteractionRequest {
    pub client_id: Option<i64>,
    #[validate(length(min = 1))]
    pub session_id: String,
    #[validate(length(min = 1))]
    pub interaction_type: String,
    #[validate(length(max = 2000))]
    pub user_message: Option<String>,
    #[validate(length(max = 2000))]
    pub bot_response: Option<String>,
    pub extracted_data: Option<serde_json::Map<String, serde_json::Value>>,
}

impl From<InteractionRequest> for NewInteraction {
    fn from(req: InteractionRequest) -> Self {
        NewInteraction {
            client_id: req.client_id,
            session_id: req.session_id,
            interaction_type: req.interaction_type,
            user_message: req.user_message,
            bot_response: req.bot_response,
            extracted_data: req.extracted_data.map(serde_json::Value::Object),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListClientsQuery {
    pub status: Option<String>,
    pub source: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `all` and an empty value both mean "no filter".
fn filter_value(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != "all")
}

impl ListClientsQuery {
    fn into_query(self) -> Result<ClientQuery, AppError> {
        let status = filter_value(self.status)
            .map(|s| s.parse::<LeadStatus>())
            .transpose()?;
        Ok(ClientQuery::new(status, filter_value(self.source), self.limit, self.offset))
    }
}

fn parse_client_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::ValidationError("Invalid client ID".to_string()))
}

fn client_not_found() -> AppError {
    AppError::NotFoundError("Client not found".to_string())
}

/// Public capture endpoints plus the admin-only lookups. Admin auth is layered per method
/// because `GET` and `POST /api/clients` share a path.
pub fn routes(state: AppState) -> Router<AppState> {
    let admin = axum::middleware::from_fn_with_state(state, admin_auth_middleware);

    Router::new()
        .route(
            "/api/clients",
            get(list_clients).route_layer(admin.clone()).post(create_client),
        )
        .route("/api/clients/interaction", post(log_interaction))
        .route("/api/clients/session/{session_id}", get(get_client_by_session))
        .route("/api/clients/{id}", get(get_client).route_layer(admin.clone()))
        .route(
            "/api/clients/{id}/interactions",
            get(list_client_interactions).route_layer(admin.clone()),
        )
        .route("/api/clients/{id}/status", put(update_status).route_layer(admin))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/clients
/// Upsert by phone: an existing lead keeps any field the request leaves out.
pub async fn create_client(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ClientRequest>,
) -> Result<(StatusCode, Json<ClientResponse>), AppError> {
    let session_id = req.session_id.clone();
    let (client, is_new) = state.client_repo.upsert_by_phone(req.into()).await?;

    dashboard::publish_lead_captured(&state, &client, session_id, is_new);

    let (status, message) = if is_new {
        (StatusCode::CREATED, "Client created successfully")
    } else {
        (StatusCode::OK, "Client updated successfully")
    };
    Ok((status, Json(ClientResponse { message, client, is_new })))
}

/// POST /api/clients/interaction
pub async fn log_interaction(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<InteractionRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let interaction = state.interaction_repo.log_interaction(req.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Interaction logged successfully",
            "interaction": interaction,
        })),
    ))
}

/// GET /api/clients/{id}
pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = parse_client_id(&id)?;
    let client = state
        .client_repo
        .get_client(id)
        .await?
        .ok_or_else(client_not_found)?;

    Ok(Json(json!({ "client": client })))
}

#[derive(Debug, Serialize)]
pub struct InteractionList {
    pub interactions: Vec<Interaction>,
    pub total: usize,
}

/// GET /api/clients/{id}/interactions
pub async fn list_client_interactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InteractionList>, AppError> {
    let id = parse_client_id(&id)?;
    let interactions = state.interaction_repo.list_for_client(id).await?;

    Ok(Json(InteractionList {
        total: interactions.len(),
        interactions,
    }))
}

/// GET /api/clients/session/{session_id}
pub async fn get_client_by_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let client = state
        .client_repo
        .find_by_session(&session_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("No client found for this session".to_string()))?;

    Ok(Json(json!({ "client": client })))
}

/// PUT /api/clients/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<StatusUpdateRequest>,
) -> Result<Response, AppError> {
    let id = parse_client_id(&id)?;

    let Some(status) = req.status.as_deref().and_then(|s| s.parse::<LeadStatus>().ok()) else {
        let body = json!({
            "error": "Invalid status",
            "valid_statuses": LeadStatus::names(),
        });
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    };

    let client = state
        .client_repo
        .update_status(id, status, req.notes)
        .await?
        .ok_or_else(client_not_found)?;

    tracing::info!(client_id = client.id, status = %status, "Client status updated");

    Ok(Json(json!({
        "message": "Client status updated successfully",
        "client": client,
    }))
    .into_response())
}

/// GET /api/clients
pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<ClientPage>, AppError> {
    let query = query.into_query()?;
    let page = state.client_repo.list_clients(&query).await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_all_means_unfiltered() {
        let query = ListClientsQuery {
            status: Some("all".into()),
            source: Some("all".into()),
            limit: Some(500),
            offset: None,
        }
        .into_query()
        .unwrap();

        assert_eq!(query.status, None);
        assert_eq!(query.source, None);
        assert_eq!(query.limit, ClientQuery::MAX_LIMIT);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn test_list_query_rejects_unknown_status() {
        let query = ListClientsQuery {
            status: Some("archived".into()),
            source: None,
            limit: None,
            offset: None,
        };
        assert!(query.into_query().is_err());
    }

    #[test]
    fn test_client_request_validation() {
        let req: ClientRequest = serde_json::from_value(json!({
            "name": "A",
            "phone": "5512345678",
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req: ClientRequest = serde_json::from_value(json!({
            "name": "Ana",
            "phone": "5512345678",
            "email": "not-an-email",
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req: ClientRequest = serde_json::from_value(json!({
            "name": "Ana",
            "phone": "5512345678",
            "preferred_body_type": "suv",
            "max_price": 300000,
        }))
        .unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_unknown_body_type_is_rejected_at_parse() {
        let parsed = serde_json::from_value::<ClientRequest>(json!({
            "name": "Ana",
            "phone": "5512345678",
            "preferred_body_type": "minivan",
        }));
        assert!(parsed.is_err());
    }
}
