//! Webhooks called by the external chatbot orchestrator (n8n).
//!
//! One endpoint dispatches on `action`; every reply is wrapped as
//! `{success, action, session_id, data}`.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use autolead_core::analytics::Timeframe;
use autolead_core::car::{Car, CarCard};
use autolead_core::client::{Client, ClientUpsert};
use autolead_core::conversation::ConversationContext;
use autolead_core::interaction::NewInteraction;
use autolead_core::search::{NewCarView, SearchCriteria, ViewSource};
use autolead_intent::{describe_criteria, extract_criteria, Clarification};

use crate::{
    dashboard,
    error::AppError,
    extract::AppJson,
    search::{run_search, SearchRun},
    state::AppState,
};

pub const GREETING: &str =
    "¡Hola! Soy tu asistente virtual de AutoDealer Premium. ¿Qué tipo de vehículo estás buscando hoy?";
pub const GREETING_OPTIONS: [&str; 5] = ["SUV", "Sedán", "Pickup", "Hatchback", "Coupé"];
const LEAD_THANKS: &str =
    "¡Gracias! Hemos guardado tu información. Un asesor se pondrá en contacto contigo pronto por WhatsApp.";
const LEAD_FOLLOW_UP: &str =
    "¿Te gustaría que te mostremos algunos vehículos específicos basados en tus preferencias?";
const NO_RESULTS: &str =
    "No encontré vehículos que coincidan exactamente con tu búsqueda. ¿Te gustaría modificar algún criterio?";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatbotAction {
    StartConversation,
    SearchCars,
    CaptureLead,
    LogInteraction,
    GetCarDetails,
    NaturalSearch,
}

impl FromStr for ChatbotAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start_conversation" => Ok(Self::StartConversation),
            "search_cars" => Ok(Self::SearchCars),
            "capture_lead" => Ok(Self::CaptureLead),
            "log_interaction" => Ok(Self::LogInteraction),
            "get_car_details" => Ok(Self::GetCarDetails),
            "natural_search" => Ok(Self::NaturalSearch),
            _ => Err(AppError::ValidationError("Invalid action specified".to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatbotWebhook {
    pub action: String,
    pub session_id: Option<String>,
    pub user_message: Option<String>,
    pub user_data: Option<LeadData>,
    pub search_criteria: Option<SearchCriteria>,
    pub client_id: Option<i64>,
    pub bot_response: Option<String>,
    pub interaction_type: Option<String>,
    pub car_id: Option<i64>,
}

impl ChatbotWebhook {
    fn session_id(&self) -> Result<String, AppError> {
        self.session_id
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("session_id"))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LeadData {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(length(min = 10, max = 20))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    pub preferences: Option<SearchCriteria>,
}

impl From<LeadData> for ClientUpsert {
    fn from(data: LeadData) -> Self {
        let prefs = data.preferences.unwrap_or_default();
        ClientUpsert {
            name: data.name,
            phone: data.phone,
            email: data.email,
            preferred_body_type: prefs.body_type.map(|b| b.to_string()),
            preferred_brand: prefs.brand,
            min_price: prefs.min_price,
            max_price: prefs.max_price,
            preferred_color: prefs.color,
            max_mileage: prefs.max_mileage,
            // Source falls back to "chatbot" on insert and is left alone on update.
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub action: String,
    pub session_id: Option<String>,
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct ChatbotSearchResult {
    pub cars: Vec<Car>,
    pub total_results: usize,
    pub search_criteria: SearchCriteria,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct NaturalSearchResult {
    pub cars: Vec<Car>,
    pub total_results: usize,
    pub search_criteria: SearchCriteria,
    pub message: String,
    pub extracted_criteria: SearchCriteria,
    pub interpretation: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsWebhook {
    pub metric_type: String,
    pub timeframe: Option<Value>,
}

fn missing(field: &str) -> AppError {
    AppError::ValidationError(format!("{} is required", field))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/webhooks/n8n/chatbot", post(chatbot_webhook))
        .route("/api/webhooks/n8n/analytics", post(analytics_webhook))
}

// ============================================================================
// Conversation context
// ============================================================================

/// Context for the session, or a fresh one. Session storage is best effort.
async fn load_context(state: &AppState, session_id: &str) -> ConversationContext {
    match state.sessions.load(session_id).await {
        Ok(Some(ctx)) => ctx,
        Ok(None) => ConversationContext::start(session_id),
        Err(e) => {
            tracing::warn!(session_id, "Failed to load conversation context: {}", e);
            ConversationContext::start(session_id)
        }
    }
}

async fn save_context(state: &AppState, ctx: &ConversationContext) {
    if let Err(e) = state.sessions.save(ctx).await {
        tracing::warn!(session_id = %ctx.session_id, "Failed to save conversation context: {}", e);
    }
}

// ============================================================================
// Chatbot webhook
// ============================================================================

/// POST /api/webhooks/n8n/chatbot
pub async fn chatbot_webhook(
    State(state): State<AppState>,
    AppJson(req): AppJson<ChatbotWebhook>,
) -> Result<Json<WebhookResponse>, AppError> {
    let action: ChatbotAction = req.action.parse()?;
    tracing::info!(
        action = %req.action,
        session_id = ?req.session_id,
        "Chatbot webhook received"
    );

    let (session_id, data) = match action {
        ChatbotAction::StartConversation => {
            let session_id = req
                .session_id
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let data = start_conversation(&state, &session_id).await?;
            (session_id, data)
        }
        ChatbotAction::SearchCars => {
            let session_id = req.session_id()?;
            let criteria = req.search_criteria.clone().ok_or_else(|| missing("search_criteria"))?;
            let result = chatbot_search(&state, &session_id, criteria, req.client_id).await?;
            (session_id, json!(result))
        }
        ChatbotAction::CaptureLead => {
            let session_id = req.session_id()?;
            let user_data = req.user_data.ok_or_else(|| missing("user_data"))?;
            let data = capture_lead(&state, &session_id, user_data).await?;
            (session_id, data)
        }
        ChatbotAction::LogInteraction => {
            let session_id = req.session_id()?;
            let interaction_type = req
                .interaction_type
                .clone()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| missing("interaction_type"))?;
            let interaction = NewInteraction {
                client_id: req.client_id,
                session_id: session_id.clone(),
                interaction_type,
                user_message: req.user_message.clone(),
                bot_response: req.bot_response.clone(),
                extracted_data: None,
            };
            let stored = state.interaction_repo.log_interaction(interaction).await?;
            (
                session_id,
                json!({ "interaction_logged": true, "interaction_id": stored.id }),
            )
        }
        ChatbotAction::GetCarDetails => {
            let session_id = req.session_id()?;
            let car_id = req.car_id.ok_or_else(|| missing("car_id"))?;
            let data = car_details(&state, &session_id, car_id, req.client_id).await?;
            (session_id, data)
        }
        ChatbotAction::NaturalSearch => {
            let session_id = req.session_id()?;
            let message = req
                .user_message
                .clone()
                .ok_or_else(|| missing("user_message"))?;
            let data = natural_search(&state, &session_id, &message, req.client_id).await?;
            (session_id, data)
        }
    };

    Ok(Json(WebhookResponse {
        success: true,
        action: req.action,
        session_id: Some(session_id),
        data,
    }))
}

async fn start_conversation(state: &AppState, session_id: &str) -> Result<Value, AppError> {
    let mut greeting = NewInteraction::new(session_id, "greeting");
    greeting.bot_response = Some("Conversation started".to_string());
    state.interaction_repo.log_interaction(greeting).await?;

    // A repeated greeting refreshes the TTL but keeps the linked client and last search
    let ctx = load_context(state, session_id).await;
    save_context(state, &ctx).await;

    Ok(json!({
        "session_id": session_id,
        "greeting": GREETING,
        "options": GREETING_OPTIONS,
    }))
}

async fn chatbot_search(
    state: &AppState,
    session_id: &str,
    criteria: SearchCriteria,
    client_id: Option<i64>,
) -> Result<ChatbotSearchResult, AppError> {
    let mut ctx = load_context(state, session_id).await;
    let client_id = client_id.or(ctx.client_id);

    let cars = run_search(
        state,
        SearchRun {
            criteria: &criteria,
            limit: state.business_rules.chatbot_result_limit,
            client_id,
            session_id,
            record_views: true,
        },
    )
    .await?;

    ctx.record_search(criteria.clone());
    save_context(state, &ctx).await;

    let message = if cars.is_empty() {
        NO_RESULTS.to_string()
    } else {
        format!("Encontré {} vehículos que coinciden con tu búsqueda:", cars.len())
    };

    Ok(ChatbotSearchResult {
        total_results: cars.len(),
        cars,
        search_criteria: criteria,
        message,
    })
}

async fn capture_lead(state: &AppState, session_id: &str, user_data: LeadData) -> Result<Value, AppError> {
    user_data.validate()?;

    let (client, is_new) = state.client_repo.upsert_by_phone(user_data.into()).await?;
    state
        .search_log_repo
        .attach_session_to_client(session_id, client.id)
        .await?;

    let mut ctx = load_context(state, session_id).await;
    ctx.attach_client(client.id);
    save_context(state, &ctx).await;

    dashboard::publish_lead_captured(state, &client, Some(session_id.to_string()), is_new);

    Ok(lead_reply(&client))
}

fn lead_reply(client: &Client) -> Value {
    json!({
        "client": client,
        "message": LEAD_THANKS,
        "follow_up": LEAD_FOLLOW_UP,
    })
}

async fn car_details(
    state: &AppState,
    session_id: &str,
    car_id: i64,
    client_id: Option<i64>,
) -> Result<Value, AppError> {
    let Some(car) = state.car_repo.get_available(car_id).await? else {
        return Ok(json!({
            "error": "Car not found or not available",
            "message": "Lo siento, ese vehículo ya no está disponible.",
        }));
    };

    state
        .search_log_repo
        .record_view(NewCarView {
            car_id: car.id,
            client_id,
            session_id: session_id.to_string(),
            source: ViewSource::ChatbotDetails,
        })
        .await?;

    Ok(json!(CarCard::from(&car)))
}

async fn natural_search(
    state: &AppState,
    session_id: &str,
    message: &str,
    client_id: Option<i64>,
) -> Result<Value, AppError> {
    let criteria = extract_criteria(message);
    if criteria.is_empty() {
        return Ok(json!(Clarification::default()));
    }

    let result = chatbot_search(state, session_id, criteria.clone(), client_id).await?;
    Ok(json!(NaturalSearchResult {
        cars: result.cars,
        total_results: result.total_results,
        search_criteria: result.search_criteria,
        message: result.message,
        interpretation: format!("Busqué: {}", describe_criteria(&criteria)),
        extracted_criteria: criteria,
    }))
}

// ============================================================================
// Analytics webhook
// ============================================================================

fn webhook_timeframe(raw: Option<&Value>) -> Result<Timeframe, AppError> {
    let days = match raw {
        None | Some(Value::Null) => i64::from(Timeframe::WEBHOOK_DEFAULT_DAYS),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| AppError::ValidationError("timeframe must be an integer".to_string()))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::ValidationError(format!("invalid timeframe '{}'", s)))?,
        Some(_) => return Err(AppError::ValidationError("timeframe must be an integer".to_string())),
    };
    Ok(Timeframe::new(days)?)
}

/// POST /api/webhooks/n8n/analytics
pub async fn analytics_webhook(
    State(state): State<AppState>,
    AppJson(req): AppJson<AnalyticsWebhook>,
) -> Result<Json<Value>, AppError> {
    let timeframe = webhook_timeframe(req.timeframe.as_ref())?;

    let data = match req.metric_type.as_str() {
        "daily_summary" => json!(state.analytics_repo.daily_summary(timeframe).await?),
        "popular_searches" => json!(state.analytics_repo.popular_searches(timeframe).await?),
        "conversion_rate" => json!(state.analytics_repo.conversion_rate(timeframe).await?),
        _ => return Err(AppError::ValidationError("Invalid metric_type".to_string())),
    };

    Ok(Json(json!({
        "success": true,
        "metric_type": req.metric_type,
        "timeframe": timeframe.label(),
        "data": data,
    })))
}
