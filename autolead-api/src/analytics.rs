use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use autolead_core::analytics::{
    CarPerformanceReport, ChatbotReport, ClientPreferencesReport, DashboardReport, Granularity,
    Timeframe, TrendsReport,
};

use crate::{dashboard, error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub timeframe: Option<String>,
    pub granularity: Option<String>,
}

impl AnalyticsQuery {
    fn timeframe(&self) -> Result<Timeframe, AppError> {
        Ok(Timeframe::parse(self.timeframe.as_deref())?)
    }

    fn granularity(&self) -> Result<Granularity, AppError> {
        match self.granularity.as_deref() {
            None => Ok(Granularity::default()),
            Some(raw) => Ok(raw.parse()?),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/dashboard", get(dashboard_report))
        .route("/api/analytics/client-preferences", get(client_preferences))
        .route("/api/analytics/car-performance", get(car_performance))
        .route("/api/analytics/chatbot-effectiveness", get(chatbot_effectiveness))
        .route("/api/analytics/trends", get(trends))
        .route("/api/analytics/stream", get(dashboard::stream))
}

/// GET /api/analytics/dashboard?timeframe=30
pub async fn dashboard_report(
    State(state): State<AppState>,
    Query(q): Query<AnalyticsQuery>,
) -> Result<Json<DashboardReport>, AppError> {
    let timeframe = q.timeframe()?;
    Ok(Json(state.analytics_repo.dashboard(timeframe).await?))
}

/// GET /api/analytics/client-preferences?timeframe=30
pub async fn client_preferences(
    State(state): State<AppState>,
    Query(q): Query<AnalyticsQuery>,
) -> Result<Json<ClientPreferencesReport>, AppError> {
    let timeframe = q.timeframe()?;
    Ok(Json(state.analytics_repo.client_preferences(timeframe).await?))
}

/// GET /api/analytics/car-performance?timeframe=30
pub async fn car_performance(
    State(state): State<AppState>,
    Query(q): Query<AnalyticsQuery>,
) -> Result<Json<CarPerformanceReport>, AppError> {
    let timeframe = q.timeframe()?;
    Ok(Json(state.analytics_repo.car_performance(timeframe).await?))
}

/// GET /api/analytics/chatbot-effectiveness?timeframe=30
pub async fn chatbot_effectiveness(
    State(state): State<AppState>,
    Query(q): Query<AnalyticsQuery>,
) -> Result<Json<ChatbotReport>, AppError> {
    let timeframe = q.timeframe()?;
    Ok(Json(state.analytics_repo.chatbot_effectiveness(timeframe).await?))
}

/// GET /api/analytics/trends?timeframe=30&granularity=day
pub async fn trends(
    State(state): State<AppState>,
    Query(q): Query<AnalyticsQuery>,
) -> Result<Json<TrendsReport>, AppError> {
    let timeframe = q.timeframe()?;
    let granularity = q.granularity()?;
    Ok(Json(state.analytics_repo.trends(timeframe, granularity).await?))
}
