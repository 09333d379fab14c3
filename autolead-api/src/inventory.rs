use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use autolead_core::inventory::{DiscountCandidate, RotationEntry, SaleRecord, SalesPeriod, VehicleKey};
use autolead_inventory::{compute_offer, summarize, OfferInput, OfferRequest, OfferSuggestion, SalesSummary};

use crate::{
    error::AppError,
    extract::{AppJson, ValidJson},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VehicleLookup {
    #[validate(length(min = 1))]
    pub brand: String,
    #[validate(length(min = 1))]
    pub model: String,
    pub year: i32,
}

impl From<VehicleLookup> for VehicleKey {
    fn from(v: VehicleLookup) -> Self {
        VehicleKey {
            brand: v.brand,
            model: v.model,
            year: v.year,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/inventory/sales-analysis", get(sales_analysis))
        .route("/api/inventory/sales-summary", get(sales_summary))
        .route("/api/inventory/rotation", get(rotation))
        .route("/api/inventory/discount-analysis", get(discount_analysis))
        .route("/api/inventory/buying-price-suggestion", post(buying_price_suggestion))
        .route("/api/inventory/offer-suggestion", post(offer_suggestion))
}

/// GET /api/inventory/sales-analysis?period=1m|3m|6m|12m
pub async fn sales_analysis(
    State(state): State<AppState>,
    Query(q): Query<PeriodQuery>,
) -> Result<Json<Vec<SaleRecord>>, AppError> {
    let period = SalesPeriod::parse(q.period.as_deref());
    Ok(Json(state.inventory_repo.sales_in_period(period).await?))
}

/// GET /api/inventory/sales-summary?period=...
pub async fn sales_summary(
    State(state): State<AppState>,
    Query(q): Query<PeriodQuery>,
) -> Result<Json<SalesSummary>, AppError> {
    let period = SalesPeriod::parse(q.period.as_deref());
    let sales = state.inventory_repo.sales_in_period(period).await?;
    Ok(Json(summarize(&sales)))
}

/// GET /api/inventory/rotation
pub async fn rotation(State(state): State<AppState>) -> Result<Json<Vec<RotationEntry>>, AppError> {
    Ok(Json(state.inventory_repo.rotation().await?))
}

/// GET /api/inventory/discount-analysis
pub async fn discount_analysis(
    State(state): State<AppState>,
) -> Result<Json<Vec<DiscountCandidate>>, AppError> {
    let threshold = state.business_rules.discount_threshold_days;
    Ok(Json(state.inventory_repo.discount_candidates(threshold).await?))
}

/// POST /api/inventory/buying-price-suggestion
/// Historical averages for the vehicle line; `{}` when it never sold.
pub async fn buying_price_suggestion(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<VehicleLookup>,
) -> Result<Json<Value>, AppError> {
    let key = VehicleKey::from(req);
    let body = match state.inventory_repo.buying_price_stats(&key).await? {
        Some(stats) => json!(stats),
        None => json!({}),
    };
    Ok(Json(body))
}

/// POST /api/inventory/offer-suggestion
pub async fn offer_suggestion(
    State(state): State<AppState>,
    AppJson(input): AppJson<OfferInput>,
) -> Result<Json<OfferSuggestion>, AppError> {
    let request = OfferRequest::try_from(input)?;
    let key = VehicleKey {
        brand: request.brand().to_string(),
        model: request.model().to_string(),
        year: request.year(),
    };

    let historical = state.inventory_repo.avg_days_in_inventory(&key).await?;
    let breakdown = compute_offer(&request, historical);

    tracing::debug!(
        brand = request.brand(),
        model = request.model(),
        year = request.year(),
        historical_days = ?historical,
        suggested = breakdown.suggested_offer_price,
        "Offer suggestion computed"
    );
    Ok(Json(OfferSuggestion::from(&breakdown)))
}
