use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use autolead_core::car::Car;
use autolead_core::search::{BodyType, NewCarView, NewSearchLog, SearchCriteria, ViewSource};
use autolead_intent::{extract_criteria, interpret_search, Clarification};

use crate::{dashboard, error::AppError, extract::{AppJson, ValidJson}, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CarSearchRequest {
    pub client_id: Option<i64>,
    #[validate(length(min = 1))]
    pub session_id: String,
    pub search_body_type: Option<BodyType>,
    #[validate(length(min = 2, max = 50))]
    pub search_brand: Option<String>,
    #[validate(range(min = 0.0))]
    pub search_min_price: Option<f64>,
    #[validate(range(min = 0.0))]
    pub search_max_price: Option<f64>,
    #[validate(length(min = 3, max = 30))]
    pub search_color: Option<String>,
    #[validate(range(min = 0.0))]
    pub search_max_mileage: Option<f64>,
}

impl CarSearchRequest {
    pub fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            body_type: self.search_body_type,
            brand: self.search_brand.clone(),
            color: self.search_color.clone(),
            min_price: self.search_min_price,
            max_price: self.search_max_price,
            max_mileage: self.search_max_mileage,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SearchCriteriaEcho {
    pub body_type: Option<BodyType>,
    pub brand: Option<String>,
    pub price_range: PriceRange,
    pub color: Option<String>,
    pub max_mileage: Option<f64>,
}

impl From<SearchCriteria> for SearchCriteriaEcho {
    fn from(c: SearchCriteria) -> Self {
        Self {
            body_type: c.body_type,
            brand: c.brand,
            price_range: PriceRange {
                min: c.min_price,
                max: c.max_price,
            },
            color: c.color,
            max_mileage: c.max_mileage,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CarSearchResponse {
    pub cars: Vec<Car>,
    pub total_results: usize,
    pub search_criteria: SearchCriteriaEcho,
}

#[derive(Debug, Deserialize)]
pub struct IntelligentSearchRequest {
    pub query_text: Option<String>,
    pub session_id: Option<String>,
    pub client_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum IntelligentSearchResponse {
    Results {
        cars: Vec<Car>,
        total_results: usize,
        original_query: String,
        extracted_criteria: SearchCriteria,
        interpretation: String,
    },
    NeedsClarification {
        cars: Vec<Car>,
        total_results: usize,
        original_query: String,
        extracted_criteria: SearchCriteria,
        needs_clarification: bool,
        message: String,
        suggestions: Vec<String>,
    },
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/search/cars", post(search_cars))
        .route("/api/search/intelligent", post(intelligent_search))
}

// ============================================================================
// Shared search execution
// ============================================================================

/// A search to run and log on behalf of a chatbot session.
pub struct SearchRun<'a> {
    pub criteria: &'a SearchCriteria,
    pub limit: i64,
    pub client_id: Option<i64>,
    pub session_id: &'a str,
    /// Record a `chatbot` view for every car returned.
    pub record_views: bool,
}

/// Runs the predicate search, then writes the search log (and views) in one go.
pub async fn run_search(state: &AppState, run: SearchRun<'_>) -> Result<Vec<Car>, AppError> {
    let filters = run.criteria.filters();
    let cars = state.car_repo.search(&filters, run.limit).await?;

    let views = if run.record_views {
        cars.iter()
            .map(|car| NewCarView {
                car_id: car.id,
                client_id: run.client_id,
                session_id: run.session_id.to_string(),
                source: ViewSource::Chatbot,
            })
            .collect()
    } else {
        Vec::new()
    };

    let log = NewSearchLog {
        client_id: run.client_id,
        session_id: run.session_id.to_string(),
        criteria: run.criteria.clone(),
        results_count: cars.len() as i64,
    };
    state.search_log_repo.log_search(log.clone(), views).await?;
    dashboard::publish_search_logged(state, &log);

    tracing::debug!(
        session_id = run.session_id,
        filters = filters.len(),
        results = cars.len(),
        "Search executed"
    );
    Ok(cars)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/search/cars
pub async fn search_cars(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CarSearchRequest>,
) -> Result<Json<CarSearchResponse>, AppError> {
    let criteria = req.criteria();
    let cars = run_search(
        &state,
        SearchRun {
            criteria: &criteria,
            limit: state.business_rules.search_result_limit,
            client_id: req.client_id,
            session_id: &req.session_id,
            record_views: true,
        },
    )
    .await?;

    Ok(Json(CarSearchResponse {
        total_results: cars.len(),
        cars,
        search_criteria: criteria.into(),
    }))
}

/// POST /api/search/intelligent
/// Free-text search: keywords are turned into criteria before searching.
pub async fn intelligent_search(
    State(state): State<AppState>,
    AppJson(req): AppJson<IntelligentSearchRequest>,
) -> Result<Json<IntelligentSearchResponse>, AppError> {
    let (query_text, session_id) = match (
        req.query_text.filter(|q| !q.trim().is_empty()),
        req.session_id.filter(|s| !s.is_empty()),
    ) {
        (Some(q), Some(s)) => (q, s),
        _ => {
            return Err(AppError::ValidationError(
                "query_text and session_id are required".to_string(),
            ))
        }
    };

    let criteria = extract_criteria(&query_text);
    if criteria.is_empty() {
        let Clarification { message, suggestions } = Clarification::default();
        return Ok(Json(IntelligentSearchResponse::NeedsClarification {
            cars: Vec::new(),
            total_results: 0,
            original_query: query_text,
            extracted_criteria: criteria,
            needs_clarification: true,
            message,
            suggestions,
        }));
    }

    let cars = run_search(
        &state,
        SearchRun {
            criteria: &criteria,
            limit: state.business_rules.search_result_limit,
            client_id: req.client_id,
            session_id: &session_id,
            record_views: false,
        },
    )
    .await?;

    Ok(Json(IntelligentSearchResponse::Results {
        interpretation: interpret_search(&criteria, cars.len()),
        total_results: cars.len(),
        cars,
        original_query: query_text,
        extracted_criteria: criteria,
    }))
}
