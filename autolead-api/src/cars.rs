use axum::{extract::State, routing::get, Json, Router};

use autolead_core::car::Car;

use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/cars", get(list_available_cars))
}

/// GET /api/cars
pub async fn list_available_cars(State(state): State<AppState>) -> Result<Json<Vec<Car>>, AppError> {
    let cars = state.car_repo.list_available().await?;
    Ok(Json(cars))
}
