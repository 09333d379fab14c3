use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::thousands;

/// A vehicle in the dealership inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: i64,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub body_type: Option<String>,
    pub color: Option<String>,
    pub mileage: Option<i32>,
    pub price: f64,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub engine_size: Option<f64>,
    pub doors: Option<i32>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<DateTime<Utc>>,
}

/// Car details formatted for the chatbot conversation.
#[derive(Debug, Clone, Serialize)]
pub struct CarCard {
    pub id: i64,
    pub title: String,
    pub price: String,
    pub details: CarCardDetails,
    pub description: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CarCardDetails {
    pub tipo: Option<String>,
    pub color: Option<String>,
    pub kilometraje: String,
    pub combustible: Option<String>,
    pub transmision: Option<String>,
    pub motor: String,
    pub puertas: Option<i32>,
}

impl From<&Car> for CarCard {
    fn from(car: &Car) -> Self {
        let title = format!("{} {} {}", car.brand, car.model, car.year);
        Self {
            id: car.id,
            price: format!("${}", thousands(car.price)),
            details: CarCardDetails {
                tipo: car.body_type.clone(),
                color: car.color.clone(),
                kilometraje: format!("{} km", thousands(f64::from(car.mileage.unwrap_or(0)))),
                combustible: car.fuel_type.clone(),
                transmision: car.transmission.clone(),
                motor: car
                    .engine_size
                    .map(|size| format!("{}L", size))
                    .unwrap_or_else(|| "N/A".to_string()),
                puertas: car.doors,
            },
            description: car.description.clone(),
            message: format!("Aquí tienes los detalles del {}:", title),
            title,
        }
    }
}
