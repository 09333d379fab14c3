use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::car::Car;
use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    Sedan,
    Suv,
    Hatchback,
    Pickup,
    Coupe,
}

impl BodyType {
    pub const ALL: [BodyType; 5] = [
        BodyType::Sedan,
        BodyType::Suv,
        BodyType::Hatchback,
        BodyType::Pickup,
        BodyType::Coupe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyType::Sedan => "sedan",
            BodyType::Suv => "suv",
            BodyType::Hatchback => "hatchback",
            BodyType::Pickup => "pickup",
            BodyType::Coupe => "coupe",
        }
    }
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BodyType::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| CoreError::ValidationError(format!("unknown body type '{}'", s)))
    }
}

/// Structured vehicle preferences, either sent by a client or derived from free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_type: Option<BodyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_mileage: Option<f64>,
}

impl SearchCriteria {
    /// True when no field is set. Callers must ask for clarification instead of searching.
    pub fn is_empty(&self) -> bool {
        self.body_type.is_none()
            && self.brand.is_none()
            && self.color.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.max_mileage.is_none()
    }

    /// Predicate list for this record. Zero-valued numeric fields impose no constraint.
    pub fn filters(&self) -> Vec<CarFilter> {
        let mut filters = Vec::new();

        if let Some(body_type) = self.body_type {
            filters.push(CarFilter::BodyType(body_type));
        }
        if let Some(brand) = self.brand.as_deref().filter(|b| !b.is_empty()) {
            filters.push(CarFilter::BrandContains(brand.to_string()));
        }
        if let Some(min) = positive(self.min_price) {
            filters.push(CarFilter::MinPrice(min));
        }
        if let Some(max) = positive(self.max_price) {
            filters.push(CarFilter::MaxPrice(max));
        }
        if let Some(color) = self.color.as_deref().filter(|c| !c.is_empty()) {
            filters.push(CarFilter::ColorContains(color.to_string()));
        }
        if let Some(mileage) = positive(self.max_mileage) {
            filters.push(CarFilter::MaxMileage(mileage));
        }

        filters
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

/// One typed clause of an inventory search. Every clause must hold for a car to match.
#[derive(Debug, Clone, PartialEq)]
pub enum CarFilter {
    BodyType(BodyType),
    /// Case-insensitive substring match on the brand.
    BrandContains(String),
    /// Case-insensitive substring match on the color.
    ColorContains(String),
    MinPrice(f64),
    MaxPrice(f64),
    MaxMileage(f64),
}

impl CarFilter {
    pub fn matches(&self, car: &Car) -> bool {
        match self {
            CarFilter::BodyType(body_type) => {
                car.body_type.as_deref() == Some(body_type.as_str())
            }
            CarFilter::BrandContains(needle) => contains_ignore_case(&car.brand, needle),
            CarFilter::ColorContains(needle) => car
                .color
                .as_deref()
                .map(|c| contains_ignore_case(c, needle))
                .unwrap_or(false),
            CarFilter::MinPrice(min) => car.price >= *min,
            CarFilter::MaxPrice(max) => car.price <= *max,
            CarFilter::MaxMileage(max) => car
                .mileage
                .map(|m| f64::from(m) <= *max)
                .unwrap_or(false),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn matches_all(filters: &[CarFilter], car: &Car) -> bool {
    filters.iter().all(|f| f.matches(car))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSource {
    Chatbot,
    ChatbotDetails,
}

impl ViewSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewSource::Chatbot => "chatbot",
            ViewSource::ChatbotDetails => "chatbot_details",
        }
    }
}

/// A search as it is written to the search log.
#[derive(Debug, Clone)]
pub struct NewSearchLog {
    pub client_id: Option<i64>,
    pub session_id: String,
    pub criteria: SearchCriteria,
    pub results_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewCarView {
    pub car_id: i64,
    pub client_id: Option<i64>,
    pub session_id: String,
    pub source: ViewSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(brand: &str, body: &str, color: &str, price: f64, mileage: i32) -> Car {
        Car {
            id: 1,
            brand: brand.to_string(),
            model: "Model".to_string(),
            year: 2020,
            body_type: Some(body.to_string()),
            color: Some(color.to_string()),
            mileage: Some(mileage),
            price,
            fuel_type: None,
            transmission: None,
            engine_size: None,
            doors: None,
            description: None,
            image_url: None,
            available: true,
            purchase_date: None,
        }
    }

    #[test]
    fn test_body_type_round_trip_names() {
        for body_type in BodyType::ALL {
            assert_eq!(body_type.as_str().parse::<BodyType>().unwrap(), body_type);
        }
        assert!("truck".parse::<BodyType>().is_err());
    }

    #[test]
    fn test_empty_criteria_has_no_filters() {
        let criteria = SearchCriteria::default();
        assert!(criteria.is_empty());
        assert!(criteria.filters().is_empty());
    }

    #[test]
    fn test_filters_follow_field_order() {
        let criteria = SearchCriteria {
            body_type: Some(BodyType::Suv),
            brand: Some("toyota".into()),
            color: Some("rojo".into()),
            min_price: Some(100_000.0),
            max_price: Some(300_000.0),
            max_mileage: Some(50_000.0),
        };

        assert_eq!(
            criteria.filters(),
            vec![
                CarFilter::BodyType(BodyType::Suv),
                CarFilter::BrandContains("toyota".into()),
                CarFilter::MinPrice(100_000.0),
                CarFilter::MaxPrice(300_000.0),
                CarFilter::ColorContains("rojo".into()),
                CarFilter::MaxMileage(50_000.0),
            ]
        );
    }

    #[test]
    fn test_zero_values_are_not_constraints() {
        let criteria = SearchCriteria {
            max_price: Some(0.0),
            max_mileage: Some(0.0),
            ..Default::default()
        };
        assert!(!criteria.is_empty());
        assert!(criteria.filters().is_empty());
    }

    #[test]
    fn test_filters_match_case_insensitively() {
        let rav4 = car("Toyota", "suv", "Rojo Metálico", 320_000.0, 40_000);
        let filters = vec![
            CarFilter::BrandContains("toyota".into()),
            CarFilter::ColorContains("rojo".into()),
            CarFilter::BodyType(BodyType::Suv),
        ];
        assert!(matches_all(&filters, &rav4));

        assert!(!CarFilter::MaxPrice(300_000.0).matches(&rav4));
        assert!(CarFilter::MinPrice(320_000.0).matches(&rav4));
        assert!(!CarFilter::MaxMileage(39_999.0).matches(&rav4));
    }

    #[test]
    fn test_missing_car_fields_never_match() {
        let mut bare = car("Ford", "pickup", "azul", 100.0, 10);
        bare.color = None;
        bare.mileage = None;
        assert!(!CarFilter::ColorContains("azul".into()).matches(&bare));
        assert!(!CarFilter::MaxMileage(1_000.0).matches(&bare));
    }

    #[test]
    fn test_criteria_serialization_skips_unset_fields() {
        let criteria = SearchCriteria {
            brand: Some("toyota".into()),
            color: Some("rojo".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&criteria).unwrap();
        assert_eq!(json, r#"{"brand":"toyota","color":"rojo"}"#);
    }
}
