use serde::Serialize;

use autolead_core::format::thousands;
use autolead_core::search::SearchCriteria;

pub const CLARIFICATION_MESSAGE: &str = "No pude entender tu búsqueda. ¿Podrías ser más específico? Por ejemplo: 'Busco un SUV Toyota en color negro'";

pub const CLARIFICATION_SUGGESTIONS: [&str; 4] = [
    "SUV Toyota",
    "Sedán menos de 300,000",
    "Pickup Ford",
    "Auto azul bajo kilometraje",
];

/// Reply used when no criteria could be extracted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Clarification {
    pub message: String,
    pub suggestions: Vec<String>,
}

impl Default for Clarification {
    fn default() -> Self {
        Self {
            message: CLARIFICATION_MESSAGE.to_string(),
            suggestions: CLARIFICATION_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn criteria_parts(criteria: &SearchCriteria) -> Vec<String> {
    let mut parts = Vec::new();

    if let Some(body_type) = criteria.body_type {
        parts.push(format!("tipo: {}", body_type));
    }
    if let Some(brand) = criteria.brand.as_deref().filter(|b| !b.is_empty()) {
        parts.push(format!("marca: {}", brand));
    }
    if let Some(color) = criteria.color.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!("color: {}", color));
    }
    if let Some(max) = criteria.max_price.filter(|v| *v != 0.0) {
        parts.push(format!("precio máximo: ${}", thousands(max)));
    }
    if let Some(min) = criteria.min_price.filter(|v| *v != 0.0) {
        parts.push(format!("precio mínimo: ${}", thousands(min)));
    }
    if let Some(mileage) = criteria.max_mileage.filter(|v| *v != 0.0) {
        parts.push(format!("kilometraje máximo: {} km", thousands(mileage)));
    }

    parts
}

/// Short human-readable list of the applied criteria.
pub fn describe_criteria(criteria: &SearchCriteria) -> String {
    let parts = criteria_parts(criteria);
    if parts.is_empty() {
        "búsqueda general".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn interpret_search(criteria: &SearchCriteria, result_count: usize) -> String {
    let parts = criteria_parts(criteria);
    let mut text = String::from("Búsqueda realizada");
    if !parts.is_empty() {
        text.push_str(" con criterios: ");
        text.push_str(&parts.join(", "));
    }
    text.push_str(&format!(". Se encontraron {} vehículos.", result_count));
    text
}
