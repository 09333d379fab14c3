use lazy_static::lazy_static;
use regex::Regex;

use autolead_core::search::SearchCriteria;

use crate::rules::RuleEngine;

lazy_static! {
    static ref DEFAULT_ENGINE: RuleEngine = RuleEngine::default();
    static ref PRICE_RE: Regex = Regex::new(r"([0-9]+),?([0-9]+)?").unwrap();
    static ref MILEAGE_RE: Regex =
        Regex::new(r"([0-9]+),?([0-9]+)?\s*(km|kilómetros|millas)").unwrap();
}

const MAX_QUALIFIERS: [&str; 3] = ["menos de", "under", "máximo"];
const MIN_QUALIFIERS: [&str; 3] = ["más de", "over", "mínimo"];

/// Maps free text to search criteria with the default rule set.
pub fn extract_criteria(text: &str) -> SearchCriteria {
    extract_with(&DEFAULT_ENGINE, text)
}

pub fn extract_with(engine: &RuleEngine, text: &str) -> SearchCriteria {
    let text = text.to_lowercase();
    let mut criteria = SearchCriteria::default();

    engine.evaluate(&text, &mut criteria);

    if let Some(price) = first_price(&text) {
        if MAX_QUALIFIERS.iter().any(|q| text.contains(q)) {
            criteria.max_price = Some(price);
        } else if MIN_QUALIFIERS.iter().any(|q| text.contains(q)) {
            criteria.min_price = Some(price);
        } else {
            criteria.max_price = Some(price);
        }
    }

    criteria.max_mileage = mileage(&text);
    criteria
}

/// First number in the text, with at most one thousands comma.
fn first_price(text: &str) -> Option<f64> {
    let found = PRICE_RE.find(text)?;
    found.as_str().replacen(',', "", 1).parse::<f64>().ok()
}

fn mileage(text: &str) -> Option<f64> {
    let found = MILEAGE_RE.find(text)?;
    let digits: String = found.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<f64>().ok()
}
