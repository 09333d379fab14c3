use serde::Serialize;

use autolead_core::search::{BodyType, SearchCriteria};

/// Which field a rule writes when one of its keywords appears in the text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RuleAction {
    SetBodyType(BodyType),
    SetBrand(String),
    SetColor(String),
}

impl RuleAction {
    fn field(&self) -> Field {
        match self {
            RuleAction::SetBodyType(_) => Field::BodyType,
            RuleAction::SetBrand(_) => Field::Brand,
            RuleAction::SetColor(_) => Field::Color,
        }
    }

    fn apply(&self, criteria: &mut SearchCriteria) {
        match self {
            RuleAction::SetBodyType(body_type) => criteria.body_type = Some(*body_type),
            RuleAction::SetBrand(brand) => criteria.brand = Some(brand.clone()),
            RuleAction::SetColor(color) => criteria.color = Some(color.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    BodyType,
    Brand,
    Color,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordRule {
    pub keywords: Vec<String>,
    pub action: RuleAction,
}

impl KeywordRule {
    fn new(keywords: &[&str], action: RuleAction) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            action,
        }
    }

    /// Substring match against already lower-cased text.
    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

/// Ordered keyword rules. For each field the first matching rule wins and later rules
/// for that field are skipped.
pub struct RuleEngine {
    rules: Vec<KeywordRule>,
}

impl RuleEngine {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    pub fn evaluate(&self, text: &str, criteria: &mut SearchCriteria) {
        let mut decided: Vec<Field> = Vec::with_capacity(3);

        for rule in &self.rules {
            let field = rule.action.field();
            if decided.contains(&field) {
                continue;
            }
            if rule.matches(text) {
                rule.action.apply(criteria);
                decided.push(field);
            }
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(get_default_rules())
    }
}

pub const BRANDS: [&str; 15] = [
    "toyota", "honda", "ford", "chevrolet", "nissan", "volkswagen", "hyundai", "mazda",
    "subaru", "kia", "bmw", "mercedes", "audi", "tesla", "jeep",
];

/// Color keyword to canonical Spanish name, in lookup order.
pub const COLORS: [(&str, &str); 17] = [
    ("blanco", "blanco"),
    ("white", "blanco"),
    ("negro", "negro"),
    ("black", "negro"),
    ("gris", "gris"),
    ("gray", "gris"),
    ("grey", "gris"),
    ("rojo", "rojo"),
    ("red", "rojo"),
    ("azul", "azul"),
    ("blue", "azul"),
    ("verde", "verde"),
    ("green", "verde"),
    ("plateado", "plateado"),
    ("silver", "plateado"),
    ("dorado", "dorado"),
    ("gold", "dorado"),
];

pub fn get_default_rules() -> Vec<KeywordRule> {
    let mut rules = vec![
        KeywordRule::new(&["suv", "camioneta"], RuleAction::SetBodyType(BodyType::Suv)),
        KeywordRule::new(&["sedan", "sedán"], RuleAction::SetBodyType(BodyType::Sedan)),
        KeywordRule::new(&["pickup", "pick up"], RuleAction::SetBodyType(BodyType::Pickup)),
        KeywordRule::new(&["hatchback", "compacto"], RuleAction::SetBodyType(BodyType::Hatchback)),
        KeywordRule::new(&["coupe", "coupé", "deportivo"], RuleAction::SetBodyType(BodyType::Coupe)),
    ];

    rules.extend(
        BRANDS
            .iter()
            .map(|brand| KeywordRule::new(&[*brand], RuleAction::SetBrand(brand.to_string()))),
    );

    // One rule per keyword keeps table order authoritative.
    rules.extend(
        COLORS
            .iter()
            .map(|(keyword, color)| KeywordRule::new(&[*keyword], RuleAction::SetColor(color.to_string()))),
    );

    rules
}
