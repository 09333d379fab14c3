use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Days assumed in stock when the vehicle line has no sales history.
pub const DEFAULT_AVG_DAYS_IN_INVENTORY: f64 = 60.0;

/// Share of the sales price charged as opportunity cost.
pub const OPPORTUNITY_COST_RATE: f64 = 0.01;

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Raw offer request body. Financial fields accept JSON numbers or numeric strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferInput {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<Value>,
    pub sales_price: Option<Value>,
    pub daily_holding_cost: Option<Value>,
    pub sales_commission: Option<Value>,
    pub reconditioning_cost: Option<Value>,
    pub desired_profit_margin: Option<Value>,
}

/// A validated offer request. Only built through `TryFrom<OfferInput>` or `OfferRequest::new`.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferRequest {
    brand: String,
    model: String,
    year: i32,
    sales_price: f64,
    daily_holding_cost: f64,
    /// Percent.
    sales_commission: f64,
    reconditioning_cost: f64,
    /// Percent.
    desired_profit_margin: f64,
}

impl OfferRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        brand: impl Into<String>,
        model: impl Into<String>,
        year: i32,
        sales_price: f64,
        daily_holding_cost: f64,
        sales_commission: f64,
        reconditioning_cost: f64,
        desired_profit_margin: f64,
    ) -> Result<Self, PricingError> {
        let brand = required_text("brand", Some(brand.into()))?;
        let model = required_text("model", Some(model.into()))?;
        let checked = |name: &str, v: f64| {
            if v.is_finite() {
                Ok(v)
            } else {
                Err(PricingError::InvalidInput(format!("{} must be a finite number", name)))
            }
        };

        Ok(Self {
            brand,
            model,
            year,
            sales_price: checked("salesPrice", sales_price)?,
            daily_holding_cost: checked("dailyHoldingCost", daily_holding_cost)?,
            sales_commission: checked("salesCommission", sales_commission)?,
            reconditioning_cost: checked("reconditioningCost", reconditioning_cost)?,
            desired_profit_margin: checked("desiredProfitMargin", desired_profit_margin)?,
        })
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sales_price(&self) -> f64 {
        self.sales_price
    }
}

impl TryFrom<OfferInput> for OfferRequest {
    type Error = PricingError;

    fn try_from(input: OfferInput) -> Result<Self, Self::Error> {
        let year = required_number("year", input.year.as_ref())?;
        if year.fract() != 0.0 || year < f64::from(i32::MIN) || year > f64::from(i32::MAX) {
            return Err(PricingError::InvalidInput("year must be an integer".to_string()));
        }

        OfferRequest::new(
            required_text("brand", input.brand)?,
            required_text("model", input.model)?,
            year as i32,
            required_number("salesPrice", input.sales_price.as_ref())?,
            required_number("dailyHoldingCost", input.daily_holding_cost.as_ref())?,
            required_number("salesCommission", input.sales_commission.as_ref())?,
            required_number("reconditioningCost", input.reconditioning_cost.as_ref())?,
            required_number("desiredProfitMargin", input.desired_profit_margin.as_ref())?,
        )
    }
}

fn required_text(name: &str, value: Option<String>) -> Result<String, PricingError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PricingError::InvalidInput(format!("{} is required", name))),
    }
}

fn required_number(name: &str, value: Option<&Value>) -> Result<f64, PricingError> {
    let parsed = match value {
        None | Some(Value::Null) => {
            return Err(PricingError::InvalidInput(format!("{} is required", name)))
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| PricingError::InvalidInput(format!("{} must be numeric", name)))
}

/// Full-precision result of the offer model.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferBreakdown {
    pub target_sales_price: f64,
    pub avg_days_in_inventory: f64,
    pub inventory_cost: f64,
    pub commission_amount: f64,
    pub reconditioning_cost: f64,
    pub opportunity_cost: f64,
    pub projected_profit: f64,
    pub total_costs: f64,
    pub suggested_offer_price: f64,
}

/// Computes the suggested acquisition price. `historical_avg_days` of `None` means no
/// sales history and substitutes the default; a historical `0.0` is used as-is.
pub fn compute_offer(request: &OfferRequest, historical_avg_days: Option<f64>) -> OfferBreakdown {
    let avg_days_in_inventory = historical_avg_days.unwrap_or(DEFAULT_AVG_DAYS_IN_INVENTORY);
    let sales_price = request.sales_price;

    let inventory_cost = avg_days_in_inventory * request.daily_holding_cost;
    let commission_amount = sales_price * (request.sales_commission / 100.0);
    let opportunity_cost = sales_price * OPPORTUNITY_COST_RATE;
    let projected_profit = sales_price * (request.desired_profit_margin / 100.0);
    let total_costs =
        inventory_cost + commission_amount + request.reconditioning_cost + opportunity_cost;

    OfferBreakdown {
        target_sales_price: sales_price,
        avg_days_in_inventory,
        inventory_cost,
        commission_amount,
        reconditioning_cost: request.reconditioning_cost,
        opportunity_cost,
        projected_profit,
        total_costs,
        suggested_offer_price: sales_price - total_costs - projected_profit,
    }
}

// ============================================================================
// Display
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfferSuggestion {
    pub suggested_offer_price: String,
    pub breakdown: OfferSuggestionBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfferSuggestionBreakdown {
    pub target_sales_price: String,
    pub avg_days_in_inventory: String,
    pub inventory_cost: String,
    pub commission_amount: String,
    pub reconditioning_cost: String,
    pub opportunity_cost: String,
    pub projected_profit: String,
    pub total_costs: String,
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

impl From<&OfferBreakdown> for OfferSuggestion {
    fn from(b: &OfferBreakdown) -> Self {
        Self {
            suggested_offer_price: money(b.suggested_offer_price),
            breakdown: OfferSuggestionBreakdown {
                target_sales_price: money(b.target_sales_price),
                avg_days_in_inventory: money(b.avg_days_in_inventory),
                inventory_cost: money(b.inventory_cost),
                commission_amount: money(b.commission_amount),
                reconditioning_cost: money(b.reconditioning_cost),
                opportunity_cost: money(b.opportunity_cost),
                projected_profit: money(b.projected_profit),
                total_costs: money(b.total_costs),
            },
        }
    }
}
