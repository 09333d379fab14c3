use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Look-back window for sales reports. Unknown values fall back to twelve months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SalesPeriod {
    OneMonth,
    ThreeMonths,
    SixMonths,
    #[default]
    TwelveMonths,
}

impl SalesPeriod {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("1m") => SalesPeriod::OneMonth,
            Some("3m") => SalesPeriod::ThreeMonths,
            Some("6m") => SalesPeriod::SixMonths,
            _ => SalesPeriod::TwelveMonths,
        }
    }

    pub fn months(&self) -> i32 {
        match self {
            SalesPeriod::OneMonth => 1,
            SalesPeriod::ThreeMonths => 3,
            SalesPeriod::SixMonths => 6,
            SalesPeriod::TwelveMonths => 12,
        }
    }

    pub fn start_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_months(chrono::Months::new(self.months() as u32))
            .unwrap_or(now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub brand: String,
    pub model: String,
    pub price: f64,
    pub sale_date: DateTime<Utc>,
}

/// A completed sale, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: i64,
    pub car_id: i64,
    pub sale_date: DateTime<Utc>,
    pub sale_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationEntry {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub avg_days_in_inventory: f64,
    pub total_sold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountCandidate {
    pub id: i64,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub purchase_date: DateTime<Utc>,
    pub days_in_inventory: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyingPriceStats {
    pub avg_sale_price: f64,
    /// `None` when none of the sold cars has a purchase date.
    pub avg_days_to_sell: Option<f64>,
}

/// Identifies a vehicle line for historical lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VehicleKey {
    pub brand: String,
    pub model: String,
    pub year: i32,
}
