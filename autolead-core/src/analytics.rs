//! Report shapes for the marketing analytics endpoints and the chatbot webhook.
//!
//! Queries live in the store; the arithmetic that is not a plain aggregate
//! (conversion rates, session averages) lives here so it can be tested without a database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::format::round2;
use crate::{CoreError, CoreResult};

/// Look-back window in days, always bound as a query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeframe(i32);

impl Timeframe {
    pub const DEFAULT_DAYS: i32 = 30;
    pub const WEBHOOK_DEFAULT_DAYS: i32 = 7;
    pub const MAX_DAYS: i32 = 3650;

    pub fn new(days: i64) -> CoreResult<Self> {
        if (1..=i64::from(Self::MAX_DAYS)).contains(&days) {
            Ok(Self(days as i32))
        } else {
            Err(CoreError::ValidationError(format!(
                "timeframe must be between 1 and {} days",
                Self::MAX_DAYS
            )))
        }
    }

    /// Parses the `timeframe` query value; absent means the default.
    pub fn parse(value: Option<&str>) -> CoreResult<Self> {
        match value {
            None => Ok(Self::default()),
            Some(raw) => {
                let days = raw.trim().parse::<i64>().map_err(|_| {
                    CoreError::ValidationError(format!("invalid timeframe '{}'", raw))
                })?;
                Self::new(days)
            }
        }
    }

    pub fn days(&self) -> i32 {
        self.0
    }

    pub fn label(&self) -> String {
        format!("{} days", self.0)
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self(Self::DEFAULT_DAYS)
    }
}

/// Trend bucket size. Bound as text into `DATE_TRUNC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            _ => Err(CoreError::ValidationError(
                "Invalid granularity. Use: hour, day, week, month".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeCount {
    pub period: DateTime<Utc>,
    pub count: i64,
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub timeframe: String,
    pub summary: LeadSummary,
    pub search_analytics: SearchAnalytics,
    pub activity: Activity,
    pub conversion_funnel: ConversionFunnel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub total_leads: i64,
    pub leads_by_source: Vec<LabelCount>,
    pub leads_by_status: Vec<LabelCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchAnalytics {
    pub most_searched_types: Vec<LabelCount>,
    pub most_searched_brands: Vec<LabelCount>,
    pub price_preferences: PricePreferences,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricePreferences {
    pub avg_min_price: Option<f64>,
    pub avg_max_price: Option<f64>,
    pub lowest_min_price: Option<f64>,
    pub highest_max_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Interactions per hour over the last 24 hours, newest first.
    pub recent_hourly: Vec<TimeCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionFunnel {
    pub new_leads: i64,
    pub contacted: i64,
    pub qualified: i64,
    pub sold: i64,
    pub lost: i64,
}

// ============================================================================
// Client preferences
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPreferencesReport {
    pub timeframe: String,
    pub vehicle_type_preferences: Vec<TypePreference>,
    pub brand_preferences: Vec<BrandPreference>,
    pub color_preferences: Vec<LabelCount>,
    pub budget_analysis: Vec<BudgetBucket>,
    pub preference_search_correlation: Vec<PreferenceCorrelation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypePreference {
    pub preferred_body_type: String,
    pub client_count: i64,
    pub avg_budget: Option<f64>,
    pub avg_mileage_tolerance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandPreference {
    pub preferred_brand: String,
    pub client_count: i64,
    pub avg_budget: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetBucket {
    pub budget_range: String,
    pub client_count: i64,
    pub avg_budget: Option<f64>,
}

/// Budget bucket label for a client's `max_price`.
pub fn budget_range(max_price: f64) -> &'static str {
    if max_price < 200_000.0 {
        "Under 200K"
    } else if max_price < 400_000.0 {
        "200K-400K"
    } else if max_price < 600_000.0 {
        "400K-600K"
    } else {
        "Over 600K"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceCorrelation {
    pub preferred_body_type: String,
    pub search_body_type: String,
    pub correlation_count: i64,
}

// ============================================================================
// Car performance
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarPerformanceReport {
    pub timeframe: String,
    pub most_viewed_cars: Vec<ViewedCar>,
    pub missed_opportunities: Vec<MissedOpportunity>,
    pub price_competitiveness: Vec<PriceCompetitiveness>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewedCar {
    pub id: i64,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub body_type: Option<String>,
    pub price: f64,
    pub view_count: i64,
}

/// An available car that matched more searches than it received views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissedOpportunity {
    pub id: i64,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub body_type: Option<String>,
    pub price: f64,
    pub matching_searches: i64,
    pub actual_views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCompetitiveness {
    pub body_type: Option<String>,
    pub brand: String,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub inventory_count: i64,
    pub total_views: i64,
}

// ============================================================================
// Chatbot effectiveness
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatbotReport {
    pub timeframe: String,
    pub conversation_flow: Vec<FlowStep>,
    pub completion_metrics: CompletionMetrics,
    pub session_analysis: SessionAnalysis,
    pub common_user_messages: Vec<MessageFrequency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    pub interaction_type: String,
    pub interaction_count: i64,
    pub unique_sessions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMetrics {
    pub total_sessions: i64,
    pub sessions_with_lead: i64,
    pub conversion_rate: f64,
    pub avg_session_length: f64,
    pub avg_session_duration_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAnalysis {
    pub total_sessions: i64,
    /// The ten longest sessions by interaction count.
    pub session_lengths: Vec<SessionLength>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLength {
    pub session_id: String,
    pub interaction_count: i64,
    pub session_duration_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageFrequency {
    pub user_message: String,
    pub frequency: i64,
}

pub const LONGEST_SESSIONS_SHOWN: usize = 10;

impl ChatbotReport {
    /// Assembles the report. `sessions` must be ordered by interaction count, longest first.
    pub fn assemble(
        timeframe: Timeframe,
        conversation_flow: Vec<FlowStep>,
        sessions: Vec<SessionLength>,
        sessions_with_lead: i64,
        common_user_messages: Vec<MessageFrequency>,
    ) -> Self {
        let total_sessions = sessions.len() as i64;
        let (avg_session_length, avg_session_duration_seconds) = session_averages(&sessions);

        Self {
            timeframe: timeframe.label(),
            conversation_flow,
            completion_metrics: CompletionMetrics {
                total_sessions,
                sessions_with_lead,
                conversion_rate: conversion_rate(sessions_with_lead, total_sessions),
                avg_session_length,
                avg_session_duration_seconds,
            },
            session_analysis: SessionAnalysis {
                total_sessions,
                session_lengths: sessions.into_iter().take(LONGEST_SESSIONS_SHOWN).collect(),
            },
            common_user_messages,
        }
    }
}

/// Mean interactions per session (2 dp) and mean duration in whole seconds.
pub fn session_averages(sessions: &[SessionLength]) -> (f64, i64) {
    if sessions.is_empty() {
        return (0.0, 0);
    }
    let n = sessions.len() as f64;
    let interactions: i64 = sessions.iter().map(|s| s.interaction_count).sum();
    let seconds: i64 = sessions.iter().map(|s| s.session_duration_seconds).sum();
    (round2(interactions as f64 / n), (seconds as f64 / n).round() as i64)
}

/// Percentage of `converted` over `total`, 2 dp; 0 when there is nothing to divide by.
pub fn conversion_rate(converted: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    round2(converted as f64 / total as f64 * 100.0)
}

// ============================================================================
// Trends
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendsReport {
    pub timeframe: String,
    pub granularity: Granularity,
    pub leads_over_time: Vec<TimeCount>,
    pub searches_over_time: Vec<TimeCount>,
    pub search_term_trends: Vec<TermTrend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermTrend {
    pub period: DateTime<Utc>,
    pub search_body_type: String,
    pub search_count: i64,
}

// ============================================================================
// Webhook metrics
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub new_leads: i64,
    pub total_searches: i64,
    pub total_views: i64,
    pub unique_sessions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularSearch {
    pub search_body_type: Option<String>,
    pub search_brand: Option<String>,
    pub search_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRate {
    pub total_sessions: i64,
    pub converted_sessions: i64,
    pub conversion_rate: f64,
}

impl ConversionRate {
    pub fn new(total_sessions: i64, converted_sessions: i64) -> Self {
        Self {
            total_sessions,
            converted_sessions,
            conversion_rate: conversion_rate(converted_sessions, total_sessions),
        }
    }
}
