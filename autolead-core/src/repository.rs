use async_trait::async_trait;

use crate::analytics::{
    CarPerformanceReport, ChatbotReport, ClientPreferencesReport, ConversionRate, DailySummary,
    DashboardReport, Granularity, PopularSearch, Timeframe, TrendsReport,
};
use crate::car::Car;
use crate::client::{Client, ClientPage, ClientQuery, ClientUpsert, LeadStatus};
use crate::conversation::ConversationContext;
use crate::interaction::{Interaction, NewInteraction};
use crate::inventory::{BuyingPriceStats, DiscountCandidate, RotationEntry, SaleRecord, SalesPeriod, VehicleKey};
use crate::search::{CarFilter, NewCarView, NewSearchLog};
use crate::StoreError;

/// Repository trait for lead (client) data access
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Inserts or updates by phone. Returns the stored client and whether it was created.
    async fn upsert_by_phone(&self, upsert: ClientUpsert) -> Result<(Client, bool), StoreError>;

    async fn get_client(&self, id: i64) -> Result<Option<Client>, StoreError>;

    async fn list_clients(&self, query: &ClientQuery) -> Result<ClientPage, StoreError>;

    /// Sets the status and, when given, the notes. `None` if the client does not exist.
    async fn update_status(
        &self,
        id: i64,
        status: LeadStatus,
        notes: Option<String>,
    ) -> Result<Option<Client>, StoreError>;

    /// Client attached to the most recent interaction of the session that carries one.
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Client>, StoreError>;
}

/// Repository trait for chatbot interaction logs
#[async_trait]
pub trait InteractionRepository: Send + Sync {
    async fn log_interaction(&self, interaction: NewInteraction) -> Result<Interaction, StoreError>;

    /// Interactions of a client, newest first.
    async fn list_for_client(&self, client_id: i64) -> Result<Vec<Interaction>, StoreError>;
}

/// Repository trait for the car inventory
#[async_trait]
pub trait CarRepository: Send + Sync {
    /// Available cars ordered by brand, then model.
    async fn list_available(&self) -> Result<Vec<Car>, StoreError>;

    async fn get_available(&self, id: i64) -> Result<Option<Car>, StoreError>;

    /// Available cars satisfying every filter, cheapest first, at most `limit`.
    async fn search(&self, filters: &[CarFilter], limit: i64) -> Result<Vec<Car>, StoreError>;
}

/// Repository trait for search and view tracking
#[async_trait]
pub trait SearchLogRepository: Send + Sync {
    /// Writes the search log entry and the view records atomically.
    async fn log_search(&self, search: NewSearchLog, views: Vec<NewCarView>) -> Result<i64, StoreError>;

    async fn record_view(&self, view: NewCarView) -> Result<(), StoreError>;

    /// Back-fills `client_id` on the session's interactions, searches and views.
    async fn attach_session_to_client(&self, session_id: &str, client_id: i64) -> Result<(), StoreError>;
}

/// Repository trait for sales history and stock age
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn sales_in_period(&self, period: SalesPeriod) -> Result<Vec<SaleRecord>, StoreError>;

    /// Average days from purchase to sale per brand/model/year, fastest first.
    async fn rotation(&self) -> Result<Vec<RotationEntry>, StoreError>;

    /// Available cars held longer than `threshold_days`, longest first.
    async fn discount_candidates(&self, threshold_days: i32) -> Result<Vec<DiscountCandidate>, StoreError>;

    async fn buying_price_stats(&self, key: &VehicleKey) -> Result<Option<BuyingPriceStats>, StoreError>;

    /// Historical average days in inventory; `None` when the vehicle line never sold.
    async fn avg_days_in_inventory(&self, key: &VehicleKey) -> Result<Option<f64>, StoreError>;
}

/// Repository trait for marketing analytics aggregates
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn dashboard(&self, timeframe: Timeframe) -> Result<DashboardReport, StoreError>;

    async fn client_preferences(&self, timeframe: Timeframe) -> Result<ClientPreferencesReport, StoreError>;

    async fn car_performance(&self, timeframe: Timeframe) -> Result<CarPerformanceReport, StoreError>;

    async fn chatbot_effectiveness(&self, timeframe: Timeframe) -> Result<ChatbotReport, StoreError>;

    async fn trends(&self, timeframe: Timeframe, granularity: Granularity) -> Result<TrendsReport, StoreError>;

    async fn daily_summary(&self, timeframe: Timeframe) -> Result<DailySummary, StoreError>;

    async fn popular_searches(&self, timeframe: Timeframe) -> Result<Vec<PopularSearch>, StoreError>;

    async fn conversion_rate(&self, timeframe: Timeframe) -> Result<ConversionRate, StoreError>;
}

/// Session-scoped conversation state
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationContext>, StoreError>;

    async fn save(&self, ctx: &ConversationContext) -> Result<(), StoreError>;
}

/// Fixed-window request limiter
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// `true` if the caller identified by `key` is still within `limit` for the window.
    async fn check(&self, key: &str, limit: u64, window_secs: u64) -> Result<bool, StoreError>;
}
