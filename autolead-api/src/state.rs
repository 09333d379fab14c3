use std::sync::Arc;
use tokio::sync::broadcast;

use autolead_core::repository::{
    AnalyticsRepository, CarRepository, ClientRepository, InteractionRepository,
    InventoryRepository, RateLimiter, SearchLogRepository, SessionStore,
};
use autolead_store::app_config::BusinessRules;

use crate::dashboard::DashboardEvent;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub admin_api_key: String,
}

#[derive(Clone)]
pub struct AppState {
    pub client_repo: Arc<dyn ClientRepository>,
    pub interaction_repo: Arc<dyn InteractionRepository>,
    pub car_repo: Arc<dyn CarRepository>,
    pub search_log_repo: Arc<dyn SearchLogRepository>,
    pub inventory_repo: Arc<dyn InventoryRepository>,
    pub analytics_repo: Arc<dyn AnalyticsRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub dashboard_tx: broadcast::Sender<DashboardEvent>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}
