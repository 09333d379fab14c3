use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BusinessRules {
    #[serde(default = "default_search_result_limit")]
    pub search_result_limit: i64,
    #[serde(default = "default_chatbot_result_limit")]
    pub chatbot_result_limit: i64,
    #[serde(default = "default_discount_threshold_days")]
    pub discount_threshold_days: i32,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u64,
    #[serde(default = "default_dashboard_refresh_seconds")]
    pub dashboard_refresh_seconds: u64,
    /// Lifetime of a chatbot conversation context.
    #[serde(default = "default_session_ttl_seconds")]
    pub session_ttl_seconds: u64,
}

fn default_search_result_limit() -> i64 { 10 }
fn default_chatbot_result_limit() -> i64 { 5 }
fn default_discount_threshold_days() -> i32 { 60 }
fn default_rate_limit_per_minute() -> u64 { 100 }
fn default_dashboard_refresh_seconds() -> u64 { 5 }
fn default_session_ttl_seconds() -> u64 { 86_400 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            search_result_limit: default_search_result_limit(),
            chatbot_result_limit: default_chatbot_result_limit(),
            discount_threshold_days: default_discount_threshold_days(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            dashboard_refresh_seconds: default_dashboard_refresh_seconds(),
            session_ttl_seconds: default_session_ttl_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    /// Shared secret exchanged for an admin token at `/api/auth/token`.
    pub admin_api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `AUTOLEAD__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("AUTOLEAD").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
