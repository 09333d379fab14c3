pub mod analytics_repo;
pub mod app_config;
pub mod car_repo;
pub mod client_repo;
pub mod database;
pub mod interaction_repo;
pub mod inventory_repo;
pub mod memory;
pub mod redis_repo;

pub use analytics_repo::StoreAnalyticsRepository;
pub use car_repo::{StoreCarRepository, StoreSearchLogRepository};
pub use client_repo::StoreClientRepository;
pub use database::DbClient;
pub use interaction_repo::StoreInteractionRepository;
pub use inventory_repo::StoreInventoryRepository;
pub use memory::{MemoryRateLimiter, MemorySessionStore, MemoryStore};
pub use redis_repo::{RedisClient, RedisSessionStore};
