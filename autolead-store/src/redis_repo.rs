use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, RedisResult};
use std::collections::HashMap;
use tracing::debug;

use autolead_core::conversation::ConversationContext;
use autolead_core::repository::{RateLimiter, SessionStore};
use autolead_core::StoreError;

/// INCR plus `EXPIRE .. NX` (Redis 7+) in one MULTI/EXEC.
fn rate_limit_pipeline(key: &str, window_seconds: i64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .incr(key, 1)
        .cmd("EXPIRE")
        .arg(key)
        .arg(window_seconds)
        .arg("NX")
        .ignore();
    pipe
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. The TTL is only set when the window opens, so
    /// traffic inside the window cannot push its end back.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let (count,): (i64,) = rate_limit_pipeline(key, window_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(count <= limit)
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl RateLimiter for RedisClient {
    async fn check(&self, key: &str, limit: u64, window_secs: u64) -> Result<bool, StoreError> {
        let key = format!("rate_limit:{}", key);
        Ok(self
            .check_rate_limit(&key, limit as i64, window_secs as i64)
            .await?)
    }
}

/// Conversation contexts stored as Redis hashes under `session:{id}` with a sliding TTL.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: RedisClient,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    pub fn new(redis: RedisClient, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    fn key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }
}

const FIELD_CLIENT_ID: &str = "client_id";
const FIELD_LAST_CRITERIA: &str = "last_criteria";
const FIELD_TURNS: &str = "turns";
const FIELD_STARTED_AT: &str = "started_at";

fn encode(ctx: &ConversationContext) -> Result<(Vec<(&'static str, String)>, Vec<&'static str>), StoreError> {
    let mut fields = vec![
        (FIELD_TURNS, ctx.turns.to_string()),
        (FIELD_STARTED_AT, ctx.started_at.to_rfc3339()),
    ];
    let mut cleared = Vec::new();

    match ctx.client_id {
        Some(id) => fields.push((FIELD_CLIENT_ID, id.to_string())),
        None => cleared.push(FIELD_CLIENT_ID),
    }
    match &ctx.last_criteria {
        Some(criteria) => fields.push((FIELD_LAST_CRITERIA, serde_json::to_string(criteria)?)),
        None => cleared.push(FIELD_LAST_CRITERIA),
    }

    Ok((fields, cleared))
}

fn decode(session_id: &str, mut hash: HashMap<String, String>) -> Result<Option<ConversationContext>, StoreError> {
    if hash.is_empty() {
        return Ok(None);
    }

    let started_at = match hash.remove(FIELD_STARTED_AT) {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc),
        None => Utc::now(),
    };
    let turns = match hash.remove(FIELD_TURNS) {
        Some(raw) => raw.parse::<u32>()?,
        None => 0,
    };
    let client_id = hash
        .remove(FIELD_CLIENT_ID)
        .map(|raw| raw.parse::<i64>())
        .transpose()?;
    let last_criteria = hash
        .remove(FIELD_LAST_CRITERIA)
        .map(|raw| serde_json::from_str(&raw))
        .transpose()?;

    Ok(Some(ConversationContext {
        session_id: session_id.to_string(),
        client_id,
        last_criteria,
        turns,
        started_at,
    }))
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationContext>, StoreError> {
        let mut conn = self.redis.client.get_multiplexed_async_connection().await?;
        let hash: HashMap<String, String> = conn.hgetall(Self::key(session_id)).await?;
        decode(session_id, hash)
    }

    async fn save(&self, ctx: &ConversationContext) -> Result<(), StoreError> {
        let key = Self::key(&ctx.session_id);
        let (fields, cleared) = encode(ctx)?;

        let mut pipe = redis::pipe();
        pipe.atomic().hset_multiple(&key, &fields).ignore();
        if !cleared.is_empty() {
            pipe.hdel(&key, &cleared).ignore();
        }
        pipe.expire(&key, self.ttl_seconds as i64).ignore();

        let mut conn = self.redis.client.get_multiplexed_async_connection().await?;
        let _: () = pipe.query_async(&mut conn).await?;
        debug!(session_id = %ctx.session_id, turns = ctx.turns, "Conversation context saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autolead_core::search::SearchCriteria;

    #[test]
    fn test_context_hash_round_trip() {
        let mut ctx = ConversationContext::start("abc");
        ctx.record_search(SearchCriteria {
            brand: Some("kia".into()),
            max_price: Some(200_000.0),
            ..Default::default()
        });

        let (fields, cleared) = encode(&ctx).unwrap();
        assert_eq!(cleared, vec![FIELD_CLIENT_ID]);

        let hash: HashMap<String, String> = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let decoded = decode("abc", hash).unwrap().unwrap();

        assert_eq!(decoded.turns, 1);
        assert_eq!(decoded.client_id, None);
        assert_eq!(decoded.last_criteria, ctx.last_criteria);
        assert_eq!(decoded.started_at.timestamp(), ctx.started_at.timestamp());
    }

    #[test]
    fn test_rate_limit_window_is_not_extended_by_traffic() {
        let packed = rate_limit_pipeline("rate_limit:10.0.0.1", 60).get_packed_pipeline();
        let text = String::from_utf8_lossy(&packed);

        assert!(text.contains("MULTI"));
        assert!(text.contains("INCR"));
        assert!(text.contains("EXPIRE"));
        // EXPIRE only applies to a key without a TTL
        assert!(text.ends_with("NX\r\n*1\r\n$4\r\nEXEC\r\n"));
    }

    #[test]
    fn test_missing_hash_is_no_session() {
        assert!(decode("nope", HashMap::new()).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_field_is_an_error() {
        let mut hash = HashMap::new();
        hash.insert(FIELD_TURNS.to_string(), "many".to_string());
        assert!(decode("bad", hash).is_err());
    }
}
