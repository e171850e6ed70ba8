use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, AsyncCommands, Client, RedisError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

const TAG_PREFIX: &str = "tag:";

#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        let mut guard = self.manager.write().await;
        *guard = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        let mut guard = self.manager.write().await;
        *guard = None;
    }

    async fn connection(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut manager) = self.connection().await else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    pub(crate) async fn rate_limit(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<bool, RedisError> {
        let Some(mut manager) = self.connection().await else {
            return Ok(true);
        };

        let script = redis::Script::new(
            r#"
            local current = redis.call("INCR", KEYS[1])
            if current == 1 then
                redis.call("EXPIRE", KEYS[1], ARGV[1])
            end
            return current
        "#,
        );

        let current: i64 =
            script.key(key).arg(window_seconds as i64).invoke_async(&mut manager).await?;

        Ok(current <= limit as i64)
    }

    /// Returns `Ok(None)` on a miss, when disconnected, or when the stored
    /// payload no longer deserializes into `T`.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, RedisError> {
        let Some(mut manager) = self.connection().await else {
            return Ok(None);
        };

        let raw: Option<String> = manager.get(key).await?;
        Ok(raw.and_then(|payload| serde_json::from_str(&payload).ok()))
    }

    /// Stores `value` under `key` for `ttl_seconds` and registers the key in
    /// every tag set so it can be dropped by [`RedisHandle::invalidate_tags`].
    pub(crate) async fn set_json_tagged<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
        tags: &[String],
    ) -> Result<(), RedisError> {
        let Some(mut manager) = self.connection().await else {
            return Ok(());
        };

        let Ok(payload) = serde_json::to_string(value) else {
            return Ok(());
        };

        let mut pipe = redis::pipe();
        pipe.atomic().cmd("SET").arg(key).arg(payload).arg("EX").arg(ttl_seconds).ignore();
        for tag in tags {
            let tag_key = format!("{TAG_PREFIX}{tag}");
            pipe.cmd("SADD").arg(&tag_key).arg(key).ignore();
            // Tag sets outlive their members by one TTL at most.
            pipe.cmd("EXPIRE").arg(&tag_key).arg(ttl_seconds * 2).ignore();
        }
        pipe.query_async::<_, ()>(&mut manager).await
    }

    pub(crate) async fn invalidate_tags(&self, tags: &[String]) -> Result<u64, RedisError> {
        let Some(mut manager) = self.connection().await else {
            return Ok(0);
        };

        let mut removed = 0u64;
        for tag in tags {
            let tag_key = format!("{TAG_PREFIX}{tag}");
            let members: Vec<String> = manager.smembers(&tag_key).await?;
            if !members.is_empty() {
                removed += manager.del::<_, u64>(&members).await?;
            }
            manager.del::<_, u64>(&tag_key).await?;
        }
        Ok(removed)
    }
}
