//! Redis service backing out-of-process cache regions

use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    /// Create a new Redis service
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Cache(format!("Failed to create Redis client: {}", e)))?;

        // Test connection
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Cache(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Cache(format!("Redis connection test failed: {}", e)))?;

        Ok(Self { client })
    }

    /// Read and decode a JSON value
    pub async fn get_json<V: DeserializeOwned>(&self, key: &str) -> AppResult<Option<V>> {
        let mut conn = self.get_connection().await?;

        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to read {} from Redis: {}", key, e)))?;

        raw.map(|s| {
            serde_json::from_str(&s)
                .map_err(|e| AppError::Cache(format!("Corrupt cache entry {}: {}", key, e)))
        })
        .transpose()
    }

    /// Store a JSON value without expiration
    pub async fn set_json<V: Serialize + ?Sized>(&self, key: &str, value: &V) -> AppResult<()> {
        let payload = serde_json::to_string(value)
            .map_err(|e| AppError::Cache(format!("Failed to encode cache entry {}: {}", key, e)))?;

        let mut conn = self.get_connection().await?;
        conn.set::<_, _, ()>(key, payload)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to write {} to Redis: {}", key, e)))
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.get_connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to delete {} from Redis: {}", key, e)))
    }

    /// Delete every key matching a glob pattern
    pub async fn delete_matching(&self, pattern: &str) -> AppResult<()> {
        let mut conn = self.get_connection().await?;

        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn
                .scan_match::<_, String>(pattern)
                .await
                .map_err(|e| AppError::Cache(format!("Failed to scan Redis keys: {}", e)))?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            return Ok(());
        }

        conn.del::<_, ()>(keys)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to delete keys from Redis: {}", e)))
    }

    /// Get a Redis connection
    pub async fn get_connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Cache(format!("Failed to get Redis connection: {}", e)))
    }
}
