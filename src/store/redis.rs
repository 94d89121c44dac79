//! Redis-backed [`BlobStore`]: each key holds one string value.
//!
//! One multiplexed connection is shared by every request. Connecting is
//! bounded by the store timeout, but commands are not: a `SET` that has been
//! sent is always awaited until the server answers or the connection drops.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{
    AsyncCommands, Client, ConnectionAddr, ConnectionInfo, ErrorKind, InfoDict,
    RedisConnectionInfo, RedisError,
};

use super::{BlobStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct RedisBlobStore {
    conn: MultiplexedConnection,
    addr: String,
}

impl RedisBlobStore {
    /// Connect to `host:port`, authenticating with `password` when set
    pub async fn connect(
        host: &str,
        port: u16,
        password: Option<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let addr = format!("{}:{}", host, port);
        let client = Client::open(connection_info(host, port, password)).map_err(classify)?;
        let conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                StoreError::unavailable(format!(
                    "connecting to Redis at {} timed out after {:?}",
                    addr, timeout
                ))
            })?
            .map_err(classify)?;

        let store = Self { conn, addr };
        store.ping().await?;
        tracing::info!("Redis client connected to {}", store.addr);
        Ok(store)
    }
}

#[async_trait]
impl BlobStore for RedisBlobStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(classify)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await.map_err(classify)?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<String> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await.map_err(classify)?;
        if pong != "PONG" {
            return Err(StoreError::unavailable(format!(
                "unexpected PING reply from {}: {}",
                self.addr, pong
            )));
        }
        let info: InfoDict = redis::cmd("INFO")
            .arg("server")
            .query_async(&mut conn)
            .await
            .map_err(classify)?;
        Ok(info
            .get::<String>("redis_version")
            .unwrap_or_else(|| "unknown".to_string()))
    }
}

fn connection_info(host: &str, port: u16, password: Option<String>) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(host.to_string(), port),
        redis: RedisConnectionInfo {
            password,
            ..Default::default()
        },
    }
}

/// Map a Redis error onto the store taxonomy
fn classify(err: RedisError) -> StoreError {
    let corrupt = err.kind() == ErrorKind::TypeError || err.code() == Some("WRONGTYPE");
    if corrupt {
        StoreError::corrupt_with("Redis returned a value of the wrong type", err)
    } else {
        StoreError::unavailable_with("Redis command failed", err)
    }
}
