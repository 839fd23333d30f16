//! Redis backend implementation

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::FromRedisValue;
use redpool_core::{Backend, Endpoint, PoolError, Result};
use serde::{Deserialize, Serialize};

/// Port used when an endpoint does not name one
pub const DEFAULT_PORT: u16 = 6379;

/// Settings shared by every connection the backend opens
///
/// Only applied to bare `host[:port]` endpoints; full URLs are used as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisBackendConfig {
    /// Username for AUTH (Redis 6+ ACLs)
    pub username: Option<String>,
    /// Password for AUTH
    pub password: Option<String>,
    /// Database index selected on connect
    pub database: u16,
}

/// Redis implementation of the `Backend` capability
#[derive(Debug, Clone, Default)]
pub struct RedisBackend {
    config: RedisBackendConfig,
}

impl RedisBackend {
    pub fn new() -> Self {
        Self::with_config(RedisBackendConfig::default())
    }

    pub fn with_config(config: RedisBackendConfig) -> Self {
        tracing::debug!(
            database = config.database,
            auth = config.password.is_some(),
            "Redis backend initialized"
        );
        Self { config }
    }

    pub fn config(&self) -> &RedisBackendConfig {
        &self.config
    }

    /// Build the connection URL for an endpoint
    pub fn connection_url(&self, endpoint: &Endpoint) -> String {
        let address = endpoint.as_str().trim();
        if address.contains("://") {
            return address.to_string();
        }

        let (host, port) = split_host_port(address);
        let database = self.config.database;
        let username = self.config.username.as_deref().filter(|s| !s.is_empty());
        let password = self.config.password.as_deref().filter(|s| !s.is_empty());

        match (username, password) {
            (Some(user), Some(pass)) => {
                format!("redis://{}:{}@{}:{}/{}", user, pass, host, port, database)
            }
            (None, Some(pass)) => format!("redis://:{}@{}:{}/{}", pass, host, port, database),
            _ => format!("redis://{}:{}/{}", host, port, database),
        }
    }
}

/// Split `host`, `host:port`, `[v6]` or `[v6]:port` into a URL host and a
/// port. An unbracketed address with several colons is a bare IPv6 address.
fn split_host_port(address: &str) -> (String, u16) {
    if let Some((host, rest)) = address
        .strip_prefix('[')
        .and_then(|bracketed| bracketed.split_once(']'))
    {
        let port = rest
            .strip_prefix(':')
            .and_then(|port| port.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        return (format!("[{}]", host), port);
    }

    if address.matches(':').count() > 1 {
        return (format!("[{}]", address), DEFAULT_PORT);
    }

    match address
        .rsplit_once(':')
        .and_then(|(host, port)| port.parse::<u16>().ok().map(|port| (host, port)))
    {
        Some((host, port)) if !host.is_empty() => (host.to_string(), port),
        _ => (address.to_string(), DEFAULT_PORT),
    }
}

#[async_trait]
impl Backend for RedisBackend {
    type Handle = RedisConnection;

    fn name(&self) -> &'static str {
        "redis"
    }

    #[tracing::instrument(skip(self, endpoint), fields(endpoint = %endpoint))]
    async fn open(&self, endpoint: &Endpoint) -> Result<RedisConnection> {
        tracing::debug!("connecting to Redis");

        let client = redis::Client::open(self.connection_url(endpoint).as_str())
            .map_err(|e| PoolError::Backend(format!("Invalid Redis endpoint: {}", e)))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PoolError::Backend(format!("Failed to connect to Redis: {}", e)))?;

        Ok(RedisConnection {
            connection,
            endpoint: endpoint.clone(),
        })
    }

    async fn ping(&self, handle: &mut RedisConnection) -> Result<bool> {
        let result: redis::RedisResult<String> =
            redis::cmd("PING").query_async(&mut handle.connection).await;

        match result {
            Ok(response) if response == "PONG" => Ok(true),
            Ok(response) => {
                tracing::warn!(endpoint = %handle.endpoint, %response, "unexpected PING response");
                Ok(false)
            }
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains("NOAUTH") || error_msg.contains("Authentication") {
                    return Err(PoolError::Backend(
                        "Redis authentication required".to_string(),
                    ));
                }
                Err(PoolError::Backend(format!("PING failed: {}", e)))
            }
        }
    }

    async fn close(&self, handle: RedisConnection) -> Result<()> {
        // The multiplexed driver task shuts down once its last handle is dropped.
        let endpoint = handle.endpoint.clone();
        drop(handle);
        tracing::debug!(%endpoint, "Redis connection closed");
        Ok(())
    }
}

/// A live Redis connection owned by one pooled factory
pub struct RedisConnection {
    connection: MultiplexedConnection,
    endpoint: Endpoint,
}

impl RedisConnection {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Run one command and convert its reply
    pub async fn query<T: FromRedisValue>(&mut self, cmd: &redis::Cmd) -> Result<T> {
        let result: redis::RedisResult<T> = cmd.query_async(&mut self.connection).await;
        result.map_err(|e| PoolError::Backend(format!("Redis command failed: {}", e)))
    }

    /// Direct access for pipelines and the typed `AsyncCommands` API
    pub fn inner_mut(&mut self) -> &mut MultiplexedConnection {
        &mut self.connection
    }
}

impl std::fmt::Debug for RedisConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConnection")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
