use std::time::Duration;

use ::redis::AsyncCommands as _;
use tracing::error;

use super::CacheStore;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("redis error: {0}")]
    Redis(::redis::RedisError),
}

/// Redis-backed listing cache. Keys are namespaced by an optional prefix.
pub struct Client {
    client: ::redis::Client,
    prefix: Option<String>,
}

impl Client {
    pub fn open(url: &str, prefix: Option<String>) -> Result<Self, Error> {
        let client = ::redis::Client::open(url)
            .map_err(Error::Redis)
            .inspect_err(|error| error!(%error, "Failed to open redis client"))?;
        Ok(Self { client, prefix })
    }

    fn key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_owned(),
        }
    }

    async fn connection(&self) -> Result<::redis::aio::MultiplexedConnection, Error> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(Error::Redis)
    }
}

impl CacheStore for Client {
    type Error = Error;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(self.key(key))
            .await
            .map_err(Error::Redis)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Self::Error> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(self.key(key), value, ttl.as_secs().max(1))
            .await
            .map_err(Error::Redis)
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Error> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.key(key)).await.map_err(Error::Redis)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize, Self::Error> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn.keys(self.key(pattern)).await.map_err(Error::Redis)?;
        if keys.is_empty() {
            return Ok(0);
        }
        conn.del::<_, ()>(&keys).await.map_err(Error::Redis)?;
        Ok(keys.len())
    }
}
