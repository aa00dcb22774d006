use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;

use super::CacheStore;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid key pattern: {0}")]
    Pattern(glob::PatternError),
}

/// Process-local cache with per-entry expiry.
#[derive(Default)]
pub struct Client {
    map: tokio::sync::Mutex<HashMap<String, (String, Instant)>>,
}

impl Client {
    pub fn new() -> Self {
        Default::default()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.map
            .lock()
            .await
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }
}

impl CacheStore for Client {
    type Error = Error;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let mut map = self.map.lock().await;
        match map.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Self::Error> {
        self.map
            .lock()
            .await
            .insert(key.to_owned(), (value.to_owned(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Error> {
        self.map.lock().await.remove(key);
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize, Self::Error> {
        let pattern = glob::Pattern::new(pattern).map_err(Error::Pattern)?;
        let mut map = self.map.lock().await;
        let before = map.len();
        map.retain(|key, _| !pattern.matches(key));
        Ok(before - map.len())
    }
}
