//! Listing cache and its invalidation policy
//!
//! Folder listings are cached under a key derived from the containing folder
//! and the search term. Mutations purge the keys they make stale; purging is
//! best-effort and never fails the mutation itself.

use std::{convert::Infallible, time::Duration};

use tracing::{debug, warn};

pub mod memory;
pub mod redis;

const LISTING_PREFIX: &str = "files";
const ROOT_FOLDER: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub folder_id: Option<String>,
    pub search: String,
}

impl CacheKey {
    pub fn new(folder_id: Option<&str>, search: Option<&str>) -> Self {
        Self {
            folder_id: folder_id.map(str::to_owned),
            search: search.unwrap_or_default().trim().to_owned(),
        }
    }

    /// The plain listing of a folder, without a search term.
    pub fn folder(folder_id: Option<&str>) -> Self {
        Self::new(folder_id, None)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{LISTING_PREFIX}:{}:{}",
            self.folder_id.as_deref().unwrap_or(ROOT_FOLDER),
            self.search
        )
    }
}

/// Pattern covering every listing key.
pub fn listing_pattern() -> String {
    format!("{LISTING_PREFIX}:*")
}

pub trait CacheStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Delete every key matching a glob-style pattern; returns how many went.
    fn delete_matching(
        &self,
        pattern: &str,
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send;
}

/// A cache that never stores anything.
pub struct Disabled;

impl CacheStore for Disabled {
    type Error = Infallible;

    async fn get(&self, _key: &str) -> Result<Option<String>, Self::Error> {
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn delete_matching(&self, _pattern: &str) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateFolder { parent: Option<String> },
    Upload { parent: Option<String> },
    Delete { file_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    Keys(Vec<CacheKey>),
    Pattern(String),
}

/// Folder-scoped mutations purge exactly the parent's plain listing; search
/// views stay until their TTL runs out. A delete does not know where the file
/// was listed, so it purges every listing.
pub fn invalidation_for(mutation: &Mutation) -> Invalidation {
    match mutation {
        Mutation::CreateFolder { parent } | Mutation::Upload { parent } => {
            Invalidation::Keys(vec![CacheKey::folder(parent.as_deref())])
        }
        Mutation::Delete { .. } => Invalidation::Pattern(listing_pattern()),
    }
}

pub async fn invalidate<C: CacheStore>(cache: &C, mutation: &Mutation) {
    match invalidation_for(mutation) {
        Invalidation::Keys(keys) => {
            for key in keys {
                let key = key.to_string();
                match cache.delete(&key).await {
                    Ok(()) => debug!(%key, "invalidated listing"),
                    Err(error) => warn!(%error, %key, "failed to invalidate listing"),
                }
            }
        }
        Invalidation::Pattern(pattern) => match cache.delete_matching(&pattern).await {
            Ok(count) => debug!(%pattern, count, "invalidated listings"),
            Err(error) => warn!(%error, %pattern, "failed to invalidate listings"),
        },
    }
}
