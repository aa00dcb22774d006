//! Cached drive service
//!
//! Fronts a [`RemoteStore`] with a listing cache. Listings go through the
//! cache; mutations go straight to the store and then purge whatever the
//! invalidation policy names. The service is itself a [`RemoteStore`], so the
//! upload pipeline invalidates as it goes without knowing about the cache.

use std::time::Duration;

use tracing::{debug, warn};
use valuable::Valuable as _;

use crate::{
    cache::{self, CacheKey, CacheStore, Mutation},
    store::{FileItem, ProgressFn, RemoteStore},
    walk::FileLike,
};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub struct Drive<S, C> {
    store: S,
    cache: C,
    ttl: Duration,
}

impl<S: RemoteStore, C: CacheStore> Drive<S, C> {
    pub fn new(store: S, cache: C, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    async fn cached(&self, key: &str) -> Option<Vec<FileItem>> {
        let value = match self.cache.get(key).await {
            Ok(value) => value?,
            Err(error) => {
                warn!(%error, key, "failed to read listing cache");
                return None;
            }
        };
        match serde_json::from_str(&value) {
            Ok(items) => Some(items),
            Err(error) => {
                warn!(%error, key, "discard corrupt listing cache entry");
                None
            }
        }
    }

    async fn store_listing(&self, key: &str, items: &[FileItem]) {
        let value = match serde_json::to_string(items) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, key, "failed to encode listing");
                return;
            }
        };
        if let Err(error) = self.cache.set_with_ttl(key, &value, self.ttl).await {
            warn!(%error, key, "failed to write listing cache");
        }
    }
}

impl<S: RemoteStore, C: CacheStore> RemoteStore for Drive<S, C> {
    type Error = S::Error;

    async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<String, Self::Error> {
        let id = self.store.create_folder(name, parent).await?;
        cache::invalidate(
            &self.cache,
            &Mutation::CreateFolder {
                parent: parent.map(str::to_owned),
            },
        )
        .await;
        Ok(id)
    }

    async fn upload_file(
        &self,
        blob: &FileLike,
        parent: Option<&str>,
        on_progress: ProgressFn,
    ) -> Result<FileItem, Self::Error> {
        let item = self.store.upload_file(blob, parent, on_progress).await?;
        debug!(item = item.as_value(), "uploaded file");
        cache::invalidate(
            &self.cache,
            &Mutation::Upload {
                parent: parent.map(str::to_owned),
            },
        )
        .await;
        Ok(item)
    }

    async fn list_files(
        &self,
        folder: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<FileItem>, Self::Error> {
        let key = CacheKey::new(folder, search).to_string();
        if let Some(items) = self.cached(&key).await {
            debug!(%key, count = items.len(), "listing cache hit");
            return Ok(items);
        }
        debug!(%key, "listing cache miss");
        let items = self.store.list_files(folder, search).await?;
        self.store_listing(&key, &items).await;
        Ok(items)
    }

    async fn refresh_files(&self, folder: Option<&str>) -> Result<Vec<FileItem>, Self::Error> {
        let items = self.store.list_files(folder, None).await?;
        self.store_listing(&CacheKey::folder(folder).to_string(), &items)
            .await;
        Ok(items)
    }

    async fn delete_file(&self, id: &str) -> Result<(), Self::Error> {
        self.store.delete_file(id).await?;
        cache::invalidate(
            &self.cache,
            &Mutation::Delete {
                file_id: id.to_owned(),
            },
        )
        .await;
        Ok(())
    }

    async fn download_url(&self, id: &str) -> Result<String, Self::Error> {
        self.store.download_url(id).await
    }
}
