//! Folder materialization
//!
//! Recreates the directory hierarchy of a batch on the remote store. Every
//! directory path maps to a single once-cell; whoever needs the path first
//! performs the create-folder call while concurrent requesters await the same
//! cell. Parents are always resolved before their children because a path is
//! only looked up after its prefix resolved.

use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{store::RemoteStore, walk::directory_segments};

#[derive(Debug, thiserror::Error)]
#[error("failed to create folder {path}: {error}")]
pub struct Error<E> {
    pub path: String,
    pub error: E,
}

pub struct FolderMaterializer<'a, S> {
    store: &'a S,
    root: Option<String>,
    folders: Mutex<IndexMap<String, Arc<OnceCell<String>>>>,
}

impl<'a, S: RemoteStore> FolderMaterializer<'a, S> {
    /// `root` is the destination folder; `None` means the store's default root.
    pub fn new(store: &'a S, root: Option<String>) -> Self {
        Self {
            store,
            root,
            folders: Mutex::new(IndexMap::new()),
        }
    }

    fn cell(&self, path: &str) -> Arc<OnceCell<String>> {
        self.folders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_owned())
            .or_default()
            .clone()
    }

    /// Resolve the immediate parent folder id for a file at `relative_path`,
    /// creating any missing folder along the way.
    pub async fn resolve_parent(
        &self,
        relative_path: &str,
    ) -> Result<Option<String>, Error<S::Error>> {
        let mut parent = self.root.clone();
        let mut path = String::new();
        for segment in directory_segments(relative_path) {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);
            let cell = self.cell(&path);
            let id = cell
                .get_or_try_init(|| async {
                    debug!(%path, parent = ?parent, "create folder");
                    self.store.create_folder(segment, parent.as_deref()).await
                })
                .await
                .map_err(|error| Error {
                    path: path.clone(),
                    error,
                })?;
            parent = Some(id.clone());
        }
        Ok(parent)
    }

    /// Directory paths resolved so far, mapped to their remote ids.
    pub fn folders(&self) -> IndexMap<String, String> {
        self.folders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(path, cell)| cell.get().map(|id| (path.clone(), id.clone())))
            .collect()
    }
}
