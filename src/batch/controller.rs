use std::{sync::Arc, time::Duration};

use futures::{StreamExt as _, TryStreamExt as _, future::join_all, stream};
use indexmap::IndexMap;
use tracing::{debug, error, info, warn};
use valuable::Valuable as _;

use crate::{
    aggregate::BatchProgress,
    config::UploadConfig,
    materialize::{self, FolderMaterializer},
    notice::Notice,
    progress::BatchObserver,
    store::{FOLDER_MIME, FileItem, ProgressFn, RemoteStore},
    walk::{FileLike, UploadEntry, Walked},
};

use super::{board::FileBoard, placeholder::Placeholder};

#[derive(Debug, thiserror::Error)]
pub enum BatchError<E> {
    #[error("failed to create folder {path}: {error}")]
    CreateFolder { path: String, error: E },
    #[error("failed to upload {path}: {error}")]
    Upload { path: String, error: E },
}

impl<E> From<materialize::Error<E>> for BatchError<E> {
    fn from(e: materialize::Error<E>) -> Self {
        BatchError::CreateFolder {
            path: e.path,
            error: e.error,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UploadSettings {
    pub concurrency: usize,
    pub settle_delay: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        UploadConfig::default().into()
    }
}

impl From<UploadConfig> for UploadSettings {
    fn from(config: UploadConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            settle_delay: config.settle_delay(),
        }
    }
}

#[derive(Debug, Default)]
pub struct TreeSummary {
    pub uploaded: Vec<FileItem>,
    /// Directory paths created for the batch, mapped to their remote ids.
    pub folders: IndexMap<String, String>,
}

#[derive(Debug)]
pub struct FlatFailure {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct FlatSummary {
    pub uploaded: Vec<FileItem>,
    pub failed: Vec<FlatFailure>,
}

#[derive(Debug)]
pub enum BatchOutcome {
    Tree(TreeSummary),
    Flat(FlatSummary),
}

/// Sole writer of the file board for the batches it runs.
pub struct BatchController<S> {
    store: S,
    board: Arc<FileBoard>,
    observer: Arc<dyn BatchObserver>,
    settings: UploadSettings,
}

impl<S: RemoteStore> BatchController<S> {
    pub fn new(
        store: S,
        board: Arc<FileBoard>,
        observer: Arc<dyn BatchObserver>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            store,
            board,
            observer,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn board(&self) -> &Arc<FileBoard> {
        &self.board
    }

    fn start(&self, placeholder: Placeholder) -> String {
        let item = self.board.insert(placeholder);
        debug!(item = item.as_value(), "show placeholder");
        self.observer.on_batch_start(&item);
        item.id
    }

    fn progress_fn(&self, id: &str, progress: Arc<BatchProgress>, index: usize) -> ProgressFn {
        let board = self.board.clone();
        let observer = self.observer.clone();
        let id = id.to_owned();
        Arc::new(move |bytes: u64| {
            let percent = progress.report(index, bytes);
            if let Some(shown) = board.progress(&id, percent) {
                observer.on_batch_progress(&id, shown);
            }
        })
    }

    fn fail(&self, id: &str, notice: Notice) {
        self.board.remove(&[id.to_owned()]);
        self.observer.on_batch_error(id, &notice);
    }

    /// Wait for the remote listing to catch up, then swap settled placeholders
    /// for a fresh listing of `dest`.
    async fn settle(&self, dest: Option<&str>, ids: Vec<String>) {
        for id in &ids {
            self.board.settle(id);
        }
        tokio::time::sleep(self.settings.settle_delay).await;
        let listing = self
            .store
            .refresh_files(dest)
            .await
            .inspect_err(|error| warn!(%error, ?dest, "Failed to refresh listing after upload"))
            .ok();
        let removed = self.board.resolve(&ids, dest, listing);
        debug!(removed, batches = ids.len(), "settled placeholders");
        for id in &ids {
            self.observer.on_batch_complete(id);
        }
    }

    /// Upload a batch that carries folder structure.
    ///
    /// Folders are created on demand; files whose parent is resolved upload
    /// concurrently up to the configured limit. The first failure aborts the
    /// rest of the batch; folders already created stay in place.
    pub async fn upload_tree(
        &self,
        dest: Option<&str>,
        entries: Vec<UploadEntry>,
    ) -> Result<TreeSummary, BatchError<S::Error>> {
        let Some(first) = entries.first() else {
            return Ok(TreeSummary::default());
        };
        let root = first.root_name().unwrap_or(&first.blob.name).to_owned();
        let progress = Arc::new(BatchProgress::new(
            entries.iter().map(|entry| entry.blob.size).collect(),
        ));
        let id = self.start(Placeholder::new(
            dest.map(str::to_owned),
            root.clone(),
            FOLDER_MIME,
            progress.total_bytes(),
        ));
        info!(%root, files = entries.len(), bytes = progress.total_bytes(), "start folder upload");

        let materializer = FolderMaterializer::new(&self.store, dest.map(str::to_owned));
        let uploaded = tokio::sync::Mutex::new(Vec::with_capacity(entries.len()));
        let result = stream::iter(entries.iter().enumerate())
            .map(Ok)
            .try_for_each_concurrent(self.settings.concurrency.max(1), |(index, entry)| {
                let id = id.as_str();
                let materializer = &materializer;
                let uploaded = &uploaded;
                let on_progress = self.progress_fn(id, progress.clone(), index);
                let progress = progress.clone();
                async move {
                    let parent = materializer.resolve_parent(&entry.relative_path).await?;
                    let item = self
                        .store
                        .upload_file(&entry.blob, parent.as_deref(), on_progress)
                        .await
                        .map_err(|error| BatchError::Upload {
                            path: entry.relative_path.clone(),
                            error,
                        })?;
                    let percent = progress.complete(index);
                    if let Some(shown) = self.board.progress(id, percent) {
                        self.observer.on_batch_progress(id, shown);
                    }
                    uploaded.lock().await.push(item);
                    Ok::<_, BatchError<S::Error>>(())
                }
            })
            .await;

        if let Err(e) = result {
            error!(error = %e, %root, "Folder upload aborted");
            let notice = match &e {
                BatchError::CreateFolder { path, .. } => Notice::create_folder_failed(path),
                BatchError::Upload { path, error } => {
                    self.observer.on_entry_failed(path, &error.to_string());
                    Notice::folder_upload_failed(&root)
                }
            };
            self.fail(&id, notice);
            return Err(e);
        }

        self.settle(dest, vec![id]).await;
        let uploaded = uploaded.into_inner();
        self.observer.notify(&Notice::uploaded(uploaded.len()));
        Ok(TreeSummary {
            uploaded,
            folders: materializer.folders(),
        })
    }

    /// Upload loose files, one placeholder each, all at once. A failed file
    /// is recorded and the others carry on.
    pub async fn upload_flat(&self, dest: Option<&str>, files: Vec<FileLike>) -> FlatSummary {
        if files.is_empty() {
            return FlatSummary::default();
        }
        let total = files.len();
        let ids = files
            .iter()
            .map(|file| {
                self.start(Placeholder::new(
                    dest.map(str::to_owned),
                    file.name.clone(),
                    file.mime_type.clone(),
                    file.size,
                ))
            })
            .collect::<Vec<_>>();
        info!(files = total, "start flat upload");

        let results = join_all(files.iter().zip(&ids).map(|(file, id)| async move {
            let progress = Arc::new(BatchProgress::new(vec![file.size]));
            let on_progress = self.progress_fn(id, progress.clone(), 0);
            let result = self.store.upload_file(file, dest, on_progress).await;
            if result.is_ok() {
                if let Some(shown) = self.board.progress(id, progress.complete(0)) {
                    self.observer.on_batch_progress(id, shown);
                }
            }
            (file, id, result)
        }))
        .await;

        let mut summary = FlatSummary::default();
        let mut settled = Vec::new();
        for (file, id, result) in results {
            match result {
                Ok(item) => {
                    summary.uploaded.push(item);
                    settled.push(id.clone());
                }
                Err(e) => {
                    error!(error = %e, name = file.name, "Upload failed");
                    self.observer.on_entry_failed(&file.name, &e.to_string());
                    self.fail(id, Notice::upload_failed(&file.name));
                    summary.failed.push(FlatFailure {
                        name: file.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if !settled.is_empty() {
            self.settle(dest, settled).await;
        }
        if summary.failed.is_empty() {
            self.observer.notify(&Notice::uploaded(summary.uploaded.len()));
        } else {
            self.observer
                .notify(&Notice::flat_summary(summary.failed.len(), total));
        }
        summary
    }

    pub async fn upload_walked(
        &self,
        dest: Option<&str>,
        walked: Walked,
    ) -> Result<BatchOutcome, BatchError<S::Error>> {
        match walked {
            Walked::Tree(entries) => self.upload_tree(dest, entries).await.map(BatchOutcome::Tree),
            Walked::Flat(files) => Ok(BatchOutcome::Flat(self.upload_flat(dest, files).await)),
        }
    }
}
