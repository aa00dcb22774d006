use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use chrono::Utc;

use crate::{
    batch::{BatchController, FileBoard, PlaceholderListItem, UploadSettings},
    notice::Notice,
    progress::BatchObserver,
    store::{FOLDER_MIME, FileItem, ProgressFn, RemoteStore},
    walk::{FileLike, UploadEntry},
};

mod flat;
mod scenario;
mod tree;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateFolder {
        name: String,
        parent: Option<String>,
        id: String,
    },
    Upload {
        name: String,
        parent: Option<String>,
    },
    List {
        folder: Option<String>,
        search: Option<String>,
    },
    Delete(String),
}

#[derive(Debug, thiserror::Error)]
#[error("injected failure: {0}")]
pub struct Failure(String);

/// A store that records every call, yields between steps so concurrent
/// callers interleave, and fails on demand.
#[derive(Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<Call>>,
    items: Mutex<Vec<FileItem>>,
    next_id: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_folders: HashSet<String>,
    fail_uploads: HashSet<String>,
    silent: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_folder(mut self, name: &str) -> Self {
        self.fail_folders.insert(name.to_owned());
        self
    }

    pub fn failing_upload(mut self, name: &str) -> Self {
        self.fail_uploads.insert(name.to_owned());
        self
    }

    /// Never report byte progress, as a store without upload events would.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created_folders(&self) -> Vec<(String, Option<String>, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateFolder { name, parent, id } => Some((name, parent, id)),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<(String, Option<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Upload { name, parent } => Some((name, parent)),
                _ => None,
            })
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn item(&self, name: &str, mime_type: &str, size: u64, parent: Option<&str>) -> FileItem {
        let id = format!("id{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let item = FileItem {
            id,
            name: name.to_owned(),
            mime_type: mime_type.to_owned(),
            size,
            created_time: Utc::now(),
            parents: parent.map(|parent| vec![parent.to_owned()]),
        };
        self.items.lock().unwrap().push(item.clone());
        item
    }
}

impl RemoteStore for RecordingStore {
    type Error = Failure;

    async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<String, Self::Error> {
        tokio::task::yield_now().await;
        if self.fail_folders.contains(name) {
            return Err(Failure(name.to_owned()));
        }
        let id = self.item(name, FOLDER_MIME, 0, parent).id;
        self.record(Call::CreateFolder {
            name: name.to_owned(),
            parent: parent.map(str::to_owned),
            id: id.clone(),
        });
        Ok(id)
    }

    async fn upload_file(
        &self,
        blob: &FileLike,
        parent: Option<&str>,
        on_progress: ProgressFn,
    ) -> Result<FileItem, Self::Error> {
        self.record(Call::Upload {
            name: blob.name.clone(),
            parent: parent.map(str::to_owned),
        });
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.silent {
            on_progress(blob.size / 2);
        }
        tokio::task::yield_now().await;
        let result = if self.fail_uploads.contains(&blob.name) {
            Err(Failure(blob.name.clone()))
        } else {
            if !self.silent {
                on_progress(blob.size);
            }
            Ok(self.item(&blob.name, &blob.mime_type, blob.size, parent))
        };
        tokio::task::yield_now().await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn list_files(
        &self,
        folder: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<FileItem>, Self::Error> {
        self.record(Call::List {
            folder: folder.map(str::to_owned),
            search: search.map(str::to_owned),
        });
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .filter(|item| {
                let parent = item.parents.as_ref().and_then(|parents| parents.first());
                parent.map(String::as_str) == folder
            })
            .filter(|item| search.is_none_or(|term| item.name.contains(term)))
            .cloned()
            .collect())
    }

    async fn delete_file(&self, id: &str) -> Result<(), Self::Error> {
        self.record(Call::Delete(id.to_owned()));
        self.items.lock().unwrap().retain(|item| item.id != id);
        Ok(())
    }

    async fn download_url(&self, id: &str) -> Result<String, Self::Error> {
        Ok(format!("https://example.invalid/{id}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(PlaceholderListItem),
    Progress(String, u8),
    Complete(String),
    Error(String, Notice),
    EntryFailed(String),
    Notify(Notice),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<PlaceholderListItem> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Start(item) => Some(item),
                _ => None,
            })
            .collect()
    }

    pub fn progress_of(&self, id: &str) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Progress(seen, percent) if seen == id => Some(percent),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl BatchObserver for RecordingObserver {
    fn on_batch_start(&self, item: &PlaceholderListItem) {
        self.push(Event::Start(item.clone()));
    }

    fn on_batch_progress(&self, id: &str, percent: u8) {
        self.push(Event::Progress(id.to_owned(), percent));
    }

    fn on_batch_complete(&self, id: &str) {
        self.push(Event::Complete(id.to_owned()));
    }

    fn on_batch_error(&self, id: &str, notice: &Notice) {
        self.push(Event::Error(id.to_owned(), notice.clone()));
    }

    fn on_entry_failed(&self, path: &str, _message: &str) {
        self.push(Event::EntryFailed(path.to_owned()));
    }

    fn notify(&self, notice: &Notice) {
        self.push(Event::Notify(notice.clone()));
    }

    fn finish(&self) {}
}

pub fn entry(relative_path: &str, size: usize) -> UploadEntry {
    let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    UploadEntry {
        relative_path: relative_path.to_owned(),
        blob: FileLike::from_bytes(name, vec![b'x'; size]),
    }
}

pub fn settings(concurrency: usize, settle_ms: u64) -> UploadSettings {
    UploadSettings {
        concurrency,
        settle_delay: Duration::from_millis(settle_ms),
    }
}

pub fn controller<S: RemoteStore>(
    store: S,
    settings: UploadSettings,
) -> (BatchController<S>, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::default());
    let controller = BatchController::new(
        store,
        Arc::new(FileBoard::new()),
        observer.clone(),
        settings,
    );
    (controller, observer)
}
