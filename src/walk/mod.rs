//! Entry tree walking
//!
//! Turns either a flat selection of files that already carry relative paths,
//! or a dropped forest of directories and files, into an ordered list of
//! [`UploadEntry`]. Walking is best-effort: anything that cannot be read is
//! skipped and recorded as a warning.

use std::{collections::VecDeque, path::PathBuf};

use bytes::Bytes;
use futures::{StreamExt as _, TryStreamExt as _, stream::BoxStream};
use tokio::io::AsyncReadExt as _;
use tracing::{debug, warn};

use crate::{ErrorContext, ErrorDetail, warn_entry};

pub mod local;
pub mod memory;

pub use local::{LocalDirectory, LocalFile, drop_paths, select_directory, select_paths};
pub use memory::{MemoryDirectory, MemoryFile, MemoryNode};

/// Chunk size used when streaming file content to a store.
pub const CHUNK_SIZE: usize = 256 * 1024;

#[derive(Clone)]
pub enum Content {
    Bytes(Bytes),
    Path(PathBuf),
}

/// A file as seen by the pipeline: metadata plus a way to read its bytes.
#[derive(derive_debug::Dbg, Clone)]
pub struct FileLike {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    #[dbg(skip)]
    pub content: Content,
}

impl FileLike {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        Self {
            mime_type: guess_mime(&name),
            size: bytes.len() as u64,
            name,
            content: Content::Bytes(bytes),
        }
    }

    pub fn from_path_with_size(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            mime_type: guess_mime(&name),
            size,
            name,
            content: Content::Path(path),
        }
    }

    pub async fn from_path(path: impl Into<PathBuf>) -> Result<Self, crate::Error> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|error| ErrorContext::new(&path).error(ErrorDetail::ReadFile(error)))?;
        Ok(Self::from_path_with_size(path, metadata.len()))
    }

    /// Stream the content in chunks of at most `chunk_size` bytes.
    pub fn chunks(&self, chunk_size: usize) -> BoxStream<'static, std::io::Result<Bytes>> {
        let chunk_size = chunk_size.max(1);
        match &self.content {
            Content::Bytes(bytes) => {
                let bytes = bytes.clone();
                let len = bytes.len();
                futures::stream::iter(
                    (0..len)
                        .step_by(chunk_size)
                        .map(move |start| Ok(bytes.slice(start..(start + chunk_size).min(len)))),
                )
                .boxed()
            }
            Content::Path(path) => {
                let path = path.clone();
                futures::stream::once(async move { tokio::fs::File::open(path).await })
                    .map_ok(move |file| {
                        futures::stream::try_unfold(file, move |mut file| async move {
                            let mut buf = vec![0u8; chunk_size];
                            let read = file.read(&mut buf).await?;
                            if read == 0 {
                                return Ok(None);
                            }
                            buf.truncate(read);
                            Ok::<_, std::io::Error>(Some((Bytes::from(buf), file)))
                        })
                    })
                    .try_flatten()
                    .boxed()
            }
        }
    }
}

fn guess_mime(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or(mime::APPLICATION_OCTET_STREAM)
        .essence_str()
        .to_owned()
}

/// A single file within a batch, annotated with its intended location.
#[derive(Debug, Clone)]
pub struct UploadEntry {
    /// Slash separated, prefixed with the batch root folder name.
    pub relative_path: String,
    pub blob: FileLike,
}

impl UploadEntry {
    /// Directory segments of the relative path, without the file name.
    pub fn directories(&self) -> Vec<&str> {
        directory_segments(&self.relative_path)
    }

    pub fn root_name(&self) -> Option<&str> {
        self.relative_path.split('/').find(|segment| !segment.is_empty())
    }
}

pub(crate) fn directory_segments(relative_path: &str) -> Vec<&str> {
    let mut segments = relative_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();
    segments.pop();
    segments
}

fn valid_relative_path(relative_path: &str) -> bool {
    let mut segments = relative_path.split('/').filter(|segment| !segment.is_empty());
    segments.clone().next().is_some() && segments.all(|segment| segment != "." && segment != "..")
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Result of walking user input.
#[derive(Debug)]
pub enum Walked {
    /// Entries that recreate a folder hierarchy.
    Tree(Vec<UploadEntry>),
    /// Plain files with no folder structure.
    Flat(Vec<FileLike>),
}

impl Walked {
    pub fn len(&self) -> usize {
        match self {
            Walked::Tree(entries) => entries.len(),
            Walked::Flat(files) => files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Glob patterns matched against relative paths and bare names.
#[derive(Debug, Clone, Default)]
pub struct Exclude(Vec<glob::Pattern>);

impl Exclude {
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<Self, crate::Error> {
        patterns
            .into_iter()
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|error| {
                    ErrorContext::new(pattern).error(ErrorDetail::InvalidPattern(error))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn matches(&self, relative_path: &str) -> bool {
        let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
        self.0
            .iter()
            .any(|pattern| pattern.matches(relative_path) || pattern.matches(name))
    }
}

/// Build entries from files that already carry their relative path, as an
/// OS directory picker hands them over. Paths are kept verbatim.
pub fn from_selection(
    files: impl IntoIterator<Item = (String, FileLike)>,
    exclude: &Exclude,
) -> Vec<UploadEntry> {
    files
        .into_iter()
        .filter_map(|(relative_path, blob)| {
            if !valid_relative_path(&relative_path) {
                warn!(relative_path, "skip entry with invalid relative path");
                warn_entry!("{relative_path}: invalid relative path");
                return None;
            }
            if exclude.matches(&relative_path) {
                debug!(relative_path, "excluded");
                return None;
            }
            Some(UploadEntry {
                relative_path,
                blob,
            })
        })
        .collect()
}

/// A dropped file whose content is resolved lazily.
pub trait FileEntry: Send {
    fn name(&self) -> &str;

    fn file(self) -> impl Future<Output = Result<FileLike, crate::Error>> + Send;
}

/// Lazy, finite, non-restartable sequence of directory children. Each call
/// returns the next page; an empty page means the listing is exhausted.
pub trait DirectoryReader: Sized + Send {
    type File: FileEntry;

    fn name(&self) -> &str;

    fn read_entries(
        &mut self,
    ) -> impl Future<Output = Result<Vec<DroppedItem<Self>>, crate::Error>> + Send;
}

pub enum DroppedItem<R: DirectoryReader> {
    File(R::File),
    Directory(R),
}

impl<R: DirectoryReader> DroppedItem<R> {
    pub fn name(&self) -> &str {
        match self {
            DroppedItem::File(file) => file.name(),
            DroppedItem::Directory(directory) => directory.name(),
        }
    }
}

async fn read_all<R: DirectoryReader>(
    reader: &mut R,
    relative_path: &str,
) -> VecDeque<DroppedItem<R>> {
    let mut items = VecDeque::new();
    loop {
        match reader.read_entries().await {
            Ok(batch) if batch.is_empty() => break,
            Ok(batch) => items.extend(batch),
            Err(error) => {
                warn!(%error, relative_path, "failed to read directory, keep partial listing");
                warn_entry!("{relative_path}: {error}");
                break;
            }
        }
    }
    items
}

async fn resolve_file<F: FileEntry>(file: F, relative_path: &str) -> Option<FileLike> {
    match file.file().await {
        Ok(blob) => Some(blob),
        Err(error) => {
            warn!(%error, relative_path, "skip unreadable file");
            warn_entry!("{relative_path}: {error}");
            None
        }
    }
}

/// Walk a dropped forest. Without any directory the drop is a flat upload;
/// otherwise every directory is descended depth-first in discovery order.
pub async fn walk_drop<R: DirectoryReader>(
    items: Vec<DroppedItem<R>>,
    exclude: &Exclude,
) -> Walked {
    let has_directory = items
        .iter()
        .any(|item| matches!(item, DroppedItem::Directory(_)));

    if !has_directory {
        let mut files = Vec::with_capacity(items.len());
        for item in items {
            if let DroppedItem::File(file) = item {
                let name = file.name().to_owned();
                if exclude.matches(&name) {
                    continue;
                }
                files.extend(resolve_file(file, &name).await);
            }
        }
        return Walked::Flat(files);
    }

    let mut entries = Vec::new();
    let mut stack = vec![(String::new(), items.into_iter().collect::<VecDeque<_>>())];
    while let Some((prefix, pending)) = stack.last_mut() {
        let Some(item) = pending.pop_front() else {
            stack.pop();
            continue;
        };
        let relative_path = join_path(prefix, item.name());
        if exclude.matches(&relative_path) {
            debug!(relative_path, "excluded");
            continue;
        }
        match item {
            DroppedItem::File(file) => {
                if let Some(blob) = resolve_file(file, &relative_path).await {
                    entries.push(UploadEntry {
                        relative_path,
                        blob,
                    });
                }
            }
            DroppedItem::Directory(mut directory) => {
                let children = read_all(&mut directory, &relative_path).await;
                stack.push((relative_path, children));
            }
        }
    }
    Walked::Tree(entries)
}
