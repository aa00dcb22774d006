use std::path::{Path, PathBuf};

use itertools::Itertools as _;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{ErrorContext, ErrorDetail, warn_entry};

use super::{DirectoryReader, DroppedItem, Exclude, FileEntry, FileLike, UploadEntry, Walked};

/// A directory on the local filesystem read page by page.
pub struct LocalDirectory {
    path: PathBuf,
    name: String,
    page: usize,
    read_dir: Option<tokio::fs::ReadDir>,
    exhausted: bool,
}

pub struct LocalFile {
    path: PathBuf,
    name: String,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl LocalDirectory {
    pub fn new(path: impl Into<PathBuf>, page: usize) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path),
            path,
            page: page.max(1),
            read_dir: None,
            exhausted: false,
        }
    }
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path),
            path,
        }
    }
}

impl FileEntry for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn file(self) -> Result<FileLike, crate::Error> {
        FileLike::from_path(self.path).await
    }
}

impl DirectoryReader for LocalDirectory {
    type File = LocalFile;

    fn name(&self) -> &str {
        &self.name
    }

    async fn read_entries(&mut self) -> Result<Vec<DroppedItem<Self>>, crate::Error> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        let context = ErrorContext::new(&self.path);
        if self.read_dir.is_none() {
            let read_dir = tokio::fs::read_dir(&self.path)
                .await
                .map_err(|error| context.error(ErrorDetail::ReadDirectory(error)))?;
            self.read_dir = Some(read_dir);
        }
        let Some(read_dir) = self.read_dir.as_mut() else {
            return Ok(Vec::new());
        };

        let mut batch = Vec::new();
        while batch.len() < self.page {
            let Some(entry) = read_dir
                .next_entry()
                .await
                .map_err(|error| context.error(ErrorDetail::ReadDirectory(error)))?
            else {
                self.exhausted = true;
                break;
            };
            let path = entry.path();
            match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_dir() => {
                    batch.push(DroppedItem::Directory(LocalDirectory::new(path, self.page)))
                }
                Ok(metadata) if metadata.is_file() => {
                    batch.push(DroppedItem::File(LocalFile::new(path)))
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(%error, path = %path.display(), "skip unreadable entry");
                    warn_entry!("{}: {error}", path.display());
                }
            }
        }
        Ok(batch)
    }
}

/// Select every file below `root` the way a directory picker does: each
/// relative path starts with the name of `root` itself.
pub fn select_directory(root: &Path, exclude: &Exclude) -> Result<Vec<UploadEntry>, crate::Error> {
    let context = ErrorContext::new(root);
    let metadata =
        std::fs::metadata(root).map_err(|error| context.error(ErrorDetail::ReadDirectory(error)))?;
    if !metadata.is_dir() {
        return Err(context.error(ErrorDetail::ReadDirectory(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            "not a directory",
        ))));
    }
    let root_name = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| context.error(ErrorDetail::InvalidRelativePath))?;

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !exclude.matches(&entry.file_name().to_string_lossy())
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                let error = context.error(ErrorDetail::Walk(error));
                warn!(%error, "skip unreadable entry");
                warn_entry!("{error}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative_path = std::iter::once(root_name.clone())
            .chain(
                relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy().into_owned()),
            )
            .join("/");
        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(error) => {
                let error = context
                    .with_relative_path(&relative_path)
                    .error(ErrorDetail::Walk(error));
                warn!(%error, "skip unreadable file");
                warn_entry!("{error}");
                continue;
            }
        };
        files.push((
            relative_path,
            FileLike::from_path_with_size(entry.path(), size),
        ));
    }
    Ok(super::from_selection(files, exclude))
}

/// Walk local paths as a drag-and-drop payload.
pub async fn drop_paths(paths: &[PathBuf], exclude: &Exclude, page: usize) -> Walked {
    let items = paths
        .iter()
        .map(|path| {
            if path.is_dir() {
                DroppedItem::Directory(LocalDirectory::new(path, page))
            } else {
                DroppedItem::File(LocalFile::new(path))
            }
        })
        .collect::<Vec<DroppedItem<LocalDirectory>>>();
    super::walk_drop(items, exclude).await
}

/// Select local paths the way a file picker would. A lone directory goes
/// through [`select_directory`], plain files form a flat selection, and a
/// mix that contains any directory is walked like a drop.
pub async fn select_paths(
    paths: &[PathBuf],
    exclude: &Exclude,
    page: usize,
) -> Result<Walked, crate::Error> {
    if let [root] = paths {
        if root.is_dir() {
            return Ok(Walked::Tree(select_directory(root, exclude)?));
        }
    }
    if paths.iter().any(|path| path.is_dir()) {
        debug!(count = paths.len(), "selection contains a directory, walk it as a drop");
        return Ok(drop_paths(paths, exclude, page).await);
    }
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match FileLike::from_path(path).await {
            Ok(file) if exclude.matches(&file.name) => {}
            Ok(file) => files.push(file),
            Err(error) => {
                warn!(%error, path = %path.display(), "skip unreadable file");
                warn_entry!("{}: {error}", path.display());
            }
        }
    }
    Ok(Walked::Flat(files))
}
