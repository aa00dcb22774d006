//! In-memory drop payloads.
//!
//! Mirrors what a browser hands over on drag-and-drop: a forest of entries
//! whose directories are read in pages. Useful for embedding the pipeline
//! behind an API that already received the files.

use std::collections::VecDeque;

use crate::{ErrorContext, ErrorDetail};

use super::{DirectoryReader, DroppedItem, FileEntry, FileLike};

#[derive(Debug, Clone)]
pub enum MemoryNode {
    File(FileLike),
    /// A file whose content cannot be obtained.
    Unreadable(String),
    Directory(String, Vec<MemoryNode>),
    /// A directory whose listing fails on the first read.
    UnreadableDirectory(String),
}

impl MemoryNode {
    pub fn file(name: impl Into<String>, content: impl Into<bytes::Bytes>) -> Self {
        MemoryNode::File(FileLike::from_bytes(name, content))
    }

    pub fn dir(name: impl Into<String>, children: Vec<MemoryNode>) -> Self {
        MemoryNode::Directory(name.into(), children)
    }

    pub fn into_dropped(self, page: usize) -> DroppedItem<MemoryDirectory> {
        match self {
            MemoryNode::File(blob) => DroppedItem::File(MemoryFile(Ok(blob))),
            MemoryNode::Unreadable(name) => DroppedItem::File(MemoryFile(Err(name))),
            MemoryNode::Directory(name, children) => DroppedItem::Directory(MemoryDirectory {
                name,
                pending: children.into(),
                page: page.max(1),
                broken: false,
            }),
            MemoryNode::UnreadableDirectory(name) => DroppedItem::Directory(MemoryDirectory {
                name,
                pending: VecDeque::new(),
                page: page.max(1),
                broken: true,
            }),
        }
    }
}

pub struct MemoryFile(Result<FileLike, String>);

pub struct MemoryDirectory {
    name: String,
    pending: VecDeque<MemoryNode>,
    page: usize,
    broken: bool,
}

impl FileEntry for MemoryFile {
    fn name(&self) -> &str {
        match &self.0 {
            Ok(blob) => &blob.name,
            Err(name) => name,
        }
    }

    async fn file(self) -> Result<FileLike, crate::Error> {
        self.0.map_err(|name| {
            ErrorContext::new(&name).error(ErrorDetail::ReadFile(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "file could not be read",
            )))
        })
    }
}

impl DirectoryReader for MemoryDirectory {
    type File = MemoryFile;

    fn name(&self) -> &str {
        &self.name
    }

    async fn read_entries(&mut self) -> Result<Vec<DroppedItem<Self>>, crate::Error> {
        if self.broken {
            return Err(
                ErrorContext::new(&self.name).error(ErrorDetail::ReadDirectory(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "directory could not be read",
                ))),
            );
        }
        let take = self.page.min(self.pending.len());
        let page = self.page;
        Ok(self
            .pending
            .drain(..take)
            .map(|node| node.into_dropped(page))
            .collect())
    }
}
