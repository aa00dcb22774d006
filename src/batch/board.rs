//! The client-visible file list.
//!
//! The board is owned by the batch controller, which is its only writer.
//! Consumers subscribe to snapshots instead of mutating shared state.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::watch;

use crate::store::{FOLDER_MIME, FileItem};

use super::placeholder::{Placeholder, PlaceholderListItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ListEntry {
    File(FileItem),
    Pending(PlaceholderListItem),
}

impl ListEntry {
    pub fn id(&self) -> &str {
        match self {
            ListEntry::File(item) => &item.id,
            ListEntry::Pending(item) => &item.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ListEntry::File(item) => &item.name,
            ListEntry::Pending(item) => &item.name,
        }
    }

    pub fn is_folder(&self) -> bool {
        match self {
            ListEntry::File(item) => item.is_folder(),
            ListEntry::Pending(item) => item.mime_type == FOLDER_MIME,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoardState {
    listings: HashMap<Option<String>, Vec<FileItem>>,
    placeholders: IndexMap<String, Placeholder>,
}

impl BoardState {
    /// What a client looking at `folder` sees: the authoritative listing plus
    /// the placeholders headed for that folder, folders first.
    pub fn view(&self, folder: Option<&str>) -> Vec<ListEntry> {
        let files = self
            .listings
            .get(&folder.map(str::to_owned))
            .into_iter()
            .flatten()
            .cloned()
            .map(ListEntry::File);
        let pending = self
            .placeholders
            .values()
            .filter(|placeholder| placeholder.is_visible() && placeholder.folder() == folder)
            .map(|placeholder| ListEntry::Pending(placeholder.item().clone()));
        let mut entries = files.chain(pending).collect::<Vec<_>>();
        entries.sort_by_key(|entry| !entry.is_folder());
        entries
    }

    pub fn placeholder(&self, id: &str) -> Option<&Placeholder> {
        self.placeholders.get(id)
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.placeholders.values()
    }
}

pub struct FileBoard {
    tx: watch::Sender<BoardState>,
}

impl Default for FileBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl FileBoard {
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(BoardState::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> BoardState {
        self.tx.borrow().clone()
    }

    pub fn view(&self, folder: Option<&str>) -> Vec<ListEntry> {
        self.tx.borrow().view(folder)
    }

    /// Insert a fresh placeholder and return its item.
    pub fn insert(&self, mut placeholder: Placeholder) -> PlaceholderListItem {
        placeholder.insert();
        let item = placeholder.item().clone();
        self.tx.send_modify(|state| {
            state
                .placeholders
                .insert(placeholder.id().to_owned(), placeholder);
        });
        item
    }

    /// Update the progress of a placeholder and return the value now shown.
    pub fn progress(&self, id: &str, percent: u8) -> Option<u8> {
        let mut shown = None;
        self.tx.send_if_modified(|state| {
            let Some(placeholder) = state.placeholders.get_mut(id) else {
                return false;
            };
            let before = placeholder.item().upload_progress;
            if !placeholder.progress(percent) {
                return false;
            }
            let after = placeholder.item().upload_progress;
            shown = Some(after);
            after != before
        });
        shown
    }

    pub fn settle(&self, id: &str) -> bool {
        self.tx.send_if_modified(|state| {
            state
                .placeholders
                .get_mut(id)
                .is_some_and(|placeholder| placeholder.settle())
        })
    }

    /// Drop placeholders immediately, as on failure. Returns how many left
    /// the board.
    pub fn remove(&self, ids: &[String]) -> usize {
        let mut removed = 0;
        self.tx.send_if_modified(|state| {
            removed = take_placeholders(&mut state.placeholders, ids);
            removed > 0
        });
        removed
    }

    /// Replace settled placeholders with a fresh authoritative listing in one
    /// step, so clients never see neither. Returns how many placeholders left
    /// the board.
    pub fn resolve(
        &self,
        ids: &[String],
        folder: Option<&str>,
        listing: Option<Vec<FileItem>>,
    ) -> usize {
        let mut removed = 0;
        self.tx.send_modify(|state| {
            removed = take_placeholders(&mut state.placeholders, ids);
            if let Some(listing) = listing {
                state.listings.insert(folder.map(str::to_owned), listing);
            }
        });
        removed
    }

    pub fn replace_listing(&self, folder: Option<&str>, listing: Vec<FileItem>) {
        self.tx.send_modify(|state| {
            state.listings.insert(folder.map(str::to_owned), listing);
        });
    }
}

fn take_placeholders(placeholders: &mut IndexMap<String, Placeholder>, ids: &[String]) -> usize {
    ids.iter()
        .filter_map(|id| placeholders.shift_remove(id))
        .map(|mut placeholder| placeholder.remove())
        .filter(|removed| *removed)
        .count()
}
