//! In-flight placeholder entries.
//!
//! A placeholder stands in for a batch (or a single file of a flat batch) in
//! the client-visible listing until the authoritative listing catches up.
//! Its lifecycle is `Absent -> Inserted -> Progressing -> Settling -> Absent`,
//! with a direct jump back to `Absent` on failure.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;
use tracing::debug;
use valuable::Valuable;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

pub const ID_PREFIX: &str = "temp-";

fn next_id() -> String {
    format!(
        "{ID_PREFIX}{}-{}",
        Utc::now().timestamp_millis(),
        NEXT_ID.fetch_add(1, Ordering::Relaxed)
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Valuable)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderListItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub is_uploading: bool,
    pub upload_progress: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderState {
    Absent,
    Inserted,
    Progressing,
    Settling,
}

#[derive(Debug, Clone)]
pub struct Placeholder {
    folder: Option<String>,
    item: PlaceholderListItem,
    state: PlaceholderState,
}

impl Placeholder {
    pub fn new(
        folder: Option<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            folder,
            item: PlaceholderListItem {
                id: next_id(),
                name: name.into(),
                mime_type: mime_type.into(),
                size,
                is_uploading: true,
                upload_progress: 0,
            },
            state: PlaceholderState::Absent,
        }
    }

    pub fn id(&self) -> &str {
        &self.item.id
    }

    /// Destination folder the placeholder is rendered in.
    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    pub fn item(&self) -> &PlaceholderListItem {
        &self.item
    }

    pub fn state(&self) -> PlaceholderState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state != PlaceholderState::Absent
    }

    fn transition(&mut self, to: PlaceholderState) -> bool {
        use PlaceholderState::*;
        let allowed = matches!(
            (self.state, to),
            (Absent, Inserted)
                | (Inserted | Progressing, Progressing)
                | (Inserted | Progressing, Settling)
                | (Inserted | Progressing | Settling, Absent)
        );
        if allowed {
            self.state = to;
        } else {
            debug!(id = self.item.id, from = ?self.state, ?to, "ignore placeholder transition");
        }
        allowed
    }

    pub fn insert(&mut self) -> bool {
        self.transition(PlaceholderState::Inserted)
    }

    /// Rewrite the progress in place. Progress never moves backwards.
    pub fn progress(&mut self, percent: u8) -> bool {
        if !self.transition(PlaceholderState::Progressing) {
            return false;
        }
        self.item.upload_progress = self.item.upload_progress.max(percent.min(100));
        true
    }

    pub fn settle(&mut self) -> bool {
        if !self.transition(PlaceholderState::Settling) {
            return false;
        }
        self.item.upload_progress = 100;
        true
    }

    pub fn remove(&mut self) -> bool {
        self.transition(PlaceholderState::Absent)
    }
}
