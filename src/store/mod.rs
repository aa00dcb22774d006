//! Remote object store abstraction
//!
//! The pipeline only needs a handful of operations from the hierarchical store
//! it uploads into. Backends live in [`crate::backend`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use valuable::{Fields, NamedField, NamedValues, StructDef, Structable, Valuable, Value, Visit};

use crate::walk::FileLike;

/// Mime type the store uses to mark folders.
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Receives the cumulative number of bytes sent for a single file.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Listing entry as returned to clients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub created_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
}

static FILE_ITEM_FIELDS: &[NamedField<'static>] = &[
    NamedField::new("id"),
    NamedField::new("name"),
    NamedField::new("mime_type"),
    NamedField::new("size"),
    NamedField::new("created_time"),
    NamedField::new("parents"),
];

impl Structable for FileItem {
    fn definition(&self) -> StructDef<'_> {
        StructDef::new_static("FileItem", Fields::Named(FILE_ITEM_FIELDS))
    }
}

// `DateTime` has no `Valuable` impl, so the timestamp is logged as RFC 3339.
impl Valuable for FileItem {
    fn as_value(&self) -> Value<'_> {
        Value::Structable(self)
    }

    fn visit(&self, visit: &mut dyn Visit) {
        let created_time = self.created_time.to_rfc3339();
        visit.visit_named_fields(&NamedValues::new(
            FILE_ITEM_FIELDS,
            &[
                self.id.as_value(),
                self.name.as_value(),
                self.mime_type.as_value(),
                self.size.as_value(),
                created_time.as_value(),
                self.parents.as_value(),
            ],
        ));
    }
}

impl FileItem {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }
}

pub trait RemoteStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create a folder and return its id.
    fn create_folder(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;

    fn upload_file(
        &self,
        blob: &FileLike,
        parent: Option<&str>,
        on_progress: ProgressFn,
    ) -> impl Future<Output = Result<FileItem, Self::Error>> + Send;

    fn list_files(
        &self,
        folder: Option<&str>,
        search: Option<&str>,
    ) -> impl Future<Output = Result<Vec<FileItem>, Self::Error>> + Send;

    /// List a folder, skipping any intermediate cache.
    fn refresh_files(
        &self,
        folder: Option<&str>,
    ) -> impl Future<Output = Result<Vec<FileItem>, Self::Error>> + Send {
        self.list_files(folder, None)
    }

    fn delete_file(&self, id: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn download_url(&self, id: &str) -> impl Future<Output = Result<String, Self::Error>> + Send;
}
