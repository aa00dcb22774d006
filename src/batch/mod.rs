//! Upload batches: placeholders, the client-visible board, and the controller
//! driving both.

pub mod board;
pub mod controller;
pub mod placeholder;

pub use board::{BoardState, FileBoard, ListEntry};
pub use controller::{
    BatchController, BatchError, BatchOutcome, FlatFailure, FlatSummary, TreeSummary,
    UploadSettings,
};
pub use placeholder::{Placeholder, PlaceholderListItem, PlaceholderState};
