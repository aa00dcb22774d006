//! Remote store backends: Google Drive over REST, and a SQLite emulation.

pub mod google;
pub mod local;
