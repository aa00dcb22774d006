use std::path::PathBuf;

pub mod aggregate;
pub mod backend;
pub mod batch;
pub mod cache;
pub mod config;
pub mod drive;
pub mod materialize;
pub mod notice;
pub mod progress;
pub mod store;
pub mod walk;
pub mod warning;

#[cfg(test)]
mod tests;

#[derive(Debug, thiserror::Error)]
#[error("{context}: {detail}")]
pub struct Error {
    pub context: Box<ErrorContext>,
    pub detail: Box<ErrorDetail>,
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub path: PathBuf,
    pub relative_path: Option<String>,
}

impl ErrorContext {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            relative_path: None,
        }
    }

    pub fn with_relative_path(&self, relative_path: impl Into<String>) -> Self {
        Self {
            path: self.path.clone(),
            relative_path: Some(relative_path.into()),
        }
    }

    pub fn error(&self, detail: ErrorDetail) -> Error {
        Error {
            context: Box::new(self.clone()),
            detail: Box::new(detail),
        }
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.relative_path {
            Some(relative_path) => write!(f, "{relative_path}({})", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorDetail {
    #[error("Failed to read directory: {0}")]
    ReadDirectory(std::io::Error),
    #[error("Failed to read file: {0}")]
    ReadFile(std::io::Error),
    #[error("Failed to walk directory: {0}")]
    Walk(walkdir::Error),
    #[error("Invalid relative path")]
    InvalidRelativePath,
    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(glob::PatternError),
}
