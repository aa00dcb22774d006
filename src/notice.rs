//! User-facing notifications. Messages are written in Vietnamese, the
//! language of the file manager's users.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    fn info(message: String) -> Self {
        Self {
            level: Level::Info,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            level: Level::Error,
            message,
        }
    }

    pub fn create_folder_failed(path: &str) -> Self {
        Self::error(format!("Không thể tạo thư mục \"{path}\""))
    }

    pub fn folder_upload_failed(root: &str) -> Self {
        Self::error(format!("Tải lên thư mục \"{root}\" thất bại"))
    }

    pub fn upload_failed(name: &str) -> Self {
        Self::error(format!("Tải lên \"{name}\" thất bại"))
    }

    pub fn flat_summary(failed: usize, total: usize) -> Self {
        Self::error(format!("{failed}/{total} tệp tải lên thất bại"))
    }

    pub fn uploaded(count: usize) -> Self {
        Self::info(format!("Đã tải lên {count} tệp"))
    }

    pub fn skipped(count: usize) -> Self {
        Self::info(format!("Đã bỏ qua {count} mục không đọc được"))
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
