use std::str::FromStr as _;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt as _;
use sqlx::FromRow;
use tracing::{error, info};

use crate::{
    store::{FOLDER_MIME, FileItem, ProgressFn, RemoteStore},
    walk::{CHUNK_SIZE, FileLike},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(sqlx::Error),
    #[error("failed to read content: {0}")]
    ReadContent(std::io::Error),
    #[error("parent folder not found: {0}")]
    MissingParent(String),
    #[error("item not found: {0}")]
    NotFound(String),
}

/// A drive emulated in a single SQLite table.
pub struct LocalDrive {
    pool: sqlx::SqlitePool,
}

#[derive(FromRow)]
struct Row {
    id: String,
    name: String,
    mime_type: String,
    size: i64,
    created_time: DateTime<Utc>,
    parent: Option<String>,
}

impl From<Row> for FileItem {
    fn from(row: Row) -> Self {
        FileItem {
            id: row.id,
            name: row.name,
            mime_type: row.mime_type,
            size: row.size.max(0) as u64,
            created_time: row.created_time,
            parents: row.parent.map(|parent| vec![parent]),
        }
    }
}

impl LocalDrive {
    pub async fn open(url: &str) -> Result<Self, Error> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)
            .map_err(Error::Sqlite)
            .inspect_err(|error| error!(%error, %url, "Failed to open local drive db"))?
            .create_if_missing(true);
        let pool = sqlx::pool::PoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(Error::Sqlite)
            .inspect_err(|error| error!(%error, %url, "Failed to open local drive db"))?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items(
                id TEXT NOT NULL PRIMARY KEY,
                name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                created_time TEXT NOT NULL,
                parent TEXT REFERENCES items(id),
                content BLOB
            );
            CREATE INDEX IF NOT EXISTS items_parent ON items(parent);
        "#,
        )
        .execute(&pool)
        .await
        .map_err(Error::Sqlite)
        .inspect_err(|error| error!(%error, %url, "Failed to execute DDL to local drive db"))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Stored bytes of a file, if it exists.
    pub async fn content(&self, id: &str) -> Result<Option<Bytes>, Error> {
        let content: Option<Option<Vec<u8>>> =
            sqlx::query_scalar("SELECT content FROM items WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Sqlite)?;
        Ok(content.flatten().map(Bytes::from))
    }

    async fn ensure_folder(&self, id: Option<&str>) -> Result<(), Error> {
        let Some(id) = id else {
            return Ok(());
        };
        let found: Option<String> =
            sqlx::query_scalar("SELECT id FROM items WHERE id = ? AND mime_type = ?")
                .bind(id)
                .bind(FOLDER_MIME)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Sqlite)?;
        found
            .map(|_| ())
            .ok_or_else(|| Error::MissingParent(id.to_owned()))
    }

    async fn insert(
        &self,
        name: &str,
        mime_type: &str,
        parent: Option<&str>,
        content: Option<&[u8]>,
    ) -> Result<FileItem, Error> {
        let row = sqlx::query_as::<_, Row>(
            r#"
            INSERT INTO items(id, name, mime_type, size, created_time, parent, content)
            VALUES (lower(hex(randomblob(8))), ?, ?, ?, ?, ?, ?)
            RETURNING id, name, mime_type, size, created_time, parent
        "#,
        )
        .bind(name)
        .bind(mime_type)
        .bind(content.map_or(0, |content| content.len() as i64))
        .bind(Utc::now())
        .bind(parent)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Sqlite)?;
        Ok(row.into())
    }
}

impl RemoteStore for LocalDrive {
    type Error = Error;

    async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<String, Self::Error> {
        self.ensure_folder(parent).await?;
        let item = self.insert(name, FOLDER_MIME, parent, None).await?;
        info!(name, id = item.id, "created folder");
        Ok(item.id)
    }

    async fn upload_file(
        &self,
        blob: &FileLike,
        parent: Option<&str>,
        on_progress: ProgressFn,
    ) -> Result<FileItem, Self::Error> {
        self.ensure_folder(parent).await?;
        let mut content = Vec::with_capacity(blob.size as usize);
        let mut chunks = blob.chunks(CHUNK_SIZE);
        while let Some(chunk) = chunks.try_next().await.map_err(Error::ReadContent)? {
            content.extend_from_slice(&chunk);
            on_progress(content.len() as u64);
        }
        let item = self
            .insert(&blob.name, &blob.mime_type, parent, Some(&content))
            .await?;
        info!(name = blob.name, id = item.id, size = item.size, "stored file");
        Ok(item)
    }

    async fn list_files(
        &self,
        folder: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<FileItem>, Self::Error> {
        let search = search.map(str::trim).filter(|term| !term.is_empty());
        let rows = match search {
            None => sqlx::query_as::<_, Row>(
                r#"
                SELECT id, name, mime_type, size, created_time, parent FROM items
                WHERE parent IS ?
                ORDER BY mime_type = ? DESC, name ASC
            "#,
            )
            .bind(folder)
            .bind(FOLDER_MIME),
            Some(term) => sqlx::query_as::<_, Row>(
                r#"
                SELECT id, name, mime_type, size, created_time, parent FROM items
                WHERE (? IS NULL OR parent = ?) AND instr(lower(name), lower(?)) > 0
                ORDER BY mime_type = ? DESC, name ASC
            "#,
            )
            .bind(folder)
            .bind(folder)
            .bind(term)
            .bind(FOLDER_MIME),
        }
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Sqlite)?;
        Ok(rows.into_iter().map(FileItem::from).collect())
    }

    async fn delete_file(&self, id: &str) -> Result<(), Self::Error> {
        let result = sqlx::query(
            r#"
            WITH RECURSIVE doomed(id) AS (
                SELECT id FROM items WHERE id = ?
                UNION ALL
                SELECT items.id FROM items JOIN doomed ON items.parent = doomed.id
            )
            DELETE FROM items WHERE id IN (SELECT id FROM doomed)
        "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Sqlite)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id.to_owned()));
        }
        Ok(())
    }

    async fn download_url(&self, id: &str) -> Result<String, Self::Error> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Sqlite)?;
        found
            .map(|id| format!("local://{id}"))
            .ok_or_else(|| Error::NotFound(id.to_owned()))
    }
}
