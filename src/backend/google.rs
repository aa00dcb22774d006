use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt as _, TryStreamExt as _};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    store::{FOLDER_MIME, FileItem, ProgressFn, RemoteStore},
    walk::{CHUNK_SIZE, FileLike},
};

pub const API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const BOUNDARY: &str = "driveflow_boundary";
const FILE_FIELDS: &str = "id,name,mimeType,size,createdTime,parents";
const ROOT_FOLDER: &str = "root";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("drive request failed. status: {code}, message: {message}")]
    Fail {
        code: reqwest::StatusCode,
        message: String,
    },
    #[error("failed to encode metadata: {0}")]
    EncodeMetadata(serde_json::Error),
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
struct ErrorInfo {
    code: u16,
    message: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
struct ErrorResponse {
    error: ErrorInfo,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    #[serde(default)]
    size: Option<String>,
    created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    parents: Option<Vec<String>>,
}

impl From<DriveFile> for FileItem {
    fn from(file: DriveFile) -> Self {
        FileItem {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            size: file
                .size
                .and_then(|size| size.parse().ok())
                .unwrap_or_default(),
            created_time: file.created_time.unwrap_or_else(Utc::now),
            parents: file.parents,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CreatedFolder {
    id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DownloadLink {
    web_content_link: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Metadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parents: Option<[&'a str; 1]>,
}

/// Drive v3 REST client authenticated with a bearer token.
pub struct Client {
    token: String,
    api_base: String,
    upload_base: String,
    client: reqwest::Client,
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn listing_query(folder: Option<&str>, search: Option<&str>) -> String {
    let search = search.map(str::trim).filter(|term| !term.is_empty());
    match (folder, search) {
        (folder, None) => format!(
            "'{}' in parents and trashed=false",
            escape_query(folder.unwrap_or(ROOT_FOLDER))
        ),
        (Some(folder), Some(term)) => format!(
            "'{}' in parents and name contains '{}' and trashed=false",
            escape_query(folder),
            escape_query(term)
        ),
        (None, Some(term)) => format!(
            "name contains '{}' and trashed=false",
            escape_query(term)
        ),
    }
}

impl Client {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_endpoints(token, API_BASE, UPLOAD_BASE)
    }

    pub fn with_endpoints(
        token: impl Into<String>,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            upload_base: upload_base.into().trim_end_matches('/').to_owned(),
            client: reqwest::Client::new(),
        }
    }

    fn file_endpoint(&self, id: &str) -> String {
        format!("{}/files/{}", self.api_base, urlencoding::encode(id))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, Error> {
        let code = response.status();
        if code.is_success() {
            return Ok(response);
        }
        let body = response.text().await.map_err(Error::Transport)?;
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|response| format!("{} ({})", response.error.message, response.error.code))
            .unwrap_or(body);
        Err(Error::Fail { code, message })
    }
}

impl RemoteStore for Client {
    type Error = Error;

    async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<String, Self::Error> {
        let metadata = Metadata {
            name,
            mime_type: Some(FOLDER_MIME),
            parents: parent.map(|parent| [parent]),
        };
        let response = self
            .client
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&self.token)
            .query(&[("fields", "id")])
            .json(&metadata)
            .send()
            .await
            .map_err(Error::Transport)?;
        let folder = Self::check(response)
            .await
            .inspect_err(|error| error!(%error, name, "failed to create folder"))?
            .json::<CreatedFolder>()
            .await
            .map_err(Error::Transport)?;
        info!(name, id = folder.id, "created folder");
        Ok(folder.id)
    }

    async fn upload_file(
        &self,
        blob: &FileLike,
        parent: Option<&str>,
        on_progress: ProgressFn,
    ) -> Result<FileItem, Self::Error> {
        let metadata = serde_json::to_string(&Metadata {
            name: &blob.name,
            mime_type: Some(&blob.mime_type),
            parents: parent.map(|parent| [parent]),
        })
        .map_err(Error::EncodeMetadata)?;
        let head = Bytes::from(format!(
            "--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{BOUNDARY}\r\nContent-Type: {}\r\n\r\n",
            blob.mime_type
        ));
        let tail = Bytes::from(format!("\r\n--{BOUNDARY}--"));

        let sent = Arc::new(AtomicU64::new(0));
        let content = blob.chunks(CHUNK_SIZE).map_ok(move |chunk| {
            let total = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
            on_progress(total);
            chunk
        });
        let body = futures::stream::once(async move { Ok::<_, std::io::Error>(head) })
            .chain(content)
            .chain(futures::stream::once(async move { Ok(tail) }));

        debug!(name = blob.name, size = blob.size, "upload file");
        let response = self
            .client
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&self.token)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={BOUNDARY}"),
            )
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(Error::Transport)?;
        let file = Self::check(response)
            .await
            .inspect_err(|error| error!(%error, name = blob.name, "failed to upload file"))?
            .json::<DriveFile>()
            .await
            .map_err(Error::Transport)?;
        Ok(file.into())
    }

    async fn list_files(
        &self,
        folder: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<FileItem>, Self::Error> {
        let query = listing_query(folder, search);
        let fields = format!("nextPageToken,files({FILE_FIELDS})");
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get(format!("{}/files", self.api_base))
                .bearer_auth(&self.token)
                .query(&[
                    ("q", query.as_str()),
                    ("fields", fields.as_str()),
                    ("orderBy", "folder,name"),
                    ("pageSize", "1000"),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let response = request.send().await.map_err(Error::Transport)?;
            let list = Self::check(response)
                .await
                .inspect_err(|error| error!(%error, query, "failed to list files"))?
                .json::<DriveFileList>()
                .await
                .map_err(Error::Transport)?;
            items.extend(list.files.into_iter().map(FileItem::from));
            match list.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(items)
    }

    async fn delete_file(&self, id: &str) -> Result<(), Self::Error> {
        let response = self
            .client
            .delete(self.file_endpoint(id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::check(response)
            .await
            .inspect_err(|error| error!(%error, id, "failed to delete file"))?;
        Ok(())
    }

    async fn download_url(&self, id: &str) -> Result<String, Self::Error> {
        let response = self
            .client
            .get(self.file_endpoint(id))
            .bearer_auth(&self.token)
            .query(&[("fields", "webContentLink")])
            .send()
            .await
            .map_err(Error::Transport)?;
        let link = Self::check(response)
            .await
            .inspect_err(|error| error!(%error, id, "failed to resolve download url"))?
            .json::<DownloadLink>()
            .await
            .map_err(Error::Transport)?;
        Ok(link
            .web_content_link
            .unwrap_or_else(|| format!("{}?alt=media", self.file_endpoint(id))))
    }
}
