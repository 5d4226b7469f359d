//! Google Drive image source
//!
//! Lists JPEG/PNG/WebP files in a Drive folder and downloads their bytes.
//! Sub-folders are walked iteratively from a worklist; a visited set keeps
//! shortcuts and multi-parent folders from being listed twice.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info};

use cardex_models::FileDescriptor;
use cardex_utils::{CardexError, CardexResult};

use super::RemoteSource;
use crate::google_auth::GoogleAuth;

pub const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";

const IMAGE_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const PAGE_SIZE: &str = "1000";
const FILE_FIELDS: &str = "nextPageToken, files(id, name, webViewLink, mimeType)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: Option<String>,
    web_view_link: Option<String>,
}

pub struct DriveService {
    client: Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
}

impl DriveService {
    pub fn new(client: Client, auth: Arc<GoogleAuth>) -> Self {
        Self {
            client,
            auth,
            base_url: DRIVE_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `{base}/files/{file_id}` with the id escaped as a single path segment.
    fn file_url(&self, file_id: &str) -> CardexResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CardexError::configuration(format!("Drive API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| CardexError::configuration("Drive API URL cannot be a base"))?
            .extend(["files", file_id]);
        Ok(url)
    }

    /// Every page of results for a `files.list` query.
    async fn query_all(&self, query: &str) -> CardexResult<Vec<DriveFile>> {
        let token = self.auth.access_token().await?;
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query),
                ("pageSize", PAGE_SIZE),
                ("fields", FILE_FIELDS),
            ];
            if let Some(page) = page_token.as_deref() {
                params.push(("pageToken", page));
            }

            let response = self
                .client
                .get(format!("{}/files", self.base_url))
                .bearer_auth(&token)
                .query(&params)
                .send()
                .await
                .map_err(drive_error)?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(CardexError::external_service(
                    "Google Drive",
                    format!("HTTP {}: {}", status, error_text),
                ));
            }

            let page: FileList = response.json().await.map_err(drive_error)?;
            files.extend(page.files);

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl RemoteSource for DriveService {
    async fn list_files(
        &self,
        folder_id: &str,
        recursive: bool,
    ) -> CardexResult<Vec<FileDescriptor>> {
        let mut worklist = VecDeque::from([folder_id.to_string()]);
        let mut visited = HashSet::new();
        let mut descriptors = Vec::new();

        while let Some(folder) = worklist.pop_front() {
            if !visited.insert(folder.clone()) {
                continue;
            }

            for file in self.query_all(&image_query(&folder)).await? {
                descriptors.push(FileDescriptor::remote(
                    file.name,
                    file.id,
                    file.mime_type,
                    file.web_view_link,
                ));
            }

            if recursive {
                let subfolders = self.query_all(&folder_query(&folder)).await?;
                debug!(folder_id = %folder, subfolders = subfolders.len(), "drive_folder_listed");
                worklist.extend(
                    subfolders
                        .into_iter()
                        .map(|sub| sub.id)
                        .filter(|id| !visited.contains(id)),
                );
            }
        }

        info!(
            folder_id = %folder_id,
            recursive,
            folders = visited.len(),
            files = descriptors.len(),
            "drive_files_listed"
        );
        Ok(descriptors)
    }

    async fn download(&self, file_id: &str) -> CardexResult<Vec<u8>> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .get(self.file_url(file_id)?)
            .bearer_auth(&token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(drive_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CardexError::not_found(format!("Drive file {}", file_id)));
        }
        if !status.is_success() {
            return Err(CardexError::external_service(
                "Google Drive",
                format!("HTTP {} downloading {}", status, file_id),
            ));
        }

        let bytes = response.bytes().await.map_err(drive_error)?;
        Ok(bytes.to_vec())
    }

    async fn check_connectivity(&self) -> bool {
        let Ok(token) = self.auth.access_token().await else {
            return false;
        };
        let response = self
            .client
            .get(format!("{}/files", self.base_url))
            .bearer_auth(&token)
            .query(&[("pageSize", "1"), ("fields", "files(id)")])
            .send()
            .await;

        matches!(response, Ok(r) if r.status().is_success())
    }
}

fn drive_error(error: reqwest::Error) -> CardexError {
    CardexError::external_service("Google Drive", error.to_string())
}

/// Quote a value for use inside a Drive query string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn image_query(folder_id: &str) -> String {
    let mime_filter = IMAGE_MIME_TYPES
        .iter()
        .map(|mime| format!("mimeType='{}'", mime))
        .collect::<Vec<_>>()
        .join(" or ");
    format!("{} in parents and trashed=false and ({})", quote(folder_id), mime_filter)
}

fn folder_query(folder_id: &str) -> String {
    format!(
        "{} in parents and trashed=false and mimeType='{}'",
        quote(folder_id),
        FOLDER_MIME_TYPE
    )
}
