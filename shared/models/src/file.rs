use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the bytes of an image live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FileSource {
    /// File on the local filesystem.
    Local { path: PathBuf },
    /// File held by a remote store, addressed by its handle.
    #[serde(rename_all = "camelCase")]
    Remote {
        remote_id: String,
        mime_type: Option<String>,
    },
}

/// Input unit of a batch: one image discovered by a folder scan or remote listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_name: String,
    pub source: FileSource,
    pub file_link: Option<String>,
}

impl FileDescriptor {
    pub fn local(file_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            source: FileSource::Local { path: path.into() },
            file_link: None,
        }
    }

    pub fn remote(
        file_name: impl Into<String>,
        remote_id: impl Into<String>,
        mime_type: Option<String>,
        file_link: Option<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            source: FileSource::Remote {
                remote_id: remote_id.into(),
                mime_type,
            },
            file_link,
        }
    }

    /// Remote handle, reported as `fileId` in rows and errors. Local files have none.
    pub fn file_id(&self) -> Option<&str> {
        match &self.source {
            FileSource::Local { .. } => None,
            FileSource::Remote { remote_id, .. } => Some(remote_id.as_str()),
        }
    }
}
