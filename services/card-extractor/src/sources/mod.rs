//! Image sources
//!
//! Where batch inputs come from: a local folder walk or a remote store that
//! can list a folder and download individual files.

use async_trait::async_trait;

use cardex_models::FileDescriptor;
use cardex_utils::CardexResult;

pub mod drive;
pub mod local;

pub use drive::DriveService;
pub use local::scan_folder;

/// A remote image store addressed by opaque folder and file handles.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn list_files(&self, folder_id: &str, recursive: bool)
        -> CardexResult<Vec<FileDescriptor>>;

    async fn download(&self, file_id: &str) -> CardexResult<Vec<u8>>;

    async fn check_connectivity(&self) -> bool;
}
