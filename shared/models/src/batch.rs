//! Request and response shapes of the batch extraction endpoint.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::row::{ExtractedRow, FileError};

pub const DEFAULT_MAX_FILES: u32 = 200;
pub const DEFAULT_CONCURRENCY: u32 = 3;

/// POST /batch/folder request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_exactly_one_source", skip_on_field_errors = false))]
pub struct BatchRequest {
    #[serde(default)]
    pub drive_folder_id: Option<String>,
    #[serde(default)]
    pub local_folder_path: Option<String>,
    /// Walk Drive sub-folders; local folders are always walked recursively.
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub sheet_id: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_max_files")]
    #[validate(range(min = 1, message = "maxFiles must be at least 1"))]
    pub max_files: u32,
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 20, message = "concurrency must be between 1 and 20"))]
    pub concurrency: u32,
    #[serde(default)]
    pub model: Option<String>,
}

/// The image folder a batch reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchSource {
    Drive { folder_id: String },
    Local { folder_path: String },
}

impl BatchSource {
    pub fn mode(&self) -> FolderMode {
        match self {
            Self::Drive { .. } => FolderMode::Drive,
            Self::Local { .. } => FolderMode::Local,
        }
    }
}

impl BatchRequest {
    /// The single source folder, or `None` when zero or two sources are set.
    pub fn source(&self) -> Option<BatchSource> {
        match (non_blank(&self.drive_folder_id), non_blank(&self.local_folder_path)) {
            (Some(folder_id), None) => Some(BatchSource::Drive {
                folder_id: folder_id.to_string(),
            }),
            (None, Some(folder_path)) => Some(BatchSource::Local {
                folder_path: folder_path.to_string(),
            }),
            _ => None,
        }
    }
}

impl Default for BatchRequest {
    fn default() -> Self {
        Self {
            drive_folder_id: None,
            local_folder_path: None,
            recursive: false,
            sheet_id: None,
            sheet_name: None,
            dry_run: false,
            max_files: DEFAULT_MAX_FILES,
            concurrency: DEFAULT_CONCURRENCY,
            model: None,
        }
    }
}

fn default_max_files() -> u32 {
    DEFAULT_MAX_FILES
}

fn default_concurrency() -> u32 {
    DEFAULT_CONCURRENCY
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn validate_exactly_one_source(request: &BatchRequest) -> Result<(), ValidationError> {
    if request.source().is_none() {
        let mut error = ValidationError::new("exactly_one_source");
        error.message = Some(
            "Provide exactly one of 'driveFolderId' or 'localFolderPath' (not both, not neither)."
                .into(),
        );
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FolderMode {
    Drive,
    Local,
}

/// POST /batch/folder response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub status: String,
    pub folder_mode: FolderMode,
    pub model_used: String,
    pub files_found: usize,
    pub files_processed: usize,
    pub rows_extracted: usize,
    pub rows_appended: usize,
    pub dry_run: bool,
    pub errors: Vec<FileError>,
    pub rows: Vec<ExtractedRow>,
}
