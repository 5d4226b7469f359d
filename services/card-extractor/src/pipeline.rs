//! Pipeline Facade
//!
//! Validates a batch request, discovers its files, runs the orchestrator,
//! deduplicates the rows and forwards them to the export sink.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use cardex_models::{BatchRequest, BatchResponse, BatchSource, ExtractedRow, FileDescriptor, FileError};
use cardex_utils::{
    deduplicate_rows, resolve_model, validate_model, AppConfig, CardexError, CardexResult,
};

use crate::extraction::BatchProcessor;
use crate::sheets::RowSink;
use crate::sources::{scan_folder, RemoteSource};
use crate::vision_client::CardExtractor;

pub struct BatchPipeline {
    config: Arc<AppConfig>,
    extractor: Arc<dyn CardExtractor>,
    drive: Option<Arc<dyn RemoteSource>>,
    sheets: Option<Arc<dyn RowSink>>,
}

impl BatchPipeline {
    pub fn new(
        config: Arc<AppConfig>,
        extractor: Arc<dyn CardExtractor>,
        drive: Option<Arc<dyn RemoteSource>>,
        sheets: Option<Arc<dyn RowSink>>,
    ) -> Self {
        Self {
            config,
            extractor,
            drive,
            sheets,
        }
    }

    /// Run one batch end to end.
    ///
    /// Fails only on request validation, model resolution or file discovery;
    /// everything after that is reported inside the response.
    pub async fn run(&self, request: BatchRequest) -> CardexResult<BatchResponse> {
        validate_model(&request)?;
        let source = request.source().ok_or_else(|| {
            CardexError::validation("source", "Provide exactly one of 'driveFolderId' or 'localFolderPath'")
        })?;

        let openrouter = &self.config.openrouter;
        let model = resolve_model(
            request.model.as_deref(),
            &openrouter.default_model,
            &openrouter.allowed_models(),
        )?;

        let mut files = self.discover(&source, request.recursive).await?;
        let files_found = files.len();
        files.truncate(request.max_files as usize);

        info!(
            mode = ?source.mode(),
            model = %model,
            files_found,
            files_selected = files.len(),
            concurrency = request.concurrency,
            "batch_started"
        );

        let processor = BatchProcessor::new(self.extractor.clone(), self.drive.clone());
        let result = processor
            .process(files, request.concurrency as usize, &model)
            .await;

        let rows_extracted = result.rows.len();
        let rows = deduplicate_rows(result.rows);
        let mut errors = result.errors;
        let mut rows_appended = 0;

        if !request.dry_run {
            if let Some(sheet_id) = self.sheet_id(request.sheet_id.as_deref()) {
                let tab = self
                    .config
                    .google
                    .sheet_name_or_default(request.sheet_name.as_deref());
                match self.export(&sheet_id, &tab, &rows).await {
                    Ok(appended) => rows_appended = appended,
                    Err(export_error) => {
                        error!(sheet_id = %sheet_id, error = %export_error, "sheets_append_failed");
                        errors.push(FileError::new(None, None, format!("Sheets: {}", export_error)));
                    }
                }
            }
        }

        info!(
            files_found,
            files_processed = result.files_processed,
            rows_extracted,
            rows_unique = rows.len(),
            rows_appended,
            errors = errors.len(),
            "batch_complete"
        );

        Ok(BatchResponse {
            status: "ok".to_string(),
            folder_mode: source.mode(),
            model_used: model,
            files_found,
            files_processed: result.files_processed,
            rows_extracted,
            rows_appended,
            dry_run: request.dry_run,
            errors,
            rows,
        })
    }

    async fn discover(
        &self,
        source: &BatchSource,
        recursive: bool,
    ) -> CardexResult<Vec<FileDescriptor>> {
        match source {
            BatchSource::Local { folder_path } => scan_folder(PathBuf::from(folder_path)).await,
            BatchSource::Drive { folder_id } => {
                let drive = self.drive.as_ref().ok_or_else(|| {
                    CardexError::configuration("Google Drive credentials are not configured")
                })?;
                drive.list_files(folder_id, recursive).await
            }
        }
    }

    async fn export(&self, sheet_id: &str, tab: &str, rows: &[ExtractedRow]) -> CardexResult<usize> {
        let sheets = self.sheets.as_ref().ok_or_else(|| {
            CardexError::configuration("Google Sheets credentials are not configured")
        })?;
        sheets.append_rows(sheet_id, tab, rows).await
    }

    fn sheet_id(&self, requested: Option<&str>) -> Option<String> {
        requested
            .filter(|id| !id.trim().is_empty())
            .or(self.config.google.default_sheet_id.as_deref())
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
    }
}
