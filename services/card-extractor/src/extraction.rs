//! Batch Orchestrator
//!
//! Runs per-file extraction with bounded parallelism and folds the outcomes
//! into a single [`BatchResult`]. A failure in one file never reaches its
//! siblings: it becomes a [`FileError`] entry and the batch carries on.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use cardex_models::{ExtractedRow, FileDescriptor, FileError, FileSource};
use cardex_utils::{normalize_row, CardexError, CardexResult};

use crate::sources::RemoteSource;
use crate::vision_client::{CardExtractor, FileMeta};

const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Outcome of one batch. Rows and errors appear in task completion order.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub rows: Vec<ExtractedRow>,
    pub errors: Vec<FileError>,
    pub files_processed: usize,
}

#[derive(Clone)]
pub struct BatchProcessor {
    extractor: Arc<dyn CardExtractor>,
    remote: Option<Arc<dyn RemoteSource>>,
}

impl BatchProcessor {
    pub fn new(extractor: Arc<dyn CardExtractor>, remote: Option<Arc<dyn RemoteSource>>) -> Self {
        Self { extractor, remote }
    }

    /// Extract every file, holding at most `concurrency` of them in flight.
    pub async fn process(
        &self,
        files: Vec<FileDescriptor>,
        concurrency: usize,
        model: &str,
    ) -> BatchResult {
        let gate = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for file in files {
            let gate = gate.clone();
            let processor = self.clone();
            let model = model.to_string();

            tasks.spawn(async move {
                let Ok(_permit) = gate.acquire_owned().await else {
                    return (file, Err(CardexError::internal("Admission gate closed")));
                };

                // A panic inside the worker surfaces as a JoinError here, so the
                // failure can still be attributed to this file.
                let target = file.clone();
                let outcome =
                    match tokio::spawn(async move { processor.process_file(&target, &model).await })
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(join_error) => {
                            Err(CardexError::internal(format!("Task failed: {}", join_error)))
                        }
                    };
                (file, outcome)
            });
        }

        let mut result = BatchResult::default();
        while let Some(joined) = tasks.join_next().await {
            let (file, outcome) = match joined {
                Ok(settled) => settled,
                Err(join_error) => {
                    error!(error = %join_error, "batch_task_aborted");
                    continue;
                }
            };

            result.files_processed += 1;
            match outcome {
                Ok(rows) => {
                    info!(file_name = %file.file_name, rows = rows.len(), "file_processed");
                    result.rows.extend(rows);
                }
                Err(error) => {
                    warn!(file_name = %file.file_name, error = %error, "file_processing_failed");
                    result.errors.push(FileError::new(
                        Some(file.file_name.clone()),
                        file.file_id().map(str::to_string),
                        error.to_string(),
                    ));
                }
            }
        }

        result
    }

    async fn process_file(
        &self,
        file: &FileDescriptor,
        model: &str,
    ) -> CardexResult<Vec<ExtractedRow>> {
        let (image_bytes, mime_type) = self.read_image(file).await?;
        let meta = FileMeta {
            file_name: file.file_name.clone(),
            file_id: file.file_id().map(str::to_string),
            file_link: file.file_link.clone(),
        };

        let raw_rows = self
            .extractor
            .extract(&image_bytes, &mime_type, &meta, model)
            .await?;

        let mut rows = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            match raw {
                Value::Object(mut object) => {
                    backfill_provenance(&mut object, &meta);
                    rows.push(normalize_row(&object));
                }
                other => {
                    warn!(file_name = %meta.file_name, row = %other, "non_object_row_skipped");
                }
            }
        }
        Ok(rows)
    }

    async fn read_image(&self, file: &FileDescriptor) -> CardexResult<(Vec<u8>, String)> {
        match &file.source {
            FileSource::Local { path } => {
                let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => {
                        CardexError::not_found(format!("Image {}", path.display()))
                    }
                    _ => CardexError::io(format!("{}: {}", path.display(), e)),
                })?;
                let mime_type = mime_guess::from_path(path)
                    .first_raw()
                    .unwrap_or(DEFAULT_MIME_TYPE)
                    .to_string();
                Ok((bytes, mime_type))
            }
            FileSource::Remote {
                remote_id,
                mime_type,
            } => {
                let remote = self
                    .remote
                    .as_ref()
                    .ok_or_else(|| CardexError::configuration("Cannot determine image source"))?;
                let bytes = remote.download(remote_id).await?;
                let mime_type = mime_type
                    .as_deref()
                    .filter(|mime| !mime.trim().is_empty())
                    .unwrap_or(DEFAULT_MIME_TYPE)
                    .to_string();
                Ok((bytes, mime_type))
            }
        }
    }
}

/// Fill `fileName`/`fileId`/`fileLink` from the file itself where the model
/// left them missing, null or blank.
fn backfill_provenance(row: &mut Map<String, Value>, meta: &FileMeta) {
    let provenance = [
        ("fileName", Some(&meta.file_name)),
        ("fileId", meta.file_id.as_ref()),
        ("fileLink", meta.file_link.as_ref()),
    ];

    for (key, value) in provenance {
        let Some(value) = value else { continue };
        let supplied = match row.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };
        if !supplied {
            row.insert(key.to_string(), Value::String(value.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns one row per image, named after the file; fails or panics on request.
    #[derive(Default)]
    struct MockExtractor {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        rows: Option<Vec<Value>>,
    }

    #[async_trait]
    impl CardExtractor for MockExtractor {
        async fn extract(
            &self,
            image_bytes: &[u8],
            _mime_type: &str,
            file_meta: &FileMeta,
            _model: &str,
        ) -> CardexResult<Vec<Value>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match image_bytes {
                b"panic" => panic!("decoder exploded"),
                b"garbage" => Err(CardexError::invalid_model_output("expected value")),
                _ => Ok(self.rows.clone().unwrap_or_else(|| {
                    vec![json!({
                        "fullName": file_meta.file_name,
                        "email1": format!("{}@cards.test", file_meta.file_name),
                    })]
                })),
            }
        }
    }

    struct MockRemote;

    #[async_trait]
    impl RemoteSource for MockRemote {
        async fn list_files(&self, _: &str, _: bool) -> CardexResult<Vec<FileDescriptor>> {
            Ok(Vec::new())
        }

        async fn download(&self, file_id: &str) -> CardexResult<Vec<u8>> {
            match file_id {
                "missing" => Err(CardexError::not_found("Drive file missing")),
                _ => Ok(b"remote-image".to_vec()),
            }
        }

        async fn check_connectivity(&self) -> bool {
            true
        }
    }

    fn write_images(dir: &Path, names: &[&str]) -> Vec<FileDescriptor> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, b"image").unwrap();
                FileDescriptor::local(*name, path)
            })
            .collect()
    }

    fn processor(extractor: Arc<MockExtractor>) -> BatchProcessor {
        BatchProcessor::new(extractor, Some(Arc::new(MockRemote)))
    }

    #[tokio::test]
    async fn test_one_unreadable_file_does_not_fail_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = write_images(dir.path(), &["a.jpg", "b.jpg", "c.png", "d.webp"]);
        files.insert(2, FileDescriptor::local("gone.jpg", dir.path().join("gone.jpg")));

        let result = processor(Arc::new(MockExtractor::default()))
            .process(files, 3, "test/model")
            .await;

        assert_eq!(result.files_processed, 5);
        assert_eq!(result.rows.len(), 4);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].file_name.as_deref(), Some("gone.jpg"));
        assert_eq!(result.errors[0].file_id, None);
    }

    #[tokio::test]
    async fn test_concurrency_bound_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..8).map(|i| format!("card{}.jpg", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let files = write_images(dir.path(), &names);

        let extractor = Arc::new(MockExtractor::default());
        let result = processor(extractor.clone()).process(files, 2, "m").await;

        assert_eq!(result.files_processed, 8);
        assert_eq!(result.rows.len(), 8);
        let peak = extractor.peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "peak in-flight was {}", peak);
    }

    #[tokio::test]
    async fn test_remote_rows_are_backfilled_and_normalized() {
        let extractor = Arc::new(MockExtractor {
            rows: Some(vec![json!({
                "fullName": "  John Doe ",
                "phone1": "+91 98765-43210",
                "fileName": null,
                "fileId": "  ",
                "fileLink": "https://model-supplied.test",
            })]),
            ..Default::default()
        });
        let files = vec![FileDescriptor::remote(
            "IMG_1.jpg",
            "drive-1",
            Some("image/png".to_string()),
            Some("https://drive.test/drive-1".to_string()),
        )];

        let result = processor(extractor).process(files, 1, "m").await;
        assert!(result.errors.is_empty());

        let row = &result.rows[0];
        assert_eq!(row.full_name.as_deref(), Some("John Doe"));
        assert_eq!(row.phone1.as_deref(), Some("919876543210"));
        assert_eq!(row.file_name.as_deref(), Some("IMG_1.jpg"));
        assert_eq!(row.file_id.as_deref(), Some("drive-1"));
        assert_eq!(row.file_link.as_deref(), Some("https://model-supplied.test"));
    }

    #[tokio::test]
    async fn test_remote_failures_carry_file_id() {
        let files = vec![
            FileDescriptor::remote("a.jpg", "missing", None, None),
            FileDescriptor::remote("b.jpg", "drive-2", None, None),
        ];

        let result = processor(Arc::new(MockExtractor::default()))
            .process(files, 2, "m")
            .await;

        assert_eq!(result.files_processed, 2);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.errors[0].file_id.as_deref(), Some("missing"));
    }

    #[tokio::test]
    async fn test_remote_file_without_source_is_per_file_error() {
        let files = vec![FileDescriptor::remote("a.jpg", "drive-1", None, None)];
        let result = BatchProcessor::new(Arc::new(MockExtractor::default()), None)
            .process(files, 1, "m")
            .await;

        assert_eq!(result.files_processed, 1);
        assert!(result.errors[0].error.contains("Cannot determine image source"));
    }

    #[tokio::test]
    async fn test_extraction_failure_and_panic_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = write_images(dir.path(), &["ok.jpg"]);
        for (name, bytes) in [("bad.jpg", b"garbage".as_slice()), ("boom.jpg", b"panic".as_slice())] {
            let path = dir.path().join(name);
            std::fs::write(&path, bytes).unwrap();
            files.push(FileDescriptor::local(name, path));
        }

        let result = processor(Arc::new(MockExtractor::default()))
            .process(files, 3, "m")
            .await;

        assert_eq!(result.files_processed, 3);
        assert_eq!(result.rows.len(), 1);

        let mut failed: Vec<_> = result
            .errors
            .iter()
            .map(|e| (e.file_name.clone().unwrap(), e.error.clone()))
            .collect();
        failed.sort();
        assert_eq!(failed[0].0, "bad.jpg");
        assert!(failed[0].1.starts_with("Invalid JSON after repair retry"));
        assert_eq!(failed[1].0, "boom.jpg");
        assert!(failed[1].1.contains("Task failed"));
    }

    #[tokio::test]
    async fn test_non_object_rows_are_skipped() {
        let extractor = Arc::new(MockExtractor {
            rows: Some(vec![json!("John Doe"), json!({"fullName": "Jane"}), json!(null)]),
            ..Default::default()
        });
        let files = vec![FileDescriptor::remote("a.jpg", "drive-1", None, None)];

        let result = processor(extractor).process(files, 1, "m").await;
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].full_name.as_deref(), Some("Jane"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let result = processor(Arc::new(MockExtractor::default()))
            .process(Vec::new(), 3, "m")
            .await;
        assert_eq!(result.files_processed, 0);
        assert!(result.rows.is_empty() && result.errors.is_empty());
    }

    #[test]
    fn test_backfill_keeps_supplied_values() {
        let meta = FileMeta {
            file_name: "card.jpg".to_string(),
            file_id: None,
            file_link: None,
        };
        let mut row = json!({"fileName": "model.jpg"}).as_object().cloned().unwrap();
        backfill_provenance(&mut row, &meta);

        assert_eq!(row["fileName"], "model.jpg");
        assert!(!row.contains_key("fileId"));
        assert!(!row.contains_key("fileLink"));
    }
}
