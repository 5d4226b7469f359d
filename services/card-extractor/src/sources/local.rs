//! Local folder scanning

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use cardex_models::FileDescriptor;
use cardex_utils::{is_valid_image_extension, CardexError, CardexResult};

/// Walk `folder` on the blocking pool.
pub async fn scan_folder(folder: PathBuf) -> CardexResult<Vec<FileDescriptor>> {
    tokio::task::spawn_blocking(move || scan_folder_blocking(&folder))
        .await
        .map_err(|e| CardexError::internal(format!("Folder scan task failed: {}", e)))?
}

/// Image files anywhere under `folder`, sorted by path. The request's
/// `recursive` flag only governs Drive listings.
pub fn scan_folder_blocking(folder: &Path) -> CardexResult<Vec<FileDescriptor>> {
    if !folder.is_dir() {
        return Err(CardexError::not_found(format!("Folder {}", folder.display())));
    }

    let mut paths: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(folder).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!(folder = %folder.display(), error = %error, "folder_entry_skipped");
                continue;
            }
        };
        if entry.file_type().is_file() && is_valid_image_extension(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    paths.sort();
    debug!(folder = %folder.display(), files = paths.len(), "local_folder_scanned");

    Ok(paths
        .into_iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            FileDescriptor::local(file_name, path)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"img").unwrap();
    }

    #[test]
    fn test_only_image_extensions_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "c.jpeg", "d.webp", "notes.txt", "scan.pdf", "noext"] {
            touch(&dir.path().join(name));
        }

        let files = scan_folder_blocking(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg", "d.webp"]);
        assert!(files.iter().all(|f| f.file_id().is_none()));
    }

    #[test]
    fn test_nested_images_are_always_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("top.jpg"));
        touch(&dir.path().join("event/nested.png"));
        touch(&dir.path().join("event/day1/deep.webp"));

        let files = scan_folder_blocking(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["deep.webp", "nested.png", "top.jpg"]);
    }

    #[test]
    fn test_directory_named_like_image_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("album.jpg")).unwrap();
        assert!(scan_folder_blocking(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_folder_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let error = scan_folder_blocking(&dir.path().join("missing")).unwrap_err();
        assert_eq!(error.http_status_code(), 404);
    }

    #[tokio::test]
    async fn test_async_scan_matches_blocking() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("card.jpg"));

        let files = scan_folder(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(files, scan_folder_blocking(dir.path()).unwrap());
    }
}
