use std::path::{Path, PathBuf};

use nearsight_core::{Error, Result};
use tokio::fs as async_fs;

/// A file read from disk, ready to be sent as one multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// File name without directories; also the part name
    pub name: String,
    /// File contents
    pub bytes: Vec<u8>,
}

/// Reads every file named by `paths`.
///
/// A directory contributes the regular files directly inside it, sorted by path;
/// subdirectories are skipped.
///
/// # Errors
/// Returns an error if a path does not exist or a file cannot be read.
pub async fn collect_uploads(paths: &[PathBuf]) -> Result<Vec<UploadFile>> {
    let mut files = Vec::new();
    for path in paths {
        if async_fs::metadata(path).await?.is_dir() {
            let mut children = Vec::new();
            let mut entries = async_fs::read_dir(path).await?;
            while let Some(entry) = entries.next_entry().await? {
                let child = entry.path();
                if async_fs::metadata(&child).await?.is_file() {
                    children.push(child);
                }
            }
            children.sort();
            for child in children {
                files.push(read_upload(&child).await?);
            }
        } else {
            files.push(read_upload(path).await?);
        }
    }
    Ok(files)
}

async fn read_upload(path: &Path) -> Result<UploadFile> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Other(format!("{} has no file name", path.display())))?;
    let bytes = async_fs::read(path).await?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "read upload");
    Ok(UploadFile { name, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_directory_expands_to_sorted_files() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp.path().join("b.jpg"), b"bee").expect("writable");
        fs::write(temp.path().join("a.jpg"), b"ay").expect("writable");
        fs::create_dir(temp.path().join("nested")).expect("creatable");
        fs::write(temp.path().join("nested").join("c.jpg"), b"sea").expect("writable");

        let files = collect_uploads(&[temp.path().to_path_buf()])
            .await
            .expect("collectable");

        let names: Vec<_> = files.iter().map(|file| file.name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "b.jpg"]);
        assert_eq!(files[0].bytes, b"ay");
    }

    #[tokio::test]
    async fn test_files_keep_argument_order() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let second = temp.path().join("z.png");
        let first = temp.path().join("m.png");
        fs::write(&second, b"z").expect("writable");
        fs::write(&first, b"m").expect("writable");

        let files = collect_uploads(&[second, first]).await.expect("collectable");
        let names: Vec<_> = files.iter().map(|file| file.name.as_str()).collect();
        assert_eq!(names, ["z.png", "m.png"]);
    }

    #[tokio::test]
    async fn test_missing_path_is_io_error() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let result = collect_uploads(&[temp.path().join("absent.jpg")]).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
