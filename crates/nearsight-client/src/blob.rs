use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nearsight_core::{Error, Result};
use tempfile::NamedTempFile;
use tokio::fs as async_fs;
use tokio::io::{self as async_io, AsyncWriteExt as _};

use crate::filename::sanitize_filename;

/// Highest ` (n)` suffix tried before a save gives up.
const MAX_DUPLICATES: u32 = 999;

/// Downloaded bytes staged in a temporary file until they are saved.
///
/// Owned by a single download. The backing file is removed exactly once, either
/// by [`StagedBlob::release`] or when the blob is dropped.
#[derive(Debug)]
pub struct StagedBlob {
    /// Backing file; `None` once released
    file: Option<NamedTempFile>,
    /// Location of the backing file
    path: PathBuf,
    /// Number of staged bytes
    len: u64,
}

impl StagedBlob {
    /// Stages `bytes` in the system temporary directory.
    ///
    /// # Errors
    /// Returns an error if the temporary file cannot be created or written.
    pub fn stage(bytes: &[u8]) -> Result<Self> {
        Self::from_file(NamedTempFile::new()?, bytes)
    }

    /// Stages `bytes` in `dir`.
    ///
    /// # Errors
    /// Returns an error if the temporary file cannot be created or written.
    pub fn stage_in(dir: &Path, bytes: &[u8]) -> Result<Self> {
        Self::from_file(NamedTempFile::new_in(dir)?, bytes)
    }

    fn from_file(mut file: NamedTempFile, bytes: &[u8]) -> Result<Self> {
        file.write_all(bytes)?;
        file.flush()?;
        let path = file.path().to_path_buf();
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "staged blob");
        Ok(Self {
            file: Some(file),
            path,
            len: bytes.len() as u64,
        })
    }

    /// Location of the staged bytes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of staged bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether nothing was staged.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the backing file has been removed.
    pub fn is_released(&self) -> bool {
        self.file.is_none()
    }

    /// Removes the backing file.
    ///
    /// # Errors
    /// Returns an error if the file could not be deleted.
    pub fn release(mut self) -> Result<()> {
        self.release_once()
    }

    fn release_once(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.close()?;
            tracing::debug!(path = %self.path.display(), "released staged blob");
        }
        Ok(())
    }
}

impl Drop for StagedBlob {
    fn drop(&mut self) {
        if let Err(error) = self.release_once() {
            tracing::warn!(path = %self.path.display(), %error, "failed to release staged blob");
        }
    }
}

/// Destination a staged download is saved to.
#[async_trait]
pub trait SaveTarget: Send + Sync {
    /// Saves the staged bytes under `filename`, returning where they ended up.
    ///
    /// # Errors
    /// Returns an error if the bytes cannot be written.
    async fn save(&self, blob: &StagedBlob, filename: &str) -> Result<PathBuf>;
}

/// Saves downloads into a directory, never overwriting an existing file.
///
/// A taken name gets a ` (n)` suffix before the extension, so a second
/// `bike.jpg` lands in `bike (1).jpg`.
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    /// Output directory, created on first save
    dir: PathBuf,
}

impl DirectoryTarget {
    /// Creates a target writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the first free variant of `name` in the output directory.
    async fn create_unique(&self, name: &str) -> Result<(PathBuf, async_fs::File)> {
        for attempt in 0..=MAX_DUPLICATES {
            let candidate = self.dir.join(numbered(name, attempt));
            match async_fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(file) => return Ok((candidate, file)),
                Err(error) if error.kind() == ErrorKind::AlreadyExists => {}
                Err(error) => return Err(error.into()),
            }
        }
        Err(Error::Other(format!(
            "too many copies of {name} in {}",
            self.dir.display()
        )))
    }
}

/// `name` with ` (attempt)` inserted before the extension; `name` itself for attempt 0.
fn numbered(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_owned();
    }
    let path = Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(extension)) => format!(
            "{} ({attempt}).{}",
            stem.to_string_lossy(),
            extension.to_string_lossy()
        ),
        _ => format!("{name} ({attempt})"),
    }
}

#[async_trait]
impl SaveTarget for DirectoryTarget {
    async fn save(&self, blob: &StagedBlob, filename: &str) -> Result<PathBuf> {
        let name = sanitize_filename(filename)
            .ok_or_else(|| Error::Other(format!("cannot save under {filename:?}")))?;

        async_fs::create_dir_all(&self.dir).await?;
        let (destination, mut file) = self.create_unique(&name).await?;
        let mut source = async_fs::File::open(blob.path()).await?;
        let written = async_io::copy(&mut source, &mut file).await?;
        file.flush().await?;

        tracing::info!(
            path = %destination.display(),
            bytes = written,
            "saved download"
        );
        Ok(destination)
    }
}
