use std::path::PathBuf;

use nearsight_core::{
    AssetId, BackendConfig, DisplayRef, DownloadArtifact, Error, FilenameSource, MatchRecord,
    Result, join_endpoint, parse_base_url,
};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::blob::{SaveTarget, StagedBlob};
use crate::filename::{fallback_filename, parse_content_disposition, sanitize_filename};
use crate::upload::collect_uploads;

/// Original asset endpoint on the gateway.
const FETCH_RAW_PATH: &str = "fetch_raw";
/// Multipart upload endpoint on the gateway.
const UPLOAD_RAW_PATH: &str = "upload_raw";

/// Step of a single download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    /// Not started.
    Idle,
    /// Waiting for the original bytes.
    Fetching,
    /// Recovering the filename.
    Parsing,
    /// Handing the staged bytes to the save target.
    Saving,
    /// Saved and the staged bytes released.
    Released,
    /// Fetch or save failed; the error went to the caller.
    Failed,
}

/// Outcome of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// What was downloaded
    pub artifact: DownloadArtifact,
    /// Where the save target put it
    pub saved_to: PathBuf,
    /// States visited, in order
    pub transitions: Vec<DownloadState>,
}

/// Transition log for one download.
struct Progress<'id> {
    /// Asset being downloaded
    id: &'id AssetId,
    /// States visited so far
    transitions: Vec<DownloadState>,
}

impl<'id> Progress<'id> {
    fn new(id: &'id AssetId) -> Self {
        Self {
            id,
            transitions: vec![DownloadState::Idle],
        }
    }

    fn advance(&mut self, state: DownloadState) {
        tracing::debug!(id = %self.id, ?state, "download transition");
        self.transitions.push(state);
    }

    fn fail(&mut self, error: Error) -> Error {
        self.advance(DownloadState::Failed);
        tracing::warn!(
            id = %self.id,
            kind = error.kind(),
            %error,
            transitions = ?self.transitions,
            "download failed"
        );
        error
    }
}

/// Response payload of `POST /upload_raw`.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    /// Ids assigned to the uploaded files, in upload order.
    ids: Vec<String>,
}

/// Turns matches into displayable references, downloads originals and uploads new ones.
pub struct AssetRetriever {
    /// HTTP client for asset requests.
    client: Client,
    /// Base URL of the asset gateway.
    base_url: Url,
}

impl AssetRetriever {
    /// Creates a retriever for the asset gateway at `asset_url`.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse.
    pub fn new(asset_url: &str) -> Result<Self> {
        Ok(Self {
            client: Client::default(),
            base_url: parse_base_url("asset_url", asset_url)?,
        })
    }

    /// Creates a retriever from configuration.
    ///
    /// # Errors
    /// Returns an error if the configured asset URL is invalid.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.asset_url)
    }

    /// Replaces the HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Reference a renderer can show for `record`. Pure and idempotent.
    pub fn display(&self, record: &MatchRecord) -> DisplayRef {
        record.display_ref()
    }

    /// URL of the original bytes for `id`.
    ///
    /// # Errors
    /// Returns an error if the base URL cannot carry a path.
    pub fn raw_url(&self, id: &AssetId) -> Result<Url> {
        let mut url = join_endpoint(&self.base_url, FETCH_RAW_PATH)?;
        url.query_pairs_mut().append_pair("id", id.as_str());
        Ok(url)
    }

    /// Fetches the original asset and recovers its filename.
    ///
    /// A missing or malformed `Content-Disposition` header never fails the call;
    /// the filename falls back to one derived from `id`.
    ///
    /// # Errors
    /// Returns [`Error::Network`] on transport failure and [`Error::Backend`] on a
    /// non-success status.
    pub async fn fetch_original(&self, id: &AssetId) -> Result<DownloadArtifact> {
        let (bytes, disposition) = self.fetch_raw(id).await?;
        Ok(artifact_from(id, bytes, disposition.as_deref()))
    }

    /// Downloads the original asset into `target`.
    ///
    /// The bytes are staged in a temporary file that is released exactly once,
    /// whether or not the save succeeds.
    ///
    /// # Errors
    /// Returns the fetch error, or the save error after the staged bytes are released.
    pub async fn download_original(
        &self,
        id: &AssetId,
        target: &dyn SaveTarget,
    ) -> Result<DownloadReport> {
        let mut progress = Progress::new(id);
        match self.run_download(id, target, &mut progress).await {
            Ok((artifact, saved_to)) => Ok(DownloadReport {
                artifact,
                saved_to,
                transitions: progress.transitions,
            }),
            Err(error) => Err(progress.fail(error)),
        }
    }

    /// Uploads the files at `paths` and returns the ids the gateway assigned.
    ///
    /// Directories contribute the regular files directly inside them. Each file is
    /// sent as a multipart part named after the file.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if a file cannot be read, [`Error::Network`] on
    /// transport failure and [`Error::Backend`] on a non-success status or
    /// malformed response.
    pub async fn upload(&self, paths: &[PathBuf]) -> Result<Vec<AssetId>> {
        let files = collect_uploads(paths).await?;
        if files.is_empty() {
            return Err(Error::Other("no files to upload".to_owned()));
        }

        let count = files.len();
        let form = files.into_iter().fold(Form::new(), |form, file| {
            let part = Part::bytes(file.bytes).file_name(file.name.clone());
            form.part(file.name, part)
        });

        let url = join_endpoint(&self.base_url, UPLOAD_RAW_PATH)?;
        tracing::debug!(%url, files = count, "uploading assets");

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| Error::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend(format!("upload_raw returned {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|err| Error::Network(format!("failed to read body: {err}")))?;
        let uploaded: UploadResponse = serde_json::from_str(&body)
            .map_err(|err| Error::Backend(format!("malformed upload response: {err}")))?;

        tracing::info!(files = count, ids = uploaded.ids.len(), "uploaded assets");
        Ok(uploaded.ids.into_iter().map(AssetId::new).collect())
    }

    /// Steps through fetch, parse and save, recording each state in `progress`.
    async fn run_download(
        &self,
        id: &AssetId,
        target: &dyn SaveTarget,
        progress: &mut Progress<'_>,
    ) -> Result<(DownloadArtifact, PathBuf)> {
        progress.advance(DownloadState::Fetching);
        let (bytes, disposition) = self.fetch_raw(id).await?;

        progress.advance(DownloadState::Parsing);
        let artifact = artifact_from(id, bytes, disposition.as_deref());

        progress.advance(DownloadState::Saving);
        let saved_to = save_staged(&artifact, target).await?;

        progress.advance(DownloadState::Released);
        Ok((artifact, saved_to))
    }

    /// Body and `Content-Disposition` value of `GET fetch_raw?id=<id>`.
    async fn fetch_raw(&self, id: &AssetId) -> Result<(Vec<u8>, Option<String>)> {
        let url = self.raw_url(id)?;
        tracing::debug!(%url, "fetching original asset");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| Error::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend(format!("fetch_raw returned {status}")));
        }

        // Servers send raw UTF-8 filenames, which are not visible ASCII.
        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

        let bytes = response
            .bytes()
            .await
            .map_err(|err| Error::Network(format!("failed to read body: {err}")))?;
        Ok((bytes.to_vec(), disposition))
    }
}

/// Builds the artifact, recovering from any filename problem with the fallback name.
fn artifact_from(id: &AssetId, bytes: Vec<u8>, disposition: Option<&str>) -> DownloadArtifact {
    let parsed = disposition.map(|header| {
        parse_content_disposition(header).and_then(|name| {
            sanitize_filename(&name)
                .ok_or_else(|| Error::Parse(format!("unusable filename {name:?}")))
        })
    });

    let (filename, filename_source) = match parsed {
        Some(Ok(name)) => (name, FilenameSource::Header),
        Some(Err(error)) => {
            tracing::debug!(%id, %error, "malformed content disposition, using fallback name");
            (fallback_filename(id), FilenameSource::Fallback)
        }
        None => (fallback_filename(id), FilenameSource::Fallback),
    };

    DownloadArtifact {
        bytes,
        filename,
        filename_source,
    }
}

/// Stages the artifact, saves it, then releases the staged bytes.
async fn save_staged(artifact: &DownloadArtifact, target: &dyn SaveTarget) -> Result<PathBuf> {
    let blob = StagedBlob::stage(&artifact.bytes)?;
    let saved = target.save(&blob, &artifact.filename).await;

    if let Err(error) = blob.release() {
        tracing::warn!(%error, "failed to release staged download");
    }
    saved
}
