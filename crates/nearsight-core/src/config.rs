//! Configuration for backend endpoints, rendering, and downloads.

use core::fmt;
use core::num::NonZeroUsize;
use core::str::FromStr;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Env var overriding [`BackendConfig::search_url`].
pub const ENV_SEARCH_URL: &str = "NEARSIGHT_SEARCH_URL";
/// Env var overriding [`BackendConfig::asset_url`].
pub const ENV_ASSET_URL: &str = "NEARSIGHT_ASSET_URL";
/// Env var overriding [`BackendConfig::protocol`].
pub const ENV_PROTOCOL: &str = "NEARSIGHT_PROTOCOL";

/// Complete client configuration.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Search backend selection and endpoints
    pub backend: BackendConfig,
    /// Parameters for rendered image references
    pub render: RenderConfig,
    /// Download destination
    pub download: DownloadConfig,
}

/// Which wire protocol the search backend speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Near-text query builder against the vector service; results embed the image.
    #[default]
    Structured,
    /// Plain `GET /near_text` gateway; results carry identifiers only.
    Rest,
}

impl fmt::Display for Protocol {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Structured => "structured",
            Self::Rest => "rest",
        })
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "structured" | "graphql" => Ok(Self::Structured),
            "rest" => Ok(Self::Rest),
            other => Err(Error::Config(format!("unknown protocol: {other}"))),
        }
    }
}

/// Search backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Protocol used for searches
    pub protocol: Protocol,
    /// Base URL of the vector search service (structured protocol)
    pub search_url: String,
    /// Base URL of the gateway serving `near_text`, `fetch_raw` and `fetch_jpg`
    pub asset_url: String,
    /// Collection (class) queried by the structured protocol
    pub collection: String,
    /// Maximum number of matches per search
    pub limit: NonZeroUsize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Structured,
            search_url: "http://localhost:8080".to_owned(),
            asset_url: "http://localhost:8081".to_owned(),
            collection: "ClipImage".to_owned(),
            limit: NonZeroUsize::MIN,
        }
    }
}

/// Rendered image parameters for remote display references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 400,
            quality: 70,
        }
    }
}

/// Download configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directory downloaded originals are saved into
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    /// Get the default config directory path (`~/.nearsight`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".nearsight"))
    }

    /// Get the default config file path (`~/.nearsight/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from `path`, or the defaults when no file exists there.
    ///
    /// Never touches the filesystem beyond reading.
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be read or parsed
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load config from `path`, writing the defaults there first if it is missing
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or created
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            let config = Self::default();
            config.save_to_file(path)?;
            tracing::info!(path = %path.display(), "created default config");
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            protocol = %config.backend.protocol,
            limit = config.backend.limit.get(),
            "loaded config"
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = self.to_toml()?;

        let header = "# Nearsight Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to point at your search backend\n\n";

        fs::write(path, format!("{header}{contents}"))?;
        Ok(())
    }

    /// Serializes the configuration as pretty TOML.
    ///
    /// # Errors
    /// Returns an error if serialization fails
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))
    }

    /// Applies `NEARSIGHT_*` environment overrides.
    ///
    /// # Errors
    /// Returns an error if an override has an invalid value
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides looked up by env var name.
    ///
    /// # Errors
    /// Returns an error if an override has an invalid value
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SEARCH_URL) {
            self.backend.search_url = url;
        }
        if let Some(url) = lookup(ENV_ASSET_URL) {
            self.backend.asset_url = url;
        }
        if let Some(protocol) = lookup(ENV_PROTOCOL) {
            self.backend.protocol = protocol.parse()?;
        }
        self.validate()
    }

    /// Checks that URLs parse and render parameters are usable.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first invalid field
    pub fn validate(&self) -> Result<()> {
        parse_base_url("backend.search_url", &self.backend.search_url)?;
        parse_base_url("backend.asset_url", &self.backend.asset_url)?;

        if self.backend.collection.is_empty() {
            return Err(Error::Config("backend.collection must not be empty".to_owned()));
        }
        if self.render.width == 0 || self.render.height == 0 {
            return Err(Error::Config(
                "render.width and render.height must be non-zero".to_owned(),
            ));
        }
        if !(1..=100).contains(&self.render.quality) {
            return Err(Error::Config(format!(
                "render.quality must be within 1..=100, got {}",
                self.render.quality
            )));
        }
        Ok(())
    }
}

/// Parses a configured base URL, naming the offending field on failure.
///
/// # Errors
/// Returns [`Error::Config`] if the URL does not parse or cannot carry a path
pub fn parse_base_url(field: &str, value: &str) -> Result<Url> {
    let url =
        Url::parse(value).map_err(|error| Error::Config(format!("{field}: {value}: {error}")))?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("{field}: {value} is not a base URL")));
    }
    Ok(url)
}

/// Appends `path` to the base URL's path, keeping any prefix the base carries.
///
/// `http://host/api` joined with `v1/graphql` yields `http://host/api/v1/graphql`.
///
/// # Errors
/// Returns [`Error::Config`] if the base URL cannot carry a path
pub fn join_endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|()| Error::Config(format!("{base} is not a base URL")))?
        .pop_if_empty()
        .extend(path.split('/').filter(|segment| !segment.is_empty()));
    Ok(url)
}
