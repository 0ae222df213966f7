use core::fmt;
use core::slice::Iter;

use serde::{Deserialize, Serialize};

/// MIME prefix for inline payloads rendered as data URIs.
const INLINE_DATA_URI_PREFIX: &str = "data:image/jpg;base64,";

/// Free-text query submitted by the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    /// Text exactly as entered.
    pub text: String,
}

impl Query {
    /// Creates a query from any string-like value.
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self { text: text.into() }
    }

    /// Query text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the query has no searchable content (empty or whitespace only).
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.text)
    }
}

/// Opaque asset identifier, stable across requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Wraps a backend-issued identifier.
    pub fn new<T: Into<String>>(id: T) -> Self {
        Self(id.into())
    }

    /// Identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A single search hit, normalized across backend protocols.
///
/// Exactly one of inline payload or remote reference exists per record; the
/// variant is the discriminant, so a record can never carry both or neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchRecord {
    /// The backend embedded the (base64) image payload in the result.
    Inline {
        /// Asset identifier.
        id: AssetId,
        /// Base64-encoded image bytes as sent by the backend.
        payload: String,
    },
    /// The backend returned only an identifier; the image is fetched on demand.
    Remote {
        /// Asset identifier.
        id: AssetId,
        /// Fully resolved URL of the rendered image.
        reference: String,
    },
}

impl MatchRecord {
    /// Builds an inline match.
    pub fn inline(id: AssetId, payload: impl Into<String>) -> Self {
        Self::Inline {
            id,
            payload: payload.into(),
        }
    }

    /// Builds a remote match.
    pub fn remote(id: AssetId, reference: impl Into<String>) -> Self {
        Self::Remote {
            id,
            reference: reference.into(),
        }
    }

    /// Identifier of the matched asset.
    pub fn id(&self) -> &AssetId {
        match self {
            Self::Inline { id, .. } | Self::Remote { id, .. } => id,
        }
    }

    /// Inline payload, if the protocol embedded one.
    pub fn inline_payload(&self) -> Option<&str> {
        match self {
            Self::Inline { payload, .. } => Some(payload),
            Self::Remote { .. } => None,
        }
    }

    /// Remote reference, if the protocol returned identifiers only.
    pub fn remote_reference(&self) -> Option<&str> {
        match self {
            Self::Inline { .. } => None,
            Self::Remote { reference, .. } => Some(reference),
        }
    }

    /// Reference a renderer can resolve directly.
    ///
    /// Inline payloads become a data URI; remote references are returned as-is.
    pub fn display_ref(&self) -> DisplayRef {
        match self {
            Self::Inline { payload, .. } => {
                DisplayRef::DataUri(format!("{INLINE_DATA_URI_PREFIX}{payload}"))
            }
            Self::Remote { reference, .. } => DisplayRef::Url(reference.clone()),
        }
    }
}

/// Ordered search results, most similar first.
///
/// The order is exactly what the backend reported; it is never re-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    matches: Vec<MatchRecord>,
}

impl ResultSet {
    /// Creates a result set preserving the given order.
    pub fn new(matches: Vec<MatchRecord>) -> Self {
        Self { matches }
    }

    /// Explicitly empty result set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Most relevant match.
    pub fn top(&self) -> Option<&MatchRecord> {
        self.matches.first()
    }

    /// Number of matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether there are no matches.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Iterates matches in relevance order.
    pub fn iter(&self) -> Iter<'_, MatchRecord> {
        self.matches.iter()
    }

    /// Consumes the set, returning the matches in relevance order.
    pub fn into_vec(self) -> Vec<MatchRecord> {
        self.matches
    }
}

impl FromIterator<MatchRecord> for ResultSet {
    fn from_iter<I: IntoIterator<Item = MatchRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'set> IntoIterator for &'set ResultSet {
    type Item = &'set MatchRecord;
    type IntoIter = Iter<'set, MatchRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Something a renderer can resolve into an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayRef {
    /// Self-contained `data:` URI.
    DataUri(String),
    /// URL of a rendered image served by the backend.
    Url(String),
}

impl DisplayRef {
    /// The reference as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::DataUri(uri) => uri,
            Self::Url(url) => url,
        }
    }
}

impl fmt::Display for DisplayRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Where a download's filename came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilenameSource {
    /// Parsed from the `Content-Disposition` response header.
    Header,
    /// Generated from the asset id because the header was absent or malformed.
    Fallback,
}

/// Original asset bytes plus the name to save them under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    /// Raw response body.
    pub bytes: Vec<u8>,
    /// Server-suggested or generated filename.
    pub filename: String,
    /// Origin of `filename`.
    pub filename_source: FilenameSource,
}
