use core::num::NonZeroUsize;
use core::result::Result as StdResult;
use std::collections::HashMap;

use async_trait::async_trait;
use nearsight_core::{
    AssetId, BackendConfig, Error, MatchRecord, Query, Result, ResultSet, SearchBackend,
    join_endpoint, parse_base_url,
};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

/// GraphQL endpoint path on the vector service.
const GRAPHQL_PATH: &str = "v1/graphql";
/// Liveness check path on the vector service.
const LIVE_PATH: &str = "v1/.well_known/live";
/// Fields requested per object: the embedded preview and the object id.
const MATCH_FIELDS: &str = "image _additional { id }";

/// Near-text similarity query against one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearTextQuery {
    /// Collection (class) name.
    pub class: String,
    /// Concept strings the embedding is computed from.
    pub concepts: Vec<String>,
    /// Selection set requested for every object.
    pub fields: String,
    /// Maximum number of objects returned.
    pub limit: NonZeroUsize,
}

impl NearTextQuery {
    /// Starts a query against `class` with the default field set and a limit of 1.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            concepts: Vec::new(),
            fields: MATCH_FIELDS.to_owned(),
            limit: NonZeroUsize::MIN,
        }
    }

    /// Adds a concept string.
    #[must_use]
    pub fn with_concept(mut self, concept: impl Into<String>) -> Self {
        self.concepts.push(concept.into());
        self
    }

    /// Sets the result limit.
    #[must_use]
    pub fn with_limit(mut self, limit: NonZeroUsize) -> Self {
        self.limit = limit;
        self
    }

    /// Renders the query document.
    ///
    /// Concepts are emitted as JSON string literals, which are valid GraphQL strings.
    ///
    /// # Errors
    /// Returns an error if a concept cannot be serialized.
    pub fn to_graphql(&self) -> Result<String> {
        let concepts = self
            .concepts
            .iter()
            .map(serde_json::to_string)
            .collect::<StdResult<Vec<_>, _>>()?
            .join(", ");
        Ok(format!(
            "{{ Get {{ {class}(nearText: {{concepts: [{concepts}]}}, limit: {limit}) {{ {fields} }} }} }}",
            class = self.class,
            limit = self.limit,
            fields = self.fields,
        ))
    }
}

/// Backend speaking the structured near-text protocol; matches embed the image.
pub struct StructuredBackend {
    /// HTTP client for API requests.
    client: Client,
    /// Base URL of the vector service.
    base_url: Url,
    /// Collection queried.
    collection: String,
}

impl StructuredBackend {
    /// Creates a backend for the vector service at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL does not parse or the collection is not a valid GraphQL name.
    pub fn new(base_url: &str, collection: impl Into<String>) -> Result<Self> {
        let collection = collection.into();
        if !is_graphql_name(&collection) {
            return Err(Error::Config(format!(
                "collection {collection:?} is not a valid class name"
            )));
        }

        Ok(Self {
            client: Client::default(),
            base_url: parse_base_url("search_url", base_url)?,
            collection,
        })
    }

    /// Creates a backend from configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.search_url, config.collection.clone())
    }

    /// Replaces the HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Collection this backend queries.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Extracts matches from a response body.
    fn parse_envelope(&self, body: &str) -> Result<ResultSet> {
        let envelope: GraphQlEnvelope = serde_json::from_str(body)
            .map_err(|err| Error::Backend(format!("malformed response: {err}")))?;

        if let Some(error) = envelope.errors.first() {
            return Err(Error::Backend(format!(
                "query rejected: {message}",
                message = error.message
            )));
        }

        let objects = envelope
            .data
            .and_then(|mut data| data.get.remove(&self.collection).flatten())
            .ok_or_else(|| {
                Error::Backend(format!(
                    "response has no result list for {collection}",
                    collection = self.collection
                ))
            })?;

        objects.into_iter().map(ClipObject::into_match).collect()
    }
}

/// Whether `name` is a valid GraphQL name.
fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first == '_' || first.is_ascii_alphabetic())
        && chars.all(|rest| rest == '_' || rest.is_ascii_alphanumeric())
}

/// Request payload sent to the GraphQL endpoint.
#[derive(Debug, Serialize)]
struct GraphQlRequest {
    /// Query document.
    query: String,
}

/// Top-level response: either `data` or `errors`.
#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    /// Successful result.
    data: Option<GetData>,
    /// Errors reported by the service.
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

/// `data.Get`, keyed by collection name.
#[derive(Debug, Deserialize)]
struct GetData {
    /// Result lists per collection.
    #[serde(rename = "Get")]
    get: HashMap<String, Option<Vec<ClipObject>>>,
}

/// A single error reported by the service.
#[derive(Debug, Deserialize)]
struct GraphQlError {
    /// Human-readable message.
    message: String,
}

/// One matched object.
#[derive(Debug, Deserialize)]
struct ClipObject {
    /// Base64 preview embedded at index time.
    image: Option<String>,
    /// Object metadata.
    #[serde(rename = "_additional")]
    additional: Option<Additional>,
}

/// `_additional` metadata block.
#[derive(Debug, Deserialize)]
struct Additional {
    /// Object identifier.
    id: Option<String>,
}

impl ClipObject {
    /// Normalizes into an inline match; both id and payload must be present.
    fn into_match(self) -> Result<MatchRecord> {
        let id = self
            .additional
            .and_then(|additional| additional.id)
            .ok_or_else(|| Error::Backend("result object has no id".to_owned()))?;
        let payload = self
            .image
            .ok_or_else(|| Error::Backend(format!("result object {id} has no image")))?;
        Ok(MatchRecord::inline(AssetId::new(id), payload))
    }
}

#[async_trait]
impl SearchBackend for StructuredBackend {
    fn name(&self) -> &'static str {
        "structured"
    }

    async fn is_available(&self) -> bool {
        let Ok(url) = join_endpoint(&self.base_url, LIVE_PATH) else {
            return false;
        };
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!(%error, "vector service liveness check failed");
                false
            }
        }
    }

    async fn near_text(&self, query: &Query, limit: NonZeroUsize) -> Result<ResultSet> {
        let document = NearTextQuery::new(self.collection.clone())
            .with_concept(query.as_str())
            .with_limit(limit)
            .to_graphql()?;
        let url = join_endpoint(&self.base_url, GRAPHQL_PATH)?;

        tracing::debug!(%url, query = %query, limit = limit.get(), "structured near-text search");

        let response = self
            .client
            .post(url)
            .json(&GraphQlRequest { query: document })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend(format!("graphql endpoint returned {status}")));
        }

        let body = response.text().await?;
        self.parse_envelope(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> StructuredBackend {
        StructuredBackend::new("http://localhost:8080", "ClipImage").expect("valid backend")
    }

    #[test]
    fn test_graphql_document() {
        let document = NearTextQuery::new("ClipImage")
            .with_concept("red bicycle")
            .to_graphql()
            .expect("renderable");
        assert_eq!(
            document,
            r#"{ Get { ClipImage(nearText: {concepts: ["red bicycle"]}, limit: 1) { image _additional { id } } } }"#
        );
    }

    #[test]
    fn test_graphql_document_escapes_concepts() {
        let limit = NonZeroUsize::new(3).expect("non-zero");
        let document = NearTextQuery::new("ClipImage")
            .with_concept(r#"a "quoted" \ cat"#)
            .with_limit(limit)
            .to_graphql()
            .expect("renderable");
        assert!(document.contains(r#"concepts: ["a \"quoted\" \\ cat"]"#));
        assert!(document.contains("limit: 3"));
    }

    #[test]
    fn test_rejects_invalid_collection() {
        assert!(matches!(
            StructuredBackend::new("http://localhost:8080", "Clip Image) { x }"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            StructuredBackend::new("http://localhost:8080", ""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_parse_envelope_inline_matches_in_order() {
        let body = r#"{"data":{"Get":{"ClipImage":[
            {"image":"/9j/4AAQ","_additional":{"id":"abc123"}},
            {"image":"iVBORw0K","_additional":{"id":"def456"}}
        ]}}}"#;
        let results = backend().parse_envelope(body).expect("valid envelope");

        assert_eq!(results.len(), 2);
        let top = results.top().expect("has top");
        assert_eq!(top.id().as_str(), "abc123");
        assert_eq!(top.inline_payload(), Some("/9j/4AAQ"));
        assert_eq!(top.remote_reference(), None);
        let ids: Vec<_> = results.iter().map(|record| record.id().as_str()).collect();
        assert_eq!(ids, ["abc123", "def456"]);
    }

    #[test]
    fn test_parse_envelope_empty_list() {
        let results = backend()
            .parse_envelope(r#"{"data":{"Get":{"ClipImage":[]}}}"#)
            .expect("valid envelope");
        assert!(results.is_empty());
    }

    #[test]
    fn test_parse_envelope_error_envelope() {
        let body = r#"{"data":{"Get":{"ClipImage":null}},"errors":[{"message":"no vectorizer"}]}"#;
        let error = backend().parse_envelope(body).unwrap_err();
        assert!(matches!(error, Error::Backend(ref msg) if msg.contains("no vectorizer")));
    }

    #[test]
    fn test_parse_envelope_missing_collection() {
        let error = backend()
            .parse_envelope(r#"{"data":{"Get":{"OtherClass":[]}}}"#)
            .unwrap_err();
        assert!(matches!(error, Error::Backend(_)));
    }

    #[test]
    fn test_parse_envelope_missing_fields() {
        let no_id = r#"{"data":{"Get":{"ClipImage":[{"image":"abc"}]}}}"#;
        assert!(matches!(backend().parse_envelope(no_id), Err(Error::Backend(_))));

        let no_image = r#"{"data":{"Get":{"ClipImage":[{"_additional":{"id":"x"}}]}}}"#;
        assert!(matches!(backend().parse_envelope(no_image), Err(Error::Backend(_))));
    }

    #[test]
    fn test_parse_envelope_garbage() {
        assert!(matches!(
            backend().parse_envelope("<html>bad gateway</html>"),
            Err(Error::Backend(_))
        ));
    }
}
