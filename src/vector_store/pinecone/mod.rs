// Pinecone REST adapter
// Control plane: list, describe and create serverless indexes
// Data plane: upsert, query and stats against an index host


use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{IndexStats, QueryMatch, VectorIndex, VectorRecord};
use crate::config::{Config, Metric};
use crate::http::{HttpClient, join_endpoint};
use crate::{RagError, Result};

pub const API_VERSION: &str = "2024-07";
const API_KEY_HEADER: &str = "Api-Key";
const API_VERSION_HEADER: &str = "X-Pinecone-API-Version";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IndexStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Debug, Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredVector>,
}

#[derive(Debug, Deserialize)]
struct ScoredVector {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<MatchMetadata>,
}

#[derive(Debug, Deserialize)]
struct MatchMetadata {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatsRequest {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    total_vector_count: u64,
}

/// Control plane client, used to find or create the index before connecting to it
#[derive(Debug, Clone)]
pub struct PineconeClient {
    controller_url: Url,
    api_key: String,
    cloud: String,
    region: String,
    metric: Metric,
    poll_attempts: u32,
    poll_interval: Duration,
    http: HttpClient,
}

impl PineconeClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.pinecone.api_key.clone().ok_or_else(|| {
            RagError::Config(
                "Pinecone API key is not set (pinecone.api_key or PINECONE_API_KEY)".to_string(),
            )
        })?;

        let controller_url = config
            .controller_url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        Ok(Self {
            controller_url,
            api_key,
            cloud: config.pinecone.cloud.clone(),
            region: config.pinecone.environment.clone(),
            metric: config.pinecone.metric,
            poll_attempts: config.pinecone.ready_poll_attempts.max(1),
            poll_interval: Duration::from_millis(config.pinecone.ready_poll_interval_ms),
            http: HttpClient::new(Duration::from_secs(config.pinecone.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    #[inline]
    pub fn with_ready_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts.max(1);
        self.poll_interval = interval;
        self
    }

    fn headers(&self) -> [(&str, &str); 2] {
        [
            (API_KEY_HEADER, self.api_key.as_str()),
            (API_VERSION_HEADER, API_VERSION),
        ]
    }

    #[inline]
    pub fn list_indexes(&self) -> Result<Vec<IndexDescription>> {
        let url = join_endpoint(&self.controller_url, "indexes")?;
        let list: IndexList = self.http.get_json(&url, &self.headers())?;
        Ok(list.indexes)
    }

    #[inline]
    pub fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let url = join_endpoint(&self.controller_url, &format!("indexes/{}", name))?;
        self.http.get_json(&url, &self.headers())
    }

    #[inline]
    pub fn create_index(&self, name: &str, dimension: usize) -> Result<IndexDescription> {
        let url = join_endpoint(&self.controller_url, "indexes")?;
        let request = CreateIndexRequest {
            name,
            dimension,
            metric: self.metric.as_str(),
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.cloud,
                    region: &self.region,
                },
            },
        };

        info!(
            "Creating index '{}' ({} dimensions, {} metric) in {}/{}",
            name,
            dimension,
            self.metric.as_str(),
            self.cloud,
            self.region
        );
        self.http.post_json(&url, &self.headers(), &request)
    }

    /// Poll the index description until it reports ready with a host
    #[inline]
    pub fn wait_until_ready(&self, name: &str) -> Result<IndexDescription> {
        for attempt in 1..=self.poll_attempts {
            let description = self.describe_index(name)?;
            if description.status.ready && !description.host.is_empty() {
                debug!("Index '{}' ready after {} checks", name, attempt);
                return Ok(description);
            }

            debug!(
                "Index '{}' not ready (state '{}'), check {}/{}",
                name, description.status.state, attempt, self.poll_attempts
            );
            if attempt < self.poll_attempts {
                std::thread::sleep(self.poll_interval);
            }
        }

        Err(RagError::RemoteUnavailable(format!(
            "Index '{}' did not become ready after {} checks",
            name, self.poll_attempts
        )))
    }

    /// Connect to `name`, creating it first if no index with that name exists
    ///
    /// An existing index with a different dimension is rejected.
    #[inline]
    pub fn initialize(&self, name: &str, dimension: usize) -> Result<PineconeIndex> {
        let exists = self
            .list_indexes()
            .inspect_err(|e| error!("Failed to list indexes: {}", e))?
            .iter()
            .any(|index| index.name == name);

        if exists {
            info!("Index '{}' already exists", name);
        } else {
            self.create_index(name, dimension)
                .inspect_err(|e| error!("Failed to create index '{}': {}", name, e))?;
        }

        let description = self.wait_until_ready(name)?;
        if description.dimension != dimension {
            return Err(RagError::Validation(format!(
                "Index '{}' has dimension {}, embeddings have dimension {}",
                name, description.dimension, dimension
            )));
        }
        if let Some(metric) = description
            .metric
            .as_deref()
            .filter(|metric| *metric != self.metric.as_str())
        {
            warn!(
                "Index '{}' uses the {} metric, configuration asks for {}",
                name,
                metric,
                self.metric.as_str()
            );
        }

        let host = host_url(&description.host)?;
        info!("Connected to index '{}' at {}", name, host);

        Ok(PineconeIndex::connect(
            name,
            host,
            self.api_key.clone(),
            self.http.clone(),
        ))
    }
}

/// Data plane handle for one index
#[derive(Debug, Clone)]
pub struct PineconeIndex {
    name: String,
    host: Url,
    api_key: String,
    http: HttpClient,
}

impl PineconeIndex {
    #[inline]
    pub fn connect(name: &str, host: Url, api_key: String, http: HttpClient) -> Self {
        Self {
            name: name.to_string(),
            host,
            api_key,
            http,
        }
    }

    #[inline]
    pub fn host(&self) -> &Url {
        &self.host
    }

    fn headers(&self) -> [(&str, &str); 2] {
        [
            (API_KEY_HEADER, self.api_key.as_str()),
            (API_VERSION_HEADER, API_VERSION),
        ]
    }
}

impl VectorIndex for PineconeIndex {
    fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let url = join_endpoint(&self.host, "vectors/upsert")?;
        let response: UpsertResponse =
            self.http
                .post_json(&url, &self.headers(), &UpsertRequest { vectors: records })?;

        debug!(
            "Upserted {} records into '{}'",
            response.upserted_count, self.name
        );
        Ok(response.upserted_count)
    }

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let url = join_endpoint(&self.host, "query")?;
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };
        let response: QueryResponse = self.http.post_json(&url, &self.headers(), &request)?;

        let mut matches: Vec<QueryMatch> = response
            .matches
            .into_iter()
            .filter_map(|m| {
                let Some(text) = m.metadata.and_then(|metadata| metadata.text) else {
                    warn!("Match '{}' in '{}' has no text metadata", m.id, self.name);
                    return None;
                };
                Some(QueryMatch {
                    id: m.id,
                    score: m.score,
                    text,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    fn stats(&self) -> Result<IndexStats> {
        let url = join_endpoint(&self.host, "describe_index_stats")?;
        let response: StatsResponse = self.http.post_json(&url, &self.headers(), &StatsRequest {})?;
        Ok(IndexStats {
            dimension: response.dimension,
            total_vector_count: response.total_vector_count,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Parse an index host, which the control plane reports without a scheme
#[inline]
pub fn host_url(host: &str) -> Result<Url> {
    let host = host.trim();
    if host.is_empty() {
        return Err(RagError::RemoteUnavailable(
            "Index description has no host".to_string(),
        ));
    }

    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };

    Url::parse(&with_scheme)
        .map_err(|e| RagError::RemoteUnavailable(format!("Invalid index host '{}': {}", host, e)))
}
