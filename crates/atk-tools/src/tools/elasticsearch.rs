//! Elasticsearch Tools
//!
//! Tools for querying and managing documents in Elasticsearch/OpenSearch.
//!
//! ## Available Tools
//!
//! - `elasticsearch_search` - Search an index (or all indices)
//! - `elasticsearch_get_document` - Fetch a document by ID
//! - `elasticsearch_index_document` - Create or replace a document
//! - `elasticsearch_delete_document` - Delete a document by ID
//! - `elasticsearch_list_indices` - List indices matching a pattern
//! - `elasticsearch_cluster_health` - Cluster health summary
//!
//! ## Authentication
//!
//! `ApiKey` header when `apiKey` is configured, otherwise basic auth when a
//! username is configured, otherwise none.
//!
//! All operations fail with a message string (`Error <action>: <reason>`).

use atk_core::{
    AtkResult, FailureContract, HttpMethod, HttpRequest, HttpTransport, Outcome, ToolConfig,
    ToolInput, ToolResult, ToolType,
};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::common::{
    clamp, create_schema, decode, describe, failure, fetch_json, flag, join_url, lenient_u64,
    null_default, path_segment, read_json, tool_config,
};
use crate::adapter::{unknown_operation, Adapter};
use crate::registry::ToolCategory;

/// Upper bound Elasticsearch accepts for `size` without scrolling
pub const MAX_SEARCH_SIZE: i64 = 10_000;

/// Connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticsearchConfig {
    /// Cluster URL (e.g., http://elasticsearch:9200)
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ElasticsearchConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            username: None,
            password: None,
        }
    }
}

/// Elasticsearch adapter
pub struct Elasticsearch {
    config: ElasticsearchConfig,
    transport: Arc<dyn HttpTransport>,
}

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    /// Index name or pattern; empty searches all indices
    #[serde(default)]
    pub index: String,
    /// Lucene query string; omitted means match all
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_size")]
    pub size: i64,
    #[serde(default)]
    pub from: i64,
    /// `field:order`, e.g. `@timestamp:desc`
    #[serde(default)]
    pub sort: Option<String>,
}

fn default_size() -> i64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentParams {
    pub index: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexDocumentParams {
    pub index: String,
    pub document: Value,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_false")]
    pub refresh: String,
}

fn default_false() -> String {
    "false".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListIndicesParams {
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

fn default_pattern() -> String {
    "*".to_string()
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchTotal {
    pub value: u64,
    /// `eq` when exact, `gte` when Elasticsearch stopped counting
    pub relation: String,
}

impl Default for SearchTotal {
    fn default() -> Self {
        Self {
            value: 0,
            relation: "eq".to_string(),
        }
    }
}

/// Accepts both the 7.x `{value, relation}` object and the 6.x bare count
fn deserialize_total<'de, D>(deserializer: D) -> Result<SearchTotal, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => SearchTotal {
            value: n.as_u64().unwrap_or_default(),
            ..SearchTotal::default()
        },
        Value::Object(map) => SearchTotal {
            value: map.get("value").and_then(Value::as_u64).unwrap_or_default(),
            relation: map
                .get("relation")
                .and_then(Value::as_str)
                .unwrap_or("eq")
                .to_string(),
        },
        _ => SearchTotal::default(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchHit {
    #[serde(rename(deserialize = "_index"), deserialize_with = "null_default")]
    pub index: String,
    #[serde(rename(deserialize = "_id"), deserialize_with = "null_default")]
    pub id: String,
    #[serde(rename(deserialize = "_score"), deserialize_with = "null_default")]
    pub score: f64,
    #[serde(rename(deserialize = "_source"))]
    pub source: Value,
}

impl Default for SearchHit {
    fn default() -> Self {
        Self {
            index: String::new(),
            id: String::new(),
            score: 0.0,
            source: json!({}),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    pub took: u64,
    pub timed_out: bool,
    pub total: SearchTotal,
    pub max_score: f64,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    took: u64,
    timed_out: bool,
    hits: HitsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HitsSection {
    #[serde(deserialize_with = "deserialize_total")]
    total: SearchTotal,
    #[serde(deserialize_with = "null_default")]
    max_score: f64,
    hits: Vec<SearchHit>,
}

impl From<SearchResponse> for SearchResult {
    fn from(response: SearchResponse) -> Self {
        Self {
            took: response.took,
            timed_out: response.timed_out,
            total: response.hits.total,
            max_score: response.hits.max_score,
            hits: response.hits.hits,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    #[serde(rename(deserialize = "_index"))]
    pub index: String,
    #[serde(rename(deserialize = "_id"))]
    pub id: String,
    #[serde(rename(deserialize = "_version"))]
    pub version: i64,
    pub found: bool,
    #[serde(rename(deserialize = "_source"))]
    pub source: Value,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            index: String::new(),
            id: String::new(),
            version: 0,
            found: false,
            source: json!({}),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteResult {
    #[serde(rename(deserialize = "_index"))]
    pub index: String,
    #[serde(rename(deserialize = "_id"))]
    pub id: String,
    #[serde(rename(deserialize = "_version"))]
    pub version: i64,
    /// `created`, `updated`, `deleted`, `not_found`, ...
    pub result: String,
}

impl Default for WriteResult {
    fn default() -> Self {
        Self {
            index: String::new(),
            id: String::new(),
            version: 0,
            result: "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexInfo {
    #[serde(deserialize_with = "null_default")]
    pub index: String,
    #[serde(deserialize_with = "null_default")]
    pub health: String,
    #[serde(deserialize_with = "null_default")]
    pub status: String,
    #[serde(rename(deserialize = "docs.count"), deserialize_with = "lenient_u64")]
    pub docs_count: u64,
    #[serde(rename(deserialize = "store.size"), deserialize_with = "null_default")]
    pub store_size: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexList {
    pub indices: Vec<IndexInfo>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterHealth {
    pub cluster_name: String,
    /// `green`, `yellow`, `red`
    pub status: String,
    pub number_of_nodes: u64,
    pub number_of_data_nodes: u64,
    pub active_shards: u64,
    pub relocating_shards: u64,
    pub unassigned_shards: u64,
}

impl Default for ClusterHealth {
    fn default() -> Self {
        Self {
            cluster_name: String::new(),
            status: "unknown".to_string(),
            number_of_nodes: 0,
            number_of_data_nodes: 0,
            active_shards: 0,
            relocating_shards: 0,
            unassigned_shards: 0,
        }
    }
}

/// Elasticsearch reports failures under `error`, as a string or an object with `reason`
fn upstream_error(body: &Value) -> Option<String> {
    body.get("error").and_then(describe)
}

/// `field:order` into the sort DSL; order defaults to `asc`
fn sort_clause(sort: &str) -> Value {
    let (field, order) = match sort.split_once(':') {
        Some((field, order)) if !order.is_empty() => (field, order),
        Some((field, _)) => (field, "asc"),
        None => (sort, "asc"),
    };
    json!([{ field: { "order": order } }])
}

impl Elasticsearch {
    pub fn new(config: ElasticsearchConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let request = HttpRequest::new(method, join_url(&self.config.base_url, path));

        if let Some(api_key) = &self.config.api_key {
            request.header("Authorization", format!("ApiKey {}", api_key))
        } else if let Some(username) = &self.config.username {
            request.basic_auth(username.clone(), self.config.password.clone())
        } else {
            request
        }
    }

    /// Search `index` (all indices when empty)
    pub async fn search(&self, params: SearchParams) -> Outcome<SearchResult> {
        let size = clamp(params.size, 1, MAX_SEARCH_SIZE);
        let from = params.from.max(0);

        let path = if params.index.is_empty() {
            "_search".to_string()
        } else {
            format!("{}/_search", path_segment(&params.index))
        };

        let mut body = json!({ "size": size, "from": from });
        if let Some(query) = params.query.filter(|q| !q.is_empty()) {
            body["query"] = json!({ "query_string": { "query": query } });
        }
        if let Some(sort) = params.sort.filter(|s| !s.is_empty()) {
            body["sort"] = sort_clause(&sort);
        }

        debug!(index = %params.index, size = size, from = from, "Searching Elasticsearch");

        let request = self.request(HttpMethod::Post, &path).json(body);
        let body = fetch_json(self.transport.as_ref(), request, upstream_error)
            .await
            .map_err(|e| failure("searching Elasticsearch", &e))?;

        decode::<SearchResponse>(body)
            .map(SearchResult::from)
            .map_err(|e| failure("searching Elasticsearch", &e))
    }

    /// Fetch a document; a missing document is reported with `found: false`
    pub async fn get_document(&self, params: DocumentParams) -> Outcome<Document> {
        const ACTION: &str = "getting document";

        debug!(index = %params.index, id = %params.id, "Getting Elasticsearch document");

        let request = self.request(
            HttpMethod::Get,
            &format!("{}/_doc/{}", path_segment(&params.index), path_segment(&params.id)),
        );
        let response = self
            .transport
            .request(request)
            .await
            .map_err(|e| failure(ACTION, &e.to_string()))?;

        if response.status_code() == 404 {
            if let Ok(body) = response.to_json() {
                if body.get("found").and_then(Value::as_bool) == Some(false) {
                    return decode(body).map_err(|e| failure(ACTION, &e));
                }
            }
        }

        let body = read_json(&response, upstream_error).map_err(|e| failure(ACTION, &e))?;
        decode(body).map_err(|e| failure(ACTION, &e))
    }

    /// Index a document, with a generated ID unless one is given
    pub async fn index_document(&self, params: IndexDocumentParams) -> Outcome<WriteResult> {
        const ACTION: &str = "indexing document";

        if !params.document.is_object() {
            return Err(failure(ACTION, "document must be a JSON object"));
        }

        let request = match &params.id {
            Some(id) if !id.is_empty() => {
                let path = format!("{}/_doc/{}", path_segment(&params.index), path_segment(id));
                self.request(HttpMethod::Put, &path)
            }
            _ => self.request(HttpMethod::Post, &format!("{}/_doc", path_segment(&params.index))),
        };
        let request = if flag(&params.refresh) {
            request.query("refresh", "true")
        } else {
            request
        };

        debug!(index = %params.index, id = ?params.id, "Indexing Elasticsearch document");

        let body = fetch_json(
            self.transport.as_ref(),
            request.json(params.document),
            upstream_error,
        )
        .await
        .map_err(|e| failure(ACTION, &e))?;

        decode(body).map_err(|e| failure(ACTION, &e))
    }

    pub async fn delete_document(&self, params: DocumentParams) -> Outcome<WriteResult> {
        const ACTION: &str = "deleting document";

        debug!(index = %params.index, id = %params.id, "Deleting Elasticsearch document");

        let request = self.request(
            HttpMethod::Delete,
            &format!("{}/_doc/{}", path_segment(&params.index), path_segment(&params.id)),
        );
        let body = fetch_json(self.transport.as_ref(), request, upstream_error)
            .await
            .map_err(|e| failure(ACTION, &e))?;

        decode(body).map_err(|e| failure(ACTION, &e))
    }

    pub async fn list_indices(&self, params: ListIndicesParams) -> Outcome<IndexList> {
        const ACTION: &str = "listing indices";

        let pattern = if params.pattern.is_empty() {
            "*"
        } else {
            params.pattern.as_str()
        };

        let request = self
            .request(HttpMethod::Get, &format!("_cat/indices/{}", path_segment(pattern)))
            .query("format", "json");
        let body = fetch_json(self.transport.as_ref(), request, upstream_error)
            .await
            .map_err(|e| failure(ACTION, &e))?;

        let indices: Vec<IndexInfo> = decode(body).map_err(|e| failure(ACTION, &e))?;
        Ok(IndexList {
            count: indices.len(),
            indices,
        })
    }

    pub async fn cluster_health(&self) -> Outcome<ClusterHealth> {
        const ACTION: &str = "getting cluster health";

        let request = self.request(HttpMethod::Get, "_cluster/health");
        let body = fetch_json(self.transport.as_ref(), request, upstream_error)
            .await
            .map_err(|e| failure(ACTION, &e))?;

        decode(body).map_err(|e| failure(ACTION, &e))
    }
}

fn http_tool(name: &str, description: &str, parameters: Value) -> ToolConfig {
    tool_config(
        name,
        description,
        parameters,
        ToolType::Http,
        FailureContract::Message,
    )
}

#[async_trait]
impl Adapter for Elasticsearch {
    fn category(&self) -> ToolCategory {
        ToolCategory::Search
    }

    fn operations(&self) -> Vec<ToolConfig> {
        vec![
            http_tool(
                "elasticsearch_search",
                "Search Elasticsearch with a query string. Returns hits with their source documents.",
                create_schema(
                    json!({
                        "index": {
                            "type": "string",
                            "description": "Index name or pattern (e.g., 'logs-*'). Empty searches all indices.",
                            "default": ""
                        },
                        "query": {
                            "type": "string",
                            "description": "Lucene query string (e.g., 'level:error AND service:api')"
                        },
                        "size": {
                            "type": "integer",
                            "description": "Number of hits to return (1-10000)",
                            "default": 10,
                            "minimum": 1,
                            "maximum": MAX_SEARCH_SIZE
                        },
                        "from": {
                            "type": "integer",
                            "description": "Offset of the first hit",
                            "default": 0
                        },
                        "sort": {
                            "type": "string",
                            "description": "Sort as 'field:order' (e.g., '@timestamp:desc')"
                        }
                    }),
                    vec![],
                ),
            ),
            http_tool(
                "elasticsearch_get_document",
                "Get a document by ID. Reports found=false when it does not exist.",
                create_schema(
                    json!({
                        "index": { "type": "string", "description": "Index name" },
                        "id": { "type": "string", "description": "Document ID" }
                    }),
                    vec!["index", "id"],
                ),
            ),
            http_tool(
                "elasticsearch_index_document",
                "Create or replace a document. Without an ID, Elasticsearch generates one.",
                create_schema(
                    json!({
                        "index": { "type": "string", "description": "Index name" },
                        "document": { "type": "object", "description": "Document body" },
                        "id": { "type": "string", "description": "Document ID (optional)" },
                        "refresh": {
                            "type": "string",
                            "description": "Make the document searchable immediately ('true'/'false')",
                            "enum": ["true", "false"],
                            "default": "false"
                        }
                    }),
                    vec!["index", "document"],
                ),
            ),
            http_tool(
                "elasticsearch_delete_document",
                "Delete a document by ID.",
                create_schema(
                    json!({
                        "index": { "type": "string", "description": "Index name" },
                        "id": { "type": "string", "description": "Document ID" }
                    }),
                    vec!["index", "id"],
                ),
            ),
            http_tool(
                "elasticsearch_list_indices",
                "List indices with health, status, document count and size.",
                create_schema(
                    json!({
                        "pattern": {
                            "type": "string",
                            "description": "Index pattern",
                            "default": "*"
                        }
                    }),
                    vec![],
                ),
            ),
            http_tool(
                "elasticsearch_cluster_health",
                "Get cluster health: status, node counts and shard allocation.",
                create_schema(json!({}), vec![]),
            ),
        ]
    }

    async fn dispatch(&self, operation: &str, input: ToolInput) -> AtkResult<ToolResult> {
        Ok(match operation {
            "elasticsearch_search" => ToolResult::from_outcome(self.search(input.parse()?).await),
            "elasticsearch_get_document" => {
                ToolResult::from_outcome(self.get_document(input.parse()?).await)
            }
            "elasticsearch_index_document" => {
                ToolResult::from_outcome(self.index_document(input.parse()?).await)
            }
            "elasticsearch_delete_document" => {
                ToolResult::from_outcome(self.delete_document(input.parse()?).await)
            }
            "elasticsearch_list_indices" => {
                ToolResult::from_outcome(self.list_indices(input.parse()?).await)
            }
            "elasticsearch_cluster_health" => {
                ToolResult::from_outcome(self.cluster_health().await)
            }
            other => return Err(unknown_operation(other)),
        })
    }
}
