//! Index lifecycle management.

use crate::{
    error::{Result, SearchError, ensure_index_name},
    mapping::Mapping,
    transport::{Request, Response, Transport},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Index manager for creating, inspecting and removing indices.
///
/// Every `create*` call replaces: an existing index of the same name is deleted first,
/// so its documents and schema are gone afterwards.
#[derive(Clone)]
pub struct IndexManager {
    transport: Arc<dyn Transport>,
}

impl IndexManager {
    /// Create a new index manager.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Check if an index exists.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        ensure_index_name(name)?;
        debug!(index = name, "Checking if index exists");

        let response = self.transport.send(Request::head(&[name])).await?;

        match response.status() {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => Err(response.into_engine_error()),
        }
    }

    /// Create an empty index with no explicit schema.
    pub async fn create(&self, name: &str) -> Result<bool> {
        self.replace(name, None).await
    }

    /// Create an index with the given mapping.
    pub async fn create_with_mapping(&self, name: &str, mapping: &Mapping) -> Result<bool> {
        self.replace(name, Some(json!({ "mappings": mapping.to_json() })))
            .await
    }

    /// Create an index from a serialized mapping document (`{"properties": {...}}`).
    ///
    /// The document is parsed before anything is sent; a malformed one is a validation error.
    pub async fn create_with_mapping_json(&self, name: &str, mapping: &str) -> Result<bool> {
        ensure_index_name(name)?;
        let mapping: Mapping = mapping.parse()?;
        self.create_with_mapping(name, &mapping).await
    }

    /// Create an index with settings and an optional mapping.
    pub async fn create_with_settings(&self, name: &str, settings: &IndexSettings) -> Result<bool> {
        let body = settings.to_json();
        let body = if body.as_object().is_some_and(Map::is_empty) {
            None
        } else {
            Some(body)
        };
        self.replace(name, body).await
    }

    async fn replace(&self, name: &str, body: Option<Value>) -> Result<bool> {
        ensure_index_name(name)?;

        if self.exists(name).await? {
            info!(index = name, "Index already exists, replacing it");
            self.delete(name).await?;
        }

        let mut request = Request::put(&[name]);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.transport.send(request).await?.error_for_status()?;
        let ack: AcknowledgedResponse = response.json()?;

        info!(index = name, acknowledged = ack.acknowledged, "Created index");
        Ok(ack.acknowledged)
    }

    /// Delete an index.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        ensure_index_name(name)?;

        let response = self.transport.send(Request::delete(&[name])).await?;
        let response = index_response(name, response)?;
        let ack: AcknowledgedResponse = response.json()?;

        info!(index = name, acknowledged = ack.acknowledged, "Deleted index");
        Ok(ack.acknowledged)
    }

    /// Get mapping, settings and aliases of one index.
    pub async fn get(&self, name: &str) -> Result<IndexDetails> {
        ensure_index_name(name)?;
        debug!(index = name, "Getting index");

        let response = self.transport.send(Request::get(&[name])).await?;
        let mut body = index_response(name, response)?.into_body();

        let entry = body
            .get_mut(name)
            .map(Value::take)
            .ok_or_else(|| SearchError::IndexNotFound(name.to_string()))?;

        IndexDetails::from_json(name, entry)
    }

    /// Get the mapping of one index.
    pub async fn get_mapping(&self, name: &str) -> Result<Mapping> {
        ensure_index_name(name)?;
        debug!(index = name, "Getting mapping");

        let response = self.transport.send(Request::get(&[name, "_mapping"])).await?;
        let body = index_response(name, response)?.into_body();

        match body.get(name) {
            Some(entry) => mapping_of(&entry["mappings"]),
            None => Err(SearchError::IndexNotFound(name.to_string())),
        }
    }

    /// Get the mappings of every index, keyed by index name.
    pub async fn get_all_mappings(&self) -> Result<BTreeMap<String, Mapping>> {
        debug!("Getting all mappings");

        let response = self
            .transport
            .send(Request::get(&["_mapping"]))
            .await?
            .error_for_status()?;

        let body = response.into_body();
        let Some(indices) = body.as_object() else {
            return Ok(BTreeMap::new());
        };

        indices
            .iter()
            .map(|(name, entry)| Ok((name.clone(), mapping_of(&entry["mappings"])?)))
            .collect()
    }

    /// List all indices.
    pub async fn list(&self) -> Result<Vec<IndexSummary>> {
        debug!("Listing indices");

        let response = self
            .transport
            .send(Request::get(&["_cat", "indices"]).param("format", "json"))
            .await?
            .error_for_status()?;

        let records: Vec<CatIndexRecord> = response.json()?;
        Ok(records.into_iter().map(IndexSummary::from).collect())
    }

    /// Refresh an index so recent writes become searchable.
    ///
    /// Returns `false` when no shard succeeded, including when none were reached; partial failure is logged.
    pub async fn refresh(&self, name: &str) -> Result<bool> {
        self.shard_operation(name, "_refresh").await
    }

    /// Flush an index to durable storage.
    ///
    /// Returns `false` when no shard succeeded, including when none were reached; partial failure is logged.
    pub async fn flush(&self, name: &str) -> Result<bool> {
        self.shard_operation(name, "_flush").await
    }

    async fn shard_operation(&self, name: &str, endpoint: &str) -> Result<bool> {
        ensure_index_name(name)?;
        debug!(index = name, operation = endpoint, "Running shard operation");

        let response = self.transport.send(Request::post(&[name, endpoint])).await?;
        let response = index_response(name, response)?;
        let shards: ShardsResponse = response.json()?;

        Ok(shards.shards.report(name, endpoint))
    }
}

/// Map index-level 404s to [`SearchError::IndexNotFound`] and other failures to engine errors.
pub(crate) fn index_response(name: &str, response: Response) -> Result<Response> {
    if response.is_not_found() {
        return Err(SearchError::IndexNotFound(name.to_string()));
    }
    response.error_for_status()
}

fn mapping_of(value: &Value) -> Result<Mapping> {
    if value.is_null() {
        return Ok(Mapping::new());
    }
    Mapping::from_json(value)
}

/// Index settings for creating indices.
#[derive(Debug, Clone, Default)]
pub struct IndexSettings {
    /// Number of shards.
    pub number_of_shards: Option<u32>,
    /// Number of replicas.
    pub number_of_replicas: Option<u32>,
    /// Refresh interval.
    pub refresh_interval: Option<String>,
    /// Analysis settings.
    pub analysis: Option<Value>,
    /// Field mappings.
    pub mappings: Option<Mapping>,
}

impl IndexSettings {
    /// Create new index settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of shards.
    pub fn shards(mut self, shards: u32) -> Self {
        self.number_of_shards = Some(shards);
        self
    }

    /// Set number of replicas.
    pub fn replicas(mut self, replicas: u32) -> Self {
        self.number_of_replicas = Some(replicas);
        self
    }

    /// Set refresh interval.
    pub fn refresh_interval(mut self, interval: impl Into<String>) -> Self {
        self.refresh_interval = Some(interval.into());
        self
    }

    /// Set analysis settings.
    pub fn analysis(mut self, analysis: Value) -> Self {
        self.analysis = Some(analysis);
        self
    }

    /// Set mappings.
    pub fn mappings(mut self, mappings: Mapping) -> Self {
        self.mappings = Some(mappings);
        self
    }

    fn to_json(&self) -> Value {
        let mut body = Map::new();
        let mut settings = Map::new();

        if let Some(shards) = self.number_of_shards {
            settings.insert("number_of_shards".to_string(), json!(shards));
        }
        if let Some(replicas) = self.number_of_replicas {
            settings.insert("number_of_replicas".to_string(), json!(replicas));
        }
        if let Some(interval) = &self.refresh_interval {
            settings.insert("refresh_interval".to_string(), json!(interval));
        }
        if let Some(analysis) = &self.analysis {
            settings.insert("analysis".to_string(), analysis.clone());
        }

        if !settings.is_empty() {
            body.insert("settings".to_string(), Value::Object(settings));
        }

        if let Some(mappings) = &self.mappings {
            body.insert("mappings".to_string(), mappings.to_json());
        }

        Value::Object(body)
    }
}

/// Response of create/delete index calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcknowledgedResponse {
    /// Whether the cluster accepted the change.
    pub acknowledged: bool,
    /// Whether the required shard copies started in time.
    #[serde(default)]
    pub shards_acknowledged: Option<bool>,
    /// Index name, on create.
    #[serde(default)]
    pub index: Option<String>,
}

/// Per-shard result counts of an index operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardStatistics {
    /// Shards the operation was sent to.
    pub total: u32,
    /// Shards that succeeded.
    pub successful: u32,
    /// Shards that failed.
    pub failed: u32,
    /// Failure details.
    #[serde(default)]
    pub failures: Vec<Value>,
}

impl ShardStatistics {
    /// Number of failed shards, taking the failure list into account when the count is missing.
    pub fn failed_count(&self) -> u32 {
        let listed = u32::try_from(self.failures.len()).unwrap_or(u32::MAX);
        self.failed.max(listed)
    }

    /// Whether no shard succeeded. An operation that reached no shards counts as failed.
    pub fn all_failed(&self) -> bool {
        self.failed_count() >= self.total
    }

    fn report(&self, index: &str, operation: &str) -> bool {
        if self.all_failed() {
            warn!(
                index,
                operation,
                total = self.total,
                failed = self.failed_count(),
                "Shard operation failed on every shard"
            );
            return false;
        }

        if self.failed_count() > 0 {
            warn!(
                index,
                operation,
                total = self.total,
                successful = self.successful,
                failed = self.failed_count(),
                failures = ?self.failures,
                "Shard operation partially failed"
            );
        } else {
            debug!(index, operation, total = self.total, "Shard operation succeeded");
        }

        true
    }
}

#[derive(Debug, Deserialize)]
struct ShardsResponse {
    #[serde(rename = "_shards")]
    shards: ShardStatistics,
}

/// Mapping, settings and aliases of one index.
#[derive(Debug, Clone)]
pub struct IndexDetails {
    /// Index name.
    pub name: String,
    /// Parsed mapping.
    pub mapping: Mapping,
    /// Raw index settings.
    pub settings: Value,
    /// Alias names mapped to their definitions.
    pub aliases: BTreeMap<String, Value>,
}

impl IndexDetails {
    fn from_json(name: &str, mut entry: Value) -> Result<Self> {
        let mapping = mapping_of(&entry["mappings"])?;
        let settings = entry.get_mut("settings").map(Value::take).unwrap_or_default();
        let aliases = match entry.get_mut("aliases").map(Value::take) {
            Some(Value::Object(aliases)) => aliases.into_iter().collect(),
            _ => BTreeMap::new(),
        };

        Ok(Self {
            name: name.to_string(),
            mapping,
            settings,
            aliases,
        })
    }

    /// `index.number_of_shards`, if present.
    pub fn number_of_shards(&self) -> Option<u32> {
        setting_u32(&self.settings["index"]["number_of_shards"])
    }

    /// `index.number_of_replicas`, if present.
    pub fn number_of_replicas(&self) -> Option<u32> {
        setting_u32(&self.settings["index"]["number_of_replicas"])
    }
}

// Settings come back as strings.
fn setting_u32(value: &Value) -> Option<u32> {
    match value {
        Value::String(s) => s.parse().ok(),
        other => other.as_u64().and_then(|n| u32::try_from(n).ok()),
    }
}

#[derive(Debug, Deserialize)]
struct CatIndexRecord {
    #[serde(default)]
    health: Option<String>,
    #[serde(default)]
    status: Option<String>,
    index: String,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    pri: Option<String>,
    #[serde(default)]
    rep: Option<String>,
    #[serde(rename = "docs.count", default)]
    docs_count: Option<String>,
    #[serde(rename = "store.size", default)]
    store_size: Option<String>,
}

/// Index information from `_cat/indices`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSummary {
    /// Index name.
    pub name: String,
    /// Health status (`green`, `yellow`, `red`).
    pub health: String,
    /// Open/closed status.
    pub status: String,
    /// Index UUID.
    pub uuid: String,
    /// Primary shard count.
    pub primary_shards: u32,
    /// Replica count.
    pub replicas: u32,
    /// Document count; zero for closed indices.
    pub docs_count: u64,
    /// Store size as reported (e.g. `12.3kb`).
    pub store_size: String,
}

impl From<CatIndexRecord> for IndexSummary {
    fn from(record: CatIndexRecord) -> Self {
        Self {
            name: record.index,
            health: record.health.unwrap_or_default(),
            status: record.status.unwrap_or_default(),
            uuid: record.uuid.unwrap_or_default(),
            primary_shards: parse_or_zero(record.pri.as_deref()),
            replicas: parse_or_zero(record.rep.as_deref()),
            docs_count: parse_or_zero(record.docs_count.as_deref()),
            store_size: record.store_size.unwrap_or_default(),
        }
    }
}

fn parse_or_zero<T: std::str::FromStr + Default>(value: Option<&str>) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}
