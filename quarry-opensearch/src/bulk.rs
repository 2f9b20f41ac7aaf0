//! Bulk operations.

use crate::{
    error::{Result, SearchError, ensure_index_name},
    transport::{Request, Transport},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Kind of a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    /// Write a document, replacing any existing one with the same id.
    #[serde(rename = "index")]
    Write,
    /// Create a document; fails if the id already exists.
    Create,
    /// Merge a partial document into an existing one.
    Update,
    /// Delete a document.
    Delete,
}

impl BulkAction {
    /// Action name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Write => "index",
            BulkAction::Create => "create",
            BulkAction::Update => "update",
            BulkAction::Delete => "delete",
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation of a [`BulkBatch`], targeting one document in one index.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperation {
    action: BulkAction,
    index: String,
    id: Option<String>,
    source: Option<Value>,
}

impl BulkOperation {
    /// Write `doc`, with a server-assigned id when `id` is `None`.
    pub fn write<T: Serialize>(
        index: impl Into<String>,
        id: Option<String>,
        doc: &T,
    ) -> Result<Self> {
        Ok(Self {
            action: BulkAction::Write,
            index: index.into(),
            id,
            source: Some(serde_json::to_value(doc)?),
        })
    }

    /// Create `doc`; the item fails if the id already exists.
    pub fn create<T: Serialize>(
        index: impl Into<String>,
        id: Option<String>,
        doc: &T,
    ) -> Result<Self> {
        Ok(Self {
            action: BulkAction::Create,
            index: index.into(),
            id,
            source: Some(serde_json::to_value(doc)?),
        })
    }

    /// Merge `partial` into the document `id`.
    pub fn update<T: Serialize>(
        index: impl Into<String>,
        id: impl Into<String>,
        partial: &T,
    ) -> Result<Self> {
        Ok(Self {
            action: BulkAction::Update,
            index: index.into(),
            id: Some(id.into()),
            source: Some(serde_json::to_value(partial)?),
        })
    }

    /// Delete the document `id`.
    pub fn delete(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            action: BulkAction::Delete,
            index: index.into(),
            id: Some(id.into()),
            source: None,
        }
    }

    /// Operation kind.
    pub fn action(&self) -> BulkAction {
        self.action
    }

    /// Target index.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Target document id, if given.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn validate(&self) -> Result<()> {
        ensure_index_name(&self.index)?;
        if matches!(self.action, BulkAction::Update | BulkAction::Delete)
            && self.id.as_deref().is_none_or(|id| id.is_empty())
        {
            return Err(SearchError::validation(format!(
                "Bulk {} on index {} requires a document id",
                self.action, self.index
            )));
        }
        Ok(())
    }

    /// Convert to bulk request lines.
    pub fn to_bulk_lines(&self) -> Vec<Value> {
        let mut meta = json!({ "_index": self.index });
        if let Some(id) = &self.id {
            meta["_id"] = json!(id);
        }

        let mut header = Map::new();
        header.insert(self.action.as_str().to_string(), meta);
        let header = Value::Object(header);

        match (&self.action, &self.source) {
            (BulkAction::Delete, _) | (_, None) => vec![header],
            (BulkAction::Update, Some(partial)) => vec![header, json!({ "doc": partial })],
            (_, Some(doc)) => vec![header, doc.clone()],
        }
    }
}

/// Ordered sequence of operations submitted in one round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkBatch {
    operations: Vec<BulkOperation>,
}

impl BulkBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation.
    pub fn add(mut self, operation: BulkOperation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Append an operation in place.
    pub fn push(&mut self, operation: BulkOperation) {
        self.operations.push(operation);
    }

    /// Operations in submission order.
    pub fn operations(&self) -> &[BulkOperation] {
        &self.operations
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the batch has no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn to_lines(&self) -> Vec<Value> {
        self.operations
            .iter()
            .flat_map(BulkOperation::to_bulk_lines)
            .collect()
    }
}

impl FromIterator<BulkOperation> for BulkBatch {
    fn from_iter<I: IntoIterator<Item = BulkOperation>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}

/// Submits [`BulkBatch`]es and aggregates the per-item results.
///
/// Failed items are logged and reported; nothing is retried or rolled back.
#[derive(Clone)]
pub struct BulkExecutor {
    transport: Arc<dyn Transport>,
}

impl BulkExecutor {
    /// Create a new bulk executor.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Submit a batch as a single `_bulk` request.
    pub async fn execute(&self, batch: &BulkBatch) -> Result<BulkOutcome> {
        if batch.is_empty() {
            return Err(SearchError::validation("Bulk batch must contain at least one operation"));
        }
        for operation in batch.operations() {
            operation.validate()?;
        }

        debug!(operations = batch.len(), "Submitting bulk request");

        let request = Request::post(&["_bulk"]).ndjson(batch.to_lines());
        let response = self.transport.send(request).await?.error_for_status()?;
        let response: BulkResponse = response.json()?;

        let outcome = BulkOutcome::from_response(batch, response);
        outcome.log();
        Ok(outcome)
    }
}

/// Raw `_bulk` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResponse {
    /// Time taken in milliseconds.
    pub took: u64,
    /// Whether any item failed.
    pub errors: bool,
    /// Individual item results.
    pub items: Vec<BulkItemResult>,
}

/// Bulk item result, keyed by action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkItemResult {
    /// Write result.
    Index(BulkItemStatus),
    /// Create result.
    Create(BulkItemStatus),
    /// Update result.
    Update(BulkItemStatus),
    /// Delete result.
    Delete(BulkItemStatus),
}

impl BulkItemResult {
    fn into_parts(self) -> (BulkAction, BulkItemStatus) {
        match self {
            BulkItemResult::Index(s) => (BulkAction::Write, s),
            BulkItemResult::Create(s) => (BulkAction::Create, s),
            BulkItemResult::Update(s) => (BulkAction::Update, s),
            BulkItemResult::Delete(s) => (BulkAction::Delete, s),
        }
    }
}

/// Status of a bulk item operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemStatus {
    /// Index name.
    #[serde(rename = "_index", default)]
    pub index: String,
    /// Document ID.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Document version.
    #[serde(rename = "_version", default)]
    pub version: Option<i64>,
    /// Result (`created`, `updated`, `deleted`, `not_found`, `noop`).
    #[serde(default)]
    pub result: Option<String>,
    /// HTTP status code.
    pub status: u16,
    /// Error details.
    #[serde(default)]
    pub error: Option<BulkItemError>,
}

/// Bulk item error details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemError {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error reason.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Outcome of one operation in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemOutcome {
    /// Position of the operation in the submitted batch.
    pub position: usize,
    /// Operation kind.
    pub action: BulkAction,
    /// Index name.
    pub index: String,
    /// Document id (server-assigned for writes without one).
    pub id: String,
    /// HTTP status of the item.
    pub status: u16,
    /// Result reported by the engine.
    pub result: Option<String>,
    /// Error, if the item failed.
    pub error: Option<BulkItemError>,
}

impl BulkItemOutcome {
    /// Whether this item succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }

    /// Error reason, falling back to the error type.
    pub fn failure_reason(&self) -> Option<&str> {
        self.error
            .as_ref()
            .map(|e| e.reason.as_deref().unwrap_or(&e.error_type))
    }
}

/// Aggregate result of a batch. Partial success is possible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    /// Time taken in milliseconds.
    pub took: u64,
    /// Whether the engine flagged any item as failed.
    pub errors: bool,
    /// Per-item outcomes in submission order.
    pub items: Vec<BulkItemOutcome>,
}

impl BulkOutcome {
    /// Successful outcome with no items, for batches that had nothing to do.
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_response(batch: &BulkBatch, response: BulkResponse) -> Self {
        let items = response
            .items
            .into_iter()
            .enumerate()
            .map(|(position, item)| {
                let (action, status) = item.into_parts();
                let submitted = batch.operations().get(position);
                BulkItemOutcome {
                    position,
                    action,
                    index: if status.index.is_empty() {
                        submitted.map(|op| op.index.clone()).unwrap_or_default()
                    } else {
                        status.index
                    },
                    id: if status.id.is_empty() {
                        submitted
                            .and_then(|op| op.id.clone())
                            .unwrap_or_default()
                    } else {
                        status.id
                    },
                    status: status.status,
                    result: status.result,
                    error: status.error,
                }
            })
            .collect();

        Self {
            took: response.took,
            errors: response.errors,
            items,
        }
    }

    /// Whether every operation succeeded.
    ///
    /// Items with an error or a non-2xx status count as failures even when the response-level
    /// `errors` flag is unset.
    pub fn is_success(&self) -> bool {
        !self.errors && self.failures().next().is_none()
    }

    /// Failed items.
    pub fn failures(&self) -> impl Iterator<Item = &BulkItemOutcome> {
        self.items.iter().filter(|item| !item.is_success())
    }

    /// Reasons of every failed item, in submission order.
    pub fn failure_reasons(&self) -> Vec<String> {
        self.failures()
            .filter_map(|item| item.failure_reason().map(str::to_string))
            .collect()
    }

    /// Number of successful items.
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.is_success()).count()
    }

    /// Ids of every item, in submission order.
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    fn log(&self) {
        if self.is_success() {
            info!(items = self.items.len(), took_ms = self.took, "Bulk request succeeded");
            return;
        }

        for item in self.failures() {
            error!(
                position = item.position,
                action = %item.action,
                index = %item.index,
                id = %item.id,
                status = item.status,
                reason = item.failure_reason().unwrap_or("unknown"),
                "Bulk item failed"
            );
        }
    }
}
