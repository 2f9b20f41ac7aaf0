//! Document store: single-document CRUD and whole-index enumeration.

use crate::{
    bulk::{BulkBatch, BulkExecutor, BulkOperation, BulkOutcome},
    error::{Result, SearchError, ensure_index_name},
    index::{IndexManager, ShardStatistics, index_response},
    query::Query,
    search::{QueryExecutor, SearchRequest},
    transport::{Request, Response, Transport},
};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Records that can be stored and searched.
///
/// Implemented for every `Serialize + DeserializeOwned` type.
///
/// ```rust
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Sku {
///     id: u64,
///     sku_name: String,
///     sku_price: f64,
/// }
///
/// fn assert_document<T: quarry_opensearch::Document>() {}
/// assert_document::<Sku>();
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync {}

impl<T> Document for T where T: Serialize + DeserializeOwned + Send + Sync {}

/// Result of a single-document write, update or delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResult {
    /// Index name.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document ID.
    #[serde(rename = "_id")]
    pub id: String,
    /// Document version after the operation.
    #[serde(rename = "_version", default)]
    pub version: Option<i64>,
    /// `created`, `updated`, `deleted`, `noop` or `not_found`.
    pub result: String,
    /// Shards the operation reached.
    #[serde(rename = "_shards", default)]
    pub shards: Option<ShardStatistics>,
    /// Sequence number.
    #[serde(rename = "_seq_no", default)]
    pub seq_no: Option<i64>,
    /// Primary term.
    #[serde(rename = "_primary_term", default)]
    pub primary_term: Option<i64>,
}

/// Raw response of a document get.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct GetResponse<T> {
    /// Index name.
    #[serde(rename = "_index")]
    pub index: String,
    /// Document ID.
    #[serde(rename = "_id")]
    pub id: String,
    /// Document version.
    #[serde(rename = "_version", default)]
    pub version: Option<i64>,
    /// Whether the document exists.
    pub found: bool,
    /// The document, when found.
    #[serde(rename = "_source", default = "Option::default")]
    pub source: Option<T>,
}

/// Single and bulk document operations against one or more indices.
///
/// Whole-index scans are bounded by the scan limit; an index holding more documents
/// than that is truncated with a warning.
#[derive(Clone)]
pub struct DocumentStore {
    transport: Arc<dyn Transport>,
    indices: IndexManager,
    bulk: BulkExecutor,
    queries: QueryExecutor,
    scan_limit: u32,
}

impl DocumentStore {
    /// Create a document store.
    pub fn new(transport: Arc<dyn Transport>, scan_limit: u32) -> Self {
        Self {
            indices: IndexManager::new(transport.clone()),
            bulk: BulkExecutor::new(transport.clone()),
            queries: QueryExecutor::new(transport.clone()),
            transport,
            scan_limit,
        }
    }

    /// Maximum number of documents a whole-index scan returns.
    pub fn scan_limit(&self) -> u32 {
        self.scan_limit
    }

    /// Write a document with a server-assigned id; returns the id.
    pub async fn add<T: Document>(&self, index: &str, doc: &T) -> Result<String> {
        ensure_index_name(index)?;

        let request = Request::post(&[index, "_doc"]).json(serde_json::to_value(doc)?);
        let result = self.write(index, request).await?;

        info!(index, id = %result.id, result = %result.result, "Added document");
        Ok(result.id)
    }

    /// Write a document under `id`, replacing any existing one; returns the id.
    pub async fn add_with_id<T: Document>(&self, index: &str, id: &str, doc: &T) -> Result<String> {
        ensure_index_name(index)?;
        ensure_id(id)?;

        let request = Request::put(&[index, "_doc", id]).json(serde_json::to_value(doc)?);
        let result = self.write(index, request).await?;

        info!(index, id, result = %result.result, "Added document");
        Ok(result.id)
    }

    /// Merge `partial` into the document `id`.
    pub async fn update<P: Serialize>(&self, index: &str, partial: &P, id: &str) -> Result<WriteResult> {
        ensure_index_name(index)?;
        ensure_id(id)?;

        let request =
            Request::post(&[index, "_update", id]).json(json!({ "doc": serde_json::to_value(partial)? }));
        let response = self.transport.send(request).await?;
        let result: WriteResult = document_response(index, id, response)?.json()?;

        info!(index, id, result = %result.result, "Updated document");
        Ok(result)
    }

    /// Fetch the document `id`.
    pub async fn get<T: Document>(&self, index: &str, id: &str) -> Result<T> {
        ensure_index_name(index)?;
        ensure_id(id)?;
        debug!(index, id, "Getting document");

        let response = self.transport.send(Request::get(&[index, "_doc", id])).await?;
        let found: GetResponse<T> = document_response(index, id, response)?.json()?;

        match found.source {
            Some(doc) if found.found => Ok(doc),
            _ => Err(SearchError::document_not_found(index, id)),
        }
    }

    /// Every document of the index, up to the scan limit.
    pub async fn get_all<T: Document>(&self, index: &str) -> Result<Vec<T>> {
        let request = self.scan(index);
        let result = self.queries.execute::<T>(&request).await?;

        warn_if_truncated(index, result.total, result.len(), self.scan_limit);
        Ok(result.into_documents())
    }

    /// Ids of every document of the index, up to the scan limit.
    pub async fn get_all_ids(&self, index: &str) -> Result<Vec<String>> {
        let request = self.scan(index).source(false);
        let response = self.queries.send::<IgnoredAny>(&request).await?;
        let ids: Vec<String> = response.hits.hits.into_iter().map(|hit| hit.id).collect();

        let total = response.hits.total.as_ref().map(|total| total.value());
        warn_if_truncated(index, total, ids.len(), self.scan_limit);
        Ok(ids)
    }

    /// Delete the document `id`.
    pub async fn delete(&self, index: &str, id: &str) -> Result<WriteResult> {
        ensure_index_name(index)?;
        ensure_id(id)?;

        let response = self.transport.send(Request::delete(&[index, "_doc", id])).await?;
        let result: WriteResult = document_response(index, id, response)?.json()?;

        info!(index, id, "Deleted document");
        Ok(result)
    }

    /// Delete every document of the index (up to the scan limit), then refresh.
    ///
    /// Not atomic: documents written between the id scan and the bulk delete survive.
    pub async fn delete_all(&self, index: &str) -> Result<BulkOutcome> {
        let ids = self.get_all_ids(index).await?;
        if ids.is_empty() {
            debug!(index, "No documents to delete");
            return Ok(BulkOutcome::empty());
        }

        let outcome = self.bulk_delete(index, &ids).await?;
        self.indices.refresh(index).await?;

        info!(index, deleted = outcome.succeeded(), "Deleted all documents");
        Ok(outcome)
    }

    /// Write many documents with server-assigned ids in one round trip.
    pub async fn bulk_add<T: Document>(&self, index: &str, docs: &[T]) -> Result<BulkOutcome> {
        ensure_index_name(index)?;
        let batch = docs
            .iter()
            .map(|doc| BulkOperation::write(index, None, doc))
            .collect::<Result<Vec<_>>>()?;
        self.submit(batch.into_iter().collect()).await
    }

    /// Write many documents under the given ids in one round trip.
    pub async fn bulk_add_with_ids<T: Document>(
        &self,
        index: &str,
        docs: &[(String, T)],
    ) -> Result<BulkOutcome> {
        ensure_index_name(index)?;
        let batch = docs
            .iter()
            .map(|(id, doc)| BulkOperation::write(index, Some(id.clone()), doc))
            .collect::<Result<Vec<_>>>()?;
        self.submit(batch.into_iter().collect()).await
    }

    /// Delete many documents by id in one round trip.
    pub async fn bulk_delete<S: AsRef<str>>(&self, index: &str, ids: &[S]) -> Result<BulkOutcome> {
        ensure_index_name(index)?;
        let batch = ids
            .iter()
            .map(|id| BulkOperation::delete(index, id.as_ref()))
            .collect::<BulkBatch>();
        self.submit(batch).await
    }

    async fn submit(&self, batch: BulkBatch) -> Result<BulkOutcome> {
        if batch.is_empty() {
            return Ok(BulkOutcome::empty());
        }
        self.bulk.execute(&batch).await
    }

    async fn write(&self, index: &str, request: Request) -> Result<WriteResult> {
        let response = self.transport.send(request).await?;
        index_response(index, response)?.json()
    }

    fn scan(&self, index: &str) -> SearchRequest {
        SearchRequest::new(index)
            .query(Query::MatchAll)
            .size(self.scan_limit)
            .track_total_hits(true)
    }
}

fn ensure_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(SearchError::validation("Document id cannot be empty"));
    }
    Ok(())
}

/// Tell a missing index from a missing document on 404.
fn document_response(index: &str, id: &str, response: Response) -> Result<Response> {
    if response.is_index_missing() {
        return Err(SearchError::IndexNotFound(index.to_string()));
    }
    if response.is_not_found() {
        return Err(SearchError::document_not_found(index, id));
    }
    response.error_for_status()
}

fn warn_if_truncated(index: &str, total: Option<u64>, returned: usize, scan_limit: u32) {
    let returned = returned as u64;
    if let Some(total) = total.filter(|total| *total > returned) {
        warn!(
            index,
            total,
            returned,
            scan_limit,
            "Index holds more documents than the scan limit; result truncated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use crate::transport::{Body, Method};
    use serde_json::{Value, json};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sku {
        id: u64,
        name: String,
        price: f64,
    }

    fn sku(id: u64) -> Sku {
        Sku {
            id,
            name: format!("bike-{}", id),
            price: 100.0 + id as f64,
        }
    }

    fn store(mock: &Arc<MockTransport>) -> DocumentStore {
        DocumentStore::new(mock.clone(), 10_000)
    }

    fn written(id: &str, result: &str) -> Value {
        json!({
            "_index": "skus", "_id": id, "_version": 1, "result": result,
            "_shards": { "total": 2, "successful": 1, "failed": 0 },
            "_seq_no": 0, "_primary_term": 1
        })
    }

    fn ids_page(ids: &[&str], total: u64) -> Value {
        let hits: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "_index": "skus", "_id": id, "_score": 1.0 }))
            .collect();
        json!({ "took": 1, "hits": { "total": { "value": total, "relation": "eq" }, "hits": hits } })
    }

    #[tokio::test]
    async fn test_add_and_add_with_id() {
        let mock = MockTransport::new()
            .respond(201, written("generated-1", "created"))
            .respond(200, written("7", "updated"))
            .shared();
        let docs = store(&mock);

        assert_eq!(docs.add("skus", &sku(1)).await.unwrap(), "generated-1");
        assert_eq!(docs.add_with_id("skus", "7", &sku(7)).await.unwrap(), "7");

        let requests = mock.requests();
        assert_eq!((requests[0].method(), requests[0].path()), (Method::Post, "/skus/_doc"));
        assert_eq!((requests[1].method(), requests[1].path()), (Method::Put, "/skus/_doc/7"));
    }

    #[tokio::test]
    async fn test_get_round_trip_and_missing() {
        let mock = MockTransport::new()
            .respond(
                200,
                json!({ "_index": "skus", "_id": "1", "_version": 1, "found": true,
                        "_source": { "id": 1, "name": "bike-1", "price": 101.0 } }),
            )
            .respond(404, json!({ "_index": "skus", "_id": "2", "found": false }))
            .respond(
                404,
                json!({ "error": { "type": "index_not_found_exception", "reason": "no such index [gone]" } }),
            )
            .shared();
        let docs = store(&mock);

        assert_eq!(docs.get::<Sku>("skus", "1").await.unwrap(), sku(1));
        assert!(matches!(
            docs.get::<Sku>("skus", "2").await,
            Err(SearchError::DocumentNotFound { id, .. }) if id == "2"
        ));
        assert!(matches!(
            docs.get::<Sku>("gone", "1").await,
            Err(SearchError::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_sends_partial_doc() {
        let mock = MockTransport::new()
            .respond(200, written("1", "updated"))
            .respond(
                404,
                json!({ "error": { "type": "document_missing_exception", "reason": "[2]: document missing" } }),
            )
            .shared();
        let docs = store(&mock);

        let result = docs.update("skus", &json!({ "price": 99.0 }), "1").await.unwrap();
        assert_eq!(result.result, "updated");

        let request = &mock.requests()[0];
        assert_eq!(request.path(), "/skus/_update/1");
        assert_eq!(request.body(), Some(&Body::Json(json!({ "doc": { "price": 99.0 } }))));

        assert!(matches!(
            docs.update("skus", &json!({ "price": 1.0 }), "2").await,
            Err(SearchError::DocumentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let mock = MockTransport::new()
            .respond(200, written("1", "deleted"))
            .respond(404, written("1", "not_found"))
            .shared();
        let docs = store(&mock);

        assert_eq!(docs.delete("skus", "1").await.unwrap().result, "deleted");
        assert!(matches!(
            docs.delete("skus", "1").await,
            Err(SearchError::DocumentNotFound { .. })
        ));
        assert_eq!(mock.requests()[0].method(), Method::Delete);
    }

    #[tokio::test]
    async fn test_delete_reports_full_write_result() {
        let mock = MockTransport::new()
            .respond(200, written("1", "deleted"))
            .shared();

        let result = store(&mock).delete("skus", "1").await.unwrap();
        assert_eq!(
            result,
            WriteResult {
                index: "skus".to_string(),
                id: "1".to_string(),
                version: Some(1),
                result: "deleted".to_string(),
                shards: Some(ShardStatistics {
                    total: 2,
                    successful: 1,
                    failed: 0,
                    failures: Vec::new(),
                }),
                seq_no: Some(0),
                primary_term: Some(1),
            }
        );
    }

    #[tokio::test]
    async fn test_get_all_is_bounded_by_scan_limit() {
        let mock = MockTransport::new()
            .respond(
                200,
                json!({ "took": 1, "hits": { "total": { "value": 3, "relation": "eq" }, "hits": [
                    { "_index": "skus", "_id": "1", "_source": { "id": 1, "name": "bike-1", "price": 101.0 } },
                    { "_index": "skus", "_id": "2", "_source": { "id": 2, "name": "bike-2", "price": 102.0 } }
                ] } }),
            )
            .shared();
        let docs = DocumentStore::new(mock.clone(), 2);

        let all: Vec<Sku> = docs.get_all("skus").await.unwrap();
        assert_eq!(all, vec![sku(1), sku(2)]);

        match mock.requests()[0].body() {
            Some(Body::Json(body)) => {
                assert_eq!(body["size"], 2);
                assert_eq!(body["track_total_hits"], true);
                assert_eq!(body["query"], json!({ "match_all": {} }));
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_all_ids_skips_source() {
        let mock = MockTransport::new().respond(200, ids_page(&["a", "b", "c"], 3)).shared();

        let ids = store(&mock).get_all_ids("skus").await.unwrap();
        assert_eq!(ids, vec!["a", "b", "c"]);

        match mock.requests()[0].body() {
            Some(Body::Json(body)) => assert_eq!(body["_source"], false),
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_all_deletes_then_refreshes() {
        let mock = MockTransport::new()
            .respond(200, ids_page(&["1", "2"], 2))
            .respond(
                200,
                json!({ "took": 3, "errors": false, "items": [
                    { "delete": { "_index": "skus", "_id": "1", "result": "deleted", "status": 200 } },
                    { "delete": { "_index": "skus", "_id": "2", "result": "deleted", "status": 200 } }
                ] }),
            )
            .respond(200, json!({ "_shards": { "total": 2, "successful": 2, "failed": 0 } }))
            .shared();

        let outcome = store(&mock).delete_all("skus").await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.succeeded(), 2);

        let paths: Vec<String> = mock.requests().iter().map(|r| r.path().to_string()).collect();
        assert_eq!(paths, vec!["/skus/_search", "/_bulk", "/skus/_refresh"]);
    }

    #[tokio::test]
    async fn test_delete_all_on_empty_index() {
        let mock = MockTransport::new().respond(200, ids_page(&[], 0)).shared();

        let outcome = store(&mock).delete_all("skus").await.unwrap();
        assert!(outcome.is_success());
        assert!(outcome.items.is_empty());
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_add_and_empty_input() {
        let mock = MockTransport::new()
            .respond(
                200,
                json!({ "took": 5, "errors": false, "items": [
                    { "index": { "_index": "skus", "_id": "x1", "result": "created", "status": 201 } },
                    { "index": { "_index": "skus", "_id": "x2", "result": "created", "status": 201 } }
                ] }),
            )
            .shared();
        let docs = store(&mock);

        let outcome = docs.bulk_add("skus", &[sku(1), sku(2)]).await.unwrap();
        assert_eq!(outcome.ids(), vec!["x1", "x2"]);

        let empty = docs.bulk_add::<Sku>("skus", &[]).await.unwrap();
        assert!(empty.is_success());
        assert_eq!(mock.requests().len(), 1);
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn test_bulk_add_with_ids_and_bulk_delete() {
        let mock = MockTransport::new()
            .respond(
                200,
                json!({ "took": 1, "errors": false, "items": [
                    { "index": { "_index": "skus", "_id": "1", "result": "created", "status": 201 } }
                ] }),
            )
            .respond(
                200,
                json!({ "took": 1, "errors": true, "items": [
                    { "delete": { "_index": "skus", "_id": "1", "result": "deleted", "status": 200 } },
                    { "delete": { "_index": "skus", "_id": "9", "result": "not_found", "status": 404 } }
                ] }),
            )
            .shared();
        let docs = store(&mock);

        docs.bulk_add_with_ids("skus", &[("1".to_string(), sku(1))])
            .await
            .unwrap();
        match mock.requests()[0].body() {
            Some(Body::NdJson(lines)) => assert_eq!(lines[0]["index"]["_id"], "1"),
            other => panic!("unexpected body: {:?}", other),
        }

        let outcome = docs.bulk_delete("skus", &["1", "9"]).await.unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.failures().count(), 1);
    }

    #[tokio::test]
    async fn test_empty_names_are_rejected() {
        let mock = MockTransport::new().shared();
        let docs = store(&mock);

        assert!(matches!(docs.add("", &sku(1)).await, Err(SearchError::Validation(_))));
        assert!(matches!(docs.get::<Sku>("skus", "").await, Err(SearchError::Validation(_))));
        assert!(matches!(
            docs.bulk_delete::<&str>("", &[]).await,
            Err(SearchError::Validation(_))
        ));
        assert!(mock.requests().is_empty());
    }
}
