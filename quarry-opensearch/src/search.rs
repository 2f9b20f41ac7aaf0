//! Query execution, search requests and results.

use crate::{
    document::Document,
    error::{Result, SearchError, ensure_index_name},
    index::index_response,
    query::{ChildScoreMode, Query},
    transport::{Request, Transport},
};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Default page size of the engine.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Sort order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Window of hits to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Offset of the first hit.
    pub from: u32,
    /// Maximum number of hits.
    pub size: u32,
    /// Whether the total hit count must be exact beyond the engine's default cap.
    pub track_total_hits: bool,
}

impl Page {
    /// Create a page.
    pub fn new(from: u32, size: u32) -> Self {
        Self {
            from,
            size,
            track_total_hits: false,
        }
    }

    /// Ask for an exact total hit count.
    pub fn track_total_hits(mut self, track: bool) -> Self {
        self.track_total_hits = track;
        self
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// A search request, built by value and executed by [`QueryExecutor::execute`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    indices: Vec<String>,
    query: Option<Query>,
    from: Option<u32>,
    size: Option<u32>,
    sort: Vec<Value>,
    source: Option<bool>,
    source_includes: Option<Vec<String>>,
    source_excludes: Option<Vec<String>>,
    aggregations: BTreeMap<String, Aggregation>,
    track_total_hits: Option<bool>,
}

impl SearchRequest {
    /// Search one index.
    pub fn new(index: impl Into<String>) -> Self {
        Self::default().index(index)
    }

    /// Add an index to search.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.indices.push(index.into());
        self
    }

    /// Set the query.
    pub fn query(mut self, query: impl Into<Query>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the offset of the first hit.
    pub fn from(mut self, from: u32) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the maximum number of hits.
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Apply a page window.
    pub fn page(mut self, page: Page) -> Self {
        self.from = Some(page.from);
        self.size = Some(page.size);
        if page.track_total_hits {
            self.track_total_hits = Some(true);
        }
        self
    }

    /// Sort by a field.
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        let mut sort = Map::new();
        sort.insert(field.into(), json!({ "order": order.as_str() }));
        self.sort.push(Value::Object(sort));
        self
    }

    /// Sort by relevance score.
    pub fn sort_by_score(mut self, order: SortOrder) -> Self {
        self.sort.push(json!({ "_score": { "order": order.as_str() } }));
        self
    }

    /// Enable or disable returning `_source`.
    pub fn source(mut self, enabled: bool) -> Self {
        self.source = Some(enabled);
        self
    }

    /// Only return these source fields.
    pub fn source_includes(mut self, fields: Vec<String>) -> Self {
        self.source_includes = Some(fields);
        self
    }

    /// Leave these source fields out.
    pub fn source_excludes(mut self, fields: Vec<String>) -> Self {
        self.source_excludes = Some(fields);
        self
    }

    /// Add a named aggregation.
    pub fn aggregation(mut self, name: impl Into<String>, agg: impl Into<Aggregation>) -> Self {
        self.aggregations.insert(name.into(), agg.into());
        self
    }

    /// Set track_total_hits.
    pub fn track_total_hits(mut self, track: bool) -> Self {
        self.track_total_hits = Some(track);
        self
    }

    /// Indices searched.
    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    /// Build the search body.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();

        if let Some(query) = &self.query {
            body.insert("query".to_string(), query.to_json());
        }

        if let Some(from) = self.from {
            body.insert("from".to_string(), json!(from));
        }

        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }

        if !self.sort.is_empty() {
            body.insert("sort".to_string(), Value::Array(self.sort.clone()));
        }

        let mut source = Map::new();
        if let Some(includes) = &self.source_includes {
            source.insert("includes".to_string(), json!(includes));
        }
        if let Some(excludes) = &self.source_excludes {
            source.insert("excludes".to_string(), json!(excludes));
        }
        if !source.is_empty() {
            body.insert("_source".to_string(), Value::Object(source));
        } else if let Some(enabled) = self.source {
            body.insert("_source".to_string(), json!(enabled));
        }

        if !self.aggregations.is_empty() {
            let aggs = self
                .aggregations
                .iter()
                .map(|(name, agg)| (name.clone(), agg.to_json()))
                .collect::<Map<_, _>>();
            body.insert("aggs".to_string(), Value::Object(aggs));
        }

        if let Some(track) = self.track_total_hits {
            body.insert("track_total_hits".to_string(), json!(track));
        }

        Value::Object(body)
    }

    fn validate(&self) -> Result<()> {
        for index in &self.indices {
            ensure_index_name(index)?;
        }
        Ok(())
    }

    fn target(&self) -> String {
        self.indices.join(",")
    }
}

/// Executes read queries and aggregations, deserializing hits into documents.
#[derive(Clone)]
pub struct QueryExecutor {
    transport: Arc<dyn Transport>,
}

impl QueryExecutor {
    /// Create a new query executor.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Run a query against one index.
    pub async fn search<T: Document>(
        &self,
        index: &str,
        query: impl Into<Query>,
        page: Page,
    ) -> Result<QueryResult<T>> {
        self.execute(&SearchRequest::new(index).query(query).page(page))
            .await
    }

    /// Run `query` over the nested objects at `path`, returning the matching parents.
    ///
    /// Hits are sorted ascending by `sort_field`; an empty field keeps relevance order.
    pub async fn nested_query<T: Document>(
        &self,
        index: &str,
        path: &str,
        query: impl Into<Query>,
        score_mode: ChildScoreMode,
        sort_field: &str,
        page: Page,
    ) -> Result<QueryResult<T>> {
        if path.trim().is_empty() {
            return Err(SearchError::validation("Nested path cannot be empty"));
        }

        let request = SearchRequest::new(index)
            .query(Query::nested(path, query.into(), score_mode))
            .page(page);

        self.execute(&sorted(request, sort_field)).await
    }

    /// Fuzzy search for `term` in `field`; no match is an empty result.
    pub async fn fuzzy_query<T: Document>(
        &self,
        index: &str,
        term: &str,
        field: &str,
        sort_field: &str,
        page: Page,
    ) -> Result<QueryResult<T>> {
        let request = SearchRequest::new(index)
            .query(Query::fuzzy(field, term))
            .page(page);

        self.execute(&sorted(request, sort_field)).await
    }

    /// Bucket the documents matching `text_term` in `text_field` by `numeric_field`.
    ///
    /// Buckets are `bucket_width` wide and start at 0, empty buckets included; each key is
    /// the lower bound of its interval.
    pub async fn aggs_by_histogram(
        &self,
        index: &str,
        text_term: &str,
        text_field: &str,
        numeric_field: &str,
        agg_name: &str,
        bucket_width: f64,
    ) -> Result<Vec<HistogramBucket>> {
        if !bucket_width.is_finite() || bucket_width <= 0.0 {
            return Err(SearchError::validation(format!(
                "Histogram bucket width must be positive, got {}",
                bucket_width
            )));
        }
        if agg_name.trim().is_empty() {
            return Err(SearchError::validation("Aggregation name cannot be empty"));
        }

        let histogram = HistogramAggregation::new(numeric_field, bucket_width)
            .offset(0.0)
            .min_doc_count(0)
            .extended_bounds_min(0.0);

        let request = SearchRequest::new(index)
            .query(Query::match_query(text_field, text_term))
            .size(0)
            .aggregation(agg_name, histogram);

        let result: QueryResult<IgnoredAny> = self.execute(&request).await?;
        result.histogram_buckets(agg_name)
    }

    /// Fetch one document through `_search` with an ids query.
    pub async fn search_by_id<T: Document>(&self, index: &str, id: &str) -> Result<T> {
        let request = SearchRequest::new(index).query(Query::ids([id])).size(1);

        let result: QueryResult<T> = self.execute(&request).await?;
        result
            .hits
            .into_iter()
            .next()
            .map(|hit| hit.source)
            .ok_or_else(|| SearchError::document_not_found(index, id))
    }

    /// Execute a search request.
    pub async fn execute<T: DeserializeOwned>(&self, request: &SearchRequest) -> Result<QueryResult<T>> {
        let response: SearchResponse<T> = self.send(request).await?;
        let result = QueryResult::from_response(response)?;

        debug!(
            index = %request.target(),
            took_ms = result.took,
            hits = result.hits.len(),
            total = ?result.total,
            "Search completed"
        );

        Ok(result)
    }

    /// Count documents matching `query`.
    pub async fn count(&self, index: &str, query: impl Into<Query>) -> Result<u64> {
        ensure_index_name(index)?;

        let request =
            Request::post(&[index, "_count"]).json(json!({ "query": query.into().to_json() }));
        let response = index_response(index, self.transport.send(request).await?)?;
        let count: CountResponse = response.json()?;

        debug!(index, count = count.count, "Count completed");
        Ok(count.count)
    }

    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse<T>> {
        request.validate()?;

        let target = request.target();
        let path = if target.is_empty() {
            Request::post(&["_search"])
        } else {
            Request::post(&[target.as_str(), "_search"])
        };

        debug!(index = %target, "Executing search");

        let response = self.transport.send(path.json(request.to_json())).await?;
        index_response(&target, response)?.json()
    }
}

fn sorted(request: SearchRequest, sort_field: &str) -> SearchRequest {
    if sort_field.trim().is_empty() {
        request
    } else {
        request.sort_by(sort_field, SortOrder::Asc)
    }
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

/// Raw `_search` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub(crate) struct SearchResponse<T> {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    pub hits: HitsEnvelope<T>,
    #[serde(default)]
    pub aggregations: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub(crate) struct HitsEnvelope<T> {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default = "Vec::new")]
    pub hits: Vec<RawHit<T>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub(crate) struct RawHit<T> {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default = "Option::default")]
    pub source: Option<T>,
    #[serde(default)]
    pub sort: Option<Vec<Value>>,
}

/// Total hit count; older engines send a bare number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum TotalHits {
    Counted { value: u64, relation: String },
    Legacy(u64),
}

impl TotalHits {
    pub(crate) fn value(&self) -> u64 {
        match self {
            TotalHits::Counted { value, .. } | TotalHits::Legacy(value) => *value,
        }
    }

    fn relation(&self) -> &str {
        match self {
            TotalHits::Counted { relation, .. } => relation,
            TotalHits::Legacy(_) => "eq",
        }
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit<T> {
    /// Index the document lives in.
    pub index: String,
    /// Document ID.
    pub id: String,
    /// Relevance score; absent when sorting by a field.
    pub score: Option<f64>,
    /// Sort values, when sorted.
    pub sort: Option<Vec<Value>>,
    /// The document.
    pub source: T,
}

/// Result of a query: ordered hits plus metadata. An empty result is not an error.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    /// Time taken in milliseconds.
    pub took: u64,
    /// Whether the search timed out and returned partial hits.
    pub timed_out: bool,
    /// Total matching documents, if reported.
    pub total: Option<u64>,
    /// Total relation (`eq` or `gte`).
    pub total_relation: Option<String>,
    /// Maximum score.
    pub max_score: Option<f64>,
    /// Matching documents with metadata.
    pub hits: Vec<Hit<T>>,
    /// Raw aggregation results by name.
    pub aggregations: Map<String, Value>,
}

impl<T: DeserializeOwned> QueryResult<T> {
    fn from_response(response: SearchResponse<T>) -> Result<Self> {
        let hits = response
            .hits
            .hits
            .into_iter()
            .map(|raw| {
                let source = raw.source.ok_or_else(|| {
                    SearchError::Serialization(serde::de::Error::missing_field("_source"))
                })?;
                Ok(Hit {
                    index: raw.index,
                    id: raw.id,
                    score: raw.score,
                    sort: raw.sort,
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let total = response.hits.total.as_ref();

        Ok(Self {
            took: response.took,
            timed_out: response.timed_out,
            total: total.map(TotalHits::value),
            total_relation: total.map(|t| t.relation().to_string()),
            max_score: response.hits.max_score,
            hits,
            aggregations: response.aggregations.unwrap_or_default(),
        })
    }
}

impl<T> QueryResult<T> {
    /// Number of hits returned.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether no hits were returned.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Ids of the hits, in order.
    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.id.as_str()).collect()
    }

    /// Borrow the documents, in order.
    pub fn documents(&self) -> Vec<&T> {
        self.hits.iter().map(|hit| &hit.source).collect()
    }

    /// Take the documents, in order.
    pub fn into_documents(self) -> Vec<T> {
        self.hits.into_iter().map(|hit| hit.source).collect()
    }

    /// Raw result of a named aggregation.
    pub fn aggregation(&self, name: &str) -> Option<AggregationResult> {
        self.aggregations.get(name).map(|value| AggregationResult {
            value: value.clone(),
        })
    }

    /// Buckets of a named histogram aggregation.
    pub fn histogram_buckets(&self, name: &str) -> Result<Vec<HistogramBucket>> {
        match self.aggregations.get(name) {
            Some(agg) => Ok(Vec::<HistogramBucket>::deserialize(&agg["buckets"])?),
            None => Ok(Vec::new()),
        }
    }
}

/// Aggregation types.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Terms aggregation.
    Terms {
        /// Field to aggregate on.
        field: String,
        /// Maximum number of buckets.
        size: Option<u32>,
    },
    /// Date histogram aggregation.
    DateHistogram {
        /// Field containing dates.
        field: String,
        /// Calendar interval (day, week, month, etc.).
        calendar_interval: Option<String>,
        /// Fixed interval (1d, 1h, etc.).
        fixed_interval: Option<String>,
    },
    /// Histogram aggregation with fixed-width buckets.
    Histogram(HistogramAggregation),
    /// Range aggregation.
    Range {
        /// Field to aggregate on.
        field: String,
        /// Range definitions.
        ranges: Vec<RangeBucket>,
    },
    /// Avg aggregation.
    Avg {
        /// Field to average.
        field: String,
    },
    /// Sum aggregation.
    Sum {
        /// Field to sum.
        field: String,
    },
    /// Min aggregation.
    Min {
        /// Field to find minimum.
        field: String,
    },
    /// Max aggregation.
    Max {
        /// Field to find maximum.
        field: String,
    },
    /// Cardinality (unique count) aggregation.
    Cardinality {
        /// Field to count unique values.
        field: String,
    },
}

impl Aggregation {
    /// Create a terms aggregation.
    pub fn terms(field: impl Into<String>) -> Self {
        Aggregation::Terms {
            field: field.into(),
            size: None,
        }
    }

    /// Create a histogram aggregation.
    pub fn histogram(field: impl Into<String>, interval: f64) -> Self {
        Aggregation::Histogram(HistogramAggregation::new(field, interval))
    }

    /// Create an average aggregation.
    pub fn avg(field: impl Into<String>) -> Self {
        Aggregation::Avg {
            field: field.into(),
        }
    }

    /// Create a sum aggregation.
    pub fn sum(field: impl Into<String>) -> Self {
        Aggregation::Sum {
            field: field.into(),
        }
    }

    /// Create a min aggregation.
    pub fn min(field: impl Into<String>) -> Self {
        Aggregation::Min {
            field: field.into(),
        }
    }

    /// Create a max aggregation.
    pub fn max(field: impl Into<String>) -> Self {
        Aggregation::Max {
            field: field.into(),
        }
    }

    /// Create a cardinality aggregation.
    pub fn cardinality(field: impl Into<String>) -> Self {
        Aggregation::Cardinality {
            field: field.into(),
        }
    }

    /// Convert to JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Aggregation::Terms { field, size } => {
                let mut terms = json!({ "field": field });
                if let Some(s) = size {
                    terms["size"] = json!(s);
                }
                json!({ "terms": terms })
            }
            Aggregation::DateHistogram {
                field,
                calendar_interval,
                fixed_interval,
            } => {
                let mut dh = json!({ "field": field });
                if let Some(ci) = calendar_interval {
                    dh["calendar_interval"] = json!(ci);
                }
                if let Some(fi) = fixed_interval {
                    dh["fixed_interval"] = json!(fi);
                }
                json!({ "date_histogram": dh })
            }
            Aggregation::Histogram(histogram) => histogram.to_json(),
            Aggregation::Range { field, ranges } => {
                let range_arr: Vec<Value> = ranges.iter().map(RangeBucket::to_json).collect();
                json!({
                    "range": {
                        "field": field,
                        "ranges": range_arr
                    }
                })
            }
            Aggregation::Avg { field } => json!({ "avg": { "field": field } }),
            Aggregation::Sum { field } => json!({ "sum": { "field": field } }),
            Aggregation::Min { field } => json!({ "min": { "field": field } }),
            Aggregation::Max { field } => json!({ "max": { "field": field } }),
            Aggregation::Cardinality { field } => json!({ "cardinality": { "field": field } }),
        }
    }
}

impl From<HistogramAggregation> for Aggregation {
    fn from(histogram: HistogramAggregation) -> Self {
        Aggregation::Histogram(histogram)
    }
}

/// Fixed-width histogram over a numeric field.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramAggregation {
    /// Field to aggregate on.
    pub field: String,
    /// Bucket width.
    pub interval: f64,
    /// Shift of the bucket boundaries.
    pub offset: Option<f64>,
    /// Buckets with fewer documents are dropped.
    pub min_doc_count: Option<u64>,
    /// Force buckets down to this value even when empty.
    pub extended_bounds_min: Option<f64>,
    /// Force buckets up to this value even when empty.
    pub extended_bounds_max: Option<f64>,
}

impl HistogramAggregation {
    /// Create a histogram aggregation.
    pub fn new(field: impl Into<String>, interval: f64) -> Self {
        Self {
            field: field.into(),
            interval,
            offset: None,
            min_doc_count: None,
            extended_bounds_min: None,
            extended_bounds_max: None,
        }
    }

    /// Set offset.
    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set min_doc_count.
    pub fn min_doc_count(mut self, count: u64) -> Self {
        self.min_doc_count = Some(count);
        self
    }

    /// Set the lower extended bound.
    pub fn extended_bounds_min(mut self, min: f64) -> Self {
        self.extended_bounds_min = Some(min);
        self
    }

    /// Set the upper extended bound.
    pub fn extended_bounds_max(mut self, max: f64) -> Self {
        self.extended_bounds_max = Some(max);
        self
    }

    fn to_json(&self) -> Value {
        let mut histogram = json!({
            "field": self.field,
            "interval": self.interval
        });

        if let Some(offset) = self.offset {
            histogram["offset"] = json!(offset);
        }
        if let Some(count) = self.min_doc_count {
            histogram["min_doc_count"] = json!(count);
        }

        let mut bounds = Map::new();
        if let Some(min) = self.extended_bounds_min {
            bounds.insert("min".to_string(), json!(min));
        }
        if let Some(max) = self.extended_bounds_max {
            bounds.insert("max".to_string(), json!(max));
        }
        if !bounds.is_empty() {
            histogram["extended_bounds"] = Value::Object(bounds);
        }

        json!({ "histogram": histogram })
    }
}

/// Range bucket definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBucket {
    /// Optional key.
    pub key: Option<String>,
    /// From value (inclusive).
    pub from: Option<f64>,
    /// To value (exclusive).
    pub to: Option<f64>,
}

impl RangeBucket {
    /// Create a range bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bucket key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the inclusive lower bound.
    pub fn from(mut self, from: f64) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the exclusive upper bound.
    pub fn to(mut self, to: f64) -> Self {
        self.to = Some(to);
        self
    }

    fn to_json(&self) -> Value {
        let mut bucket = Map::new();
        if let Some(k) = &self.key {
            bucket.insert("key".to_string(), json!(k));
        }
        if let Some(f) = self.from {
            bucket.insert("from".to_string(), json!(f));
        }
        if let Some(t) = self.to {
            bucket.insert("to".to_string(), json!(t));
        }
        Value::Object(bucket)
    }
}

/// One histogram bucket: the interval's lower bound and its document count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Lower bound of the interval.
    pub key: f64,
    /// Documents in the interval.
    pub doc_count: u64,
}

/// Aggregation result wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Raw aggregation result.
    pub value: Value,
}

impl AggregationResult {
    /// Get a metric value (avg, sum, min, max).
    pub fn metric_value(&self) -> Option<f64> {
        self.value["value"].as_f64()
    }

    /// Get buckets from bucket aggregation.
    pub fn buckets(&self) -> Option<Vec<Value>> {
        self.value["buckets"].as_array().cloned()
    }
}
