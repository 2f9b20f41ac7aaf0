//! Client-side access layer over OpenSearch and Elasticsearch clusters.
//!
//! This crate provides:
//! - Index lifecycle management with replace-on-create semantics
//! - Typed document storage and bounded whole-index scans
//! - Bulk operations with per-item outcomes
//! - Query DSL builder, nested and fuzzy search, histogram aggregations
//! - Cluster node and health inspection
//!
//! # Example
//!
//! ```rust,no_run
//! use quarry_opensearch::{ClusterConfig, Mapping, MappingField, Page, SearchClient};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Sku {
//!     sku_name: String,
//!     sku_price: f64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SearchClient::new(ClusterConfig::new("localhost:9200"))?;
//!
//!     let mapping = Mapping::new()
//!         .field("sku_name", MappingField::text().fielddata(true))
//!         .field("sku_price", MappingField::double());
//!     client.indices().create_with_mapping("skus", &mapping).await?;
//!
//!     let sku = Sku {
//!         sku_name: "Mountain bike".to_string(),
//!         sku_price: 499.0,
//!     };
//!     client.documents().add_with_id("skus", "1", &sku).await?;
//!     client.indices().refresh("skus").await?;
//!
//!     let result = client
//!         .queries()
//!         .fuzzy_query::<Sku>("skus", "bkie", "sku_name", "", Page::default())
//!         .await?;
//!     println!("{} hits", result.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bulk;
mod client;
mod cluster;
mod config;
mod connection;
mod document;
mod error;
mod index;
mod mapping;
mod query;
mod search;
mod transport;

#[cfg(test)]
mod testing;

pub use bulk::{
    BulkAction, BulkBatch, BulkExecutor, BulkItemError, BulkItemOutcome, BulkOperation,
    BulkOutcome,
};
pub use client::SearchClient;
pub use cluster::{ClusterHealth, ClusterInspector, HealthStatus, NodeSummary};
pub use config::{ClusterConfig, ENV_PREFIX, MAX_SCAN_LIMIT};
pub use connection::OpenSearchTransport;
pub use document::{Document, DocumentStore, GetResponse, WriteResult};
pub use error::{Result, SearchError};
pub use index::{
    AcknowledgedResponse, IndexDetails, IndexManager, IndexSettings, IndexSummary,
    ShardStatistics,
};
pub use mapping::{FieldType, Mapping, MappingField};
pub use query::{
    BoolQuery, BoolQueryBuilder, ChildScoreMode, ExistsQuery, FuzzyQuery, MatchQuery,
    NestedQuery, PrefixQuery, Query, QueryStringQuery, RangeQuery, TermQuery, TermsQuery,
    WildcardQuery,
};
pub use search::{
    Aggregation, AggregationResult, DEFAULT_PAGE_SIZE, HistogramAggregation, HistogramBucket,
    Hit, Page, QueryExecutor, QueryResult, RangeBucket, SearchRequest, SortOrder,
};
pub use transport::{Body, Method, Request, Response, Transport};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        BulkBatch, BulkOperation, ChildScoreMode, ClusterConfig, Document, Mapping, MappingField,
        Page, Query, QueryResult, Result, SearchClient, SearchError, SearchRequest,
    };
}
