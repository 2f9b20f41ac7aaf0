//! Search client facade.

use crate::{
    bulk::BulkExecutor,
    cluster::ClusterInspector,
    config::ClusterConfig,
    connection::OpenSearchTransport,
    document::DocumentStore,
    error::{Result, SearchError},
    index::IndexManager,
    search::QueryExecutor,
    transport::Transport,
};
use std::sync::Arc;
use tracing::debug;

/// Entry point owning one shared transport.
///
/// Cloning is cheap; every component handed out shares the same transport.
#[derive(Clone)]
pub struct SearchClient {
    transport: Arc<dyn Transport>,
    config: Arc<ClusterConfig>,
}

impl SearchClient {
    /// Connect to the nodes named by `config`.
    pub fn new(config: ClusterConfig) -> Result<Self> {
        let transport = OpenSearchTransport::new(&config)?;
        debug!(nodes = transport.node_count(), "Search client initialized");
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Connect using `QUARRY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClusterConfig::from_env()?)
    }

    /// Use an already-built transport.
    pub fn with_transport(transport: Arc<dyn Transport>, config: ClusterConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// The configured target index.
    pub fn default_index(&self) -> Result<&str> {
        self.config
            .index
            .as_deref()
            .ok_or_else(|| SearchError::validation("No default index configured"))
    }

    /// Get the shared transport.
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Get an index manager for index operations.
    pub fn indices(&self) -> IndexManager {
        IndexManager::new(self.transport.clone())
    }

    /// Get a document store.
    pub fn documents(&self) -> DocumentStore {
        DocumentStore::new(self.transport.clone(), self.config.scan_limit)
    }

    /// Get a bulk executor.
    pub fn bulk(&self) -> BulkExecutor {
        BulkExecutor::new(self.transport.clone())
    }

    /// Get a query executor.
    pub fn queries(&self) -> QueryExecutor {
        QueryExecutor::new(self.transport.clone())
    }

    /// Get a cluster inspector.
    pub fn cluster(&self) -> ClusterInspector {
        ClusterInspector::new(self.transport.clone())
    }
}

impl std::fmt::Debug for SearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use serde_json::json;

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = SearchClient::new(ClusterConfig::new("localhost"));
        assert!(matches!(result, Err(SearchError::Config(_))));

        let result = SearchClient::new(ClusterConfig::new(","));
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[test]
    fn test_new_builds_one_client_per_node() {
        let client = SearchClient::new(ClusterConfig::new("localhost:9200,localhost:9201"));
        assert!(client.is_ok());
    }

    #[test]
    fn test_default_index() {
        let mock = MockTransport::new().shared();

        let client = SearchClient::with_transport(mock.clone(), ClusterConfig::new("localhost:9200"));
        assert!(matches!(client.default_index(), Err(SearchError::Validation(_))));

        let client = SearchClient::with_transport(
            mock,
            ClusterConfig::new("localhost:9200").with_index("skus"),
        );
        assert_eq!(client.default_index().unwrap(), "skus");
    }

    #[tokio::test]
    async fn test_components_share_transport() {
        let mock = MockTransport::new()
            .respond(200, json!(null))
            .respond(200, json!({ "count": 4 }))
            .shared();
        let client = SearchClient::with_transport(
            mock.clone(),
            ClusterConfig::new("localhost:9200").with_scan_limit(50),
        );

        assert!(client.indices().exists("skus").await.unwrap());
        assert_eq!(client.queries().count("skus", crate::query::Query::MatchAll).await.unwrap(), 4);
        assert_eq!(client.documents().scan_limit(), 50);
        assert_eq!(mock.requests().len(), 2);
    }

    #[test]
    fn test_debug_hides_password() {
        let client = SearchClient::with_transport(
            MockTransport::new().shared(),
            ClusterConfig::new("localhost:9200").with_basic_auth("admin", "s3cret"),
        );
        assert!(!format!("{:?}", client).contains("s3cret"));
    }
}
