//! Transport backed by the `opensearch` crate.

use crate::{
    config::ClusterConfig,
    error::{Result, SearchError},
    transport::{Method, Request, Response, Transport},
};
use async_trait::async_trait;
use opensearch::{
    OpenSearch,
    auth::Credentials,
    http::{
        Method as HttpMethod, Url,
        headers::{CONTENT_TYPE, HeaderMap, HeaderValue},
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// HTTP transport talking to one or more cluster nodes.
///
/// One client is built per configured `host:port`; requests are spread over them round-robin.
pub struct OpenSearchTransport {
    clients: Vec<OpenSearch>,
    next: AtomicUsize,
}

impl OpenSearchTransport {
    /// Build a transport from a validated configuration.
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        let urls = config.node_urls()?;
        if urls.is_empty() {
            return Err(SearchError::Connection("No cluster nodes configured".to_string()));
        }

        info!(
            nodes = ?urls.iter().map(Url::as_str).collect::<Vec<_>>(),
            socket_timeout_ms = config.socket_timeout_ms,
            connect_timeout_ms = config.connect_timeout_ms,
            max_connections = config.max_connections,
            max_connections_per_route = config.max_connections_per_route,
            authenticated = config.username.is_some(),
            "Initializing cluster transport"
        );

        let clients = urls
            .into_iter()
            .map(|url| build_client(url, config))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            clients,
            next: AtomicUsize::new(0),
        })
    }

    /// Number of node clients.
    pub fn node_count(&self) -> usize {
        self.clients.len()
    }

    fn pick(&self) -> &OpenSearch {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        &self.clients[n % self.clients.len()]
    }
}

fn build_client(url: Url, config: &ClusterConfig) -> Result<OpenSearch> {
    let conn_pool = SingleNodeConnectionPool::new(url);
    let mut builder = TransportBuilder::new(conn_pool)
        .timeout(config.socket_timeout())
        .disable_proxy();

    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        builder = builder.auth(Credentials::Basic(user.clone(), pass.clone()));
    }

    let transport = builder
        .build()
        .map_err(|e| SearchError::Connection(e.to_string()))?;

    Ok(OpenSearch::new(transport))
}

fn http_method(method: Method) -> HttpMethod {
    match method {
        Method::Get => HttpMethod::Get,
        Method::Put => HttpMethod::Put,
        Method::Post => HttpMethod::Post,
        Method::Delete => HttpMethod::Delete,
        Method::Head => HttpMethod::Head,
    }
}

#[async_trait]
impl Transport for OpenSearchTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        debug!(method = %request.method(), path = request.path(), "Sending request");

        let mut headers = HeaderMap::new();
        let payload = match request.body() {
            Some(body) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(body.content_type()));
                Some(body.to_payload()?)
            }
            None => None,
        };

        let query = request.query();
        let query_string = if query.is_empty() { None } else { Some(query) };

        let response = self
            .pick()
            .send(
                http_method(request.method()),
                request.path(),
                headers,
                query_string,
                payload,
                None,
            )
            .await?;

        let status = response.status_code().as_u16();
        let text = response.text().await?;

        debug!(status, path = request.path(), "Received response");

        Ok(Response::from_text(status, &text))
    }
}

impl std::fmt::Debug for OpenSearchTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSearchTransport")
            .field("nodes", &self.clients.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_client_per_node() {
        let transport = OpenSearchTransport::new(&ClusterConfig::new("es1:9200, es2:9200")).unwrap();
        assert_eq!(transport.node_count(), 2);
    }

    #[test]
    fn test_address_without_nodes_is_rejected() {
        for address in [",", " , "] {
            assert!(matches!(
                OpenSearchTransport::new(&ClusterConfig::new(address)),
                Err(SearchError::Config(_))
            ));
        }
    }
}
