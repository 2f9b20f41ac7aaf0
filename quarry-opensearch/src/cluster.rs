//! Cluster inspection: nodes, health and reachability.

use crate::{
    error::Result,
    transport::{Request, Transport},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Read-only view of the cluster.
#[derive(Clone)]
pub struct ClusterInspector {
    transport: Arc<dyn Transport>,
}

impl ClusterInspector {
    /// Create a new cluster inspector.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Nodes of the cluster as reported by `_cat/nodes`.
    pub async fn nodes(&self) -> Result<Vec<NodeSummary>> {
        debug!("Listing nodes");

        let request = Request::get(&["_cat", "nodes"])
            .param("format", "json")
            .param("h", CAT_NODE_COLUMNS);
        let response = self.transport.send(request).await?.error_for_status()?;

        let records: Vec<CatNodeRecord> = response.json()?;
        Ok(records.into_iter().map(NodeSummary::from).collect())
    }

    /// Cluster health.
    pub async fn health(&self) -> Result<ClusterHealth> {
        debug!("Getting cluster health");

        let response = self
            .transport
            .send(Request::get(&["_cluster", "health"]))
            .await?
            .error_for_status()?;
        response.json()
    }

    /// Whether the cluster answers at all.
    pub async fn ping(&self) -> bool {
        match self.transport.send(Request::head::<&str>(&[])).await {
            Ok(response) => response.is_success(),
            Err(e) => {
                warn!(error = %e, "Ping failed");
                false
            }
        }
    }
}

const CAT_NODE_COLUMNS: &str =
    "name,ip,node.role,master,heap.percent,ram.percent,cpu,load_1m,load_5m,load_15m";

#[derive(Debug, Deserialize)]
struct CatNodeRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ip: Option<String>,
    #[serde(rename = "node.role", default)]
    role: Option<String>,
    #[serde(default)]
    master: Option<String>,
    #[serde(rename = "heap.percent", default)]
    heap_percent: Option<String>,
    #[serde(rename = "ram.percent", default)]
    ram_percent: Option<String>,
    #[serde(default)]
    cpu: Option<String>,
    #[serde(default)]
    load_1m: Option<String>,
    #[serde(default)]
    load_5m: Option<String>,
    #[serde(default)]
    load_15m: Option<String>,
}

/// Node information from `_cat/nodes`.
///
/// Metrics the node does not report (load on some platforms) are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSummary {
    /// Node name.
    pub name: String,
    /// Node IP address.
    pub ip: String,
    /// Role letters as reported (`d` data, `m` master-eligible, `i` ingest, ...).
    pub roles: String,
    /// Whether this node is the elected master.
    pub master: bool,
    /// Heap usage percent.
    pub heap_percent: Option<u8>,
    /// RAM usage percent.
    pub ram_percent: Option<u8>,
    /// CPU usage percent.
    pub cpu: Option<u8>,
    /// One-minute load average.
    pub load_1m: Option<f64>,
    /// Five-minute load average.
    pub load_5m: Option<f64>,
    /// Fifteen-minute load average.
    pub load_15m: Option<f64>,
}

impl NodeSummary {
    /// Whether the node holds data.
    pub fn is_data(&self) -> bool {
        self.roles.contains('d')
    }

    /// Whether the node is master-eligible.
    pub fn is_master_eligible(&self) -> bool {
        self.roles.contains('m')
    }
}

impl From<CatNodeRecord> for NodeSummary {
    fn from(record: CatNodeRecord) -> Self {
        Self {
            name: record.name.unwrap_or_default(),
            ip: record.ip.unwrap_or_default(),
            roles: record.role.unwrap_or_default(),
            master: record.master.as_deref() == Some("*"),
            heap_percent: parse(record.heap_percent.as_deref()),
            ram_percent: parse(record.ram_percent.as_deref()),
            cpu: parse(record.cpu.as_deref()),
            load_1m: parse(record.load_1m.as_deref()),
            load_5m: parse(record.load_5m.as_deref()),
            load_15m: parse(record.load_15m.as_deref()),
        }
    }
}

fn parse<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Cluster health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All shards allocated.
    Green,
    /// Primaries allocated, some replicas not.
    Yellow,
    /// Some primaries unallocated.
    Red,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Green => "green",
            HealthStatus::Yellow => "yellow",
            HealthStatus::Red => "red",
        })
    }
}

/// Response of `_cluster/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHealth {
    /// Cluster name.
    pub cluster_name: String,
    /// Overall status.
    pub status: HealthStatus,
    /// Whether the health request timed out.
    #[serde(default)]
    pub timed_out: bool,
    /// Nodes in the cluster.
    pub number_of_nodes: u32,
    /// Data nodes in the cluster.
    pub number_of_data_nodes: u32,
    /// Active primary shards.
    pub active_primary_shards: u32,
    /// Active primary and replica shards.
    pub active_shards: u32,
    /// Shards being relocated.
    #[serde(default)]
    pub relocating_shards: u32,
    /// Shards being initialized.
    #[serde(default)]
    pub initializing_shards: u32,
    /// Unassigned shards.
    #[serde(default)]
    pub unassigned_shards: u32,
    /// Pending cluster-level tasks.
    #[serde(default)]
    pub number_of_pending_tasks: u32,
    /// Percentage of active shards.
    #[serde(default)]
    pub active_shards_percent_as_number: f64,
}

impl ClusterHealth {
    /// Whether every shard is allocated.
    pub fn is_green(&self) -> bool {
        self.status == HealthStatus::Green
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::testing::MockTransport;
    use crate::transport::Method;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn test_nodes() {
        let mock = MockTransport::new()
            .respond(
                200,
                json!([
                    { "name": "node-1", "ip": "10.0.0.1", "node.role": "dimr", "master": "*",
                      "heap.percent": "41", "ram.percent": "93", "cpu": "7",
                      "load_1m": "0.52", "load_5m": "0.40", "load_15m": "0.38" },
                    { "name": "node-2", "ip": "10.0.0.2", "node.role": "di", "master": "-",
                      "heap.percent": "12", "ram.percent": "80", "cpu": "3",
                      "load_1m": null, "load_5m": null, "load_15m": null }
                ]),
            )
            .shared();

        let nodes = ClusterInspector::new(mock.clone()).nodes().await.unwrap();
        assert_eq!(nodes.len(), 2);

        assert!(nodes[0].master);
        assert!(nodes[0].is_master_eligible());
        assert_eq!(nodes[0].heap_percent, Some(41));
        assert_eq!(nodes[0].load_1m, Some(0.52));

        assert!(!nodes[1].master);
        assert!(nodes[1].is_data());
        assert!(!nodes[1].is_master_eligible());
        assert_eq!(nodes[1].load_15m, None);

        let request = &mock.requests()[0];
        assert_eq!(request.path(), "/_cat/nodes");
        assert!(request.query().iter().any(|(k, v)| k == "format" && v == "json"));
    }

    #[tokio::test]
    async fn test_health() {
        let mock = MockTransport::new()
            .respond(
                200,
                json!({
                    "cluster_name": "quarry", "status": "yellow", "timed_out": false,
                    "number_of_nodes": 1, "number_of_data_nodes": 1,
                    "active_primary_shards": 5, "active_shards": 5,
                    "relocating_shards": 0, "initializing_shards": 0, "unassigned_shards": 5,
                    "number_of_pending_tasks": 0, "active_shards_percent_as_number": 50.0
                }),
            )
            .respond(503, json!({ "error": { "type": "master_not_discovered_exception", "reason": "no master" } }))
            .shared();
        let cluster = ClusterInspector::new(mock.clone());

        let health = cluster.health().await.unwrap();
        assert_eq!(health.status, HealthStatus::Yellow);
        assert!(!health.is_green());
        assert_eq!(health.unassigned_shards, 5);

        assert!(matches!(
            cluster.health().await,
            Err(SearchError::Engine { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_ping() {
        let mock = MockTransport::new()
            .respond(200, Value::Null)
            .fail("connection refused")
            .shared();
        let cluster = ClusterInspector::new(mock.clone());

        assert!(cluster.ping().await);
        assert!(!cluster.ping().await);

        let request = &mock.requests()[0];
        assert_eq!((request.method(), request.path()), (Method::Head, "/"));
    }
}
