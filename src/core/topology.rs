// src/core/topology.rs

//! Cluster Topology Reader (C3): queries OpenSearch to enumerate nodes and
//! index states.

use crate::core::app::App;
use crate::core::errors::OperatorError;
use crate::core::node::{Node, Role, Temperature};
use crate::core::opensearch_client::OpenSearchClient;
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Open/closed/red state of one index, as reported by `_cluster/state` or
/// `_cat/indices`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    Open,
    Closed,
    Red,
}

#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name: String,
    pub state: IndexState,
}

/// Overall cluster health color (§3), distinguishing transient shard motion
/// (`YellowTemp`) from a genuinely degraded cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthColor {
    Green,
    Yellow,
    YellowTemp,
    Red,
    Unknown,
    Ignore,
}

/// Queries an OpenSearch cluster to build the live node/index census that
/// feeds the PCM (§4.1) and the lifecycle gate (§4.2.4).
pub struct ClusterTopologyReader {
    client: OpenSearchClient,
    host: String,
}

impl ClusterTopologyReader {
    pub fn new(client: OpenSearchClient, host: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
        }
    }

    /// Enumerates live nodes via `_nodes/stats` + `_cat/nodes`-equivalent
    /// data, resolving each node's `App` ownership from its `app_id` custom
    /// attribute.
    pub async fn nodes(&self, app: &App) -> Result<Vec<Node>, OperatorError> {
        let body = self
            .client
            .request(
                Method::GET,
                &self.host,
                "/_nodes/stats/jvm",
                None,
                crate::core::opensearch_client::DEFAULT_RETRIES,
                crate::core::opensearch_client::DEFAULT_TIMEOUT,
                &[],
            )
            .await?;

        let mut nodes = Vec::new();
        if let Some(map) = body.get("nodes").and_then(|v| v.as_object()) {
            for (_id, entry) in map {
                let name = entry
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let ip = entry
                    .get("ip")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let attrs = entry.get("attributes").and_then(|v| v.as_object());
                let unit_number = attrs
                    .and_then(|a| a.get("unit_number"))
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(0);
                let roles: Vec<Role> = entry
                    .get("roles")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|r| r.as_str())
                            .filter_map(Role::parse)
                            .collect()
                    })
                    .unwrap_or_default();
                let temperature = attrs
                    .and_then(|a| a.get("temperature"))
                    .and_then(|v| v.as_str())
                    .and_then(Temperature::parse);

                if let Ok(node) = Node::new(name, roles, ip, app.clone(), unit_number, temperature) {
                    nodes.push(node);
                }
            }
        }
        Ok(nodes)
    }

    /// Reads the `_cluster/health` color, translating a YELLOW result with
    /// relocating/initializing shards into [`HealthColor::YellowTemp`] (§3).
    pub async fn health(&self) -> Result<HealthColor, OperatorError> {
        let body = self
            .client
            .request(
                Method::GET,
                &self.host,
                "/_cluster/health",
                None,
                crate::core::opensearch_client::DEFAULT_RETRIES,
                crate::core::opensearch_client::DEFAULT_TIMEOUT,
                &[],
            )
            .await?;

        let status = body.get("status").and_then(|v| v.as_str()).unwrap_or("red");
        let relocating = body
            .get("relocating_shards")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let initializing = body
            .get("initializing_shards")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        Ok(match status {
            "green" => HealthColor::Green,
            "yellow" if relocating > 0 || initializing > 0 => HealthColor::YellowTemp,
            "yellow" => HealthColor::Yellow,
            "red" => HealthColor::Red,
            _ => HealthColor::Unknown,
        })
    }

    /// Lists index states via `_cat/indices?format=json`, excluding nothing —
    /// callers that need to exclude system indices apply that filter
    /// themselves (§4.3.3).
    pub async fn indices(&self) -> Result<Vec<IndexInfo>, OperatorError> {
        let body = self
            .client
            .request(
                Method::GET,
                &self.host,
                "/_cat/indices?format=json",
                None,
                crate::core::opensearch_client::DEFAULT_RETRIES,
                crate::core::opensearch_client::DEFAULT_TIMEOUT,
                &[],
            )
            .await?;

        let mut out = Vec::new();
        if let Some(arr) = body.as_array() {
            for entry in arr {
                let name = entry
                    .get("index")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let health = entry.get("health").and_then(|v| v.as_str()).unwrap_or("");
                let status = entry.get("status").and_then(|v| v.as_str()).unwrap_or("");
                let state = if status == "close" {
                    IndexState::Closed
                } else if health == "red" {
                    IndexState::Red
                } else {
                    IndexState::Open
                };
                out.push(IndexInfo { name, state });
            }
        }
        Ok(out)
    }
}
