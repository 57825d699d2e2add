// src/core/relation/payload.rs

//! Wire schemas for the peer-cluster orchestrator relation (§6.2).

use crate::core::kv::SecretRef;
use crate::core::node::Node;
use crate::core::pcm::{DeploymentDescription, PeerClusterApp, PeerClusterOrchestrators};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub admin_username: String,
    pub admin_password: SecretRef,
    pub admin_password_hash: SecretRef,
    pub kibana_password: SecretRef,
    pub kibana_password_hash: SecretRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_password: Option<SecretRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_tls: Option<SecretRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Credentials>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureCredentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Credentials {
    #[serde(rename = "access-key")]
    pub access_key: SecretRef,
    #[serde(rename = "secret-key")]
    pub secret_key: SecretRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_ca_chain: Option<SecretRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureCredentials {
    #[serde(rename = "storage-account")]
    pub storage_account: SecretRef,
    #[serde(rename = "secret-key")]
    pub secret_key: SecretRef,
}

/// Provider → Requirer payload (§6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPayload {
    pub cluster_name: String,
    pub cm_nodes: Vec<Node>,
    pub credentials: Credentials,
    pub deployment_desc: Option<DeploymentDescription>,
    pub security_index_initialised: bool,
}

impl ProviderPayload {
    /// Canonical JSON used to compute `rel_data_hash`: keys sorted, no
    /// insignificant whitespace (R1 round-trip law).
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        let canonical = canonicalize(&value);
        serde_json::to_string(&canonical)
    }

    /// SHA-1 of the canonical JSON of the unredacted payload, written
    /// alongside `data` as `rel_data_hash` (§6.2).
    pub fn rel_data_hash(&self) -> Result<String, serde_json::Error> {
        let canonical = self.canonical_json()?;
        let mut hasher = Sha1::new();
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Recursively sorts object keys so the JSON rendering is stable across
/// HashMap iteration order (R1).
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// Requirer → Provider payload (§6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirerPayload {
    pub app: PeerClusterApp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_candidate_failover_orchestrator: Option<String>,
    pub main_orchestrator_registered: String,
    pub orchestrators: PeerClusterOrchestrators,
}

/// Error propagation slot (§6.2, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerClusterRelErrorData {
    pub cluster_name: String,
    pub should_sever_relation: bool,
    pub should_wait: bool,
    pub blocked_message: String,
    pub deployment_desc: Option<DeploymentDescription>,
}
