// src/core/lock.rs

//! Node Lock (C8): a cluster-wide at-most-one-holder mutex serializing
//! start/stop/restart/upgrade/storage-detach across all units (§4.6, I9).

use crate::core::errors::OperatorError;
use crate::core::kv::{KvBus, Scope};
use crate::core::opensearch_client::OpenSearchClient;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the OpenSearch index used to back the lock once the security
/// index has been bootstrapped.
pub const LOCK_INDEX: &str = ".opensearch-peer-operator-lock";

const LOCK_DOC_ID: &str = "node-lock";
const LOCK_KEY: &str = "node-lock-holder";

/// `acquire` returns true iff the caller now uniquely holds the lock;
/// `release` releases iff this unit holds it (§4.6).
#[async_trait]
pub trait NodeLock: Send + Sync {
    async fn acquire(&self, holder: &str) -> Result<bool, OperatorError>;
    async fn release(&self, holder: &str) -> Result<(), OperatorError>;
    async fn is_held_by(&self, holder: &str) -> Result<bool, OperatorError>;
}

/// Lock backed by a single-document OpenSearch index, relying on the
/// cluster's own linearizable `op_type=create` / sequence-number semantics
/// (§4.6, §5 "coordination happens exclusively through ... the cluster's own
/// consistency primitives").
pub struct IndexBackedLock {
    client: OpenSearchClient,
    host: String,
}

impl IndexBackedLock {
    pub fn new(client: OpenSearchClient, host: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
        }
    }

    fn doc_path(&self) -> String {
        format!("/{LOCK_INDEX}/_doc/{LOCK_DOC_ID}")
    }
}

#[async_trait]
impl NodeLock for IndexBackedLock {
    async fn acquire(&self, holder: &str) -> Result<bool, OperatorError> {
        let path = format!("{}/_create", self.doc_path());
        let resp = self
            .client
            .request(
                Method::PUT,
                &self.host,
                &path,
                Some(json!({ "holder": holder })),
                crate::core::opensearch_client::DEFAULT_RETRIES,
                crate::core::opensearch_client::DEFAULT_TIMEOUT,
                &[],
            )
            .await;

        match resp {
            Ok(_) => {
                debug!("{} acquired the node lock (index-backed)", holder);
                Ok(true)
            }
            Err(OperatorError::OpenSearchStatus { status, .. })
                if status == StatusCode::CONFLICT.as_u16() =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn release(&self, holder: &str) -> Result<(), OperatorError> {
        if !self.is_held_by(holder).await? {
            return Ok(());
        }
        match self
            .client
            .request(
                Method::DELETE,
                &self.host,
                &self.doc_path(),
                None,
                crate::core::opensearch_client::DEFAULT_RETRIES,
                crate::core::opensearch_client::DEFAULT_TIMEOUT,
                &[],
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(OperatorError::OpenSearchStatus { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn is_held_by(&self, holder: &str) -> Result<bool, OperatorError> {
        match self
            .client
            .request(
                Method::GET,
                &self.host,
                &self.doc_path(),
                None,
                crate::core::opensearch_client::DEFAULT_RETRIES,
                crate::core::opensearch_client::DEFAULT_TIMEOUT,
                &[],
            )
            .await
        {
            Ok(body) => Ok(body
                .get("_source")
                .and_then(|s| s.get("holder"))
                .and_then(|h| h.as_str())
                == Some(holder)),
            Err(OperatorError::OpenSearchStatus { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Fallback lock used before the security index exists: the holder's name is
/// stored in the app-scope databag on the typed KV bus. Weaker than the
/// index-backed variant (no server-side linearizability) but sufficient
/// before any unit has data online to arbitrate via (§4.6).
pub struct DatabagLock<B: KvBus> {
    bus: Arc<B>,
}

impl<B: KvBus> DatabagLock<B> {
    pub fn new(bus: Arc<B>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl<B: KvBus> NodeLock for DatabagLock<B> {
    async fn acquire(&self, holder: &str) -> Result<bool, OperatorError> {
        match self.bus.get(Scope::App, LOCK_KEY).await {
            Some(current) if current != holder => {
                warn!("node lock already held by {}", current);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => {
                self.bus.set(Scope::App, LOCK_KEY, holder.to_string()).await;
                Ok(true)
            }
        }
    }

    async fn release(&self, holder: &str) -> Result<(), OperatorError> {
        if self.bus.get(Scope::App, LOCK_KEY).await.as_deref() == Some(holder) {
            self.bus.delete(Scope::App, LOCK_KEY).await;
        }
        Ok(())
    }

    async fn is_held_by(&self, holder: &str) -> Result<bool, OperatorError> {
        Ok(self.bus.get(Scope::App, LOCK_KEY).await.as_deref() == Some(holder))
    }
}

/// Selects the appropriate lock backend: index-backed once the security
/// index is initialised, the app-databag fallback otherwise (§4.6).
pub fn select_lock<B: KvBus + 'static>(
    security_index_initialised: bool,
    client: OpenSearchClient,
    host: impl Into<String>,
    bus: Arc<B>,
) -> Box<dyn NodeLock> {
    if security_index_initialised {
        Box::new(IndexBackedLock::new(client, host))
    } else {
        Box::new(DatabagLock::new(bus))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kv::InMemoryKvBus;

    /// I9: at most one unit holds the lock at any instant.
    #[tokio::test]
    async fn databag_lock_is_exclusive() {
        let bus = Arc::new(InMemoryKvBus::new());
        let lock = DatabagLock::new(bus);
        assert!(lock.acquire("unit-0").await.unwrap());
        assert!(!lock.acquire("unit-1").await.unwrap());
        assert!(lock.acquire("unit-0").await.unwrap());
        lock.release("unit-0").await.unwrap();
        assert!(lock.acquire("unit-1").await.unwrap());
    }

    #[tokio::test]
    async fn release_is_noop_for_non_holder() {
        let bus = Arc::new(InMemoryKvBus::new());
        let lock = DatabagLock::new(bus);
        assert!(lock.acquire("unit-0").await.unwrap());
        lock.release("unit-1").await.unwrap();
        assert!(lock.is_held_by("unit-0").await.unwrap());
    }
}
