// src/core/opensearch_client.rs

//! A thin request layer over the OpenSearch cluster admin HTTP surface (C2,
//! §6.3). Distinguishes transport failures from HTTP-status failures and
//! retries transient errors with a bounded, fixed-wait policy (§5, §9).

use crate::core::errors::OperatorError;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout/retry policy for cluster admin calls (§5).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRIES: u32 = 6;
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(10);

/// Longer timeout for repository listing operations (§5).
pub const REPO_LIST_TIMEOUT: Duration = Duration::from_secs(30);
/// Longer timeout for restore operations (§5).
pub const RESTORE_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed-wait retry policy for repository mutations (§4.3.2, §9): 3 attempts, 3s.
pub const REPO_MUTATION_RETRIES: u32 = 3;
pub const REPO_MUTATION_WAIT: Duration = Duration::from_secs(3);

/// A thin wrapper around `reqwest` implementing the `request()` contract from
/// §2 C2: `request(method, path, payload, retries, timeout, altHosts) -> JSON`.
#[derive(Clone)]
pub struct OpenSearchClient {
    client: Client,
    auth: Option<AuthHeader>,
}

#[derive(Clone)]
enum AuthHeader {
    Basic(String, String),
}

impl OpenSearchClient {
    /// Builds a client authenticated with HTTP basic auth as `admin`.
    pub fn with_basic_auth(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .danger_accept_invalid_certs(false)
                .build()
                .expect("reqwest client builder should not fail"),
            auth: Some(AuthHeader::Basic(username.into(), password.into())),
        }
    }

    /// Builds a client authenticated via a client certificate identity (used
    /// for the app-admin-authenticated cert-reload calls of §4.4.3).
    pub fn with_identity(identity: reqwest::Identity) -> Result<Self, OperatorError> {
        let client = Client::builder()
            .identity(identity)
            .build()
            .map_err(OperatorError::from)?;
        Ok(Self { client, auth: None })
    }

    /// Issues one admin call against `host`, retrying transient failures up
    /// to `retries` times with [`DEFAULT_RETRY_WAIT`] between attempts. On
    /// exhaustion, falls through to `alt_hosts` in order.
    pub async fn request(
        &self,
        method: Method,
        host: &str,
        path: &str,
        payload: Option<Value>,
        retries: u32,
        timeout: Duration,
        alt_hosts: &[String],
    ) -> Result<Value, OperatorError> {
        let mut hosts = Vec::with_capacity(1 + alt_hosts.len());
        hosts.push(host.to_string());
        hosts.extend(alt_hosts.iter().cloned());

        let mut last_err = OperatorError::Internal("no hosts to contact".into());
        for candidate in &hosts {
            match self
                .request_with_retry(method.clone(), candidate, path, payload.clone(), retries, timeout)
                .await
            {
                Ok(v) => return Ok(v),
                Err(e) => {
                    warn!("OpenSearch call to {} failed: {}", candidate, e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    async fn request_with_retry(
        &self,
        method: Method,
        host: &str,
        path: &str,
        payload: Option<Value>,
        retries: u32,
        timeout: Duration,
    ) -> Result<Value, OperatorError> {
        let url = format!("https://{host}{path}");
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut req = self.client.request(method.clone(), &url).timeout(timeout);
            if let Some(AuthHeader::Basic(user, pass)) = &self.auth {
                req = req.basic_auth(user, Some(pass));
            }
            if let Some(body) = &payload {
                req = req.json(body);
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json::<Value>().await.map_err(OperatorError::from);
                    }
                    let body = resp.text().await.unwrap_or_default();
                    if is_transient_status(status) && attempt <= retries {
                        debug!(
                            "transient HTTP {} from {}, retrying ({}/{})",
                            status, url, attempt, retries
                        );
                        tokio::time::sleep(DEFAULT_RETRY_WAIT).await;
                        continue;
                    }
                    return Err(OperatorError::OpenSearchStatus {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) if attempt <= retries => {
                    debug!("transport error to {}: {} (retry {}/{})", url, e, attempt, retries);
                    tokio::time::sleep(DEFAULT_RETRY_WAIT).await;
                }
                Err(e) => {
                    return Err(OperatorError::Transport {
                        addr: host.to_string(),
                        source: e.to_string(),
                    });
                }
            }
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS
}
