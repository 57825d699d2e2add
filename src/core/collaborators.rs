// src/core/collaborators.rs

//! External collaborators this crate calls out to but does not implement
//! (§1, §6): the CA that actually signs CSRs, and the object-storage backend
//! behind a snapshot repository. Both are "deliberately out of scope" per the
//! spec's Non-goals; only the trait boundary ships here, the same way C1's
//! `KvBus` ships as a trait with an in-memory test double.

use crate::core::errors::OperatorError;
use crate::core::tls::{CertBundle, Csr};
use async_trait::async_trait;

/// Signs a CSR built by [`crate::core::tls::TlsManager`] and returns the
/// resulting certificate chain. The production implementation lives outside
/// this crate (the deployment substrate's CA integration, e.g. a Vault PKI
/// mount or an external `certificates` relation).
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    async fn sign(&self, csr: &Csr) -> Result<CertBundle, OperatorError>;

    /// Current issuer string for the CA's active signing certificate, used
    /// for the §4.4.4 trust-store consistency check.
    async fn current_issuer(&self) -> Result<String, OperatorError>;
}

/// The object store behind a registered snapshot repository (S3/Azure/GCS).
/// This crate only needs to know whether the backend is reachable with the
/// credentials on file; the actual blob operations are OpenSearch's own
/// repository plugin, driven through [`crate::core::opensearch_client`].
#[async_trait]
pub trait ObjectStoreBackend: Send + Sync {
    async fn verify_reachable(&self) -> Result<bool, OperatorError>;
}

/// The local process supervisor controlling the colocated OpenSearch service
/// (§1: "a local supervisor", e.g. a systemd unit or a snap daemon). The
/// Lifecycle Controller (§4.2) only needs start/stop/restart and a liveness
/// probe; everything else about how the process is packaged is out of scope.
#[async_trait]
pub trait ServiceSupervisor: Send + Sync {
    async fn start(&self) -> Result<(), OperatorError>;
    async fn stop(&self) -> Result<(), OperatorError>;
    async fn restart(&self) -> Result<(), OperatorError>;
    /// Whether the supervised process currently reports itself as running
    /// (not the same as the cluster being healthy, just "the PID is up").
    async fn is_running(&self) -> Result<bool, OperatorError>;
}

/// A [`ServiceSupervisor`] backed by `systemctl`, the one local supervisor
/// implementation this crate ships rather than leaving purely external: most
/// deployment substrates that run this operator also run systemd, so this is
/// a reasonable default rather than a test double.
pub struct SystemdSupervisor {
    unit: String,
}

impl SystemdSupervisor {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }

    async fn systemctl(&self, verb: &str) -> Result<std::process::Output, OperatorError> {
        tokio::process::Command::new("systemctl")
            .arg(verb)
            .arg(&self.unit)
            .output()
            .await
            .map_err(OperatorError::from)
    }
}

#[async_trait]
impl ServiceSupervisor for SystemdSupervisor {
    async fn start(&self) -> Result<(), OperatorError> {
        let output = self.systemctl("start").await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(OperatorError::Internal(format!(
                "systemctl start {} failed: {}",
                self.unit,
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }

    async fn stop(&self) -> Result<(), OperatorError> {
        let output = self.systemctl("stop").await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(OperatorError::Internal(format!(
                "systemctl stop {} failed: {}",
                self.unit,
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }

    async fn restart(&self) -> Result<(), OperatorError> {
        let output = self.systemctl("restart").await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(OperatorError::Internal(format!(
                "systemctl restart {} failed: {}",
                self.unit,
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }

    async fn is_running(&self) -> Result<bool, OperatorError> {
        let output = self.systemctl("is-active").await?;
        Ok(output.status.success())
    }
}

/// Bootstraps the `.opendistro_security` index exactly once per cluster
/// lifetime (§4.2.1 step 9): invokes the security-admin tool against the
/// admin keystore/truststore. Idempotent on the caller's side only via
/// `security_index_initialised` — this trait itself just runs the tool once.
#[async_trait]
pub trait SecurityIndexInitializer: Send + Sync {
    async fn bootstrap(&self) -> Result<(), OperatorError>;
}

/// A [`SecurityIndexInitializer`] that shells out to `securityadmin.sh`, the
/// same local-process pattern as [`SystemdSupervisor`].
pub struct SecurityAdminTool {
    script_path: String,
    config_dir: String,
}

impl SecurityAdminTool {
    pub fn new(script_path: impl Into<String>, config_dir: impl Into<String>) -> Self {
        Self {
            script_path: script_path.into(),
            config_dir: config_dir.into(),
        }
    }
}

#[async_trait]
impl SecurityIndexInitializer for SecurityAdminTool {
    async fn bootstrap(&self) -> Result<(), OperatorError> {
        let output = tokio::process::Command::new(&self.script_path)
            .arg("-cd")
            .arg(format!("{}/opensearch-security", self.config_dir))
            .arg("-icl")
            .output()
            .await
            .map_err(OperatorError::from)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(OperatorError::Internal(format!(
                "{} failed: {}",
                self.script_path,
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }
}
