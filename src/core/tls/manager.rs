// src/core/tls/manager.rs

//! Certificate issuance (§4.4.1) and the truststore abstraction the rotation
//! protocol (§4.4.2) and consistency check (§4.4.4) operate on.

use crate::core::errors::OperatorError;
use crate::core::kv::{KvBus, Scope};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The three certificate scopes the fabric issues (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertScope {
    AppAdmin,
    UnitTransport,
    UnitHttp,
}

/// A certificate signing request built locally and submitted to the external
/// certificates provider.
#[derive(Debug, Clone)]
pub struct Csr {
    pub scope: CertScope,
    pub common_name: String,
    pub organization: String,
    pub sans: Vec<String>,
    pub pem: String,
}

/// The `{cert, ca, chain}` triple returned by the provider for one CSR.
#[derive(Debug, Clone)]
pub struct CertBundle {
    pub cert: String,
    pub ca: String,
    pub chain: Vec<String>,
    /// Issuer string as reported by the provider, used for the §4.4.4
    /// consistency check without needing a full X.509 parser in this crate.
    pub issuer: String,
}

/// One alias entry in the truststore: the imported PEM and its issuer label.
#[derive(Debug, Clone)]
struct TrustEntry {
    pem: String,
}

/// An in-memory model of the unit's keystore/truststore. The production
/// backing (a JKS/PKCS12 file manipulated via `keytool`) is deployment-host
/// state outside this crate's process; this struct is the authoritative
/// record this crate reasons about and persists through the KV bus.
#[derive(Debug, Default)]
pub struct TrustStore {
    aliases: HashMap<String, TrustEntry>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import(&mut self, alias: &str, pem: impl Into<String>) {
        self.aliases.insert(
            alias.to_string(),
            TrustEntry { pem: pem.into() },
        );
    }

    /// Renames an alias, a no-op if the source alias is absent (§4.4.2:
    /// "idempotent").
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(entry) = self.aliases.remove(from) {
            self.aliases.insert(to.to_string(), entry);
        }
    }

    /// Removes an alias; absence is success.
    pub fn delete(&mut self, alias: &str) {
        self.aliases.remove(alias);
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(|e| e.pem.as_str())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }
}

/// Issues certificates and drives truststore mutations for one node (§4.4.1,
/// §4.4.2).
pub struct TlsManager<B: KvBus> {
    bus: Arc<B>,
    pub trust_store: Mutex<TrustStore>,
    pub chain_pem: Mutex<Vec<String>>,
}

impl<B: KvBus> TlsManager<B> {
    pub fn new(bus: Arc<B>) -> Self {
        Self {
            bus,
            trust_store: Mutex::new(TrustStore::new()),
            chain_pem: Mutex::new(Vec::new()),
        }
    }

    /// Generates the keystore/truststore password once, idempotently, and
    /// persists it on the app scope for the whole fleet to reuse (§4.4.1).
    pub async fn ensure_keystore_password(&self) -> Result<String, OperatorError> {
        if let Some(existing) = self.bus.get(Scope::App, "tls-keystore-password").await {
            return Ok(existing);
        }
        let generated = uuid::Uuid::new_v4().to_string();
        self.bus
            .set(Scope::App, "tls-keystore-password", generated.clone())
            .await;
        Ok(generated)
    }

    /// Builds a CSR for the given scope. `unit_ip`/`hostnames`/`public_ip`
    /// feed the SAN list per §4.4.1.
    pub fn build_csr(
        scope: CertScope,
        cluster_name: &str,
        unit_ip: &str,
        hostnames: &[String],
        public_ip: Option<&str>,
    ) -> Result<Csr, OperatorError> {
        let common_name = match scope {
            CertScope::AppAdmin => "admin".to_string(),
            CertScope::UnitTransport | CertScope::UnitHttp => unit_ip.to_string(),
        };

        let mut sans: Vec<SanType> = vec![SanType::IpAddress(
            unit_ip
                .parse()
                .map_err(|_| OperatorError::InvalidConfig(format!("invalid unit ip: {unit_ip}")))?,
        )];
        for host in hostnames {
            sans.push(SanType::DnsName(
                host.clone().try_into().map_err(|_| {
                    OperatorError::InvalidConfig(format!("invalid hostname: {host}"))
                })?,
            ));
        }
        if scope == CertScope::UnitHttp {
            if let Some(ip) = public_ip {
                sans.push(SanType::IpAddress(ip.parse().map_err(|_| {
                    OperatorError::InvalidConfig(format!("invalid public ip: {ip}"))
                })?));
            }
        }

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name.clone());
        dn.push(DnType::OrganizationName, cluster_name.to_string());

        let mut params = CertificateParams::new(Vec::new())
            .map_err(|e| OperatorError::Internal(format!("csr params: {e}")))?;
        params.distinguished_name = dn;
        params.subject_alt_names = sans;

        let key_pair = KeyPair::generate().map_err(|e| OperatorError::Internal(format!("keygen: {e}")))?;
        let csr = params
            .serialize_request(&key_pair)
            .map_err(|e| OperatorError::Internal(format!("csr serialize: {e}")))?;

        Ok(Csr {
            scope,
            common_name,
            organization: cluster_name.to_string(),
            sans: hostnames.to_vec(),
            pem: csr.pem().map_err(|e| OperatorError::Internal(format!("csr pem: {e}")))?,
        })
    }
}
