// src/core/tls/mod.rs

//! TLS Fabric (C5): certificate issuance, the two-phase CA rotation protocol,
//! and trust-store consistency checks (§4.4).

pub mod manager;
pub mod rotation;
pub mod trust;

pub use manager::{CertBundle, CertScope, Csr, TlsManager};
pub use rotation::{CaRotationState, RotationPhase};
pub use trust::pem_sets_equal;

/// SAN extension OID embedded in every CSR (§4.4.1).
pub const SAN_OID: &str = "1.2.3.4.5.5";

/// Truststore alias for the currently-trusted CA.
pub const ALIAS_CA: &str = "ca";
/// Truststore alias the previous CA is renamed to during rotation phase 1.
pub const ALIAS_OLD_CA: &str = "old-ca";
/// Truststore alias family used for the S3 snapshot gateway's CA chain.
pub const ALIAS_S3_SNAPSHOTS_GATEWAY: &str = "s3-snapshots-gateway";
