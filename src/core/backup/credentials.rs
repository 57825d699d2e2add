// src/core/backup/credentials.rs

//! Credential lifecycle (§4.3.2): keystore propagation, S3 CA-chain import
//! discipline, and the cross-unit hash-verification quorum.

use crate::core::backup::state::{Backend, SnapshotCredentials};
use crate::core::errors::OperatorError;
use crate::core::keystore::KeystoreManager;
use crate::core::tls::manager::TrustStore;
use crate::core::tls::trust::{pem_sets_equal, split_pem_blocks};
use crate::core::tls::ALIAS_S3_SNAPSHOTS_GATEWAY;
use sha1::{Digest, Sha1};

/// Writes the backend-specific secure-settings entries (§4.3.2 step 3).
pub async fn write_keystore_entries(
    keystore: &KeystoreManager,
    creds: &SnapshotCredentials,
) -> Result<(), OperatorError> {
    match creds {
        SnapshotCredentials::S3(s3) => {
            keystore
                .add_secure_setting("s3.client.default.access_key", &s3.access_key)
                .await?;
            keystore
                .add_secure_setting("s3.client.default.secret_key", &s3.secret_key)
                .await?;
        }
        SnapshotCredentials::Azure(az) => {
            keystore
                .add_secure_setting("azure.client.default.account", &az.storage_account)
                .await?;
            keystore
                .add_secure_setting("azure.client.default.key", &az.secret_key)
                .await?;
        }
        SnapshotCredentials::Gcs(_) => {
            return Err(OperatorError::Unsupported("gcs".into()));
        }
    }
    Ok(())
}

/// Removes the backend-specific entries; "does not exist" is success, so the
/// caller can invoke this unconditionally on credentials-gone (§4.3.2).
pub async fn remove_keystore_entries(
    keystore: &KeystoreManager,
    backend: Backend,
) -> Result<(), OperatorError> {
    match backend {
        Backend::S3 => {
            keystore.remove_secure_setting("s3.client.default.access_key").await?;
            keystore.remove_secure_setting("s3.client.default.secret_key").await?;
        }
        Backend::Azure => {
            keystore.remove_secure_setting("azure.client.default.account").await?;
            keystore.remove_secure_setting("azure.client.default.key").await?;
        }
        Backend::Gcs => {}
    }
    Ok(())
}

/// Imports the S3 TLS CA chain under the `s3-snapshots-gateway` alias family
/// only if it differs from what's stored, as a set of normalized PEM blocks
/// (§4.3.2 step 4, §4.3.5, I7). Deletes the whole family first to sidestep
/// alias-already-exists errors.
pub fn sync_s3_ca_chain(trust_store: &mut TrustStore, new_chain: Option<&[String]>) -> bool {
    let Some(new_chain) = new_chain else {
        return false;
    };
    let current: Vec<String> = trust_store
        .get(ALIAS_S3_SNAPSHOTS_GATEWAY)
        .map(split_pem_blocks)
        .unwrap_or_default();

    if pem_sets_equal(&current, new_chain) {
        return false;
    }

    trust_store.delete(ALIAS_S3_SNAPSHOTS_GATEWAY);
    // Concatenate into one alias entry; a real PKCS12 truststore would carry
    // one alias per chain segment, but this crate's model treats the family
    // as a single logical unit (§4.3.5).
    trust_store.import(ALIAS_S3_SNAPSHOTS_GATEWAY, new_chain.join("\n"));
    true
}

/// SHA-1 of a credentials payload, recorded per-unit during the
/// `VerifyBackupCredentials` control event (§4.3.2 step 7).
pub fn credentials_hash(canonical_payload: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(canonical_payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// The leader proceeds only once every unit reports the same hash
/// (§4.3.2 step 7).
pub fn quorum_reached(expected: &str, reported: &[String]) -> bool {
    !reported.is_empty() && reported.iter().all(|h| h == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_ca_import_skipped_when_unchanged() {
        let mut ts = TrustStore::new();
        ts.import(ALIAS_S3_SNAPSHOTS_GATEWAY, "CERT-A\n");
        let changed = sync_s3_ca_chain(&mut ts, Some(&["CERT-A".to_string()]));
        assert!(!changed);
    }

    #[test]
    fn s3_ca_import_happens_when_changed() {
        let mut ts = TrustStore::new();
        ts.import(ALIAS_S3_SNAPSHOTS_GATEWAY, "CERT-A\n");
        let changed = sync_s3_ca_chain(&mut ts, Some(&["CERT-B".to_string()]));
        assert!(changed);
        assert_eq!(ts.get(ALIAS_S3_SNAPSHOTS_GATEWAY), Some("CERT-B"));
    }

    #[test]
    fn s3_ca_import_skipped_when_multi_cert_chain_reordered() {
        let root = "-----BEGIN CERTIFICATE-----\nROOT\n-----END CERTIFICATE-----";
        let intermediate = "-----BEGIN CERTIFICATE-----\nINTERMEDIATE\n-----END CERTIFICATE-----";
        let mut ts = TrustStore::new();
        ts.import(ALIAS_S3_SNAPSHOTS_GATEWAY, format!("{root}\n{intermediate}\n"));

        // Same two certs, reordered: must not be treated as a change (I8, S6).
        let changed = sync_s3_ca_chain(&mut ts, Some(&[intermediate.to_string(), root.to_string()]));
        assert!(!changed);
    }

    #[test]
    fn s3_ca_import_happens_when_one_block_of_a_chain_changes() {
        let root = "-----BEGIN CERTIFICATE-----\nROOT\n-----END CERTIFICATE-----";
        let old_intermediate = "-----BEGIN CERTIFICATE-----\nOLD\n-----END CERTIFICATE-----";
        let new_intermediate = "-----BEGIN CERTIFICATE-----\nNEW\n-----END CERTIFICATE-----";
        let mut ts = TrustStore::new();
        ts.import(ALIAS_S3_SNAPSHOTS_GATEWAY, format!("{root}\n{old_intermediate}\n"));

        let changed = sync_s3_ca_chain(&mut ts, Some(&[root.to_string(), new_intermediate.to_string()]));
        assert!(changed);
    }

    #[test]
    fn quorum_requires_all_units_matching() {
        assert!(quorum_reached("abc", &["abc".into(), "abc".into()]));
        assert!(!quorum_reached("abc", &["abc".into(), "def".into()]));
        assert!(!quorum_reached("abc", &[]));
    }
}
