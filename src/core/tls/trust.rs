// src/core/tls/trust.rs

//! Trust-store consistency check (§4.4.4) and the PEM-set equality used by
//! both CA-rotation detection (§4.4.2) and the S3 CA comparison (I8).

/// Normalizes a PEM block: collapses internal whitespace runs and guarantees
/// exactly one trailing newline (§4.3.3: "normalized PEM blocks").
fn normalize_pem(block: &str) -> String {
    let collapsed: String = block
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n", collapsed.trim())
}

/// True iff the two PEM-chain strings contain the same set of normalized
/// blocks, regardless of order (I8).
pub fn pem_sets_equal(a: &[String], b: &[String]) -> bool {
    let mut sa: Vec<String> = a.iter().map(|p| normalize_pem(p)).collect();
    let mut sb: Vec<String> = b.iter().map(|p| normalize_pem(p)).collect();
    sa.sort();
    sb.sort();
    sa == sb
}

/// Splits a concatenated PEM chain back into its individual certificate
/// blocks, so a chain stored as one alias entry can still be compared
/// block-by-block with [`pem_sets_equal`] (§4.3.5, I8).
pub fn split_pem_blocks(chain: &str) -> Vec<String> {
    const END_MARKER: &str = "-----END CERTIFICATE-----";
    chain
        .split_inclusive(END_MARKER)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| block.to_string())
        .collect()
}

/// A unit's per-scope TLS state, as needed by the §4.4.4 check: does the
/// keystore file exist, and does the cert's issuer match the current CA's?
#[derive(Debug, Clone)]
pub struct ScopeTrustState {
    pub keystore_exists: bool,
    pub cert_issuer: String,
}

/// A unit considers TLS fully configured iff, for all three scopes, the
/// keystore file exists AND the cert's issuer string matches the current
/// CA's issuer string (§4.4.4).
pub fn is_fully_configured(scopes: &[ScopeTrustState], current_ca_issuer: &str) -> bool {
    !scopes.is_empty()
        && scopes
            .iter()
            .all(|s| s.keystore_exists && s.cert_issuer == current_ca_issuer)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// I8: S3 CA equality is a set comparison over normalized PEM blocks.
    #[test]
    fn pem_set_equality_ignores_order_and_whitespace() {
        let a = vec!["---A---\n".to_string(), "---B---".to_string()];
        let b = vec!["---B---\n\n".to_string(), "---A---".to_string()];
        assert!(pem_sets_equal(&a, &b));

        let c = vec!["---C---".to_string()];
        assert!(!pem_sets_equal(&a, &c));
    }

    #[test]
    fn split_pem_blocks_recovers_each_certificate() {
        let chain = "-----BEGIN CERTIFICATE-----\nAAA\n-----END CERTIFICATE-----\n-----BEGIN CERTIFICATE-----\nBBB\n-----END CERTIFICATE-----\n";
        let blocks = split_pem_blocks(chain);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("AAA"));
        assert!(blocks[1].contains("BBB"));
    }

    #[test]
    fn pem_set_equality_holds_for_reordered_multi_block_chains() {
        let root = "-----BEGIN CERTIFICATE-----\nROOT\n-----END CERTIFICATE-----";
        let intermediate = "-----BEGIN CERTIFICATE-----\nINTERMEDIATE\n-----END CERTIFICATE-----";
        let stored = format!("{root}\n{intermediate}\n");
        let current = split_pem_blocks(&stored);
        let incoming = vec![intermediate.to_string(), root.to_string()];
        assert!(pem_sets_equal(&current, &incoming));
    }

    #[test]
    fn fully_configured_requires_all_scopes_matching() {
        let good = ScopeTrustState {
            keystore_exists: true,
            cert_issuer: "CN=ca".to_string(),
        };
        let stale = ScopeTrustState {
            keystore_exists: true,
            cert_issuer: "CN=old-ca".to_string(),
        };
        assert!(is_fully_configured(&[good.clone(), good.clone()], "CN=ca"));
        assert!(!is_fully_configured(&[good, stale], "CN=ca"));
        assert!(!is_fully_configured(&[], "CN=ca"));
    }
}
