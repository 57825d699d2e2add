// src/core/tls/rotation.rs

//! The two-phase CA-rotation protocol (§4.4.2).

use crate::core::tls::manager::TrustStore;
use crate::core::tls::trust::pem_sets_equal;
use crate::core::tls::{ALIAS_CA, ALIAS_OLD_CA};

/// Per-unit rotation flags broadcast to peer and peer-cluster relations
/// (§4.4.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaRotationState {
    pub tls_ca_renewing: bool,
    pub tls_ca_renewed: bool,
}

/// Which half of the rotation protocol a unit is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPhase {
    /// No rotation in progress, or phase 1 ("add new") just completed and a
    /// restart has been requested.
    AddNew,
    /// Phase 2 ("finish"): requesting new unit certs and waiting for the
    /// fleet to converge before retiring the old CA.
    Finish,
}

/// True iff the provider's new CA differs from what's currently trusted,
/// i.e. rotation must begin (§4.4.2 preamble).
pub fn rotation_required(trust_store: &TrustStore, new_ca_pem: &str) -> bool {
    match trust_store.get(ALIAS_CA) {
        Some(current) => !pem_sets_equal(&[current.to_string()], &[new_ca_pem.to_string()]),
        None => true,
    }
}

/// Phase 1: rename `ca` to `old-ca`, import the new CA under `ca`, and flip
/// on `tls_ca_renewing`. Returns the updated state; the caller is
/// responsible for emitting the restart and broadcasting the flag.
pub fn phase1_add_new(
    trust_store: &mut TrustStore,
    chain_pem: &mut Vec<String>,
    new_ca_pem: &str,
) -> CaRotationState {
    trust_store.rename(ALIAS_CA, ALIAS_OLD_CA);
    trust_store.import(ALIAS_CA, new_ca_pem);
    chain_pem.push(new_ca_pem.to_string());
    CaRotationState {
        tls_ca_renewing: true,
        tls_ca_renewed: false,
    }
}

/// Phase 2 completion gate: every relevant unit has reported
/// `tls_ca_renewed=true` and `tls_configured=true`, and none is still
/// `tls_ca_renewing` (§4.4.2).
pub fn fleet_ready_to_finish(peer_states: &[(CaRotationState, bool)]) -> bool {
    !peer_states.is_empty()
        && peer_states
            .iter()
            .all(|(state, tls_configured)| {
                state.tls_ca_renewed && *tls_configured && !state.tls_ca_renewing
            })
}

/// Finishes the rotation: drops `old-ca` from the truststore and from
/// `chain.pem`, clearing both flags.
pub fn finish_rotation(
    trust_store: &mut TrustStore,
    chain_pem: &mut Vec<String>,
    old_ca_pem: &str,
) -> CaRotationState {
    trust_store.delete(ALIAS_OLD_CA);
    chain_pem.retain(|pem| pem != old_ca_pem);
    CaRotationState::default()
}
