// src/core/relation/mod.rs

//! Orchestrator Relation (C7, §4.5, §6.2): the cross-app "peer-cluster" wire
//! protocol.

pub mod payload;
pub mod provider;
pub mod requirer;

pub use payload::{
    AzureCredentials, Credentials, PeerClusterRelErrorData, ProviderPayload, RequirerPayload,
    S3Credentials,
};
