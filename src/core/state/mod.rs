// src/core/state/mod.rs

//! Defines the central `OperatorState` struct and all related state
//! components (§5: one `OperatorState` per unit, wrapped in `Arc` and shared
//! across the tick loop, the metrics server, and any relation-event
//! handlers).

mod core;

pub use core::{OperatorInit, OperatorState};
