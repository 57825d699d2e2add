// src/core/tasks/mod.rs

//! Long-running background tasks that drive the per-unit control loop (§5):
//! the event-queue tick loop and the relation-refresh loop.

pub mod relation;
pub mod tick;

pub use relation::run_relation_refresh_loop;
pub use tick::run_tick_loop;
