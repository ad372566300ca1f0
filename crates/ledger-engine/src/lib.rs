//! The habit-ledger sync orchestrator.
//!
//! [`SyncService`] owns the authoritative in-memory cache, exposes the
//! command surface consumed by UI collaborators, and runs the push → pull →
//! merge cycle against injected [`LocalStore`] and [`RemoteStore`] backends.
//!
//! [`LocalStore`]: ledger_core::store::LocalStore
//! [`RemoteStore`]: ledger_core::remote::RemoteStore

mod merge;
mod service;

pub use service::{SyncService, SyncStatus};

#[cfg(test)]
mod tests;
