//! HTTP implementation of the habit-ledger remote store.
//!
//! Talks to a PostgREST-style endpoint exposing the `habits` and
//! `habit_entries` tables. Every failure — missing configuration, transport,
//! auth, bad status, decode — is caught at this boundary and surfaced as
//! empty results, so sync degrades to a local-only no-op.

mod client;
mod rows;

pub mod error;

pub use client::{HttpRemote, RemoteConfig};
pub use error::{Error, Result};
