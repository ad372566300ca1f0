//! Error type for `ledger-remote`.
//!
//! These errors never leave the crate through the [`RemoteStore`] trait —
//! they are logged and swallowed at the push/pull boundary. Only client
//! construction surfaces them.
//!
//! [`RemoteStore`]: ledger_core::remote::RemoteStore

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("{0} → {1}")]
  Status(&'static str, reqwest::StatusCode),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
