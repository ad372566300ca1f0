//! Error types for `ledger-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("habit title is empty")]
  EmptyTitle,

  #[error("review window of {0} days is outside 0..=90")]
  ReviewWindowOutOfRange(u8),

  #[error("unknown outbox entity discriminant: {0:?}")]
  UnknownEntity(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
