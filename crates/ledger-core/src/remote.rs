//! The `RemoteStore` trait — push/pull against the shared remote service.

use std::future::Future;

use uuid::Uuid;

use crate::{entry::HabitEntry, habit::Habit, outbox::OutboxItem};

/// A full remote snapshot for one owner, tombstones included.
#[derive(Debug, Clone, Default)]
pub struct RemoteSnapshot {
  pub habits:  Vec<Habit>,
  pub entries: Vec<HabitEntry>,
}

/// Abstraction over the remote store backend.
///
/// Both operations are best-effort: implementations catch every transport,
/// auth, and configuration failure internally and return empty results, so a
/// failed sync degrades to a local-only no-op instead of raising to the
/// engine. Unconfirmed outbox items are simply retried on the next cycle.
pub trait RemoteStore: Send + Sync {
  /// Upsert each outbox item's entity snapshot, stamping records with
  /// `owner` where they are not yet attached. Returns the ids of the items
  /// the remote confirmed accepted.
  fn push(
    &self,
    items: Vec<OutboxItem>,
    owner: Uuid,
  ) -> impl Future<Output = Vec<Uuid>> + Send + '_;

  /// Fetch the full snapshot owned by `owner`.
  fn pull(&self, owner: Uuid) -> impl Future<Output = RemoteSnapshot> + Send + '_;
}
