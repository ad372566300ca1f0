//! The `LocalStore` trait — the durable four-collection contract.
//!
//! The trait is implemented by storage backends (e.g. `ledger-store-sqlite`).
//! The engine depends on this abstraction, not on any concrete backend, and
//! absorbs backend errors itself: a failing store degrades the engine to
//! memory-only operation rather than surfacing to callers.

use std::future::Future;

use uuid::Uuid;

use crate::{entry::HabitEntry, habit::Habit, outbox::OutboxItem};

/// Meta key holding the RFC 3339 stamp of the last completed sync cycle.
pub const META_LAST_SYNC: &str = "last_sync";

/// Abstraction over the durable local store.
///
/// All upserts replace by identity (habit id, entry `(habit_id, date)` key,
/// outbox item id) and are idempotent. All methods return `Send` futures so
/// the trait can be used from multi-threaded async runtimes.
pub trait LocalStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Entities ──────────────────────────────────────────────────────────

  fn load_habits(
    &self,
  ) -> impl Future<Output = Result<Vec<Habit>, Self::Error>> + Send + '_;

  fn load_entries(
    &self,
  ) -> impl Future<Output = Result<Vec<HabitEntry>, Self::Error>> + Send + '_;

  fn upsert_habits(
    &self,
    habits: Vec<Habit>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn upsert_entries(
    &self,
    entries: Vec<HabitEntry>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Outbox ────────────────────────────────────────────────────────────

  /// Load the full outbox in append order.
  fn load_outbox(
    &self,
  ) -> impl Future<Output = Result<Vec<OutboxItem>, Self::Error>> + Send + '_;

  fn append_outbox(
    &self,
    items: Vec<OutboxItem>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove confirmed items; unknown ids are ignored.
  fn remove_outbox(
    &self,
    ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Meta ──────────────────────────────────────────────────────────────

  fn get_meta<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  fn set_meta<'a>(
    &'a self,
    key: &'a str,
    value: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
