//! [`SqliteStore`] — the SQLite implementation of [`LocalStore`].

use std::path::Path;

use ledger_core::{
  entry::HabitEntry, habit::Habit, outbox::OutboxItem, store::LocalStore,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawEntry, RawHabit, RawOutboxItem, encode_uuid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A habit-ledger local store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — the degraded fallback when the durable file
  /// is unavailable, and the backend used in tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── LocalStore impl ─────────────────────────────────────────────────────────

impl LocalStore for SqliteStore {
  type Error = Error;

  // ── Entities ──────────────────────────────────────────────────────────────

  async fn load_habits(&self) -> Result<Vec<Habit>> {
    let raws: Vec<RawHabit> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT habit_id, owner_id, title, kind, review_window_days,
                  sub_activities, created_at, updated_at, deleted_at
           FROM habits",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawHabit {
              habit_id:           row.get(0)?,
              owner_id:           row.get(1)?,
              title:              row.get(2)?,
              kind:               row.get(3)?,
              review_window_days: row.get(4)?,
              sub_activities:     row.get(5)?,
              created_at:         row.get(6)?,
              updated_at:         row.get(7)?,
              deleted_at:         row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHabit::into_habit).collect()
  }

  async fn load_entries(&self) -> Result<Vec<HabitEntry>> {
    let raws: Vec<RawEntry> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT habit_id, entry_date, row_id, owner_id, status,
                  sub_activity_statuses, created_at, updated_at, deleted_at
           FROM entries",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawEntry {
              habit_id:              row.get(0)?,
              entry_date:            row.get(1)?,
              row_id:                row.get(2)?,
              owner_id:              row.get(3)?,
              status:                row.get(4)?,
              sub_activity_statuses: row.get(5)?,
              created_at:            row.get(6)?,
              updated_at:            row.get(7)?,
              deleted_at:            row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }

  async fn upsert_habits(&self, habits: Vec<Habit>) -> Result<()> {
    if habits.is_empty() {
      return Ok(());
    }
    let raws = habits
      .iter()
      .map(RawHabit::from_habit)
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for raw in &raws {
          tx.execute(
            "INSERT OR REPLACE INTO habits (
               habit_id, owner_id, title, kind, review_window_days,
               sub_activities, created_at, updated_at, deleted_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
              raw.habit_id,
              raw.owner_id,
              raw.title,
              raw.kind,
              raw.review_window_days,
              raw.sub_activities,
              raw.created_at,
              raw.updated_at,
              raw.deleted_at,
            ],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_entries(&self, entries: Vec<HabitEntry>) -> Result<()> {
    if entries.is_empty() {
      return Ok(());
    }
    let raws = entries
      .iter()
      .map(RawEntry::from_entry)
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for raw in &raws {
          tx.execute(
            "INSERT OR REPLACE INTO entries (
               habit_id, entry_date, row_id, owner_id, status,
               sub_activity_statuses, created_at, updated_at, deleted_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
              raw.habit_id,
              raw.entry_date,
              raw.row_id,
              raw.owner_id,
              raw.status,
              raw.sub_activity_statuses,
              raw.created_at,
              raw.updated_at,
              raw.deleted_at,
            ],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Outbox ────────────────────────────────────────────────────────────────

  async fn load_outbox(&self) -> Result<Vec<OutboxItem>> {
    let raws: Vec<RawOutboxItem> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT item_id, entity, action, created_at, owner_id, payload
           FROM outbox ORDER BY seq",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawOutboxItem {
              item_id:    row.get(0)?,
              entity:     row.get(1)?,
              action:     row.get(2)?,
              created_at: row.get(3)?,
              owner_id:   row.get(4)?,
              payload:    row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOutboxItem::into_item).collect()
  }

  async fn append_outbox(&self, items: Vec<OutboxItem>) -> Result<()> {
    if items.is_empty() {
      return Ok(());
    }
    let raws = items
      .iter()
      .map(RawOutboxItem::from_item)
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for raw in &raws {
          tx.execute(
            "INSERT OR REPLACE INTO outbox (
               item_id, entity, action, created_at, owner_id, payload
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
              raw.item_id,
              raw.entity,
              raw.action,
              raw.created_at,
              raw.owner_id,
              raw.payload,
            ],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn remove_outbox(&self, ids: Vec<Uuid>) -> Result<()> {
    if ids.is_empty() {
      return Ok(());
    }
    let id_strs: Vec<String> = ids.into_iter().map(encode_uuid).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for id in &id_strs {
          tx.execute(
            "DELETE FROM outbox WHERE item_id = ?1",
            rusqlite::params![id],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Meta ──────────────────────────────────────────────────────────────────

  async fn get_meta(&self, key: &str) -> Result<Option<String>> {
    let key = key.to_owned();
    let value: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM meta WHERE key = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(value)
  }

  async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
    let key = key.to_owned();
    let value = value.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
          rusqlite::params![key, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
