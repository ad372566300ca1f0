//! Outbox — the append-only log of local mutations not yet confirmed by the
//! remote store.
//!
//! One item is appended per persisted mutation; items get their own ids, so
//! repeated edits to one entity produce distinct items. Items are removed
//! only after the remote confirms acceptance, and unconfirmed items ride the
//! next sync cycle unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  entry::{EntryKey, HabitEntry},
  habit::Habit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxAction {
  Upsert,
  Delete,
}

/// The entity snapshot carried by an outbox item. The variant name is the
/// discriminant stored in the `entity` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "entity", content = "record", rename_all = "lowercase")]
pub enum OutboxPayload {
  Habit(Habit),
  Entry(HabitEntry),
}

impl OutboxPayload {
  /// The discriminant string stored in the `entity` column.
  /// Must match the `rename_all = "lowercase"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Habit(_) => "habit",
      Self::Entry(_) => "entry",
    }
  }

  /// Serialise the inner snapshot (without the entity tag) for the `payload`
  /// database column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("record").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the discriminant string and JSON snapshot stored in
  /// the database.
  pub fn from_parts(discriminant: &str, record: serde_json::Value) -> Result<Self> {
    match discriminant {
      "habit" | "entry" => {}
      other => return Err(crate::Error::UnknownEntity(other.to_owned())),
    }
    let wrapped = serde_json::json!({ "entity": discriminant, "record": record });
    Ok(serde_json::from_value(wrapped)?)
  }
}

/// Identity of the record an outbox item refers to — the merge guard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
  Habit(Uuid),
  Entry(EntryKey),
}

/// One unconfirmed local mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxItem {
  pub id:         Uuid,
  pub action:     OutboxAction,
  /// Equals the triggering entity's `updated_at`.
  pub created_at: DateTime<Utc>,
  pub owner_id:   Option<Uuid>,
  pub payload:    OutboxPayload,
}

impl OutboxItem {
  pub fn habit(habit: Habit, action: OutboxAction) -> Self {
    Self {
      id: Uuid::new_v4(),
      action,
      created_at: habit.updated_at,
      owner_id: habit.owner_id,
      payload: OutboxPayload::Habit(habit),
    }
  }

  pub fn entry(entry: HabitEntry, action: OutboxAction) -> Self {
    Self {
      id: Uuid::new_v4(),
      action,
      created_at: entry.updated_at,
      owner_id: entry.owner_id,
      payload: OutboxPayload::Entry(entry),
    }
  }

  pub fn entity_key(&self) -> EntityKey {
    match &self.payload {
      OutboxPayload::Habit(h) => EntityKey::Habit(h.id),
      OutboxPayload::Entry(e) => EntityKey::Entry(e.key()),
    }
  }
}
