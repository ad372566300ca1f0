//! HabitEntry — one calendar day's check-in for a habit.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The raw recorded outcome for a day. A composite habit's displayed status
/// is derived from its sub-activity flags instead (see
/// [`crate::stats::HabitView::effective_status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
  Success,
  Fail,
}

/// The canonical identity of an entry: one check-in per habit per day.
///
/// Used as the cache key, the local table primary key, the outbox guard key,
/// and the remote upsert conflict target. The generated row id on
/// [`HabitEntry`] is carried for the wire schema only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
  pub habit_id: Uuid,
  pub date:     NaiveDate,
}

/// A single day's check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitEntry {
  pub id:                    Uuid,
  pub habit_id:              Uuid,
  pub owner_id:              Option<Uuid>,
  pub date:                  NaiveDate,
  /// `None` when the day has only sub-activity flags and no explicit outcome.
  pub status:                Option<EntryStatus>,
  /// Per sub-activity done flags; populated for composite habits only.
  #[serde(default)]
  pub sub_activity_statuses: BTreeMap<Uuid, bool>,
  pub created_at:            DateTime<Utc>,
  pub updated_at:            DateTime<Utc>,
  pub deleted_at:            Option<DateTime<Utc>>,
}

impl HabitEntry {
  pub fn new(
    habit_id: Uuid,
    date: NaiveDate,
    status: Option<EntryStatus>,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      habit_id,
      owner_id: None,
      date,
      status,
      sub_activity_statuses: BTreeMap::new(),
      created_at: now,
      updated_at: now,
      deleted_at: None,
    }
  }

  pub fn key(&self) -> EntryKey {
    EntryKey {
      habit_id: self.habit_id,
      date:     self.date,
    }
  }

  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }
}
