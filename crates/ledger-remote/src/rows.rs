//! Wire row types — the compatibility contract with the backing service.
//!
//! Column names and shapes mirror the remote `habits` and `habit_entries`
//! tables. Mapping is lossless apart from optional arrays, which the remote
//! may return as `null` and which map back to empty collections.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use ledger_core::{
  entry::{EntryStatus, HabitEntry},
  habit::{Habit, HabitKind, SubActivity},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── habits ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitRow {
  pub id:                 Uuid,
  pub user_id:            Uuid,
  pub title:              String,
  pub kind:               HabitKind,
  pub review_window_days: u8,
  pub sub_activities:     Option<Vec<SubActivity>>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
  pub deleted_at:         Option<DateTime<Utc>>,
}

impl HabitRow {
  /// Rows are always owner-stamped on the wire; records not yet attached
  /// locally are stamped with the pushing owner.
  pub fn from_habit(habit: &Habit, owner: Uuid) -> Self {
    Self {
      id:                 habit.id,
      user_id:            habit.owner_id.unwrap_or(owner),
      title:              habit.title.clone(),
      kind:               habit.kind,
      review_window_days: habit.review_window_days,
      sub_activities:     Some(habit.sub_activities.clone()),
      created_at:         habit.created_at,
      updated_at:         habit.updated_at,
      deleted_at:         habit.deleted_at,
    }
  }

  pub fn into_habit(self) -> Habit {
    Habit {
      id: self.id,
      owner_id: Some(self.user_id),
      title: self.title,
      kind: self.kind,
      review_window_days: self.review_window_days,
      sub_activities: self.sub_activities.unwrap_or_default(),
      created_at: self.created_at,
      updated_at: self.updated_at,
      deleted_at: self.deleted_at,
    }
  }
}

// ─── habit_entries ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRow {
  pub id:                    Uuid,
  pub habit_id:              Uuid,
  pub user_id:               Uuid,
  pub entry_date:            NaiveDate,
  pub status:                Option<EntryStatus>,
  pub sub_activity_statuses: Option<BTreeMap<Uuid, bool>>,
  pub created_at:            DateTime<Utc>,
  pub updated_at:            DateTime<Utc>,
  pub deleted_at:            Option<DateTime<Utc>>,
}

impl EntryRow {
  pub fn from_entry(entry: &HabitEntry, owner: Uuid) -> Self {
    Self {
      id:                    entry.id,
      habit_id:              entry.habit_id,
      user_id:               entry.owner_id.unwrap_or(owner),
      entry_date:            entry.date,
      status:                entry.status,
      sub_activity_statuses: Some(entry.sub_activity_statuses.clone()),
      created_at:            entry.created_at,
      updated_at:            entry.updated_at,
      deleted_at:            entry.deleted_at,
    }
  }

  pub fn into_entry(self) -> HabitEntry {
    HabitEntry {
      id: self.id,
      habit_id: self.habit_id,
      owner_id: Some(self.user_id),
      date: self.entry_date,
      status: self.status,
      sub_activity_statuses: self.sub_activity_statuses.unwrap_or_default(),
      created_at: self.created_at,
      updated_at: self.updated_at,
      deleted_at: self.deleted_at,
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
