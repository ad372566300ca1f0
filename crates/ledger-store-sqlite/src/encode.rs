//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings, calendar days as
//! `YYYY-MM-DD`. Structured fields (sub-activity lists, checklist flags,
//! outbox payloads) are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use ledger_core::{
  entry::{EntryStatus, HabitEntry},
  habit::{Habit, HabitKind, SubActivity},
  outbox::{OutboxAction, OutboxItem, OutboxPayload},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_opt_uuid(id: Option<Uuid>) -> Option<String> {
  id.map(encode_uuid)
}

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  s.parse().map_err(|_| Error::DateParse(format!("bad date key: {s:?}")))
}

// ─── HabitKind ───────────────────────────────────────────────────────────────

pub fn encode_kind(k: HabitKind) -> &'static str {
  match k {
    HabitKind::Good => "good",
    HabitKind::Bad => "bad",
  }
}

pub fn decode_kind(s: &str) -> Result<HabitKind> {
  match s {
    "good" => Ok(HabitKind::Good),
    "bad" => Ok(HabitKind::Bad),
    other => Err(Error::Decode(format!("unknown habit kind: {other:?}"))),
  }
}

// ─── EntryStatus ─────────────────────────────────────────────────────────────

pub fn encode_status(s: Option<EntryStatus>) -> Option<&'static str> {
  s.map(|s| match s {
    EntryStatus::Success => "success",
    EntryStatus::Fail => "fail",
  })
}

pub fn decode_status(s: Option<&str>) -> Result<Option<EntryStatus>> {
  match s {
    None => Ok(None),
    Some("success") => Ok(Some(EntryStatus::Success)),
    Some("fail") => Ok(Some(EntryStatus::Fail)),
    Some(other) => Err(Error::Decode(format!("unknown entry status: {other:?}"))),
  }
}

// ─── OutboxAction ────────────────────────────────────────────────────────────

pub fn encode_action(a: OutboxAction) -> &'static str {
  match a {
    OutboxAction::Upsert => "upsert",
    OutboxAction::Delete => "delete",
  }
}

pub fn decode_action(s: &str) -> Result<OutboxAction> {
  match s {
    "upsert" => Ok(OutboxAction::Upsert),
    "delete" => Ok(OutboxAction::Delete),
    other => Err(Error::Decode(format!("unknown outbox action: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read from (or bound into) a `habits` row.
pub struct RawHabit {
  pub habit_id:           String,
  pub owner_id:           Option<String>,
  pub title:              String,
  pub kind:               String,
  pub review_window_days: i64,
  pub sub_activities:     String,
  pub created_at:         String,
  pub updated_at:         String,
  pub deleted_at:         Option<String>,
}

impl RawHabit {
  pub fn from_habit(habit: &Habit) -> Result<Self> {
    Ok(Self {
      habit_id:           encode_uuid(habit.id),
      owner_id:           encode_opt_uuid(habit.owner_id),
      title:              habit.title.clone(),
      kind:               encode_kind(habit.kind).to_owned(),
      review_window_days: i64::from(habit.review_window_days),
      sub_activities:     serde_json::to_string(&habit.sub_activities)?,
      created_at:         encode_dt(habit.created_at),
      updated_at:         encode_dt(habit.updated_at),
      deleted_at:         habit.deleted_at.map(encode_dt),
    })
  }

  pub fn into_habit(self) -> Result<Habit> {
    let sub_activities: Vec<SubActivity> =
      serde_json::from_str(&self.sub_activities)?;

    Ok(Habit {
      id: decode_uuid(&self.habit_id)?,
      owner_id: decode_opt_uuid(self.owner_id.as_deref())?,
      title: self.title,
      kind: decode_kind(&self.kind)?,
      review_window_days: u8::try_from(self.review_window_days)
        .map_err(|_| Error::Decode(format!(
          "review window out of range: {}",
          self.review_window_days
        )))?,
      sub_activities,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      deleted_at: decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

/// Raw strings read from (or bound into) an `entries` row.
pub struct RawEntry {
  pub habit_id:              String,
  pub entry_date:            String,
  pub row_id:                String,
  pub owner_id:              Option<String>,
  pub status:                Option<String>,
  pub sub_activity_statuses: String,
  pub created_at:            String,
  pub updated_at:            String,
  pub deleted_at:            Option<String>,
}

impl RawEntry {
  pub fn from_entry(entry: &HabitEntry) -> Result<Self> {
    Ok(Self {
      habit_id:              encode_uuid(entry.habit_id),
      entry_date:            encode_date(entry.date),
      row_id:                encode_uuid(entry.id),
      owner_id:              encode_opt_uuid(entry.owner_id),
      status:                encode_status(entry.status).map(str::to_owned),
      sub_activity_statuses: serde_json::to_string(&entry.sub_activity_statuses)?,
      created_at:            encode_dt(entry.created_at),
      updated_at:            encode_dt(entry.updated_at),
      deleted_at:            entry.deleted_at.map(encode_dt),
    })
  }

  pub fn into_entry(self) -> Result<HabitEntry> {
    Ok(HabitEntry {
      id: decode_uuid(&self.row_id)?,
      habit_id: decode_uuid(&self.habit_id)?,
      owner_id: decode_opt_uuid(self.owner_id.as_deref())?,
      date: decode_date(&self.entry_date)?,
      status: decode_status(self.status.as_deref())?,
      sub_activity_statuses: serde_json::from_str(&self.sub_activity_statuses)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      deleted_at: decode_opt_dt(self.deleted_at.as_deref())?,
    })
  }
}

/// Raw strings read from (or bound into) an `outbox` row.
pub struct RawOutboxItem {
  pub item_id:    String,
  pub entity:     String,
  pub action:     String,
  pub created_at: String,
  pub owner_id:   Option<String>,
  pub payload:    String,
}

impl RawOutboxItem {
  pub fn from_item(item: &OutboxItem) -> Result<Self> {
    Ok(Self {
      item_id:    encode_uuid(item.id),
      entity:     item.payload.discriminant().to_owned(),
      action:     encode_action(item.action).to_owned(),
      created_at: encode_dt(item.created_at),
      owner_id:   encode_opt_uuid(item.owner_id),
      payload:    item.payload.to_json().map_err(Error::Core)?.to_string(),
    })
  }

  pub fn into_item(self) -> Result<OutboxItem> {
    let record: serde_json::Value = serde_json::from_str(&self.payload)?;
    let payload = OutboxPayload::from_parts(&self.entity, record)?;

    Ok(OutboxItem {
      id: decode_uuid(&self.item_id)?,
      action: decode_action(&self.action)?,
      created_at: decode_dt(&self.created_at)?,
      owner_id: decode_opt_uuid(self.owner_id.as_deref())?,
      payload,
    })
  }
}
