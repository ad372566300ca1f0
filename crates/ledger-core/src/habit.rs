//! Habit — the tracked activity and its optional sub-activity checklist.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Upper bound on `review_window_days`.
pub const REVIEW_WINDOW_MAX: u8 = 90;

/// Whether a habit is something to build up or something to cut out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitKind {
  Good,
  Bad,
}

/// A named checklist item inside a composite habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubActivity {
  pub id:    Uuid,
  pub label: String,
}

/// A tracked habit.
///
/// Records are soft-deleted via `deleted_at` so the deletion survives merge;
/// `updated_at` is bumped on every mutation and drives last-write-wins
/// conflict resolution. `owner_id` is `None` until the record is attached to
/// an authenticated owner, and is never reverted afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
  pub id:                 Uuid,
  pub owner_id:           Option<Uuid>,
  pub title:              String,
  pub kind:               HabitKind,
  pub review_window_days: u8,
  pub sub_activities:     Vec<SubActivity>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
  pub deleted_at:         Option<DateTime<Utc>>,
}

impl Habit {
  /// Construct a habit with a fresh id.
  ///
  /// The title is trimmed, the review window clamped to
  /// `0..=REVIEW_WINDOW_MAX`, and sub-activity labels are trimmed and
  /// de-duplicated case-insensitively — first occurrence wins, order is
  /// preserved.
  pub fn new(
    title: &str,
    kind: HabitKind,
    review_window_days: u8,
    sub_activity_labels: &[String],
    now: DateTime<Utc>,
  ) -> Self {
    let mut seen: HashSet<String> = HashSet::new();
    let sub_activities = sub_activity_labels
      .iter()
      .map(|label| label.trim())
      .filter(|label| !label.is_empty())
      .filter(|label| seen.insert(label.to_lowercase()))
      .map(|label| SubActivity {
        id:    Uuid::new_v4(),
        label: label.to_owned(),
      })
      .collect();

    Self {
      id: Uuid::new_v4(),
      owner_id: None,
      title: title.trim().to_owned(),
      kind,
      review_window_days: review_window_days.min(REVIEW_WINDOW_MAX),
      sub_activities,
      created_at: now,
      updated_at: now,
      deleted_at: None,
    }
  }

  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }
}

/// Reject titles with no visible characters.
pub fn validate_title(title: &str) -> Result<()> {
  if title.trim().is_empty() {
    Err(Error::EmptyTitle)
  } else {
    Ok(())
  }
}

/// Reject review windows outside `0..=REVIEW_WINDOW_MAX`.
pub fn validate_review_window(days: u8) -> Result<()> {
  if days > REVIEW_WINDOW_MAX {
    Err(Error::ReviewWindowOutOfRange(days))
  } else {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  #[test]
  fn new_trims_and_dedups_sub_activities() {
    let labels = vec![
      "Stretch".to_owned(),
      "  stretch  ".to_owned(),
      "".to_owned(),
      "Walk".to_owned(),
      "STRETCH".to_owned(),
    ];
    let habit = Habit::new("Morning routine", HabitKind::Good, 7, &labels, Utc::now());

    let kept: Vec<_> = habit
      .sub_activities
      .iter()
      .map(|a| a.label.as_str())
      .collect();
    assert_eq!(kept, ["Stretch", "Walk"]);
  }

  #[test]
  fn new_clamps_review_window() {
    let habit = Habit::new("Read", HabitKind::Good, 200, &[], Utc::now());
    assert_eq!(habit.review_window_days, REVIEW_WINDOW_MAX);
  }

  #[test]
  fn validate_rejects_blank_title() {
    assert!(matches!(validate_title("   "), Err(Error::EmptyTitle)));
    assert!(validate_title("Drink water").is_ok());
  }

  #[test]
  fn validate_rejects_oversized_window() {
    assert!(matches!(
      validate_review_window(91),
      Err(Error::ReviewWindowOutOfRange(91))
    ));
    assert!(validate_review_window(0).is_ok());
    assert!(validate_review_window(90).is_ok());
  }
}
