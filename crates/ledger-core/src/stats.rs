//! Derived read model and statistics.
//!
//! Nothing here is stored: a [`HabitView`] is assembled on read from the
//! engine's cache (tombstones already filtered), and every statistic is
//! computed from effective statuses at call time.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::{
  entry::{EntryStatus, HabitEntry},
  habit::Habit,
};

/// Streak walking is bounded; a year of consecutive days is reported as 365.
const STREAK_MAX_DAYS: u64 = 365;

// ─── HabitView ───────────────────────────────────────────────────────────────

/// A habit with its live entries nested by date — the unit of the read view.
#[derive(Debug, Clone, Serialize)]
pub struct HabitView {
  #[serde(flatten)]
  pub habit:   Habit,
  pub entries: BTreeMap<NaiveDate, HabitEntry>,
}

impl HabitView {
  /// The derived success/fail outcome for `date`, or `None` when nothing is
  /// recorded.
  ///
  /// Simple habits report the raw stored status. Composite habits derive it
  /// from the checklist: all sub-activities done is a success, a partial
  /// checklist is a fail, and an untouched checklist falls back to the raw
  /// status.
  pub fn effective_status(&self, date: NaiveDate) -> Option<EntryStatus> {
    let entry = self.entries.get(&date)?;
    if self.habit.sub_activities.is_empty() {
      return entry.status;
    }

    let done = self
      .habit
      .sub_activities
      .iter()
      .filter(|a| entry.sub_activity_statuses.get(&a.id).copied().unwrap_or(false))
      .count();

    if done == self.habit.sub_activities.len() {
      Some(EntryStatus::Success)
    } else if done > 0 {
      Some(EntryStatus::Fail)
    } else {
      entry.status
    }
  }

  /// Consecutive effective-success days ending at `base_date`.
  pub fn streak(&self, base_date: NaiveDate) -> u32 {
    let mut streak = 0;
    for offset in 0..STREAK_MAX_DAYS {
      let Some(date) = base_date.checked_sub_days(Days::new(offset)) else {
        break;
      };
      if self.effective_status(date) != Some(EntryStatus::Success) {
        break;
      }
      streak += 1;
    }
    streak
  }

  /// Share of the trailing `window_days` (ending at `base_date`, inclusive)
  /// with an effective success, as a whole percentage.
  pub fn success_rate(&self, window_days: u8, base_date: NaiveDate) -> u8 {
    if window_days == 0 {
      return 0;
    }
    let successes = (0..u64::from(window_days))
      .filter_map(|offset| base_date.checked_sub_days(Days::new(offset)))
      .filter(|date| self.effective_status(*date) == Some(EntryStatus::Success))
      .count();

    ((successes as f64 / f64::from(window_days)) * 100.0).round() as u8
  }
}

// ─── Daily summary ───────────────────────────────────────────────────────────

/// Cross-habit totals for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailySummary {
  /// Habits with any effective status recorded for the day.
  pub total:     usize,
  pub successes: usize,
  /// Whole-percent success share; 0 when nothing is recorded.
  pub rate:      u8,
}

pub fn daily_summary(views: &[HabitView], date: NaiveDate) -> DailySummary {
  let mut total = 0;
  let mut successes = 0;

  for view in views {
    match view.effective_status(date) {
      Some(EntryStatus::Success) => {
        total += 1;
        successes += 1;
      }
      Some(EntryStatus::Fail) => total += 1,
      None => {}
    }
  }

  let rate = if total == 0 {
    0
  } else {
    ((successes as f64 / total as f64) * 100.0).round() as u8
  };

  DailySummary { total, successes, rate }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
