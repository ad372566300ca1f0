//! Whole-record last-write-wins merge of a remote snapshot into local state.

use std::collections::{HashMap, HashSet};

use ledger_core::{
  entry::{EntryKey, HabitEntry},
  habit::Habit,
  outbox::{EntityKey, OutboxItem},
  remote::RemoteSnapshot,
};
use uuid::Uuid;

/// The remote records that replace their local counterparts.
#[derive(Debug, Default)]
pub struct MergeOutcome {
  pub habits:  Vec<Habit>,
  pub entries: Vec<HabitEntry>,
}

impl MergeOutcome {
  pub fn is_empty(&self) -> bool {
    self.habits.is_empty() && self.entries.is_empty()
  }
}

/// Decide which remote records win.
///
/// A remote record replaces the local one iff no unconfirmed outbox item
/// exists for its identity, AND either no local record exists or the remote
/// is strictly newer. Equal timestamps keep the local record. Resolution is
/// always whole-record; tombstones flow through like any other record.
pub fn merge_snapshot(
  local_habits: &HashMap<Uuid, Habit>,
  local_entries: &HashMap<EntryKey, HabitEntry>,
  snapshot: RemoteSnapshot,
  outbox: &[OutboxItem],
) -> MergeOutcome {
  let guarded: HashSet<EntityKey> =
    outbox.iter().map(OutboxItem::entity_key).collect();

  let habits = snapshot
    .habits
    .into_iter()
    .filter(|remote| !guarded.contains(&EntityKey::Habit(remote.id)))
    .filter(|remote| match local_habits.get(&remote.id) {
      Some(local) => remote.updated_at > local.updated_at,
      None => true,
    })
    .collect();

  let entries = snapshot
    .entries
    .into_iter()
    .filter(|remote| !guarded.contains(&EntityKey::Entry(remote.key())))
    .filter(|remote| match local_entries.get(&remote.key()) {
      Some(local) => remote.updated_at > local.updated_at,
      None => true,
    })
    .collect();

  MergeOutcome { habits, entries }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
