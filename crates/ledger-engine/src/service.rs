//! [`SyncService`] — the orchestrator owning the authoritative cache.
//!
//! Every command applies its read-modify-write to the cache synchronously,
//! before any I/O, so an in-flight merge always observes the latest local
//! edits. Store and remote failures are absorbed here: reads degrade to
//! empty, writes to logged no-ops, and a failed cycle never corrupts local
//! state.

use std::{
  collections::{BTreeMap, HashMap},
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, NaiveDate, Utc};
use ledger_core::{
  Result,
  clock::{Clock, SystemClock},
  entry::{EntryKey, EntryStatus, HabitEntry},
  habit::{self, Habit, HabitKind},
  outbox::{OutboxAction, OutboxItem},
  remote::RemoteStore,
  stats::HabitView,
  store::{LocalStore, META_LAST_SYNC},
};
use serde::Serialize;
use uuid::Uuid;

use crate::merge::merge_snapshot;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Sync state exposed alongside the read view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
  pub is_syncing: bool,
  pub last_sync:  Option<DateTime<Utc>>,
}

// ─── Internal state ──────────────────────────────────────────────────────────

/// The authoritative in-memory mirror of the local store. Id-indexed maps
/// are the primary representation; sorted and filtered views are derived
/// lazily at read time.
#[derive(Default)]
struct Cache {
  habits:    HashMap<Uuid, Habit>,
  entries:   HashMap<EntryKey, HabitEntry>,
  owner:     Option<Uuid>,
  last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncPhase {
  Idle,
  Syncing,
}

/// A sync requested mid-cycle is coalesced into exactly one follow-up cycle
/// instead of being dropped.
struct SyncState {
  phase: SyncPhase,
  rerun: bool,
}

/// An entry-level command, applied through one shared write path.
enum EntryEdit {
  SetStatus(EntryStatus),
  SetFlag { sub_activity_id: Uuid, done: bool },
  Clear,
}

struct Inner<S, R, C> {
  store:  S,
  remote: R,
  clock:  C,
  cache:  Mutex<Cache>,
  sync:   Mutex<SyncState>,
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// The sync engine service object.
///
/// Cloning is cheap — all state lives behind a shared `Arc`.
pub struct SyncService<S, R, C = SystemClock> {
  inner: Arc<Inner<S, R, C>>,
}

impl<S, R, C> Clone for SyncService<S, R, C> {
  fn clone(&self) -> Self {
    Self { inner: Arc::clone(&self.inner) }
  }
}

/// Records in a read view or command target must share the active owner
/// scope; `None` matches `None` only.
fn in_scope(record_owner: Option<Uuid>, active: Option<Uuid>) -> bool {
  record_owner == active
}

impl<S, R, C> SyncService<S, R, C>
where
  S: LocalStore,
  R: RemoteStore,
  C: Clock,
{
  pub fn new(store: S, remote: R, clock: C) -> Self {
    Self {
      inner: Arc::new(Inner {
        store,
        remote,
        clock,
        cache: Mutex::new(Cache::default()),
        sync: Mutex::new(SyncState { phase: SyncPhase::Idle, rerun: false }),
      }),
    }
  }

  /// The injected local store.
  pub fn store(&self) -> &S { &self.inner.store }

  /// The injected remote client.
  pub fn remote(&self) -> &R { &self.inner.remote }

  fn lock_cache(&self) -> MutexGuard<'_, Cache> {
    self.inner.cache.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn lock_sync(&self) -> MutexGuard<'_, SyncState> {
    self.inner.sync.lock().unwrap_or_else(PoisonError::into_inner)
  }

  // ── Hydration ─────────────────────────────────────────────────────────────

  /// Load the durable collections into the cache at process start. A failing
  /// store leaves the engine running memory-only.
  pub async fn hydrate(&self) {
    let habits = match self.inner.store.load_habits().await {
      Ok(habits) => habits,
      Err(e) => {
        tracing::warn!("hydrating habits failed, starting empty: {e}");
        Vec::new()
      }
    };
    let entries = match self.inner.store.load_entries().await {
      Ok(entries) => entries,
      Err(e) => {
        tracing::warn!("hydrating entries failed, starting empty: {e}");
        Vec::new()
      }
    };
    let last_sync = match self.inner.store.get_meta(META_LAST_SYNC).await {
      Ok(value) => value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
          .map(|dt| dt.with_timezone(&Utc))
          .ok()
      }),
      Err(e) => {
        tracing::warn!("reading last-sync stamp failed: {e}");
        None
      }
    };

    let mut cache = self.lock_cache();
    cache.habits = habits.into_iter().map(|h| (h.id, h)).collect();
    cache.entries = entries.into_iter().map(|e| (e.key(), e)).collect();
    cache.last_sync = last_sync;
  }

  // ── Commands ──────────────────────────────────────────────────────────────

  /// Create a habit. The only command that can fail, and only on validation.
  pub async fn add_habit(
    &self,
    title: &str,
    kind: HabitKind,
    review_window_days: u8,
    sub_activity_labels: &[String],
  ) -> Result<Habit> {
    habit::validate_title(title)?;
    habit::validate_review_window(review_window_days)?;

    let now = self.inner.clock.now();
    let habit = {
      let mut cache = self.lock_cache();
      let mut habit =
        Habit::new(title, kind, review_window_days, sub_activity_labels, now);
      habit.owner_id = cache.owner;
      cache.habits.insert(habit.id, habit.clone());
      habit
    };

    self.persist_habits(vec![habit.clone()]).await;
    self
      .enqueue(vec![OutboxItem::habit(habit.clone(), OutboxAction::Upsert)])
      .await;
    Ok(habit)
  }

  /// Tombstone a habit and cascade the tombstone to all of its live entries.
  /// Unknown, already-deleted, or out-of-scope ids are no-ops.
  pub async fn remove_habit(&self, id: Uuid) {
    let now = self.inner.clock.now();
    let (habit, entries, items) = {
      let mut guard = self.lock_cache();
      let cache = &mut *guard;
      let active = cache.owner;

      let Some(habit) = cache.habits.get_mut(&id) else { return };
      if habit.is_deleted() || !in_scope(habit.owner_id, active) {
        return;
      }
      habit.deleted_at = Some(now);
      habit.updated_at = now;
      let habit = habit.clone();

      let mut entries = Vec::new();
      for entry in cache.entries.values_mut() {
        if entry.habit_id == id
          && !entry.is_deleted()
          && in_scope(entry.owner_id, active)
        {
          entry.deleted_at = Some(now);
          entry.updated_at = now;
          entries.push(entry.clone());
        }
      }

      let mut items = vec![OutboxItem::habit(habit.clone(), OutboxAction::Delete)];
      items.extend(
        entries
          .iter()
          .cloned()
          .map(|e| OutboxItem::entry(e, OutboxAction::Delete)),
      );
      (habit, entries, items)
    };

    self.persist_habits(vec![habit]).await;
    self.persist_entries(entries).await;
    self.enqueue(items).await;
  }

  /// Record the day's outcome for a habit.
  pub async fn set_status(&self, id: Uuid, date: NaiveDate, status: EntryStatus) {
    self.write_entry(id, date, EntryEdit::SetStatus(status)).await;
  }

  /// Toggle one sub-activity's done flag for the day. Unknown sub-activity
  /// ids are no-ops.
  pub async fn set_sub_activity_status(
    &self,
    id: Uuid,
    date: NaiveDate,
    sub_activity_id: Uuid,
    done: bool,
  ) {
    self
      .write_entry(id, date, EntryEdit::SetFlag { sub_activity_id, done })
      .await;
  }

  /// Clear the day's check-in (tombstones the entry).
  pub async fn clear_status(&self, id: Uuid, date: NaiveDate) {
    self.write_entry(id, date, EntryEdit::Clear).await;
  }

  /// Shared write path for entry commands: the entry write and the parent
  /// habit's `updated_at` bump happen in the same logical step, one outbox
  /// item each.
  async fn write_entry(&self, habit_id: Uuid, date: NaiveDate, edit: EntryEdit) {
    let now = self.inner.clock.now();
    let (habit, entry, items) = {
      let mut guard = self.lock_cache();
      let cache = &mut *guard;
      let active = cache.owner;

      let Some(habit) = cache.habits.get_mut(&habit_id) else { return };
      if habit.is_deleted() || !in_scope(habit.owner_id, active) {
        return;
      }
      if let EntryEdit::SetFlag { sub_activity_id, .. } = &edit {
        if !habit.sub_activities.iter().any(|a| a.id == *sub_activity_id) {
          return;
        }
      }

      let key = EntryKey { habit_id, date };
      let action = match &edit {
        EntryEdit::Clear => OutboxAction::Delete,
        _ => OutboxAction::Upsert,
      };

      let entry = match edit {
        EntryEdit::Clear => match cache.entries.get_mut(&key) {
          Some(entry) if !entry.is_deleted() && in_scope(entry.owner_id, active) => {
            entry.deleted_at = Some(now);
            entry.updated_at = now;
            entry.clone()
          }
          // Nothing recorded for the day — skip the habit bump too.
          _ => return,
        },
        EntryEdit::SetStatus(status) => {
          let entry = cache.entries.entry(key).or_insert_with(|| {
            let mut entry = HabitEntry::new(habit_id, date, None, now);
            entry.owner_id = active;
            entry
          });
          if !in_scope(entry.owner_id, active) {
            return;
          }
          entry.status = Some(status);
          entry.deleted_at = None;
          entry.updated_at = now;
          entry.clone()
        }
        EntryEdit::SetFlag { sub_activity_id, done } => {
          let entry = cache.entries.entry(key).or_insert_with(|| {
            let mut entry = HabitEntry::new(habit_id, date, None, now);
            entry.owner_id = active;
            entry
          });
          if !in_scope(entry.owner_id, active) {
            return;
          }
          entry.sub_activity_statuses.insert(sub_activity_id, done);
          entry.deleted_at = None;
          entry.updated_at = now;
          entry.clone()
        }
      };

      habit.updated_at = now;
      let habit = habit.clone();

      let items = vec![
        OutboxItem::habit(habit.clone(), OutboxAction::Upsert),
        OutboxItem::entry(entry.clone(), action),
      ];
      (habit, entry, items)
    };

    self.persist_entries(vec![entry]).await;
    self.persist_habits(vec![habit]).await;
    self.enqueue(items).await;
  }

  // ── Ownership reattachment ────────────────────────────────────────────────

  /// Attach the authenticated owner: every unscoped record is re-stamped,
  /// persisted, re-enqueued so the remote learns about pre-authentication
  /// data, and a sync cycle is triggered. Calling again with the same owner
  /// finds nothing to re-stamp.
  pub async fn attach_owner(&self, owner: Uuid) {
    let now = self.inner.clock.now();
    let (habits, entries, items) = {
      let mut guard = self.lock_cache();
      let cache = &mut *guard;
      cache.owner = Some(owner);

      let mut habits = Vec::new();
      for habit in cache.habits.values_mut() {
        if habit.owner_id.is_none() {
          habit.owner_id = Some(owner);
          habit.updated_at = now;
          habits.push(habit.clone());
        }
      }

      let mut entries = Vec::new();
      for entry in cache.entries.values_mut() {
        if entry.owner_id.is_none() {
          entry.owner_id = Some(owner);
          entry.updated_at = now;
          entries.push(entry.clone());
        }
      }

      let mut items: Vec<OutboxItem> = habits
        .iter()
        .cloned()
        .map(|h| OutboxItem::habit(h, OutboxAction::Upsert))
        .collect();
      items.extend(
        entries
          .iter()
          .cloned()
          .map(|e| OutboxItem::entry(e, OutboxAction::Upsert)),
      );
      (habits, entries, items)
    };

    if !items.is_empty() {
      tracing::info!(
        habits = habits.len(),
        entries = entries.len(),
        "attaching local records to owner"
      );
      self.persist_habits(habits).await;
      self.persist_entries(entries).await;
      self.enqueue(items).await;
    }

    self.sync_now().await;
  }

  // ── Sync ──────────────────────────────────────────────────────────────────

  /// Run a sync cycle. A call arriving while a cycle is running is coalesced
  /// into exactly one follow-up cycle. Never fails: remote and store
  /// problems degrade to a no-op cycle.
  pub async fn sync_now(&self) {
    {
      let mut sync = self.lock_sync();
      if sync.phase == SyncPhase::Syncing {
        sync.rerun = true;
        return;
      }
      sync.phase = SyncPhase::Syncing;
    }

    loop {
      self.run_cycle().await;

      let run_again = {
        let mut sync = self.lock_sync();
        if sync.rerun {
          sync.rerun = false;
          true
        } else {
          sync.phase = SyncPhase::Idle;
          false
        }
      };
      if !run_again {
        break;
      }
    }
  }

  async fn run_cycle(&self) {
    // Local-only mode: nothing to reconcile without an owner.
    let owner = self.lock_cache().owner;
    let Some(owner) = owner else { return };

    // Push: flush this owner's outbox items, drop the confirmed ones.
    let outbox = match self.inner.store.load_outbox().await {
      Ok(items) => items,
      Err(e) => {
        tracing::warn!("loading outbox failed, pushing nothing: {e}");
        Vec::new()
      }
    };
    // Items stamped for another owner stay queued for that owner's session;
    // unstamped items (queued before sign-in) are pushed and owner-filled by
    // the remote client.
    let to_push: Vec<OutboxItem> = outbox
      .iter()
      .filter(|item| item.owner_id.is_none_or(|o| o == owner))
      .cloned()
      .collect();
    let confirmed = self.inner.remote.push(to_push, owner).await;
    if !confirmed.is_empty() {
      if let Err(e) = self.inner.store.remove_outbox(confirmed.clone()).await {
        tracing::warn!("dropping confirmed outbox items failed: {e}");
      }
    }

    // Pull the full remote snapshot for the owner.
    let snapshot = self.inner.remote.pull(owner).await;

    // Re-read the outbox so items enqueued while push/pull were in flight
    // still guard their records during merge.
    let guard_items = match self.inner.store.load_outbox().await {
      Ok(items) => items,
      Err(e) => {
        tracing::warn!("re-reading outbox failed, guarding with pre-push view: {e}");
        outbox
          .into_iter()
          .filter(|item| !confirmed.contains(&item.id))
          .collect()
      }
    };

    // Merge synchronously against the live cache.
    let outcome = {
      let mut guard = self.lock_cache();
      let cache = &mut *guard;
      let outcome =
        merge_snapshot(&cache.habits, &cache.entries, snapshot, &guard_items);
      for habit in &outcome.habits {
        cache.habits.insert(habit.id, habit.clone());
      }
      for entry in &outcome.entries {
        cache.entries.insert(entry.key(), entry.clone());
      }
      outcome
    };

    if !outcome.is_empty() {
      tracing::debug!(
        habits = outcome.habits.len(),
        entries = outcome.entries.len(),
        "merged remote records"
      );
    }
    self.persist_habits(outcome.habits).await;
    self.persist_entries(outcome.entries).await;

    // Stamp the completed cycle.
    let now = self.inner.clock.now();
    if let Err(e) = self
      .inner
      .store
      .set_meta(META_LAST_SYNC, &now.to_rfc3339())
      .await
    {
      tracing::warn!("stamping last-sync failed: {e}");
    }
    self.lock_cache().last_sync = Some(now);
  }

  // ── Read surface ──────────────────────────────────────────────────────────

  /// The derived read view: owner-scoped, tombstone-filtered habits sorted
  /// by `updated_at` descending, entries nested by date.
  pub fn read_view(&self) -> Vec<HabitView> {
    let cache = self.lock_cache();
    let active = cache.owner;

    let mut views: Vec<HabitView> = cache
      .habits
      .values()
      .filter(|h| !h.is_deleted() && in_scope(h.owner_id, active))
      .map(|h| HabitView { habit: h.clone(), entries: BTreeMap::new() })
      .collect();
    views.sort_by(|a, b| {
      b.habit
        .updated_at
        .cmp(&a.habit.updated_at)
        .then_with(|| a.habit.id.cmp(&b.habit.id))
    });

    let slots: HashMap<Uuid, usize> = views
      .iter()
      .enumerate()
      .map(|(i, v)| (v.habit.id, i))
      .collect();
    for entry in cache.entries.values() {
      if entry.is_deleted() || !in_scope(entry.owner_id, active) {
        continue;
      }
      if let Some(&i) = slots.get(&entry.habit_id) {
        views[i].entries.insert(entry.date, entry.clone());
      }
    }

    views
  }

  pub fn status(&self) -> SyncStatus {
    let is_syncing = self.lock_sync().phase == SyncPhase::Syncing;
    let last_sync = self.lock_cache().last_sync;
    SyncStatus { is_syncing, last_sync }
  }

  pub fn owner(&self) -> Option<Uuid> { self.lock_cache().owner }

  // ── Degrading store helpers ───────────────────────────────────────────────

  async fn persist_habits(&self, habits: Vec<Habit>) {
    if habits.is_empty() {
      return;
    }
    if let Err(e) = self.inner.store.upsert_habits(habits).await {
      tracing::warn!("habit write failed, continuing in memory: {e}");
    }
  }

  async fn persist_entries(&self, entries: Vec<HabitEntry>) {
    if entries.is_empty() {
      return;
    }
    if let Err(e) = self.inner.store.upsert_entries(entries).await {
      tracing::warn!("entry write failed, continuing in memory: {e}");
    }
  }

  async fn enqueue(&self, items: Vec<OutboxItem>) {
    if items.is_empty() {
      return;
    }
    if let Err(e) = self.inner.store.append_outbox(items).await {
      tracing::warn!("outbox append failed, mutation will not reach remote: {e}");
    }
  }
}
