//! Engine tests against an in-memory store, a scripted remote, and a manual
//! clock.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use ledger_core::{
  Error,
  clock::Clock,
  entry::{EntryKey, EntryStatus, HabitEntry},
  habit::{Habit, HabitKind},
  outbox::OutboxItem,
  remote::{RemoteSnapshot, RemoteStore},
  store::LocalStore,
};
use uuid::Uuid;

use crate::SyncService;

// ─── In-memory local store ───────────────────────────────────────────────────

#[derive(Debug)]
struct StoreOffline;

impl std::fmt::Display for StoreOffline {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "store offline")
  }
}

impl std::error::Error for StoreOffline {}

#[derive(Default)]
struct MemState {
  habits:  Mutex<HashMap<Uuid, Habit>>,
  entries: Mutex<HashMap<EntryKey, HabitEntry>>,
  outbox:  Mutex<Vec<OutboxItem>>,
  meta:    Mutex<HashMap<String, String>>,
  offline: AtomicBool,
}

/// Cheap-clone in-memory [`LocalStore`]; clones share state so a second
/// "session" can be opened over the same store.
#[derive(Clone, Default)]
struct MemStore {
  state: Arc<MemState>,
}

impl MemStore {
  fn set_offline(&self, offline: bool) {
    self.state.offline.store(offline, Ordering::SeqCst);
  }

  fn check(&self) -> Result<(), StoreOffline> {
    if self.state.offline.load(Ordering::SeqCst) {
      Err(StoreOffline)
    } else {
      Ok(())
    }
  }

  fn outbox_len(&self) -> usize { self.state.outbox.lock().unwrap().len() }

  fn habit(&self, id: Uuid) -> Option<Habit> {
    self.state.habits.lock().unwrap().get(&id).cloned()
  }

  fn entries(&self) -> Vec<HabitEntry> {
    self.state.entries.lock().unwrap().values().cloned().collect()
  }
}

impl LocalStore for MemStore {
  type Error = StoreOffline;

  async fn load_habits(&self) -> Result<Vec<Habit>, StoreOffline> {
    self.check()?;
    Ok(self.state.habits.lock().unwrap().values().cloned().collect())
  }

  async fn load_entries(&self) -> Result<Vec<HabitEntry>, StoreOffline> {
    self.check()?;
    Ok(self.state.entries.lock().unwrap().values().cloned().collect())
  }

  async fn upsert_habits(&self, habits: Vec<Habit>) -> Result<(), StoreOffline> {
    self.check()?;
    let mut map = self.state.habits.lock().unwrap();
    for habit in habits {
      map.insert(habit.id, habit);
    }
    Ok(())
  }

  async fn upsert_entries(&self, entries: Vec<HabitEntry>) -> Result<(), StoreOffline> {
    self.check()?;
    let mut map = self.state.entries.lock().unwrap();
    for entry in entries {
      map.insert(entry.key(), entry);
    }
    Ok(())
  }

  async fn load_outbox(&self) -> Result<Vec<OutboxItem>, StoreOffline> {
    self.check()?;
    Ok(self.state.outbox.lock().unwrap().clone())
  }

  async fn append_outbox(&self, items: Vec<OutboxItem>) -> Result<(), StoreOffline> {
    self.check()?;
    self.state.outbox.lock().unwrap().extend(items);
    Ok(())
  }

  async fn remove_outbox(&self, ids: Vec<Uuid>) -> Result<(), StoreOffline> {
    self.check()?;
    self.state.outbox.lock().unwrap().retain(|item| !ids.contains(&item.id));
    Ok(())
  }

  async fn get_meta(&self, key: &str) -> Result<Option<String>, StoreOffline> {
    self.check()?;
    Ok(self.state.meta.lock().unwrap().get(key).cloned())
  }

  async fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreOffline> {
    self.check()?;
    self.state.meta.lock().unwrap().insert(key.to_owned(), value.to_owned());
    Ok(())
  }
}

// ─── Scripted remote ─────────────────────────────────────────────────────────

#[derive(Default)]
struct RemoteState {
  pushed:     Mutex<Vec<OutboxItem>>,
  snapshot:   Mutex<RemoteSnapshot>,
  reject:     AtomicBool,
  pull_count: AtomicUsize,
  pull_delay: Mutex<Option<Duration>>,
}

#[derive(Clone, Default)]
struct MockRemote {
  state: Arc<RemoteState>,
}

impl MockRemote {
  fn serve(&self, snapshot: RemoteSnapshot) {
    *self.state.snapshot.lock().unwrap() = snapshot;
  }

  fn reject_pushes(&self) {
    self.state.reject.store(true, Ordering::SeqCst);
  }

  fn delay_pulls(&self, delay: Duration) {
    *self.state.pull_delay.lock().unwrap() = Some(delay);
  }

  fn pushed(&self) -> Vec<OutboxItem> {
    self.state.pushed.lock().unwrap().clone()
  }

  fn pull_count(&self) -> usize {
    self.state.pull_count.load(Ordering::SeqCst)
  }
}

impl RemoteStore for MockRemote {
  async fn push(&self, items: Vec<OutboxItem>, _owner: Uuid) -> Vec<Uuid> {
    let confirmed = if self.state.reject.load(Ordering::SeqCst) {
      Vec::new()
    } else {
      items.iter().map(|item| item.id).collect()
    };
    self.state.pushed.lock().unwrap().extend(items);
    confirmed
  }

  async fn pull(&self, _owner: Uuid) -> RemoteSnapshot {
    self.state.pull_count.fetch_add(1, Ordering::SeqCst);
    let delay = *self.state.pull_delay.lock().unwrap();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    self.state.snapshot.lock().unwrap().clone()
  }
}

// ─── Manual clock ────────────────────────────────────────────────────────────

#[derive(Clone)]
struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
  fn at(secs: i64) -> Self {
    Self(Arc::new(Mutex::new(Utc.timestamp_opt(secs, 0).unwrap())))
  }

  fn advance(&self, secs: i64) {
    *self.0.lock().unwrap() += chrono::Duration::seconds(secs);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> { *self.0.lock().unwrap() }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

type TestService = SyncService<MemStore, MockRemote, ManualClock>;

struct Harness {
  service: TestService,
  store:   MemStore,
  remote:  MockRemote,
  clock:   ManualClock,
}

fn harness() -> Harness {
  let store = MemStore::default();
  let remote = MockRemote::default();
  let clock = ManualClock::at(1_000);
  let service = SyncService::new(store.clone(), remote.clone(), clock.clone());
  Harness { service, store, remote, clock }
}

fn day(s: &str) -> chrono::NaiveDate { s.parse().unwrap() }

async fn add_simple(service: &TestService, title: &str) -> Habit {
  service
    .add_habit(title, HabitKind::Good, 7, &[])
    .await
    .expect("valid habit")
}

// ─── Commands ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_habit_rejects_bad_input_before_mutation() {
  let h = harness();

  let empty = h.service.add_habit("   ", HabitKind::Good, 7, &[]).await;
  assert!(matches!(empty, Err(Error::EmptyTitle)));

  let wide = h.service.add_habit("Read", HabitKind::Good, 91, &[]).await;
  assert!(matches!(wide, Err(Error::ReviewWindowOutOfRange(91))));

  assert!(h.service.read_view().is_empty());
  assert_eq!(h.store.outbox_len(), 0);
}

#[tokio::test]
async fn add_habit_persists_and_enqueues_exactly_one_item() {
  let h = harness();
  let habit = add_simple(&h.service, "Drink water").await;

  assert_eq!(h.service.read_view().len(), 1);
  assert_eq!(h.store.habit(habit.id).unwrap().title, "Drink water");
  assert_eq!(h.store.outbox_len(), 1);
}

#[tokio::test]
async fn set_status_writes_entry_and_bumps_habit_in_one_step() {
  let h = harness();
  let habit = add_simple(&h.service, "Drink water").await;
  let created_at = habit.updated_at;

  h.clock.advance(60);
  h.service
    .set_status(habit.id, day("2024-03-01"), EntryStatus::Success)
    .await;

  let view = h.service.read_view();
  let entry = &view[0].entries[&day("2024-03-01")];
  assert_eq!(entry.status, Some(EntryStatus::Success));
  assert!(view[0].habit.updated_at > created_at);

  // One item for the habit creation, then one per record of the edit.
  assert_eq!(h.store.outbox_len(), 3);
}

#[tokio::test]
async fn entry_commands_on_unknown_habit_are_noops() {
  let h = harness();
  h.service
    .set_status(Uuid::new_v4(), day("2024-03-01"), EntryStatus::Fail)
    .await;
  h.service.clear_status(Uuid::new_v4(), day("2024-03-01")).await;
  h.service.remove_habit(Uuid::new_v4()).await;

  assert_eq!(h.store.outbox_len(), 0);
}

#[tokio::test]
async fn sub_activity_flags_drive_effective_status() {
  let h = harness();
  let labels = vec!["Stretch".to_owned(), "Hydrate".to_owned()];
  let habit = h
    .service
    .add_habit("Morning routine", HabitKind::Good, 7, &labels)
    .await
    .unwrap();
  let d = day("2024-03-01");
  let ids: Vec<Uuid> = habit.sub_activities.iter().map(|a| a.id).collect();

  h.service.set_sub_activity_status(habit.id, d, ids[0], true).await;
  assert_eq!(
    h.service.read_view()[0].effective_status(d),
    Some(EntryStatus::Fail)
  );

  h.service.set_sub_activity_status(habit.id, d, ids[1], true).await;
  assert_eq!(
    h.service.read_view()[0].effective_status(d),
    Some(EntryStatus::Success)
  );

  // Unknown sub-activity id does nothing.
  let before = h.store.outbox_len();
  h.service
    .set_sub_activity_status(habit.id, d, Uuid::new_v4(), true)
    .await;
  assert_eq!(h.store.outbox_len(), before);
}

#[tokio::test]
async fn clear_status_tombstones_entry_but_keeps_it_stored() {
  let h = harness();
  let habit = add_simple(&h.service, "Drink water").await;
  let d = day("2024-03-01");

  h.service.set_status(habit.id, d, EntryStatus::Success).await;
  h.clock.advance(60);
  h.service.clear_status(habit.id, d).await;

  let view = h.service.read_view();
  assert!(view[0].entries.is_empty());

  let stored = h.store.entries();
  assert_eq!(stored.len(), 1);
  assert!(stored[0].deleted_at.is_some());

  // Clearing an already-clear day is a no-op.
  let before = h.store.outbox_len();
  h.service.clear_status(habit.id, d).await;
  assert_eq!(h.store.outbox_len(), before);
}

#[tokio::test]
async fn remove_habit_cascades_tombstone_to_entries() {
  let h = harness();
  let habit = add_simple(&h.service, "Drink water").await;
  h.service.set_status(habit.id, day("2024-03-01"), EntryStatus::Success).await;
  h.service.set_status(habit.id, day("2024-03-02"), EntryStatus::Fail).await;

  h.clock.advance(60);
  h.service.remove_habit(habit.id).await;

  assert!(h.service.read_view().is_empty());
  assert!(h.store.habit(habit.id).unwrap().deleted_at.is_some());
  assert!(h.store.entries().iter().all(|e| e.deleted_at.is_some()));

  // Removing again is a no-op.
  let before = h.store.outbox_len();
  h.service.remove_habit(habit.id).await;
  assert_eq!(h.store.outbox_len(), before);
}

// ─── Sync ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_without_owner_is_local_only_noop() {
  let h = harness();
  add_simple(&h.service, "Drink water").await;

  h.service.sync_now().await;

  assert_eq!(h.remote.pull_count(), 0);
  assert_eq!(h.store.outbox_len(), 1);
  assert_eq!(h.service.status().last_sync, None);
}

#[tokio::test]
async fn attach_owner_restamps_records_and_drains_outbox() {
  let h = harness();
  let owner = Uuid::new_v4();
  let habit = add_simple(&h.service, "Drink water").await;
  h.service.set_status(habit.id, day("2024-03-01"), EntryStatus::Success).await;
  assert_eq!(h.store.outbox_len(), 3);

  h.clock.advance(60);
  h.service.attach_owner(owner).await;

  // Everything re-stamped with the owner.
  assert_eq!(h.store.habit(habit.id).unwrap().owner_id, Some(owner));
  assert!(h.store.entries().iter().all(|e| e.owner_id == Some(owner)));

  // Push + pull completed: outbox empty, stamp recorded.
  assert_eq!(h.store.outbox_len(), 0);
  assert!(h.service.status().last_sync.is_some());
  assert!(!h.remote.pushed().is_empty());

  // The authenticated view still shows the data.
  assert_eq!(h.service.read_view().len(), 1);
}

#[tokio::test]
async fn attach_owner_twice_restamps_nothing_new() {
  let h = harness();
  let owner = Uuid::new_v4();
  add_simple(&h.service, "Drink water").await;

  h.service.attach_owner(owner).await;
  let pushed_once = h.remote.pushed().len();

  h.service.attach_owner(owner).await;
  assert_eq!(h.store.outbox_len(), 0);
  assert_eq!(h.remote.pushed().len(), pushed_once);
}

#[tokio::test]
async fn lww_prefers_strictly_newer_remote_records() {
  let h = harness();
  let owner = Uuid::new_v4();
  h.service.attach_owner(owner).await;

  let habit = add_simple(&h.service, "Walk").await;
  h.service.sync_now().await;
  assert_eq!(h.store.outbox_len(), 0);

  // An older remote copy loses.
  let mut stale = h.store.habit(habit.id).unwrap();
  stale.title = "Stale".to_owned();
  stale.updated_at -= chrono::Duration::seconds(10);
  h.remote.serve(RemoteSnapshot { habits: vec![stale], entries: vec![] });
  h.service.sync_now().await;
  assert_eq!(h.service.read_view()[0].habit.title, "Walk");

  // A strictly newer remote copy wins, whole-record.
  let mut fresh = h.store.habit(habit.id).unwrap();
  fresh.title = "Walk daily".to_owned();
  fresh.updated_at += chrono::Duration::seconds(10);
  h.remote.serve(RemoteSnapshot { habits: vec![fresh], entries: vec![] });
  h.service.sync_now().await;
  assert_eq!(h.service.read_view()[0].habit.title, "Walk daily");
}

#[tokio::test]
async fn unconfirmed_outbox_item_shields_local_record() {
  let h = harness();
  let owner = Uuid::new_v4();
  h.service.attach_owner(owner).await;
  h.remote.reject_pushes();

  let habit = add_simple(&h.service, "Walk").await;

  let mut remote_copy = habit.clone();
  remote_copy.owner_id = Some(owner);
  remote_copy.title = "Clobbered".to_owned();
  remote_copy.updated_at += chrono::Duration::seconds(600);
  h.remote.serve(RemoteSnapshot { habits: vec![remote_copy], entries: vec![] });

  h.service.sync_now().await;

  // The push was rejected, so the item still guards the record.
  assert!(h.store.outbox_len() > 0);
  assert_eq!(h.service.read_view()[0].habit.title, "Walk");
}

#[tokio::test]
async fn pull_merges_records_created_on_another_device() {
  let h = harness();
  let owner = Uuid::new_v4();
  h.service.attach_owner(owner).await;

  let now = h.clock.now();
  let mut habit = Habit::new("From device B", HabitKind::Bad, 7, &[], now);
  habit.owner_id = Some(owner);
  let mut entry = HabitEntry::new(
    habit.id,
    day("2024-03-01"),
    Some(EntryStatus::Success),
    now,
  );
  entry.owner_id = Some(owner);
  h.remote.serve(RemoteSnapshot {
    habits:  vec![habit.clone()],
    entries: vec![entry],
  });

  h.service.sync_now().await;

  let view = h.service.read_view();
  assert_eq!(view.len(), 1);
  assert_eq!(view[0].habit.id, habit.id);
  assert_eq!(
    view[0].effective_status(day("2024-03-01")),
    Some(EntryStatus::Success)
  );
  // The merged records are durable, not cache-only.
  assert!(h.store.habit(habit.id).is_some());
}

#[tokio::test]
async fn remote_tombstone_hides_local_record() {
  let h = harness();
  let owner = Uuid::new_v4();
  h.service.attach_owner(owner).await;
  let habit = add_simple(&h.service, "Walk").await;
  h.service.sync_now().await;

  let mut deleted = h.store.habit(habit.id).unwrap();
  deleted.updated_at += chrono::Duration::seconds(10);
  deleted.deleted_at = Some(deleted.updated_at);
  h.remote.serve(RemoteSnapshot { habits: vec![deleted], entries: vec![] });

  h.service.sync_now().await;

  assert!(h.service.read_view().is_empty());
  assert!(h.store.habit(habit.id).unwrap().deleted_at.is_some());
}

#[tokio::test]
async fn sync_requested_mid_cycle_runs_exactly_one_more() {
  let h = harness();
  let owner = Uuid::new_v4();
  h.service.attach_owner(owner).await;
  assert_eq!(h.remote.pull_count(), 1);

  h.remote.delay_pulls(Duration::from_millis(100));
  let background = tokio::spawn({
    let service = h.service.clone();
    async move { service.sync_now().await }
  });
  tokio::time::sleep(Duration::from_millis(20)).await;
  assert!(h.service.status().is_syncing);

  // Two requests while the cycle runs coalesce into a single follow-up.
  h.service.sync_now().await;
  h.service.sync_now().await;
  background.await.unwrap();

  assert!(!h.service.status().is_syncing);
  assert_eq!(h.remote.pull_count(), 3);
}

// ─── Degradation & scoping ───────────────────────────────────────────────────

#[tokio::test]
async fn offline_store_degrades_to_memory_only() {
  let h = harness();
  h.store.set_offline(true);

  let habit = add_simple(&h.service, "Drink water").await;
  h.service.set_status(habit.id, day("2024-03-01"), EntryStatus::Success).await;

  let view = h.service.read_view();
  assert_eq!(view.len(), 1);
  assert_eq!(
    view[0].effective_status(day("2024-03-01")),
    Some(EntryStatus::Success)
  );

  // Sync survives the broken store too.
  h.service.attach_owner(Uuid::new_v4()).await;
  assert!(h.service.status().last_sync.is_some());
}

#[tokio::test]
async fn read_views_never_mix_owner_scopes() {
  let h = harness();
  let owner = Uuid::new_v4();
  h.service.attach_owner(owner).await;
  add_simple(&h.service, "Owned").await;

  // A fresh unauthenticated session over the same store.
  let local = SyncService::new(
    h.store.clone(),
    MockRemote::default(),
    ManualClock::at(5_000),
  );
  local.hydrate().await;
  assert!(local.read_view().is_empty());

  add_simple(&local, "Local only").await;
  let unscoped = local.read_view();
  assert_eq!(unscoped.len(), 1);
  assert_eq!(unscoped[0].habit.owner_id, None);

  // The authenticated session does not see the unscoped record.
  h.service.hydrate().await;
  let owned = h.service.read_view();
  assert_eq!(owned.len(), 1);
  assert_eq!(owned[0].habit.title, "Owned");
  assert!(owned.iter().all(|v| v.habit.owner_id == Some(owner)));
}

#[tokio::test]
async fn read_view_sorts_by_updated_at_descending() {
  let h = harness();
  let first = add_simple(&h.service, "First").await;
  h.clock.advance(60);
  add_simple(&h.service, "Second").await;
  h.clock.advance(60);

  let view = h.service.read_view();
  assert_eq!(view[0].habit.title, "Second");
  assert_eq!(view[1].habit.title, "First");

  // Touching the older habit moves it to the front.
  h.service.set_status(first.id, day("2024-03-01"), EntryStatus::Success).await;
  let view = h.service.read_view();
  assert_eq!(view[0].habit.title, "First");
}
