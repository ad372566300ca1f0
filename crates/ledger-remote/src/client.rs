//! [`HttpRemote`] — reqwest-backed implementation of [`RemoteStore`].

use std::time::Duration;

use ledger_core::{
  outbox::{OutboxItem, OutboxPayload},
  remote::{RemoteSnapshot, RemoteStore},
};
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  rows::{EntryRow, HabitRow},
};

/// Connection settings for the remote store service.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  pub base_url: String,
  pub api_key:  String,
}

/// Async HTTP client for the remote habit store.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based. A client
/// constructed without configuration is inert: push confirms nothing and
/// pull returns an empty snapshot.
#[derive(Clone)]
pub struct HttpRemote {
  client: Client,
  config: Option<RemoteConfig>,
}

impl HttpRemote {
  pub fn new(config: RemoteConfig) -> Result<Self> {
    Ok(Self {
      client: Self::build_client()?,
      config: Some(config),
    })
  }

  /// A client with no backing service — local-only mode.
  pub fn disabled() -> Self {
    Self {
      client: Client::new(),
      config: None,
    }
  }

  fn build_client() -> Result<Client> {
    Ok(
      Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?,
    )
  }

  fn url(&self, config: &RemoteConfig, table: &str) -> String {
    format!("{}/rest/v1/{table}", config.base_url.trim_end_matches('/'))
  }

  fn authed(
    &self,
    config: &RemoteConfig,
    req: reqwest::RequestBuilder,
  ) -> reqwest::RequestBuilder {
    req
      .header("apikey", &config.api_key)
      .bearer_auth(&config.api_key)
  }

  // ── Push ──────────────────────────────────────────────────────────────────

  /// `POST /rest/v1/habits?on_conflict=id`
  async fn upsert_habit(&self, config: &RemoteConfig, row: HabitRow) -> Result<()> {
    let resp = self
      .authed(config, self.client.post(self.url(config, "habits")))
      .query(&[("on_conflict", "id")])
      .header("prefer", "resolution=merge-duplicates")
      .json(&[row])
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(Error::Status("POST /habits", resp.status()));
    }
    Ok(())
  }

  /// `POST /rest/v1/habit_entries?on_conflict=habit_id,entry_date`
  async fn upsert_entry(&self, config: &RemoteConfig, row: EntryRow) -> Result<()> {
    let resp = self
      .authed(config, self.client.post(self.url(config, "habit_entries")))
      .query(&[("on_conflict", "habit_id,entry_date")])
      .header("prefer", "resolution=merge-duplicates")
      .json(&[row])
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(Error::Status("POST /habit_entries", resp.status()));
    }
    Ok(())
  }

  // ── Pull ──────────────────────────────────────────────────────────────────

  /// `GET /rest/v1/habits?select=*&user_id=eq.<owner>`
  async fn fetch_habits(
    &self,
    config: &RemoteConfig,
    owner: Uuid,
  ) -> Result<Vec<HabitRow>> {
    let resp = self
      .authed(config, self.client.get(self.url(config, "habits")))
      .query(&[("select", "*".to_owned()), ("user_id", format!("eq.{owner}"))])
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(Error::Status("GET /habits", resp.status()));
    }
    Ok(resp.json().await?)
  }

  /// `GET /rest/v1/habit_entries?select=*&user_id=eq.<owner>`
  async fn fetch_entries(
    &self,
    config: &RemoteConfig,
    owner: Uuid,
  ) -> Result<Vec<EntryRow>> {
    let resp = self
      .authed(config, self.client.get(self.url(config, "habit_entries")))
      .query(&[("select", "*".to_owned()), ("user_id", format!("eq.{owner}"))])
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(Error::Status("GET /habit_entries", resp.status()));
    }
    Ok(resp.json().await?)
  }
}

// ─── RemoteStore impl ────────────────────────────────────────────────────────

impl RemoteStore for HttpRemote {
  async fn push(&self, items: Vec<OutboxItem>, owner: Uuid) -> Vec<Uuid> {
    let Some(config) = &self.config else {
      return Vec::new();
    };

    // Delete actions push the tombstoned snapshot; there is no remote hard
    // delete.
    let mut confirmed = Vec::with_capacity(items.len());
    for item in items {
      let result = match &item.payload {
        OutboxPayload::Habit(habit) => {
          self.upsert_habit(config, HabitRow::from_habit(habit, owner)).await
        }
        OutboxPayload::Entry(entry) => {
          self.upsert_entry(config, EntryRow::from_entry(entry, owner)).await
        }
      };

      match result {
        Ok(()) => confirmed.push(item.id),
        Err(e) => {
          tracing::warn!(item = %item.id, "push not accepted, will retry next cycle: {e}");
        }
      }
    }
    confirmed
  }

  async fn pull(&self, owner: Uuid) -> RemoteSnapshot {
    let Some(config) = &self.config else {
      return RemoteSnapshot::default();
    };

    let (habits, entries) = tokio::join!(
      self.fetch_habits(config, owner),
      self.fetch_entries(config, owner),
    );

    match (habits, entries) {
      (Ok(habits), Ok(entries)) => RemoteSnapshot {
        habits:  habits.into_iter().map(HabitRow::into_habit).collect(),
        entries: entries.into_iter().map(EntryRow::into_entry).collect(),
      },
      (Err(e), _) | (_, Err(e)) => {
        tracing::warn!("pull failed, treating as no remote changes: {e}");
        RemoteSnapshot::default()
      }
    }
  }
}
