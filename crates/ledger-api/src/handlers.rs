//! Handlers for the command surface and read view.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/api/habits` | Read view + sync status |
//! | `POST`   | `/api/habits` | 400 on validation failure |
//! | `DELETE` | `/api/habits/{id}` | Tombstone + cascade |
//! | `PUT`    | `/api/habits/{id}/entries/{date}` | Body: `{"status":"success"}` |
//! | `DELETE` | `/api/habits/{id}/entries/{date}` | Clear the day |
//! | `PUT`    | `/api/habits/{id}/entries/{date}/activities/{activity_id}` | Body: `{"done":true}` |
//! | `POST`   | `/api/sync` | Fire-and-forget, 202 |
//! | `GET`    | `/api/status` | `{is_syncing, last_sync}` |
//!
//! Commands addressing unknown records are no-ops (204), matching the
//! fire-and-forget command surface of the engine.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use ledger_core::{
  clock::Clock,
  entry::EntryStatus,
  habit::{Habit, HabitKind},
  remote::RemoteStore,
  stats::HabitView,
  store::LocalStore,
};
use ledger_engine::SyncStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── Read view ────────────────────────────────────────────────────────────────

/// The full read surface: owner-scoped habit list plus sync status.
#[derive(Debug, Serialize)]
pub struct ReadView {
  pub habits:     Vec<HabitView>,
  pub is_syncing: bool,
  pub last_sync:  Option<DateTime<Utc>>,
}

/// `GET /api/habits`
pub async fn list_habits<S, R, C>(
  State(state): State<AppState<S, R, C>>,
  _auth: Authenticated,
) -> Json<ReadView>
where
  S: LocalStore + 'static,
  R: RemoteStore + 'static,
  C: Clock + 'static,
{
  let habits = state.service.read_view();
  let status = state.service.status();
  Json(ReadView {
    habits,
    is_syncing: status.is_syncing,
    last_sync: status.last_sync,
  })
}

/// `GET /api/status`
pub async fn status<S, R, C>(
  State(state): State<AppState<S, R, C>>,
  _auth: Authenticated,
) -> Json<SyncStatus>
where
  S: LocalStore + 'static,
  R: RemoteStore + 'static,
  C: Clock + 'static,
{
  Json(state.service.status())
}

// ─── Habit commands ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddHabitBody {
  pub title: String,
  pub kind:  HabitKind,
  #[serde(default = "default_review_window")]
  pub review_window_days: u8,
  #[serde(default)]
  pub sub_activities: Vec<String>,
}

fn default_review_window() -> u8 { 7 }

/// `POST /api/habits`
pub async fn add_habit<S, R, C>(
  State(state): State<AppState<S, R, C>>,
  _auth: Authenticated,
  Json(body): Json<AddHabitBody>,
) -> Result<(StatusCode, Json<Habit>), ApiError>
where
  S: LocalStore + 'static,
  R: RemoteStore + 'static,
  C: Clock + 'static,
{
  let habit = state
    .service
    .add_habit(
      &body.title,
      body.kind,
      body.review_window_days,
      &body.sub_activities,
    )
    .await?;
  Ok((StatusCode::CREATED, Json(habit)))
}

/// `DELETE /api/habits/{id}`
pub async fn remove_habit<S, R, C>(
  State(state): State<AppState<S, R, C>>,
  _auth: Authenticated,
  Path(id): Path<Uuid>,
) -> StatusCode
where
  S: LocalStore + 'static,
  R: RemoteStore + 'static,
  C: Clock + 'static,
{
  state.service.remove_habit(id).await;
  StatusCode::NO_CONTENT
}

// ─── Entry commands ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SetStatusBody {
  pub status: EntryStatus,
}

/// `PUT /api/habits/{id}/entries/{date}`
pub async fn set_status<S, R, C>(
  State(state): State<AppState<S, R, C>>,
  _auth: Authenticated,
  Path((id, date)): Path<(Uuid, NaiveDate)>,
  Json(body): Json<SetStatusBody>,
) -> StatusCode
where
  S: LocalStore + 'static,
  R: RemoteStore + 'static,
  C: Clock + 'static,
{
  state.service.set_status(id, date, body.status).await;
  StatusCode::NO_CONTENT
}

/// `DELETE /api/habits/{id}/entries/{date}`
pub async fn clear_status<S, R, C>(
  State(state): State<AppState<S, R, C>>,
  _auth: Authenticated,
  Path((id, date)): Path<(Uuid, NaiveDate)>,
) -> StatusCode
where
  S: LocalStore + 'static,
  R: RemoteStore + 'static,
  C: Clock + 'static,
{
  state.service.clear_status(id, date).await;
  StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct SetFlagBody {
  pub done: bool,
}

/// `PUT /api/habits/{id}/entries/{date}/activities/{activity_id}`
pub async fn set_sub_activity<S, R, C>(
  State(state): State<AppState<S, R, C>>,
  _auth: Authenticated,
  Path((id, date, activity_id)): Path<(Uuid, NaiveDate, Uuid)>,
  Json(body): Json<SetFlagBody>,
) -> StatusCode
where
  S: LocalStore + 'static,
  R: RemoteStore + 'static,
  C: Clock + 'static,
{
  state
    .service
    .set_sub_activity_status(id, date, activity_id, body.done)
    .await;
  StatusCode::NO_CONTENT
}

// ─── Sync ─────────────────────────────────────────────────────────────────────

/// `POST /api/sync` — fire-and-forget; the cycle runs in the background and
/// requests arriving mid-cycle coalesce inside the engine.
pub async fn sync<S, R, C>(
  State(state): State<AppState<S, R, C>>,
  _auth: Authenticated,
) -> impl IntoResponse
where
  S: LocalStore + 'static,
  R: RemoteStore + 'static,
  C: Clock + 'static,
{
  let service = state.service.clone();
  tokio::spawn(async move { service.sync_now().await });
  StatusCode::ACCEPTED
}
