//! JSON HTTP API for the habit-ledger sync engine.
//!
//! Exposes an axum [`Router`] over a [`SyncService`]: the command surface and
//! the derived read view described in the engine crate. Rendering, theming,
//! and auth UI flows live in external clients; requests authenticate with
//! HTTP Basic against an argon2 hash.

pub mod auth;
pub mod error;
pub mod handlers;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use ledger_core::{clock::Clock, remote::RemoteStore, store::LocalStore};
use ledger_engine::SyncService;
use ledger_remote::RemoteConfig;
use serde::Deserialize;
use uuid::Uuid;

use auth::AuthConfig;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `LEDGER_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
  /// The account owning this device's records. Absent in local-only mode;
  /// set once sign-in has succeeded (auth UI flows are external).
  pub owner_id:           Option<Uuid>,
  /// Backing service connection; absent disables push/pull entirely.
  pub remote:             Option<RemoteConfig>,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, R, C> {
  pub service: SyncService<S, R, C>,
  pub auth:    Arc<AuthConfig>,
}

impl<S, R, C> Clone for AppState<S, R, C> {
  fn clone(&self) -> Self {
    Self {
      service: self.service.clone(),
      auth:    Arc::clone(&self.auth),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build an axum [`Router`] for the engine API.
pub fn router<S, R, C>(state: AppState<S, R, C>) -> Router
where
  S: LocalStore + 'static,
  R: RemoteStore + 'static,
  C: Clock + 'static,
{
  Router::new()
    .route(
      "/api/habits",
      get(handlers::list_habits::<S, R, C>).post(handlers::add_habit::<S, R, C>),
    )
    .route("/api/habits/{id}", delete(handlers::remove_habit::<S, R, C>))
    .route(
      "/api/habits/{id}/entries/{date}",
      put(handlers::set_status::<S, R, C>)
        .delete(handlers::clear_status::<S, R, C>),
    )
    .route(
      "/api/habits/{id}/entries/{date}/activities/{activity_id}",
      put(handlers::set_sub_activity::<S, R, C>),
    )
    .route("/api/sync", post(handlers::sync::<S, R, C>))
    .route("/api/status", get(handlers::status::<S, R, C>))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
