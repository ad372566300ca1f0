//! Clock abstraction.
//!
//! The engine stamps every mutation with `Clock::now`, so injecting a manual
//! clock makes merge and streak behaviour fully deterministic in tests.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}
