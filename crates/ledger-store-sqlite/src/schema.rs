//! SQL schema for the habit-ledger SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Habits are soft-deleted: deleted_at is set and the row is retained so the
-- deletion propagates through merge.
CREATE TABLE IF NOT EXISTS habits (
    habit_id           TEXT PRIMARY KEY,
    owner_id           TEXT,            -- NULL until attached to an owner
    title              TEXT NOT NULL,
    kind               TEXT NOT NULL,   -- 'good' | 'bad'
    review_window_days INTEGER NOT NULL DEFAULT 7,
    sub_activities     TEXT NOT NULL DEFAULT '[]',  -- JSON [{id,label}]
    created_at         TEXT NOT NULL,   -- ISO 8601 UTC
    updated_at         TEXT NOT NULL,
    deleted_at         TEXT
);

-- One check-in per habit per calendar day; the composite key is the entry's
-- canonical identity, row_id is carried for the wire schema only.
CREATE TABLE IF NOT EXISTS entries (
    habit_id              TEXT NOT NULL,
    entry_date            TEXT NOT NULL,   -- YYYY-MM-DD
    row_id                TEXT NOT NULL,
    owner_id              TEXT,
    status                TEXT,            -- 'success' | 'fail' | NULL
    sub_activity_statuses TEXT NOT NULL DEFAULT '{}',  -- JSON {id: bool}
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL,
    deleted_at            TEXT,
    PRIMARY KEY (habit_id, entry_date)
);

-- Unconfirmed local mutations, drained only after remote acceptance.
-- seq preserves append order for retries.
CREATE TABLE IF NOT EXISTS outbox (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id    TEXT NOT NULL UNIQUE,
    entity     TEXT NOT NULL,   -- discriminant of OutboxPayload variant
    action     TEXT NOT NULL,   -- 'upsert' | 'delete'
    created_at TEXT NOT NULL,
    owner_id   TEXT,
    payload    TEXT NOT NULL    -- JSON entity snapshot (inner record only)
);

CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS habits_updated_idx ON habits(updated_at);
CREATE INDEX IF NOT EXISTS entries_habit_idx  ON entries(habit_id);

PRAGMA user_version = 1;
";
