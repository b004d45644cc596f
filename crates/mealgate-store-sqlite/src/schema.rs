//! SQL schema for the Mealgate SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS diners (
    diner_id           INTEGER PRIMARY KEY AUTOINCREMENT,
    identification     TEXT NOT NULL,          -- as entered or imported
    identification_key TEXT NOT NULL UNIQUE,   -- hyphens and quotes stripped
    name               TEXT NOT NULL,
    area               TEXT,
    cost_center        TEXT,
    note               TEXT,
    active             INTEGER NOT NULL DEFAULT 1,
    registered_from    TEXT,
    registered_until   TEXT,
    alert_enabled      INTEGER NOT NULL DEFAULT 0,
    alert_mail_subject TEXT,
    alert_mail_to      TEXT,
    alert_mail_from    TEXT,
    alert_mail_cc      TEXT
);

-- Configured meal windows; matched in shift_id order.
CREATE TABLE IF NOT EXISTS shifts (
    shift_id             INTEGER PRIMARY KEY,
    starts               TEXT NOT NULL,
    ends                 TEXT NOT NULL,
    label                TEXT NOT NULL,
    accept_chime_repeats INTEGER,
    reject_chime_repeats INTEGER
);

CREATE TABLE IF NOT EXISTS dispatches (
    dispatch_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    diner_id       INTEGER NOT NULL REFERENCES diners(diner_id),
    shift_id       INTEGER NOT NULL REFERENCES shifts(shift_id),
    registered_at  TEXT NOT NULL,               -- local wall-clock, ISO 8601
    dispatch_date  TEXT NOT NULL,               -- date part of registered_at
    identification TEXT NOT NULL,
    quantity       INTEGER NOT NULL,
    unit_cost      REAL NOT NULL,
    active         INTEGER NOT NULL DEFAULT 1,
    dispatched     INTEGER NOT NULL DEFAULT 0,
    handed_out_at  TEXT,
    origin         TEXT NOT NULL                -- 'administration' | 'verification'
);

-- At most one active dispatch per diner, shift and calendar day.
CREATE UNIQUE INDEX IF NOT EXISTS dispatches_active_key
    ON dispatches(diner_id, shift_id, dispatch_date) WHERE active = 1;
CREATE INDEX IF NOT EXISTS dispatches_pending_idx
    ON dispatches(dispatched, active);

-- Read-only reference rosters mirrored from the reservations and payroll
-- systems.
CREATE TABLE IF NOT EXISTS reservation_roster (
    identification TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    area           TEXT,
    cost_center    TEXT,
    note           TEXT
);

CREATE TABLE IF NOT EXISTS payroll_roster (
    identification TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    area           TEXT,
    cost_center    TEXT,
    note           TEXT
);

PRAGMA user_version = 1;
";
