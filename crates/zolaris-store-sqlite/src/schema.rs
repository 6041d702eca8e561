//! SQL schema for the Zolaris SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS categories (
    category_id   TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    category_type TEXT NOT NULL,   -- 'user' | 'organization' | 'device-group' | other
    created_at    TEXT NOT NULL
);

-- parent_id and depth are written once, at insert time.
CREATE TABLE IF NOT EXISTS entities (
    entity_id   TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    category_id TEXT NOT NULL REFERENCES categories(category_id),
    parent_id   TEXT REFERENCES entities(entity_id),
    user_id     TEXT,
    depth       INTEGER NOT NULL CHECK (depth >= 0),
    details     TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    CHECK ((parent_id IS NULL) = (depth = 0))
);

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    first_name    TEXT,
    last_name     TEXT,
    referral_mail TEXT,
    parent_id     TEXT,            -- entity id set by a cross-link
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- device_id is the hardware id reported by the device.
CREATE TABLE IF NOT EXISTS devices (
    device_id   TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    category    TEXT,
    description TEXT,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS entities_parent_idx   ON entities(parent_id);
CREATE INDEX IF NOT EXISTS entities_user_idx     ON entities(user_id);
CREATE INDEX IF NOT EXISTS categories_type_idx   ON categories(category_type);
CREATE INDEX IF NOT EXISTS users_referral_idx    ON users(referral_mail);
CREATE INDEX IF NOT EXISTS devices_user_idx      ON devices(user_id);

PRAGMA user_version = 1;
";
