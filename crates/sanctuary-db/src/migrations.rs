use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Current schema version. Increment this and add a new migration function
/// to the `MIGRATIONS` array when the schema changes.
const CURRENT_VERSION: u32 = 2;

/// Each migration is a function that takes a connection and applies changes.
/// Migrations are applied sequentially starting from the current version + 1.
type MigrationFn = fn(&Connection) -> Result<()>;

/// Ordered list of migrations. Index 0 = version 1, index 1 = version 2, etc.
const MIGRATIONS: &[MigrationFn] = &[migrate_v1, migrate_v2];

pub fn run(conn: &Connection) -> Result<()> {
    // Create the version tracking table if it doesn't exist.
    // This table always uses IF NOT EXISTS so it's safe on first run.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version     INTEGER NOT NULL,
            applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = get_current_version(conn)?;
    info!(
        "Database schema version: {} (latest: {})",
        current, CURRENT_VERSION
    );

    if current >= CURRENT_VERSION {
        return Ok(());
    }

    // Each migration + version bump is wrapped in a transaction.
    // BEGIN IMMEDIATE acquires a write lock immediately, preventing concurrent
    // writers from interleaving. On error, the entire migration is rolled back.
    for version in (current + 1)..=CURRENT_VERSION {
        let idx = (version - 1) as usize;
        info!("Applying migration v{}", version);

        conn.execute_batch("BEGIN IMMEDIATE")?;
        match MIGRATIONS[idx](conn) {
            Ok(()) => {
                conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
                conn.execute_batch("COMMIT")?;
                info!("Migration v{} applied successfully", version);
            }
            Err(e) => {
                conn.execute_batch("ROLLBACK").ok();
                return Err(anyhow::anyhow!("Migration v{} failed: {}", version, e));
            }
        }
    }

    info!("Database migrations complete (now at v{})", CURRENT_VERSION);
    Ok(())
}

fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Version 1: Initial schema — all base tables.
///
/// Timestamps are RFC 3339 UTC text written by the application so that
/// lexicographic comparison matches chronological order (the unread
/// predicate compares message timestamps against the read watermark in SQL).
/// Messages reference subscribers by phone number, not foreign key; the
/// repository enforces that linkage at the code level.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS subscribers (
            id                   TEXT PRIMARY KEY,
            phone_number         TEXT NOT NULL UNIQUE,
            is_active            INTEGER NOT NULL DEFAULT 1,
            joined_at            TEXT NOT NULL,
            last_read_at         TEXT,
            joined_via_keyword   TEXT,
            notifier_thread_ref  TEXT
        );

        CREATE TABLE IF NOT EXISTS lists (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS list_members (
            subscriber_id TEXT NOT NULL REFERENCES subscribers(id),
            list_id       TEXT NOT NULL REFERENCES lists(id),
            joined_at     TEXT NOT NULL,
            joined_via    TEXT NOT NULL,
            UNIQUE(subscriber_id, list_id)
        );

        CREATE TABLE IF NOT EXISTS keywords (
            id            TEXT PRIMARY KEY,
            keyword       TEXT NOT NULL UNIQUE,
            auto_response TEXT NOT NULL,
            is_active     INTEGER NOT NULL DEFAULT 1,
            list_id       TEXT REFERENCES lists(id),
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS broadcasts (
            id          TEXT PRIMARY KEY,
            name        TEXT,
            message     TEXT NOT NULL,
            sent_count  INTEGER NOT NULL DEFAULT 0,
            total_cost  REAL NOT NULL DEFAULT 0,
            target_all  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS broadcast_targets (
            broadcast_id TEXT NOT NULL REFERENCES broadcasts(id),
            list_id      TEXT NOT NULL REFERENCES lists(id),
            target_type  TEXT NOT NULL CHECK (target_type IN ('include', 'exclude')),
            UNIQUE(broadcast_id, list_id, target_type)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id                  TEXT PRIMARY KEY,
            phone_number        TEXT NOT NULL,
            content             TEXT NOT NULL,
            direction           TEXT NOT NULL CHECK (direction IN ('INBOUND', 'OUTBOUND')),
            created_at          TEXT NOT NULL,
            broadcast_id        TEXT REFERENCES broadcasts(id),
            provider_message_id TEXT UNIQUE,
            delivery_status     TEXT
        );

        CREATE TABLE IF NOT EXISTS links (
            id           TEXT PRIMARY KEY,
            broadcast_id TEXT NOT NULL REFERENCES broadcasts(id),
            original_url TEXT NOT NULL,
            short_code   TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS link_clicks (
            id            TEXT PRIMARY KEY,
            link_id       TEXT NOT NULL REFERENCES links(id),
            subscriber_id TEXT,
            clicked_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS app_config (
            id                                  INTEGER PRIMARY KEY CHECK (id = 1),
            default_welcome_message             TEXT NOT NULL,
            legacy_opt_in_keyword               TEXT,
            legacy_welcome_response             TEXT,
            legacy_already_subscribed_response  TEXT
        );

        -- Seed the config singleton
        INSERT OR IGNORE INTO app_config (id, default_welcome_message)
            VALUES (1, 'Welcome! You are now subscribed. Reply STOP to unsubscribe.');
        ",
    )?;
    Ok(())
}

/// Version 2: Indexes for the hot paths — conversation lookups by phone,
/// broadcast analytics, and click counting.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_messages_phone
            ON messages(phone_number, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_broadcast
            ON messages(broadcast_id);

        CREATE INDEX IF NOT EXISTS idx_list_members_list
            ON list_members(list_id);

        CREATE INDEX IF NOT EXISTS idx_link_clicks_link
            ON link_clicks(link_id);
        ",
    )?;
    Ok(())
}
