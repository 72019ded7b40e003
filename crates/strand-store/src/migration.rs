//! Schema migration system.
//!
//! Migrations are stored as static SQL strings keyed by version number.
//! The current version is tracked in a `_migrations` table so migrations
//! are idempotent and only run once.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL to execute.  May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order.  Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "initial schema — conversations and messages",
    sql: r#"
        CREATE TABLE conversations (
            id         TEXT PRIMARY KEY,
            model      TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            role            TEXT NOT NULL CHECK(role IN ('system','user','assistant','tool')),
            content         TEXT,
            tool_calls      TEXT,
            tool_call_id    TEXT,
            created_at      INTEGER NOT NULL
        );
        CREATE INDEX idx_messages_conversation ON messages(conversation_id, id);
    "#,
}];

/// Run all migrations that have not been applied yet.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        debug!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| StoreError::Migration {
                version: migration.version,
                message: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description,
                chrono::Utc::now().timestamp()
            ],
        )?;

        info!(version = migration.version, "migration applied");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_strictly_increasing() {
        let mut last = 0;
        for migration in MIGRATIONS {
            assert!(migration.version > last, "non-increasing migration version");
            last = migration.version;
        }
    }

    #[test]
    fn applies_cleanly_to_a_fresh_connection() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let applied: u32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.last().unwrap().version);

        // Second run is a no-op.
        run_all(&conn).unwrap();
    }
}
