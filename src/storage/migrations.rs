//! Database migrations.
//!
//! Schema changes made after version 1 go here, never into `SCHEMA_SQL`
//! alone, so existing stores pick them up. Migrations are embedded as SQL
//! strings; the `schema_migrations` table tracks which have been applied.

use rusqlite::{Connection, Result};
use tracing::{info, warn};

/// A single migration with version identifier and SQL content.
// Only constructed by tests until the first post-v1 schema change lands.
#[cfg_attr(not(test), allow(dead_code))]
struct Migration {
    version: &'static str,
    sql: &'static str,
}

/// All migrations in order.
const MIGRATIONS: &[Migration] = &[];

/// Run all pending migrations on the database.
///
/// Already-applied migrations are skipped. This is idempotent and safe to
/// call on every database open.
///
/// # Errors
///
/// Returns an error if a migration fails to apply. A failure caused by an
/// object that already exists is logged and the migration marked complete.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    apply_migrations(conn, MIGRATIONS)
}

fn apply_migrations(conn: &Connection, migrations: &[Migration]) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let applied: std::collections::HashSet<String> = conn
        .prepare("SELECT version FROM schema_migrations")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for migration in migrations {
        if applied.contains(migration.version) {
            continue;
        }

        info!(version = migration.version, "Applying migration");

        if let Err(e) = conn.execute_batch(migration.sql) {
            if e.to_string().contains("already exists") {
                warn!(
                    version = migration.version,
                    "Migration objects already present, marking complete"
                );
            } else {
                return Err(e);
            }
        }

        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().timestamp_millis()],
        )?;
    }

    Ok(())
}
