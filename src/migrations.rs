//! Versioned schema setup for the schedule database.
//!
//! SQL files under `src/migrations/` are compiled into the binary and applied
//! in version order the first time a database is opened at that version. The
//! `schema_version` table records what has already run, so re-opening an
//! up-to-date database is a no-op.

use rusqlite::Connection;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/001_baseline.sql"),
}];

fn ensure_schema_version_table(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("schema_version table could not be created: {}", e))
}

/// Highest version already applied; 0 for a fresh database.
fn current_version(conn: &Connection) -> Result<i32, String> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| format!("schema version unreadable: {}", e))
}

/// Apply every migration newer than the recorded version. Each migration and
/// its version bump commit together or not at all.
pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    ensure_schema_version_table(conn)?;
    let applied = current_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| format!("migration transaction would not start: {}", e))?;

        let result = conn
            .execute_batch(migration.sql)
            .map_err(|e| format!("migration {} failed: {}", migration.version, e))
            .and_then(|_| {
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    [migration.version],
                )
                .map_err(|e| {
                    format!(
                        "migration {} applied but not recorded: {}",
                        migration.version, e
                    )
                })
            });

        match result {
            Ok(_) => {
                conn.execute_batch("COMMIT")
                    .map_err(|e| format!("migration commit failed: {}", e))?;
                log::info!("schedule db migrated to v{}", migration.version);
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply_and_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 1);

        // Second run is a no-op.
        run_migrations(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 1);

        // Both tables exist.
        for table in ["flairs", "schedules"] {
            let exists = conn
                .prepare(&format!("SELECT 1 FROM {} LIMIT 1", table))
                .is_ok();
            assert!(exists, "table {} missing", table);
        }
    }
}
