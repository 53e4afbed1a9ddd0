//! SQLite persistence for flairs and schedules.
//!
//! One database file holds both stores. Schedule items are stored as a JSON
//! array in the `schedules.items` column; the row carries identity and
//! timestamps. `owner_id` is UNIQUE on `schedules`, and all schedule writes
//! go through [`ScheduleDb::upsert_schedule`], so two concurrent requests for
//! the same owner can never produce duplicate schedules.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::types::{Flair, Schedule, ScheduleItem};

pub mod types;
pub use types::*;

pub struct ScheduleDb {
    conn: Connection,
}

impl ScheduleDb {
    /// Open (or create) a database at the given path and apply the schema.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// In-memory database, for tests and ephemeral use.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;
        Ok(Self { conn })
    }

    // -----------------------------------------------------------------------
    // Flairs
    // -----------------------------------------------------------------------

    pub fn create_flair(
        &self,
        owner_id: &str,
        name: &str,
        description: &str,
        color: &str,
    ) -> Result<Flair, DbError> {
        let flair = Flair {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            color: color.to_string(),
        };
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO flairs (id, owner_id, name, description, color, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                flair.id,
                flair.owner_id,
                flair.name,
                flair.description,
                flair.color,
                now
            ],
        )?;
        Ok(flair)
    }

    pub fn update_flair(
        &self,
        id: &str,
        name: &str,
        description: &str,
        color: &str,
    ) -> Result<Flair, DbError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE flairs SET name = ?2, description = ?3, color = ?4, updated_at = ?5
             WHERE id = ?1",
            params![id, name, description, color, now],
        )?;
        if changed == 0 {
            return Err(DbError::FlairNotFound(id.to_string()));
        }
        self.get_flair(id)?
            .ok_or_else(|| DbError::FlairNotFound(id.to_string()))
    }

    pub fn get_flair(&self, id: &str) -> Result<Option<Flair>, DbError> {
        let flair = self
            .conn
            .query_row(
                "SELECT id, owner_id, name, description, color FROM flairs WHERE id = ?1",
                params![id],
                Self::flair_from_row,
            )
            .optional()?;
        Ok(flair)
    }

    pub fn list_flairs_by_owner(&self, owner_id: &str) -> Result<Vec<Flair>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, name, description, color FROM flairs
             WHERE owner_id = ?1 ORDER BY name",
        )?;
        let flairs = stmt
            .query_map(params![owner_id], Self::flair_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(flairs)
    }

    fn flair_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Flair> {
        Ok(Flair {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            color: row.get(4)?,
        })
    }

    // -----------------------------------------------------------------------
    // Schedules
    // -----------------------------------------------------------------------

    /// The owner's schedule, or None when nothing was generated yet.
    pub fn find_schedule_by_owner(&self, owner_id: &str) -> Result<Option<Schedule>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, owner_id, items, created_at, updated_at
                 FROM schedules WHERE owner_id = ?1",
                params![owner_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((id, owner_id, items_json, created_at, updated_at)) => {
                let items: Vec<ScheduleItem> = serde_json::from_str(&items_json)?;
                Ok(Some(Schedule {
                    id,
                    owner_id,
                    items,
                    created_at: parse_timestamp(&created_at)?,
                    updated_at: parse_timestamp(&updated_at)?,
                }))
            }
        }
    }

    /// Atomic create-or-replace of the owner's schedule.
    ///
    /// On first write a new schedule row is created; on every later write the
    /// row's items and updated_at change while id and created_at are kept.
    pub fn upsert_schedule(
        &self,
        owner_id: &str,
        items: &[ScheduleItem],
    ) -> Result<Schedule, DbError> {
        let items_json = serde_json::to_string(items)?;
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO schedules (id, owner_id, items, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(owner_id) DO UPDATE SET
                 items = excluded.items,
                 updated_at = excluded.updated_at",
            params![Uuid::new_v4().to_string(), owner_id, items_json, now],
        )?;

        // The row is guaranteed to exist after the statement above.
        self.find_schedule_by_owner(owner_id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.to_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskDuration;
    use chrono::TimeZone;

    fn item(title: &str, hour: u32) -> ScheduleItem {
        ScheduleItem {
            title: title.to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 7, 25, hour, 0, 0).unwrap(),
            duration: TaskDuration::minutes(30),
            flair_id: None,
        }
    }

    #[test]
    fn test_open_at_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dayweave.db");
        let db = ScheduleDb::open_at(path.clone()).unwrap();
        assert!(path.exists());
        assert!(db.find_schedule_by_owner("nobody").unwrap().is_none());
    }

    #[test]
    fn test_flair_crud() {
        let db = ScheduleDb::open_in_memory().unwrap();

        let flair = db
            .create_flair("owner-1", "Gym", "Evening workout", "#22cc88")
            .unwrap();
        assert_eq!(db.get_flair(&flair.id).unwrap().unwrap().name, "Gym");

        let updated = db
            .update_flair(&flair.id, "Gym", "Morning workout", "#22cc88")
            .unwrap();
        assert_eq!(updated.description, "Morning workout");

        db.create_flair("owner-1", "Admin", "Paperwork", "#888888")
            .unwrap();
        db.create_flair("owner-2", "Other", "Not mine", "#000000")
            .unwrap();
        let mine = db.list_flairs_by_owner("owner-1").unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|f| f.owner_id == "owner-1"));
    }

    #[test]
    fn test_update_missing_flair_is_typed_error() {
        let db = ScheduleDb::open_in_memory().unwrap();
        let err = db.update_flair("ghost", "X", "Y", "#fff").unwrap_err();
        assert!(matches!(err, DbError::FlairNotFound(_)));
    }

    #[test]
    fn test_get_missing_flair_is_none_not_error() {
        let db = ScheduleDb::open_in_memory().unwrap();
        assert!(db.get_flair("ghost").unwrap().is_none());
    }

    #[test]
    fn test_upsert_creates_then_replaces() {
        let db = ScheduleDb::open_in_memory().unwrap();

        let first = db
            .upsert_schedule("owner-1", &[item("Standup", 9)])
            .unwrap();
        assert_eq!(first.items.len(), 1);

        let second = db
            .upsert_schedule("owner-1", &[item("Standup", 9), item("Review", 11)])
            .unwrap();

        // Same row: identity and created_at survive the replace.
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.items.len(), 2);

        // Still exactly one schedule for the owner.
        let count: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM schedules WHERE owner_id = 'owner-1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_items_round_trip_through_json_column() {
        let db = ScheduleDb::open_in_memory().unwrap();
        let mut tagged = item("Workout", 18);
        tagged.flair_id = Some("flair-9".to_string());

        db.upsert_schedule("owner-1", &[tagged.clone()]).unwrap();
        let loaded = db.find_schedule_by_owner("owner-1").unwrap().unwrap();

        assert_eq!(loaded.items, vec![tagged]);
    }

    #[test]
    fn test_schedules_are_isolated_per_owner() {
        let db = ScheduleDb::open_in_memory().unwrap();
        db.upsert_schedule("owner-1", &[item("A", 9)]).unwrap();
        db.upsert_schedule("owner-2", &[item("B", 10)]).unwrap();

        let one = db.find_schedule_by_owner("owner-1").unwrap().unwrap();
        let two = db.find_schedule_by_owner("owner-2").unwrap().unwrap();
        assert_ne!(one.id, two.id);
        assert_eq!(one.items[0].title, "A");
        assert_eq!(two.items[0].title, "B");
    }
}
