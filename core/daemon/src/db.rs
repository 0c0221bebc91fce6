//! SQLite persistence for doorstate-daemon.
//!
//! This is the single-writer store backing the daemon. The schema is
//! small: an append-only periods table and a one-row meta table holding
//! the last-update marker. Periods are never deleted; closing the door
//! only fills in the `closed` column of the latest row.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::PathBuf;

use doorstate_core::OpeningPeriod;

const LAST_UPDATE_KEY: &str = "last_update";

pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn new(path: PathBuf) -> Result<Self, String> {
        let db = Self { path };
        db.init_schema()?;
        Ok(db)
    }

    /// Latest period by opening time, if any exists yet.
    pub fn latest_period(&self) -> Result<Option<OpeningPeriod>, String> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT opened, closed FROM periods ORDER BY opened DESC, id DESC LIMIT 1",
                [],
                |row| {
                    Ok(OpeningPeriod {
                        opened: row.get(0)?,
                        closed: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|err| format!("Failed to query latest period: {}", err))
        })
    }

    /// Starts a new opening period.
    pub fn append_period(&self, opened: i64) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO periods (opened, closed) VALUES (?1, NULL)",
                params![opened],
            )
            .map_err(|err| format!("Failed to append period: {}", err))?;
            Ok(())
        })
    }

    /// Sets `closed` on the latest period.
    pub fn close_latest(&self, closed: i64) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE periods SET closed = ?1 \
                 WHERE id = (SELECT id FROM periods ORDER BY opened DESC, id DESC LIMIT 1)",
                params![closed],
            )
            .map_err(|err| format!("Failed to close latest period: {}", err))?;
            Ok(())
        })
    }

    /// Periods overlapping `[from, to]`, ascending by opening time, at
    /// most `limit` rows. Still-open periods match any range that ends
    /// after their start.
    pub fn query_periods(
        &self,
        from: i64,
        to: i64,
        limit: usize,
    ) -> Result<Vec<OpeningPeriod>, String> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT opened, closed FROM periods \
                     WHERE opened <= ?2 AND (closed IS NULL OR closed >= ?1) \
                     ORDER BY opened ASC, id ASC LIMIT ?3",
                )
                .map_err(|err| format!("Failed to prepare period query: {}", err))?;

            let rows = stmt
                .query_map(params![from, to, limit as i64], |row| {
                    Ok(OpeningPeriod {
                        opened: row.get(0)?,
                        closed: row.get(1)?,
                    })
                })
                .map_err(|err| format!("Failed to read period rows: {}", err))?;

            let mut periods = Vec::new();
            for row in rows {
                periods.push(row.map_err(|err| format!("Failed to decode period row: {}", err))?);
            }
            Ok(periods)
        })
    }

    /// Timestamp of the most recently accepted claim, 0 before the first
    /// one.
    pub fn last_update(&self) -> Result<i64, String> {
        self.with_connection(|conn| {
            let value: Option<i64> = conn
                .query_row(
                    "SELECT value FROM meta WHERE key = ?1",
                    params![LAST_UPDATE_KEY],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| format!("Failed to query last update marker: {}", err))?;
            Ok(value.unwrap_or(0))
        })
    }

    /// Records an accepted claim in the last-update marker.
    pub fn touch_last_update(&self, timestamp: i64) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![LAST_UPDATE_KEY, timestamp],
            )
            .map_err(|err| format!("Failed to touch last update marker: {}", err))?;
            Ok(())
        })
    }

    fn init_schema(&self) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS periods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    opened INTEGER NOT NULL,
                    closed INTEGER
                 );
                 CREATE INDEX IF NOT EXISTS periods_opened_idx ON periods (opened);
                 CREATE TABLE IF NOT EXISTS meta (
                    key TEXT PRIMARY KEY,
                    value INTEGER NOT NULL
                 );
                 COMMIT;",
            )
            .map_err(|err| format!("Failed to initialize schema: {}", err))?;
            Ok(())
        })
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, String>,
    ) -> Result<T, String> {
        let mut conn = self.open()?;
        op(&mut conn)
    }

    fn open(&self) -> Result<Connection, String> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("Failed to create daemon data dir: {}", err))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|err| format!("Failed to open sqlite db: {}", err))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| format!("Failed to enable WAL: {}", err))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|err| format!("Failed to set synchronous: {}", err))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|err| format!("Failed to set busy_timeout: {}", err))?;

        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn temp_db() -> (tempfile::TempDir, Db) {
        let temp = tempdir().expect("temp dir");
        let db = Db::new(temp.path().join("doorstate.db")).expect("open db");
        (temp, db)
    }

    #[test]
    fn fresh_db_has_no_periods_and_epoch_zero_marker() {
        let (_temp, db) = temp_db();
        assert_eq!(db.latest_period().expect("latest"), None);
        assert_eq!(db.last_update().expect("marker"), 0);
    }

    #[test]
    fn append_then_close_updates_the_latest_period() {
        let (_temp, db) = temp_db();
        db.append_period(100).expect("append");
        assert_eq!(
            db.latest_period().expect("latest"),
            Some(OpeningPeriod {
                opened: 100,
                closed: None,
            })
        );

        db.close_latest(200).expect("close");
        assert_eq!(
            db.latest_period().expect("latest"),
            Some(OpeningPeriod {
                opened: 100,
                closed: Some(200),
            })
        );
    }

    #[test]
    fn close_only_touches_the_newest_period() {
        let (_temp, db) = temp_db();
        db.append_period(100).expect("append");
        db.close_latest(200).expect("close");
        db.append_period(300).expect("append");
        db.close_latest(400).expect("close");

        let periods = db.query_periods(0, 1000, 10).expect("query");
        assert_eq!(
            periods,
            vec![
                OpeningPeriod {
                    opened: 100,
                    closed: Some(200),
                },
                OpeningPeriod {
                    opened: 300,
                    closed: Some(400),
                },
            ]
        );
    }

    #[test]
    fn query_uses_overlap_semantics() {
        let (_temp, db) = temp_db();
        db.append_period(100).expect("append");
        db.close_latest(200).expect("close");
        db.append_period(300).expect("append");

        // Range cutting into the first period still returns it.
        let periods = db.query_periods(150, 250, 10).expect("query");
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].opened, 100);

        // An open period matches any range ending after its start.
        let periods = db.query_periods(500, 900, 10).expect("query");
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].opened, 300);

        // A range entirely before all periods matches nothing.
        let periods = db.query_periods(0, 50, 10).expect("query");
        assert!(periods.is_empty());
    }

    #[test]
    fn query_respects_the_row_limit() {
        let (_temp, db) = temp_db();
        for i in 0..5 {
            db.append_period(100 + i * 100).expect("append");
            db.close_latest(150 + i * 100).expect("close");
        }
        let periods = db.query_periods(0, 10_000, 3).expect("query");
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0].opened, 100);
        assert_eq!(periods[2].opened, 300);
    }

    #[test]
    fn marker_upserts_in_place() {
        let (_temp, db) = temp_db();
        db.touch_last_update(100).expect("touch");
        assert_eq!(db.last_update().expect("marker"), 100);
        db.touch_last_update(250).expect("touch");
        assert_eq!(db.last_update().expect("marker"), 250);
    }

    #[test]
    fn state_survives_reopening() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("doorstate.db");
        {
            let db = Db::new(path.clone()).expect("open db");
            db.append_period(100).expect("append");
            db.touch_last_update(100).expect("touch");
        }
        let db = Db::new(path).expect("reopen db");
        assert_eq!(
            db.latest_period().expect("latest"),
            Some(OpeningPeriod {
                opened: 100,
                closed: None,
            })
        );
        assert_eq!(db.last_update().expect("marker"), 100);
    }
}
