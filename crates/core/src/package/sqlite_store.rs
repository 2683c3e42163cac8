//! SQLite-backed package table.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::{normalize_package_name, PackageConfig, PackageError, PackageStore};

pub struct SqlitePackageStore {
    conn: Mutex<Connection>,
}

impl SqlitePackageStore {
    pub fn new(path: &Path) -> Result<Self, PackageError> {
        let conn = Connection::open(path).map_err(|e| PackageError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, PackageError> {
        let conn =
            Connection::open_in_memory().map_err(|e| PackageError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PackageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS package_configs (
                package_name TEXT PRIMARY KEY,
                direct_streams_target INTEGER NOT NULL,
                playlist_streams_target INTEGER NOT NULL,
                playlist_assignments_needed INTEGER NOT NULL,
                time_on_playlists INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| PackageError::Database(e.to_string()))
    }

    fn row_to_config(row: &rusqlite::Row) -> rusqlite::Result<PackageConfig> {
        Ok(PackageConfig {
            package_name: row.get(0)?,
            direct_streams_target: row.get(1)?,
            playlist_streams_target: row.get(2)?,
            playlist_assignments_needed: row.get(3)?,
            time_on_playlists: row.get(4)?,
        })
    }
}

impl PackageStore for SqlitePackageStore {
    fn get(&self, package_name: &str) -> Result<Option<PackageConfig>, PackageError> {
        let conn = self.conn.lock().unwrap();
        match conn.query_row(
            "SELECT package_name, direct_streams_target, playlist_streams_target, playlist_assignments_needed, time_on_playlists FROM package_configs WHERE package_name = ?",
            params![normalize_package_name(package_name)],
            Self::row_to_config,
        ) {
            Ok(config) => Ok(Some(config)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PackageError::Database(e.to_string())),
        }
    }

    fn list(&self) -> Result<Vec<PackageConfig>, PackageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT package_name, direct_streams_target, playlist_streams_target, playlist_assignments_needed, time_on_playlists FROM package_configs ORDER BY package_name ASC",
            )
            .map_err(|e| PackageError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_config)
            .map_err(|e| PackageError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| PackageError::Database(e.to_string()))
    }

    fn upsert(&self, config: &PackageConfig) -> Result<(), PackageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO package_configs (package_name, direct_streams_target, playlist_streams_target, playlist_assignments_needed, time_on_playlists) VALUES (?, ?, ?, ?, ?)",
            params![
                normalize_package_name(&config.package_name),
                config.direct_streams_target,
                config.playlist_streams_target,
                config.playlist_assignments_needed,
                config.time_on_playlists,
            ],
        )
        .map_err(|e| PackageError::Database(e.to_string()))?;
        Ok(())
    }
}
