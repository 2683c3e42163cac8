//! Playlist Directory collaborator.
//!
//! The curated playlist catalog is maintained elsewhere; the engine reads
//! entries to validate and denormalize slot assignments.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("Database error: {0}")]
    Database(String),
}

/// A curated playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    pub is_active: bool,
}

/// Read access to the playlist catalog.
pub trait PlaylistDirectory: Send + Sync {
    /// Get a playlist by id, active or not.
    fn get(&self, id: &str) -> Result<Option<Playlist>, PlaylistError>;

    /// All active playlists, by name.
    fn list_active(&self) -> Result<Vec<Playlist>, PlaylistError>;
}

/// SQLite-backed playlist directory.
pub struct SqlitePlaylistDirectory {
    conn: Mutex<Connection>,
}

impl SqlitePlaylistDirectory {
    pub fn new(path: &Path) -> Result<Self, PlaylistError> {
        let conn = Connection::open(path).map_err(|e| PlaylistError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, PlaylistError> {
        let conn =
            Connection::open_in_memory().map_err(|e| PlaylistError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PlaylistError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS playlists (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                genre TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            );
            "#,
        )
        .map_err(|e| PlaylistError::Database(e.to_string()))
    }

    /// Insert or replace a catalog entry (catalog-management side / seeding).
    pub fn upsert(&self, playlist: &Playlist) -> Result<(), PlaylistError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO playlists (id, name, genre, is_active) VALUES (?, ?, ?, ?)",
            params![
                playlist.id,
                playlist.name,
                playlist.genre,
                playlist.is_active
            ],
        )
        .map_err(|e| PlaylistError::Database(e.to_string()))?;
        Ok(())
    }

    fn row_to_playlist(row: &rusqlite::Row) -> rusqlite::Result<Playlist> {
        Ok(Playlist {
            id: row.get(0)?,
            name: row.get(1)?,
            genre: row.get(2)?,
            is_active: row.get(3)?,
        })
    }
}

impl PlaylistDirectory for SqlitePlaylistDirectory {
    fn get(&self, id: &str) -> Result<Option<Playlist>, PlaylistError> {
        let conn = self.conn.lock().unwrap();
        match conn.query_row(
            "SELECT id, name, genre, is_active FROM playlists WHERE id = ?",
            params![id],
            Self::row_to_playlist,
        ) {
            Ok(playlist) => Ok(Some(playlist)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PlaylistError::Database(e.to_string())),
        }
    }

    fn list_active(&self) -> Result<Vec<Playlist>, PlaylistError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, genre, is_active FROM playlists WHERE is_active = 1 ORDER BY name ASC",
            )
            .map_err(|e| PlaylistError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_playlist)
            .map_err(|e| PlaylistError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| PlaylistError::Database(e.to_string()))
    }
}
