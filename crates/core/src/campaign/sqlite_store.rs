//! SQLite implementation of the campaign store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::{Campaign, CampaignError, CampaignFilter, CampaignStore, NewCampaign, Slot};

const CAMPAIGN_COLUMNS: &str = "id, order_id, order_number, song_name, song_link, track_id, \
    package_name, package_id, direct_streams_target, playlist_streams_target, time_on_playlists, \
    playlist_assignments_needed, direct_streams_confirmed, playlists_added_confirmed, \
    playlists_added_at, removed_from_playlists, playlist_assignments, hidden_until, \
    initial_actions_excluded, removal_actions_excluded, campaign_status, created_at, updated_at, \
    version";

/// SQLite-backed campaign store.
pub struct SqliteCampaignStore {
    conn: Mutex<Connection>,
}

impl SqliteCampaignStore {
    /// Create a new store with the given database path.
    pub fn new(path: &Path) -> Result<Self, CampaignError> {
        let conn = Connection::open(path).map_err(|e| CampaignError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, CampaignError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CampaignError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CampaignError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL,
                order_number TEXT NOT NULL,
                song_name TEXT NOT NULL,
                song_link TEXT NOT NULL,
                track_id TEXT NOT NULL,
                package_name TEXT NOT NULL,
                package_id TEXT,
                direct_streams_target INTEGER NOT NULL,
                playlist_streams_target INTEGER NOT NULL,
                time_on_playlists INTEGER NOT NULL,
                playlist_assignments_needed INTEGER NOT NULL,
                direct_streams_confirmed INTEGER NOT NULL DEFAULT 0,
                playlists_added_confirmed INTEGER NOT NULL DEFAULT 0,
                playlists_added_at TEXT,
                removed_from_playlists INTEGER NOT NULL DEFAULT 0,
                playlist_assignments TEXT NOT NULL DEFAULT '[]',
                hidden_until TEXT,
                initial_actions_excluded INTEGER NOT NULL DEFAULT 0,
                removal_actions_excluded INTEGER NOT NULL DEFAULT 0,
                campaign_status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                UNIQUE (order_id, track_id)
            );

            CREATE INDEX IF NOT EXISTS idx_campaigns_order ON campaigns(order_id);
            CREATE INDEX IF NOT EXISTS idx_campaigns_excluded
                ON campaigns(initial_actions_excluded, removal_actions_excluded);
            "#,
        )
        .map_err(|e| CampaignError::Database(e.to_string()))?;
        Ok(())
    }

    fn row_to_campaign(row: &rusqlite::Row) -> rusqlite::Result<Campaign> {
        let assignments_json: String = row.get(16)?;
        let playlist_assignments: Vec<Slot> =
            serde_json::from_str(&assignments_json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    16,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(Campaign {
            id: row.get(0)?,
            order_id: row.get(1)?,
            order_number: row.get(2)?,
            song_name: row.get(3)?,
            song_link: row.get(4)?,
            track_id: row.get(5)?,
            package_name: row.get(6)?,
            package_id: row.get(7)?,
            direct_streams_target: row.get(8)?,
            playlist_streams_target: row.get(9)?,
            time_on_playlists: row.get(10)?,
            playlist_assignments_needed: row.get(11)?,
            direct_streams_confirmed: row.get(12)?,
            playlists_added_confirmed: row.get(13)?,
            playlists_added_at: parse_optional_timestamp(row.get(14)?),
            removed_from_playlists: row.get(15)?,
            playlist_assignments,
            hidden_until: parse_optional_timestamp(row.get(17)?),
            initial_actions_excluded: row.get(18)?,
            removal_actions_excluded: row.get(19)?,
            campaign_status: row.get(20)?,
            created_at: parse_timestamp(&row.get::<_, String>(21)?),
            updated_at: parse_timestamp(&row.get::<_, String>(22)?),
            version: row.get(23)?,
        })
    }

    fn get_with_conn(conn: &Connection, id: &str) -> Result<Option<Campaign>, CampaignError> {
        conn.query_row(
            &format!("SELECT {} FROM campaigns WHERE id = ?", CAMPAIGN_COLUMNS),
            params![id],
            Self::row_to_campaign,
        )
        .optional()
        .map_err(|e| CampaignError::Database(e.to_string()))
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_optional_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.as_deref().map(parse_timestamp)
}

impl CampaignStore for SqliteCampaignStore {
    fn create(
        &self,
        campaign: &NewCampaign,
        now: DateTime<Utc>,
    ) -> Result<Campaign, CampaignError> {
        let conn = self.conn.lock().unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        let now_str = now.to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO campaigns (
                id, order_id, order_number, song_name, song_link, track_id,
                package_name, package_id, direct_streams_target, playlist_streams_target,
                time_on_playlists, playlist_assignments_needed, campaign_status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, ?)
            "#,
            params![
                id,
                campaign.order_id,
                campaign.order_number,
                campaign.song_name,
                campaign.song_link,
                campaign.track_id,
                campaign.package_name,
                campaign.package_id,
                campaign.direct_streams_target,
                campaign.playlist_streams_target,
                campaign.time_on_playlists,
                campaign.playlist_assignments_needed,
                now_str,
                now_str,
            ],
        )
        .map_err(|e| CampaignError::Database(e.to_string()))?;

        Self::get_with_conn(&conn, &id)?.ok_or(CampaignError::NotFound(id))
    }

    fn get(&self, id: &str) -> Result<Option<Campaign>, CampaignError> {
        let conn = self.conn.lock().unwrap();
        Self::get_with_conn(&conn, id)
    }

    fn find_by_track(
        &self,
        order_id: &str,
        track_id: &str,
    ) -> Result<Option<Campaign>, CampaignError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {} FROM campaigns WHERE order_id = ? AND track_id = ?",
                CAMPAIGN_COLUMNS
            ),
            params![order_id, track_id],
            Self::row_to_campaign,
        )
        .optional()
        .map_err(|e| CampaignError::Database(e.to_string()))
    }

    fn list(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>, CampaignError> {
        let conn = self.conn.lock().unwrap();

        let mut sql = format!("SELECT {} FROM campaigns WHERE 1=1", CAMPAIGN_COLUMNS);
        let mut values: Vec<String> = Vec::new();

        if let Some(order_ids) = &filter.order_ids {
            if order_ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; order_ids.len()].join(", ");
            sql.push_str(&format!(" AND order_id IN ({})", placeholders));
            values.extend(order_ids.iter().cloned());
        }

        if !filter.include_excluded {
            sql.push_str(" AND NOT (initial_actions_excluded = 1 AND removal_actions_excluded = 1)");
        }

        sql.push_str(&format!(
            " ORDER BY created_at ASC, rowid ASC LIMIT {} OFFSET {}",
            filter.limit, filter.offset
        ));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| CampaignError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_campaign)
            .map_err(|e| CampaignError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| CampaignError::Database(e.to_string()))
    }

    fn update(&self, campaign: &Campaign) -> Result<Campaign, CampaignError> {
        let conn = self.conn.lock().unwrap();
        let assignments = serde_json::to_string(&campaign.playlist_assignments)
            .map_err(|e| CampaignError::Database(e.to_string()))?;

        let updated = conn
            .execute(
                r#"
                UPDATE campaigns SET
                    song_name = ?, song_link = ?, package_name = ?, package_id = ?,
                    direct_streams_target = ?, playlist_streams_target = ?,
                    time_on_playlists = ?, playlist_assignments_needed = ?,
                    direct_streams_confirmed = ?, playlists_added_confirmed = ?,
                    playlists_added_at = ?, removed_from_playlists = ?,
                    playlist_assignments = ?, hidden_until = ?,
                    initial_actions_excluded = ?, removal_actions_excluded = ?,
                    campaign_status = ?, updated_at = ?, version = version + 1
                WHERE id = ? AND version = ?
                "#,
                params![
                    campaign.song_name,
                    campaign.song_link,
                    campaign.package_name,
                    campaign.package_id,
                    campaign.direct_streams_target,
                    campaign.playlist_streams_target,
                    campaign.time_on_playlists,
                    campaign.playlist_assignments_needed,
                    campaign.direct_streams_confirmed,
                    campaign.playlists_added_confirmed,
                    campaign.playlists_added_at.map(|t| t.to_rfc3339()),
                    campaign.removed_from_playlists,
                    assignments,
                    campaign.hidden_until.map(|t| t.to_rfc3339()),
                    campaign.initial_actions_excluded,
                    campaign.removal_actions_excluded,
                    campaign.campaign_status,
                    campaign.updated_at.to_rfc3339(),
                    campaign.id,
                    campaign.version,
                ],
            )
            .map_err(|e| CampaignError::Database(e.to_string()))?;

        if updated == 0 {
            return match Self::get_with_conn(&conn, &campaign.id)? {
                Some(_) => Err(CampaignError::Conflict {
                    campaign_id: campaign.id.clone(),
                    expected_version: campaign.version,
                }),
                None => Err(CampaignError::NotFound(campaign.id.clone())),
            };
        }

        Self::get_with_conn(&conn, &campaign.id)?
            .ok_or_else(|| CampaignError::NotFound(campaign.id.clone()))
    }
}
