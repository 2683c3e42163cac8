//! Immutable record of every panel submission attempt.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PurchaseLogError {
    #[error("Database error: {0}")]
    Database(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Written before the panel call; settled once the panel answers.
    Pending,
    Success,
    Failed,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Success => "success",
            PurchaseStatus::Failed => "failed",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "pending" => PurchaseStatus::Pending,
            "success" => PurchaseStatus::Success,
            _ => PurchaseStatus::Failed,
        }
    }
}

/// One submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLogEntry {
    pub campaign_id: String,
    pub order_set_id: i64,
    pub service_id: String,
    pub quantity: i64,
    /// Panel order id, on success.
    pub followiz_order_id: Option<String>,
    pub status: PurchaseStatus,
    pub error_message: Option<String>,
    pub raw_response: Option<String>,
    pub submitted_by: String,
    /// Informational; unset when the rate could not be looked up.
    pub cost: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Purchase log. Rows are only ever added or settled, never deleted.
pub trait PurchaseLogStore: Send + Sync {
    /// Insert an entry and return its row id.
    fn append(&self, entry: &PurchaseLogEntry) -> Result<i64, PurchaseLogError>;

    /// Settle a `Pending` row with the panel's answer.
    fn settle(&self, row_id: i64, entry: &PurchaseLogEntry) -> Result<(), PurchaseLogError>;

    /// Entries for a campaign, oldest first.
    fn for_campaign(&self, campaign_id: &str) -> Result<Vec<PurchaseLogEntry>, PurchaseLogError>;

    /// Order set ids with at least one successful submission for the campaign.
    fn succeeded_sets(&self, campaign_id: &str) -> Result<Vec<i64>, PurchaseLogError>;

    /// Order set ids with an attempt that was never settled.
    fn unsettled_sets(&self, campaign_id: &str) -> Result<Vec<i64>, PurchaseLogError>;
}

pub struct SqlitePurchaseLogStore {
    conn: Mutex<Connection>,
}

impl SqlitePurchaseLogStore {
    pub fn new(path: &Path) -> Result<Self, PurchaseLogError> {
        let conn =
            Connection::open(path).map_err(|e| PurchaseLogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, PurchaseLogError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PurchaseLogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PurchaseLogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS purchase_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id TEXT NOT NULL,
                order_set_id INTEGER NOT NULL,
                service_id TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                followiz_order_id TEXT,
                status TEXT NOT NULL,
                error_message TEXT,
                raw_response TEXT,
                submitted_by TEXT NOT NULL,
                cost REAL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_purchase_logs_campaign
                ON purchase_logs(campaign_id, order_set_id);
            "#,
        )
        .map_err(|e| PurchaseLogError::Database(e.to_string()))
    }
}

impl PurchaseLogStore for SqlitePurchaseLogStore {
    fn append(&self, entry: &PurchaseLogEntry) -> Result<i64, PurchaseLogError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO purchase_logs (
                campaign_id, order_set_id, service_id, quantity, followiz_order_id,
                status, error_message, raw_response, submitted_by, cost, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.campaign_id,
                entry.order_set_id,
                entry.service_id,
                entry.quantity,
                entry.followiz_order_id,
                entry.status.as_str(),
                entry.error_message,
                entry.raw_response,
                entry.submitted_by,
                entry.cost,
                entry.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| PurchaseLogError::Database(e.to_string()))?;
        Ok(conn.last_insert_rowid())
    }

    fn settle(&self, row_id: i64, entry: &PurchaseLogEntry) -> Result<(), PurchaseLogError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                r#"
                UPDATE purchase_logs
                SET followiz_order_id = ?, status = ?, error_message = ?, raw_response = ?, cost = ?
                WHERE id = ? AND status = 'pending'
                "#,
                params![
                    entry.followiz_order_id,
                    entry.status.as_str(),
                    entry.error_message,
                    entry.raw_response,
                    entry.cost,
                    row_id,
                ],
            )
            .map_err(|e| PurchaseLogError::Database(e.to_string()))?;
        if changed == 0 {
            return Err(PurchaseLogError::Database(format!(
                "no pending purchase log row {}",
                row_id
            )));
        }
        Ok(())
    }

    fn for_campaign(&self, campaign_id: &str) -> Result<Vec<PurchaseLogEntry>, PurchaseLogError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT campaign_id, order_set_id, service_id, quantity, followiz_order_id,
                       status, error_message, raw_response, submitted_by, cost, created_at
                FROM purchase_logs WHERE campaign_id = ? ORDER BY id ASC
                "#,
            )
            .map_err(|e| PurchaseLogError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![campaign_id], |row| {
                let status: String = row.get(5)?;
                let created_at: String = row.get(10)?;
                Ok(PurchaseLogEntry {
                    campaign_id: row.get(0)?,
                    order_set_id: row.get(1)?,
                    service_id: row.get(2)?,
                    quantity: row.get(3)?,
                    followiz_order_id: row.get(4)?,
                    status: PurchaseStatus::parse(&status),
                    error_message: row.get(6)?,
                    raw_response: row.get(7)?,
                    submitted_by: row.get(8)?,
                    cost: row.get(9)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .map_err(|e| PurchaseLogError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| PurchaseLogError::Database(e.to_string()))
    }

    fn succeeded_sets(&self, campaign_id: &str) -> Result<Vec<i64>, PurchaseLogError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT order_set_id FROM purchase_logs WHERE campaign_id = ? AND status = 'success' ORDER BY order_set_id",
            )
            .map_err(|e| PurchaseLogError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![campaign_id], |row| row.get(0))
            .map_err(|e| PurchaseLogError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<i64>, _>>()
            .map_err(|e| PurchaseLogError::Database(e.to_string()))
    }

    fn unsettled_sets(&self, campaign_id: &str) -> Result<Vec<i64>, PurchaseLogError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT order_set_id FROM purchase_logs WHERE campaign_id = ? AND status = 'pending' ORDER BY order_set_id",
            )
            .map_err(|e| PurchaseLogError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![campaign_id], |row| row.get(0))
            .map_err(|e| PurchaseLogError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<i64>, _>>()
            .map_err(|e| PurchaseLogError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(set_id: i64, status: PurchaseStatus) -> PurchaseLogEntry {
        PurchaseLogEntry {
            campaign_id: "c1".to_string(),
            order_set_id: set_id,
            service_id: "101".to_string(),
            quantity: 1000,
            followiz_order_id: (status == PurchaseStatus::Success).then(|| "555".to_string()),
            status,
            error_message: (status == PurchaseStatus::Failed).then(|| "boom".to_string()),
            raw_response: Some("{}".to_string()),
            submitted_by: "admin".to_string(),
            cost: Some(0.9),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_list() {
        let store = SqlitePurchaseLogStore::in_memory().unwrap();
        store.append(&entry(1, PurchaseStatus::Success)).unwrap();
        store.append(&entry(2, PurchaseStatus::Failed)).unwrap();

        let entries = store.for_campaign("c1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].followiz_order_id.as_deref(), Some("555"));
        assert_eq!(entries[1].error_message.as_deref(), Some("boom"));
        assert!(store.for_campaign("other").unwrap().is_empty());
    }

    #[test]
    fn test_succeeded_sets() {
        let store = SqlitePurchaseLogStore::in_memory().unwrap();
        store.append(&entry(2, PurchaseStatus::Failed)).unwrap();
        store.append(&entry(1, PurchaseStatus::Success)).unwrap();
        store.append(&entry(1, PurchaseStatus::Success)).unwrap();
        store.append(&entry(2, PurchaseStatus::Failed)).unwrap();

        assert_eq!(store.succeeded_sets("c1").unwrap(), vec![1]);
    }

    #[test]
    fn test_pending_row_settles_once() {
        let store = SqlitePurchaseLogStore::in_memory().unwrap();
        let row = store.append(&entry(3, PurchaseStatus::Pending)).unwrap();
        assert_eq!(store.unsettled_sets("c1").unwrap(), vec![3]);
        assert!(store.succeeded_sets("c1").unwrap().is_empty());

        store.settle(row, &entry(3, PurchaseStatus::Success)).unwrap();
        assert!(store.unsettled_sets("c1").unwrap().is_empty());
        assert_eq!(store.succeeded_sets("c1").unwrap(), vec![3]);

        let entries = store.for_campaign("c1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].followiz_order_id.as_deref(), Some("555"));

        // A settled row is not rewritten.
        assert!(store.settle(row, &entry(3, PurchaseStatus::Failed)).is_err());
    }
}
