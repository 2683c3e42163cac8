//! SQLite-backed order store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{Order, OrderError, OrderItem, OrderStatus, OrderStore, OrderSummary};

/// SQLite-backed order store.
///
/// `upsert` and `set_status` exist for the order-management side and for
/// seeding; the engine only goes through [`OrderStore`].
pub struct SqliteOrderStore {
    conn: Mutex<Connection>,
}

impl SqliteOrderStore {
    /// Open (or create) the order tables in the database at `path`.
    pub fn new(path: &Path) -> Result<Self, OrderError> {
        let conn = Connection::open(path).map_err(|e| OrderError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, OrderError> {
        let conn =
            Connection::open_in_memory().map_err(|e| OrderError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), OrderError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                order_number TEXT NOT NULL,
                customer_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                status TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS order_items (
                order_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                song_name TEXT NOT NULL,
                song_link TEXT NOT NULL,
                package_name TEXT NOT NULL,
                package_id TEXT,
                PRIMARY KEY (order_id, position)
            );

            CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
            "#,
        )
        .map_err(|e| OrderError::Database(e.to_string()))
    }

    /// Insert or replace an order and all of its line items.
    pub fn upsert(&self, order: &Order) -> Result<(), OrderError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| OrderError::Database(e.to_string()))?;

        let summary = &order.summary;
        tx.execute(
            "INSERT OR REPLACE INTO orders (id, order_number, customer_name, created_at, status) VALUES (?, ?, ?, ?, ?)",
            params![
                summary.id,
                summary.order_number,
                summary.customer_name,
                summary.created_at.to_rfc3339(),
                summary.status.as_str(),
            ],
        )
        .map_err(|e| OrderError::Database(e.to_string()))?;

        tx.execute(
            "DELETE FROM order_items WHERE order_id = ?",
            params![summary.id],
        )
        .map_err(|e| OrderError::Database(e.to_string()))?;

        for (position, item) in order.items.iter().enumerate() {
            tx.execute(
                "INSERT INTO order_items (order_id, position, song_name, song_link, package_name, package_id) VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    summary.id,
                    position as i64,
                    item.song_name,
                    item.song_link,
                    item.package_name,
                    item.package_id,
                ],
            )
            .map_err(|e| OrderError::Database(e.to_string()))?;
        }

        tx.commit().map_err(|e| OrderError::Database(e.to_string()))
    }

    /// Change an order's status.
    pub fn set_status(&self, id: &str, status: OrderStatus) -> Result<(), OrderError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE orders SET status = ? WHERE id = ?",
                params![status.as_str(), id],
            )
            .map_err(|e| OrderError::Database(e.to_string()))?;
        if changed == 0 {
            return Err(OrderError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<OrderSummary> {
        let created_at_str: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        Ok(OrderSummary {
            id: row.get(0)?,
            order_number: row.get(1)?,
            customer_name: row.get(2)?,
            created_at: parse_timestamp(&created_at_str),
            status: OrderStatus::parse(&status_str),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl OrderStore for SqliteOrderStore {
    fn get(&self, id: &str) -> Result<Option<Order>, OrderError> {
        let conn = self.conn.lock().unwrap();

        let summary = conn.query_row(
            "SELECT id, order_number, customer_name, created_at, status FROM orders WHERE id = ?",
            params![id],
            Self::row_to_summary,
        );
        let summary = match summary {
            Ok(summary) => summary,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(OrderError::Database(e.to_string())),
        };

        let mut stmt = conn
            .prepare(
                "SELECT song_name, song_link, package_name, package_id FROM order_items WHERE order_id = ? ORDER BY position ASC",
            )
            .map_err(|e| OrderError::Database(e.to_string()))?;
        let items = stmt
            .query_map(params![id], |row| {
                Ok(OrderItem {
                    song_name: row.get(0)?,
                    song_link: row.get(1)?,
                    package_name: row.get(2)?,
                    package_id: row.get(3)?,
                })
            })
            .map_err(|e| OrderError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OrderError::Database(e.to_string()))?;

        Ok(Some(Order { summary, items }))
    }

    fn summaries(&self, ids: &[String]) -> Result<Vec<OrderSummary>, OrderError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, order_number, customer_name, created_at, status FROM orders WHERE id IN ({})",
            placeholders
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| OrderError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), Self::row_to_summary)
            .map_err(|e| OrderError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| OrderError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, songs: usize) -> Order {
        Order {
            summary: OrderSummary {
                id: id.to_string(),
                order_number: format!("#{}", id),
                customer_name: "Maya Lind".to_string(),
                created_at: Utc::now(),
                status: OrderStatus::Processing,
            },
            items: (0..songs)
                .map(|i| OrderItem {
                    song_name: format!("Song {}", i + 1),
                    song_link: format!("https://open.spotify.com/track/TRACK{}", i),
                    package_name: "LEGENDARY".to_string(),
                    package_id: Some("pkg-5".to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let store = SqliteOrderStore::in_memory().unwrap();
        store.upsert(&order("o1", 2)).unwrap();

        let fetched = store.get("o1").unwrap().unwrap();
        assert_eq!(fetched.summary.order_number, "#o1");
        assert_eq!(fetched.items.len(), 2);
        assert_eq!(fetched.items[1].song_name, "Song 2");
    }

    #[test]
    fn test_get_missing() {
        let store = SqliteOrderStore::in_memory().unwrap();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_items() {
        let store = SqliteOrderStore::in_memory().unwrap();
        store.upsert(&order("o1", 3)).unwrap();
        store.upsert(&order("o1", 1)).unwrap();
        assert_eq!(store.get("o1").unwrap().unwrap().items.len(), 1);
    }

    #[test]
    fn test_set_status() {
        let store = SqliteOrderStore::in_memory().unwrap();
        store.upsert(&order("o1", 1)).unwrap();
        store.set_status("o1", OrderStatus::Cancelled).unwrap();
        let fetched = store.get("o1").unwrap().unwrap();
        assert!(fetched.summary.status.is_cancelled());

        assert!(matches!(
            store.set_status("missing", OrderStatus::Cancelled),
            Err(OrderError::NotFound(_))
        ));
    }

    #[test]
    fn test_summaries_skip_unknown_ids() {
        let store = SqliteOrderStore::in_memory().unwrap();
        store.upsert(&order("o1", 1)).unwrap();
        store.upsert(&order("o2", 1)).unwrap();

        let summaries = store
            .summaries(&["o1".to_string(), "o2".to_string(), "o3".to_string()])
            .unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(store.summaries(&[]).unwrap().is_empty());
    }
}
