//! Order set templates: the panel orders placed for each package.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::DripFeed;
use crate::package::normalize_package_name;

#[derive(Debug, Error)]
pub enum OrderSetError {
    #[error("Order set not found: {0}")]
    NotFound(i64),

    #[error("Invalid order set: {0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// An admin-configured panel order for a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSet {
    pub id: i64,
    pub package_name: String,
    pub service_id: String,
    pub quantity: i64,
    pub drip_runs: Option<u32>,
    pub interval_minutes: Option<u32>,
    pub display_order: i64,
    pub price_per_1k: Option<f64>,
    pub set_cost: Option<f64>,
    pub is_active: bool,
}

impl OrderSet {
    /// Drip-feed parameters, or `None` for a single delivery.
    pub fn drip_feed(&self) -> Option<DripFeed> {
        match self.drip_runs {
            Some(runs) if runs > 0 => Some(DripFeed {
                runs,
                interval_minutes: self.interval_minutes.unwrap_or(0),
            }),
            _ => None,
        }
    }
}

/// Fields an admin supplies when creating or editing an order set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSetInput {
    pub package_name: String,
    pub service_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub drip_runs: Option<u32>,
    #[serde(default)]
    pub interval_minutes: Option<u32>,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default)]
    pub price_per_1k: Option<f64>,
    #[serde(default)]
    pub set_cost: Option<f64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl OrderSetInput {
    fn validate(&self) -> Result<(), OrderSetError> {
        if normalize_package_name(&self.package_name).is_empty() {
            return Err(OrderSetError::Invalid("package_name is empty".to_string()));
        }
        if self.service_id.trim().is_empty() {
            return Err(OrderSetError::Invalid("service_id is empty".to_string()));
        }
        if self.quantity <= 0 {
            return Err(OrderSetError::Invalid(
                "quantity must be positive".to_string(),
            ));
        }
        if self.drip_runs.is_some_and(|runs| runs > 0) && self.interval_minutes.unwrap_or(0) == 0 {
            return Err(OrderSetError::Invalid(
                "drip feed needs interval_minutes".to_string(),
            ));
        }
        Ok(())
    }
}

/// Storage for order set templates.
pub trait OrderSetStore: Send + Sync {
    fn create(&self, input: &OrderSetInput) -> Result<OrderSet, OrderSetError>;

    fn update(&self, id: i64, input: &OrderSetInput) -> Result<OrderSet, OrderSetError>;

    fn get(&self, id: i64) -> Result<Option<OrderSet>, OrderSetError>;

    /// All sets, optionally for one package, by package then display order.
    fn list(&self, package_name: Option<&str>) -> Result<Vec<OrderSet>, OrderSetError>;

    /// Active sets for a package, by display order.
    fn active_for_package(&self, package_name: &str) -> Result<Vec<OrderSet>, OrderSetError>;
}

const ORDER_SET_COLUMNS: &str = "id, package_name, service_id, quantity, drip_runs, \
    interval_minutes, display_order, price_per_1k, set_cost, is_active";

/// SQLite-backed order set store.
pub struct SqliteOrderSetStore {
    conn: Mutex<Connection>,
}

impl SqliteOrderSetStore {
    pub fn new(path: &Path) -> Result<Self, OrderSetError> {
        let conn = Connection::open(path).map_err(|e| OrderSetError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, OrderSetError> {
        let conn =
            Connection::open_in_memory().map_err(|e| OrderSetError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), OrderSetError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS order_sets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_name TEXT NOT NULL,
                service_id TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                drip_runs INTEGER,
                interval_minutes INTEGER,
                display_order INTEGER NOT NULL DEFAULT 0,
                price_per_1k REAL,
                set_cost REAL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_order_sets_package
                ON order_sets(package_name, display_order);
            "#,
        )
        .map_err(|e| OrderSetError::Database(e.to_string()))
    }

    fn row_to_order_set(row: &rusqlite::Row) -> rusqlite::Result<OrderSet> {
        Ok(OrderSet {
            id: row.get(0)?,
            package_name: row.get(1)?,
            service_id: row.get(2)?,
            quantity: row.get(3)?,
            drip_runs: row.get(4)?,
            interval_minutes: row.get(5)?,
            display_order: row.get(6)?,
            price_per_1k: row.get(7)?,
            set_cost: row.get(8)?,
            is_active: row.get(9)?,
        })
    }

    fn query(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<OrderSet>, OrderSetError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| OrderSetError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, Self::row_to_order_set)
            .map_err(|e| OrderSetError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| OrderSetError::Database(e.to_string()))
    }
}

impl OrderSetStore for SqliteOrderSetStore {
    fn create(&self, input: &OrderSetInput) -> Result<OrderSet, OrderSetError> {
        input.validate()?;
        let id = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                r#"
                INSERT INTO order_sets (
                    package_name, service_id, quantity, drip_runs, interval_minutes,
                    display_order, price_per_1k, set_cost, is_active
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    normalize_package_name(&input.package_name),
                    input.service_id.trim(),
                    input.quantity,
                    input.drip_runs,
                    input.interval_minutes,
                    input.display_order,
                    input.price_per_1k,
                    input.set_cost,
                    input.is_active,
                ],
            )
            .map_err(|e| OrderSetError::Database(e.to_string()))?;
            conn.last_insert_rowid()
        };

        self.get(id)?.ok_or(OrderSetError::NotFound(id))
    }

    fn update(&self, id: i64, input: &OrderSetInput) -> Result<OrderSet, OrderSetError> {
        input.validate()?;
        let updated = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                r#"
                UPDATE order_sets SET
                    package_name = ?, service_id = ?, quantity = ?, drip_runs = ?,
                    interval_minutes = ?, display_order = ?, price_per_1k = ?,
                    set_cost = ?, is_active = ?
                WHERE id = ?
                "#,
                params![
                    normalize_package_name(&input.package_name),
                    input.service_id.trim(),
                    input.quantity,
                    input.drip_runs,
                    input.interval_minutes,
                    input.display_order,
                    input.price_per_1k,
                    input.set_cost,
                    input.is_active,
                    id,
                ],
            )
            .map_err(|e| OrderSetError::Database(e.to_string()))?
        };

        if updated == 0 {
            return Err(OrderSetError::NotFound(id));
        }
        self.get(id)?.ok_or(OrderSetError::NotFound(id))
    }

    fn get(&self, id: i64) -> Result<Option<OrderSet>, OrderSetError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {} FROM order_sets WHERE id = ?", ORDER_SET_COLUMNS),
            params![id],
            Self::row_to_order_set,
        )
        .optional()
        .map_err(|e| OrderSetError::Database(e.to_string()))
    }

    fn list(&self, package_name: Option<&str>) -> Result<Vec<OrderSet>, OrderSetError> {
        match package_name {
            Some(name) => self.query(
                &format!(
                    "SELECT {} FROM order_sets WHERE package_name = ? ORDER BY display_order ASC, id ASC",
                    ORDER_SET_COLUMNS
                ),
                params![normalize_package_name(name)],
            ),
            None => self.query(
                &format!(
                    "SELECT {} FROM order_sets ORDER BY package_name ASC, display_order ASC, id ASC",
                    ORDER_SET_COLUMNS
                ),
                [],
            ),
        }
    }

    fn active_for_package(&self, package_name: &str) -> Result<Vec<OrderSet>, OrderSetError> {
        self.query(
            &format!(
                "SELECT {} FROM order_sets WHERE package_name = ? AND is_active = 1 ORDER BY display_order ASC, id ASC",
                ORDER_SET_COLUMNS
            ),
            params![normalize_package_name(package_name)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(package: &str, service: &str, display_order: i64) -> OrderSetInput {
        OrderSetInput {
            package_name: package.to_string(),
            service_id: service.to_string(),
            quantity: 1000,
            drip_runs: None,
            interval_minutes: None,
            display_order,
            price_per_1k: None,
            set_cost: None,
            is_active: true,
        }
    }

    #[test]
    fn test_create_normalizes_package() {
        let store = SqliteOrderSetStore::in_memory().unwrap();
        let set = store.create(&input("ultimate package", "101", 0)).unwrap();
        assert_eq!(set.package_name, "LEGENDARY");
        assert!(set.drip_feed().is_none());
    }

    #[test]
    fn test_active_sets_in_display_order() {
        let store = SqliteOrderSetStore::in_memory().unwrap();
        store.create(&input("LEGENDARY", "second", 2)).unwrap();
        store.create(&input("LEGENDARY", "first", 1)).unwrap();
        let mut inactive = input("LEGENDARY", "off", 0);
        inactive.is_active = false;
        store.create(&inactive).unwrap();
        store.create(&input("MOMENTUM", "other", 0)).unwrap();

        let sets = store.active_for_package("Legendary").unwrap();
        let services: Vec<_> = sets.iter().map(|s| s.service_id.as_str()).collect();
        assert_eq!(services, vec!["first", "second"]);

        assert_eq!(store.list(Some("LEGENDARY")).unwrap().len(), 3);
        assert_eq!(store.list(None).unwrap().len(), 4);
    }

    #[test]
    fn test_update() {
        let store = SqliteOrderSetStore::in_memory().unwrap();
        let set = store.create(&input("LEGENDARY", "101", 0)).unwrap();

        let mut edit = input("LEGENDARY", "101", 0);
        edit.drip_runs = Some(5);
        edit.interval_minutes = Some(60);
        let updated = store.update(set.id, &edit).unwrap();
        assert_eq!(
            updated.drip_feed(),
            Some(DripFeed {
                runs: 5,
                interval_minutes: 60
            })
        );

        assert!(matches!(
            store.update(999, &edit),
            Err(OrderSetError::NotFound(999))
        ));
    }

    #[test]
    fn test_validation() {
        let store = SqliteOrderSetStore::in_memory().unwrap();

        let mut bad = input("LEGENDARY", "101", 0);
        bad.quantity = 0;
        assert!(matches!(store.create(&bad), Err(OrderSetError::Invalid(_))));

        let mut no_interval = input("LEGENDARY", "101", 0);
        no_interval.drip_runs = Some(3);
        assert!(matches!(
            store.create(&no_interval),
            Err(OrderSetError::Invalid(_))
        ));

        assert!(matches!(
            store.create(&input("  ", "101", 0)),
            Err(OrderSetError::Invalid(_))
        ));
    }
}
