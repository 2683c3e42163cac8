//! Mock SMM panel for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::smm::{
    AddOrder, AddOrderResult, Balance, OrderStatusInfo, ServiceInfo, SmmError, SmmPanel,
};

/// Mock implementation of the SmmPanel trait.
///
/// Provides controllable behavior for testing:
/// - Per-service scripted failures
/// - Configurable catalog rates
/// - Recorded orders for assertions
///
/// # Example
///
/// ```rust,ignore
/// use spotlight_core::testing::MockSmmPanel;
///
/// let panel = MockSmmPanel::new();
/// panel.set_rate("101", 0.9);
/// panel.fail_service("102", "Not enough funds on balance");
///
/// // ... submit ...
///
/// assert_eq!(panel.submitted().len(), 2);
/// ```
#[derive(Debug)]
pub struct MockSmmPanel {
    rates: Mutex<HashMap<String, f64>>,
    failures: Mutex<HashMap<String, String>>,
    catalog_unavailable: Mutex<bool>,
    balance: Mutex<f64>,
    submitted: Mutex<Vec<AddOrder>>,
    statuses: Mutex<HashMap<String, OrderStatusInfo>>,
    order_delay: Mutex<Option<Duration>>,
    next_order_id: AtomicU64,
}

impl Default for MockSmmPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSmmPanel {
    pub fn new() -> Self {
        Self {
            rates: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            catalog_unavailable: Mutex::new(false),
            balance: Mutex::new(100.0),
            submitted: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
            order_delay: Mutex::new(None),
            next_order_id: AtomicU64::new(1000),
        }
    }

    /// Add or replace a catalog entry.
    pub fn set_rate(&self, service_id: &str, rate: f64) {
        self.rates
            .lock()
            .unwrap()
            .insert(service_id.to_string(), rate);
    }

    /// Make every order for `service_id` fail with a panel error.
    pub fn fail_service(&self, service_id: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(service_id.to_string(), message.to_string());
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Make `services` fail.
    pub fn fail_services_catalog(&self, fail: bool) {
        *self.catalog_unavailable.lock().unwrap() = fail;
    }

    pub fn set_balance(&self, balance: f64) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_status(&self, order_id: &str, status: OrderStatusInfo) {
        self.statuses
            .lock()
            .unwrap()
            .insert(order_id.to_string(), status);
    }

    /// Hold every `add_order` response for `delay`.
    pub fn set_order_delay(&self, delay: Duration) {
        *self.order_delay.lock().unwrap() = Some(delay);
    }

    /// Orders accepted or rejected so far, in call order.
    pub fn submitted(&self) -> Vec<AddOrder> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmmPanel for MockSmmPanel {
    async fn balance(&self) -> Result<Balance, SmmError> {
        Ok(Balance {
            balance: *self.balance.lock().unwrap(),
            currency: Some("USD".to_string()),
        })
    }

    async fn services(&self) -> Result<Vec<ServiceInfo>, SmmError> {
        if *self.catalog_unavailable.lock().unwrap() {
            return Err(SmmError::ConnectionFailed("catalog unavailable".to_string()));
        }
        let mut services: Vec<ServiceInfo> = self
            .rates
            .lock()
            .unwrap()
            .iter()
            .map(|(id, rate)| ServiceInfo {
                service_id: id.clone(),
                name: format!("Service {}", id),
                service_type: Some("Default".to_string()),
                category: None,
                rate: *rate,
                min: None,
                max: None,
            })
            .collect();
        services.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        Ok(services)
    }

    async fn add_order(&self, order: &AddOrder) -> Result<AddOrderResult, SmmError> {
        self.submitted.lock().unwrap().push(order.clone());

        let delay = *self.order_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failures.lock().unwrap().get(&order.service_id) {
            return Err(SmmError::Panel {
                message: message.clone(),
                raw: format!(r#"{{"error":"{}"}}"#, message),
            });
        }

        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst).to_string();
        Ok(AddOrderResult {
            raw: format!(r#"{{"order":{}}}"#, order_id),
            order_id,
        })
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatusInfo, SmmError> {
        self.statuses
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| SmmError::Panel {
                message: "Incorrect order ID".to_string(),
                raw: r#"{"error":"Incorrect order ID"}"#.to_string(),
            })
    }

    async fn order_statuses(
        &self,
        order_ids: &[String],
    ) -> Result<HashMap<String, OrderStatusInfo>, SmmError> {
        let statuses = self.statuses.lock().unwrap();
        Ok(order_ids
            .iter()
            .map(|id| {
                let status = statuses.get(id).cloned().unwrap_or(OrderStatusInfo {
                    status: None,
                    charge: None,
                    start_count: None,
                    remains: None,
                    currency: None,
                    error: Some("Incorrect order ID".to_string()),
                });
                (id.clone(), status)
            })
            .collect())
    }
}
