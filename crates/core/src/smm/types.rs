//! Types for SMM panel operations.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors from the SMM panel.
#[derive(Debug, Error)]
pub enum SmmError {
    /// No panel configured or API key missing. Not retryable.
    #[error("SMM panel not configured: {0}")]
    NotConfigured(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    /// The panel answered with an `error` field.
    #[error("Panel error: {message}")]
    Panel { message: String, raw: String },

    #[error("Invalid panel response: {message}")]
    InvalidResponse { message: String, raw: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

impl SmmError {
    /// Raw response body, when the panel produced one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            SmmError::Panel { raw, .. } | SmmError::InvalidResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Drip-feed delivery: `runs` installments, `interval_minutes` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DripFeed {
    pub runs: u32,
    pub interval_minutes: u32,
}

/// An "add order" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddOrder {
    pub service_id: String,
    pub link: String,
    pub quantity: i64,
    /// `None` means a single delivery; no drip parameters are sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drip_feed: Option<DripFeed>,
}

/// Panel response to an accepted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddOrderResult {
    pub order_id: String,
    /// Body as returned by the panel.
    pub raw: String,
}

/// One service from the panel catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(rename = "service", deserialize_with = "string_or_number")]
    pub service_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Price per 1000 units.
    #[serde(deserialize_with = "decimal")]
    pub rate: f64,
    #[serde(default, deserialize_with = "optional_integer")]
    pub min: Option<i64>,
    #[serde(default, deserialize_with = "optional_integer")]
    pub max: Option<i64>,
}

/// Account balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(deserialize_with = "decimal")]
    pub balance: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Status of a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "optional_decimal")]
    pub charge: Option<f64>,
    #[serde(default, deserialize_with = "optional_integer")]
    pub start_count: Option<i64>,
    #[serde(default, deserialize_with = "optional_integer")]
    pub remains: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Set when the panel rejected this order id.
    #[serde(default)]
    pub error: Option<String>,
}

/// External SMM panel.
#[async_trait]
pub trait SmmPanel: Send + Sync {
    async fn balance(&self) -> Result<Balance, SmmError>;

    /// Live service catalog with per-1k rates.
    async fn services(&self) -> Result<Vec<ServiceInfo>, SmmError>;

    async fn add_order(&self, order: &AddOrder) -> Result<AddOrderResult, SmmError>;

    async fn order_status(&self, order_id: &str) -> Result<OrderStatusInfo, SmmError>;

    /// Status for several orders, keyed by order id.
    async fn order_statuses(
        &self,
        order_ids: &[String],
    ) -> Result<HashMap<String, OrderStatusInfo>, SmmError>;
}

/// Panels encode numbers as JSON numbers or strings, inconsistently.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Loose::Int(i) => Some(*i as f64),
            Loose::Float(f) => Some(*f),
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Loose::Int(i) => Some(*i),
            Loose::Float(f) => Some(*f as i64),
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }

    fn into_string(self) -> String {
        match self {
            Loose::Int(i) => i.to_string(),
            Loose::Float(f) => f.to_string(),
            Loose::Text(s) => s,
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Loose::deserialize(d)?.into_string())
}

fn decimal<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Loose::deserialize(d)?
        .as_f64()
        .ok_or_else(|| serde::de::Error::custom("expected a decimal"))
}

fn optional_decimal<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?.and_then(|v| v.as_f64()))
}

fn optional_integer<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<Loose>::deserialize(d)?.and_then(|v| v.as_i64()))
}

/// Units actually delivered: drip-fed orders repeat `quantity` per run.
pub fn effective_quantity(quantity: i64, drip_feed: Option<DripFeed>) -> i64 {
    match drip_feed {
        Some(drip) if drip.runs > 0 => quantity * drip.runs as i64,
        _ => quantity,
    }
}

/// `effective_quantity / 1000 * rate`.
pub fn order_cost(quantity: i64, drip_feed: Option<DripFeed>, rate_per_1k: f64) -> f64 {
    effective_quantity(quantity, drip_feed) as f64 / 1000.0 * rate_per_1k
}
