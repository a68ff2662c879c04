// =============================================================================
// Shared wire types mirroring the Tudengibaar POS backend JSON
// =============================================================================
//
// Products and orders arrive as camelCase JSON from the POS REST API. Both
// collections are replaced wholesale on every poll tick; nothing here is
// patched incrementally. Optional fields carry `#[serde(default)]` so that
// older backend builds missing a field still deserialise.
// =============================================================================

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A menu product as served by `GET /api/products/my`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Current unit price in euros. The backend clamps this to >= 0.
    pub price: f64,
    #[serde(default)]
    pub sales_count: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub category_name: Option<String>,
    /// ISO-8601 timestamp of the most recent sale, if any.
    #[serde(default)]
    pub last_sale_at: Option<String>,
    /// Signed price change since the last recorded repricing.
    #[serde(default)]
    pub price_change: Option<f64>,
    #[serde(default)]
    pub price_up: Option<bool>,
    /// Server-computed predicted next price. Opaque to this service.
    #[serde(default)]
    pub predicted_price: Option<f64>,
}

impl Product {
    /// Total units sold, defaulting to 0 when the backend omits the field.
    pub fn sales_count(&self) -> i64 {
        self.sales_count.unwrap_or(0)
    }

    /// Last-sale timestamp as epoch milliseconds, when present and parseable.
    pub fn last_sale_ms(&self) -> Option<i64> {
        self.last_sale_at.as_deref().and_then(parse_timestamp_ms)
    }

    /// Category label for the board: upper-cased, "OTHER" when missing.
    pub fn category_label(&self) -> String {
        self.category_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("Other")
            .to_uppercase()
    }
}

/// A historical order as served by `GET /api/orders/my`. Read-only once
/// fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Creation timestamp as epoch milliseconds, when parseable.
    pub fn created_at_ms(&self) -> Option<i64> {
        parse_timestamp_ms(&self.created_at)
    }
}

/// A single order line with the product state captured at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub quantity: u32,
    pub product: OrderLineProduct,
}

/// Embedded product reference inside an order line. `price` is the unit
/// price at the moment the order was placed, not the current price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineProduct {
    pub id: i64,
    pub name: String,
    pub price: f64,
}

/// One observed point of a per-product price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    /// Epoch milliseconds.
    pub t: i64,
    pub price: f64,
}

/// One point of the merged chart series. Exactly one of `price` / `forecast`
/// is set; both fields live on the same record so that a single ordered
/// sequence can carry the observed segment and the forecast segment.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChartPoint {
    pub t: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<f64>,
}

/// Current UNIX timestamp in milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse an ISO-8601 timestamp into epoch milliseconds.
///
/// Accepts both RFC 3339 (`2024-05-01T12:30:15Z`, with offset) and the bare
/// `LocalDateTime` shape the Java backend emits (`2024-05-01T12:30:15.123`),
/// which is interpreted as UTC. Returns `None` for anything else.
pub fn parse_timestamp_ms(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    None
}
