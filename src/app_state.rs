// =============================================================================
// Central Application State — Tudengibaar TV Board
// =============================================================================
//
// The single source of truth for the board service. The poll loop replaces
// the product/order snapshots here, the rotation loop and control endpoints
// mutate the selection, and the REST/WebSocket layer reads everything back
// as a serialisable display snapshot.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared collections.
//   - All mutation funnels through a handful of methods that bump the state
//     version so the WebSocket feed can detect changes.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::board::{group_by_category, top_movers, CategoryGroup, Mover};
use crate::forecast::derive_forecast;
use crate::history::derive_history;
use crate::runtime_config::RuntimeConfig;
use crate::selection::SelectionState;
use crate::types::{now_ms, ChartPoint, Order, Product};

/// Stroke colours for the forecast segment, selected by the direction flag.
const FORECAST_STROKE_UP: &str = "#34d399";
const FORECAST_STROKE_DOWN: &str = "#f87171";
/// Fill gradient ids understood by the TV chart client.
const FORECAST_FILL_UP: &str = "forecastFillUp";
const FORECAST_FILL_DOWN: &str = "forecastFillDown";

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// A recorded error event for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter. Incremented on every
    /// meaningful state mutation; the WebSocket feed uses this to decide
    /// when to push.
    pub state_version: AtomicU64,

    /// WebSocket message sequence number (incremented per message sent).
    pub ws_sequence_number: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Snapshots (replaced wholesale per poll tick) ────────────────────
    pub products: RwLock<Vec<Product>>,
    pub orders: RwLock<Vec<Order>>,

    // ── Selection ───────────────────────────────────────────────────────
    pub selection: RwLock<SelectionState>,

    // ── Operational status ──────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,
    pub last_poll_ok: RwLock<Option<std::time::Instant>>,
    pub last_poll_error: RwLock<Option<String>>,
    pub ws_client_connected: RwLock<bool>,

    /// Instant when the service was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct a new `AppState` from the given runtime configuration.
    /// The returned value is typically wrapped in `Arc` immediately.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            ws_sequence_number: AtomicU64::new(0),

            runtime_config: Arc::new(RwLock::new(config)),
            products: RwLock::new(Vec::new()),
            orders: RwLock::new(Vec::new()),
            selection: RwLock::new(SelectionState::default()),

            recent_errors: RwLock::new(Vec::new()),
            last_poll_ok: RwLock::new(None),
            last_poll_error: RwLock::new(None),
            ws_client_connected: RwLock::new(false),

            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    /// Atomically increment the state version. Call this after every
    /// meaningful mutation so WebSocket clients see fresh data.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Read the current state version without modifying it.
    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted at the limit.
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }

        self.increment_version();
    }

    // ── Snapshot Application ────────────────────────────────────────────

    /// Apply one poll tick's snapshot pair: replace both collections
    /// wholesale and reconcile the selection against the new product list.
    ///
    /// Selection reconciliation always uses the pair from the same tick —
    /// never a mix of an old product list and new orders.
    pub fn apply_snapshot(&self, new_products: Vec<Product>, new_orders: Vec<Order>) {
        {
            // Reconcile and swap under one critical section (products lock
            // first, selection second, same order as the rotation loop) so
            // no reader ever sees an index computed against the other list.
            let mut products = self.products.write();
            let mut selection = self.selection.write();

            let previously_selected = selection.selected_id(&products);
            selection.reconcile(previously_selected, &new_products);
            *products = new_products;
        }
        *self.orders.write() = new_orders;
        *self.last_poll_ok.write() = Some(std::time::Instant::now());
        *self.last_poll_error.write() = None;

        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Build the complete, serialisable display snapshot.
    ///
    /// This is the payload of `GET /api/v1/display` and the WebSocket push
    /// feed: the selected product's merged chart series plus forecast
    /// styling, the grouped board, the movers ticker, and poll status.
    pub fn build_snapshot(&self) -> DisplaySnapshot {
        let now = now_ms();
        let config = self.runtime_config.read();
        let products = self.products.read();
        let orders = self.orders.read();
        let selection = self.selection.read();

        let selected = selection.selected(&products).map(|product| {
            let history = derive_history(&orders, product, now, config.stale_anchor_ms);
            let forecast = derive_forecast(
                &history,
                product.price,
                product.predicted_price,
                &config.forecast,
                now,
            );

            // One ordered sequence: observed points first, forecast after.
            let mut series: Vec<ChartPoint> = history
                .iter()
                .map(|p| ChartPoint {
                    t: p.t,
                    price: Some(p.price),
                    forecast: None,
                })
                .collect();
            series.extend(forecast.points.iter().map(|p| ChartPoint {
                t: p.t,
                price: None,
                forecast: Some(p.value),
            }));

            let (stroke, fill) = if forecast.direction_up {
                (FORECAST_STROKE_UP, FORECAST_FILL_UP)
            } else {
                (FORECAST_STROKE_DOWN, FORECAST_FILL_DOWN)
            };

            SelectedSeries {
                product: product.clone(),
                series,
                // "Now" reference: timestamp of the last observed point.
                now_t: history.last().map_or(now, |p| p.t),
                forecast_target: forecast.target,
                forecast_direction_up: forecast.direction_up,
                forecast_stroke: stroke,
                forecast_fill: fill,
            }
        });

        let board = group_by_category(&products, &config.preferred_categories);
        let movers = top_movers(&products, config.movers_limit);

        DisplaySnapshot {
            state_version: self.current_state_version(),
            server_time: now,
            auto_rotate: selection.auto_rotate,
            selected,
            board,
            movers,
            product_count: products.len(),
            poll: PollStatus {
                last_ok_age_s: self.last_poll_ok.read().map(|t| t.elapsed().as_secs()),
                last_error: self.last_poll_error.read().clone(),
            },
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

// =============================================================================
// Serialisable snapshot types (match the TV client's Display interface)
// =============================================================================

/// Full display snapshot sent to TV clients.
#[derive(Debug, Clone, Serialize)]
pub struct DisplaySnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub auto_rotate: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<SelectedSeries>,

    pub board: Vec<CategoryGroup>,
    pub movers: Vec<Mover>,
    pub product_count: usize,
    pub poll: PollStatus,
    pub uptime_secs: u64,
}

/// Chart payload for the currently selected product.
#[derive(Debug, Clone, Serialize)]
pub struct SelectedSeries {
    pub product: Product,
    /// Merged observed + forecast series, ordered by timestamp.
    pub series: Vec<ChartPoint>,
    /// Timestamp of the last observed point ("Now" reference line).
    pub now_t: i64,
    pub forecast_target: f64,
    pub forecast_direction_up: bool,
    pub forecast_stroke: &'static str,
    pub forecast_fill: &'static str,
}

/// Poll loop health for the status banner.
#[derive(Debug, Clone, Serialize)]
pub struct PollStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ok_age_s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, name: &str, price: f64, sales: i64) -> Product {
        Product {
            id,
            name: name.to_string(),
            description: None,
            price,
            sales_count: Some(sales),
            category_id: None,
            category_name: None,
            last_sale_at: None,
            price_change: None,
            price_up: None,
            predicted_price: None,
        }
    }

    #[test]
    fn end_to_end_best_seller_anchor_and_flat_forecast() {
        // Two products, no order history: selection falls to the best seller
        // (Cola), its series is a single current-price anchor, and with no
        // predictedPrice and no drift the forecast is flat at 2.00.
        let state = AppState::new(RuntimeConfig::default());
        state.apply_snapshot(
            vec![
                product(1, "Beer", 3.00, 10),
                product(2, "Cola", 2.00, 50),
            ],
            vec![],
        );

        let snap = state.build_snapshot();
        let selected = snap.selected.expect("non-empty snapshot selects a product");
        assert_eq!(selected.product.id, 2);

        // Anchor-only history followed by 6 forecast points.
        assert_eq!(selected.series.len(), 7);
        let anchor = &selected.series[0];
        assert!((anchor.price.unwrap() - 2.00).abs() < f64::EPSILON);
        assert!(anchor.forecast.is_none());
        assert_eq!(selected.now_t, anchor.t);

        for p in &selected.series[1..] {
            assert!(p.price.is_none());
            assert!((p.forecast.unwrap() - 2.00).abs() < 1e-9);
        }
        assert!(selected.forecast_direction_up);
        assert_eq!(selected.forecast_stroke, "#34d399");
    }

    #[test]
    fn refresh_reconciles_selection_from_same_tick() {
        let state = AppState::new(RuntimeConfig::default());
        state.apply_snapshot(
            vec![product(1, "Beer", 3.0, 10), product(2, "Cola", 2.0, 50)],
            vec![],
        );
        // Best seller id 2 selected at index 1.
        assert_eq!(state.selection.read().index, 1);

        // New snapshot reorders: id 2 now first.
        state.apply_snapshot(
            vec![product(2, "Cola", 2.1, 55), product(1, "Beer", 3.0, 12)],
            vec![],
        );
        assert_eq!(state.selection.read().index, 0);
        assert_eq!(
            state.selection.read().selected_id(&state.products.read()),
            Some(2)
        );
    }

    #[test]
    fn shrinking_snapshot_never_leaves_index_out_of_range() {
        let state = AppState::new(RuntimeConfig::default());
        state.apply_snapshot(
            (1..=5).map(|i| product(i, &format!("p{i}"), 1.0, i)).collect(),
            vec![],
        );
        let products = state.products.read().clone();
        state.selection.write().select_product(&products, 5);
        assert_eq!(state.selection.read().index, 4);

        // The dropped id falls back to the best seller of the smaller list;
        // the index is in range in the same call that swaps the products.
        state.apply_snapshot(
            vec![product(1, "p1", 1.0, 3), product(2, "p2", 1.0, 9)],
            vec![],
        );
        assert_eq!(state.selection.read().index, 1);
        assert!(state.build_snapshot().selected.is_some());
    }

    #[test]
    fn empty_snapshot_degrades_everything() {
        let state = AppState::new(RuntimeConfig::default());
        state.apply_snapshot(vec![], vec![]);

        let snap = state.build_snapshot();
        assert!(snap.selected.is_none());
        assert!(snap.board.is_empty());
        assert!(snap.movers.is_empty());
        assert_eq!(snap.product_count, 0);
        assert_eq!(state.selection.read().index, 0);
    }

    #[test]
    fn apply_snapshot_bumps_version_and_clears_error() {
        let state = AppState::new(RuntimeConfig::default());
        *state.last_poll_error.write() = Some("boom".to_string());
        let v0 = state.current_state_version();

        state.apply_snapshot(vec![product(1, "Beer", 3.0, 1)], vec![]);

        assert!(state.current_state_version() > v0);
        assert!(state.last_poll_error.read().is_none());
        assert!(state.last_poll_ok.read().is_some());
    }

    #[test]
    fn error_ring_is_capped() {
        let state = AppState::new(RuntimeConfig::default());
        for i in 0..60 {
            state.push_error(format!("error {i}"));
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), 50);
        assert_eq!(errors[0].message, "error 10");
    }
}
