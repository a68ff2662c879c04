// =============================================================================
// Background Loops — snapshot polling and TV rotation
// =============================================================================
//
// Two independent repeating timers, both spawned once at startup and both
// stopped deterministically through a shared watch-channel shutdown signal:
//
//   * Poll loop — fetches the product and order snapshots in parallel as one
//     logical pair. Both must succeed for the tick to be applied; any
//     failure discards the tick, keeps the previous data, and waits for the
//     next scheduled tick (no retry/backoff).
//   * Rotation loop — advances the selection circularly in Auto mode with
//     more than one product. Eligibility is re-checked on a short cadence so
//     leaving Manual mode is observed promptly; the advance itself waits for
//     a full rotation period from the moment rotation becomes eligible.
//
// Because both loops exit on the shutdown signal before touching state, a
// fetch that completes during teardown is never applied.
// =============================================================================

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::pos_client::PosClient;

/// Run the snapshot poll loop. The first tick fires immediately on startup,
/// then every `poll_interval_secs`. Spawn as a background task.
pub async fn run_poll_loop(
    state: Arc<AppState>,
    client: Arc<PosClient>,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = state.runtime_config.read().poll_interval_secs;
    info!(interval_secs = period, "snapshot poll loop started");

    let mut ticker = interval(Duration::from_secs(period));

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("snapshot poll loop stopping");
                return;
            }
            _ = ticker.tick() => {}
        }

        // One logical snapshot pair per tick, fetched in parallel.
        let (products, orders) = tokio::join!(client.get_products(), client.get_orders());

        match (products, orders) {
            (Ok(products), Ok(orders)) => {
                debug!(
                    products = products.len(),
                    orders = orders.len(),
                    "snapshot pair applied"
                );
                state.apply_snapshot(products, orders);
            }
            (Err(e), _) | (_, Err(e)) => {
                // Tick discarded wholesale: never mix an old product list
                // with new orders. The next tick is the only retry.
                warn!(error = %e, "snapshot fetch failed — keeping previous data");
                *state.last_poll_error.write() = Some(e.to_string());
                state.push_error(format!("snapshot fetch failed: {e}"));
            }
        }
    }
}

/// How often the rotation loop re-checks eligibility. Keeps the latency of
/// resuming autoplay well under one rotation period.
const ROTATION_CHECK_MS: u64 = 250;

/// Run the TV rotation loop. Spawn as a background task.
pub async fn run_rotation_loop(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(state.runtime_config.read().rotation_interval_secs);
    info!(interval_secs = period.as_secs(), "rotation loop started");

    let mut checker = interval(Duration::from_millis(ROTATION_CHECK_MS));
    // Armed while rotation is eligible; cleared on Manual or <2 products so a
    // resumed rotation always waits a full period before its first advance.
    let mut next_advance: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("rotation loop stopping");
                return;
            }
            _ = checker.tick() => {}
        }

        // Count and index move under the same locks, so a concurrent
        // snapshot swap can never leave the advance modulo a stale count.
        let advanced = {
            let products = state.products.read();
            let mut selection = state.selection.write();

            if !selection.auto_rotate || products.len() < 2 {
                next_advance = None;
                None
            } else {
                let deadline = *next_advance.get_or_insert_with(|| Instant::now() + period);
                if Instant::now() >= deadline {
                    selection.advance(products.len());
                    next_advance = Some(Instant::now() + period);
                    Some(selection.index)
                } else {
                    None
                }
            }
        };

        if let Some(index) = advanced {
            state.increment_version();
            debug!(index, "rotation advanced selection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_config::RuntimeConfig;
    use crate::types::Product;

    fn product(id: i64) -> Product {
        Product {
            id,
            name: format!("product-{id}"),
            description: None,
            price: 1.0,
            sales_count: None,
            category_id: None,
            category_name: None,
            last_sale_at: None,
            price_change: None,
            price_up: None,
            predicted_price: None,
        }
    }

    #[tokio::test]
    async fn loops_stop_on_shutdown_signal() {
        let state = Arc::new(AppState::new(RuntimeConfig::default()));
        let (tx, rx) = watch::channel(false);

        let rotation = tokio::spawn(run_rotation_loop(state.clone(), rx));
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), rotation)
            .await
            .expect("rotation loop must exit promptly on shutdown")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_advances_only_when_eligible() {
        let state = Arc::new(AppState::new(RuntimeConfig::default()));
        state.apply_snapshot(vec![product(1), product(2), product(3)], vec![]);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_rotation_loop(state.clone(), rx));

        // The first check arms the period; advances land at 6 s and 12 s.
        tokio::time::sleep(Duration::from_secs(13)).await;
        let after_auto = state.selection.read().index;
        assert!(after_auto > 0, "auto mode must have advanced");

        // Manual mode freezes the index.
        state.selection.write().auto_rotate = false;
        let frozen = state.selection.read().index;
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(state.selection.read().index, frozen);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn resumed_autoplay_advances_within_one_period() {
        let state = Arc::new(AppState::new(RuntimeConfig::default()));
        state.apply_snapshot(vec![product(1), product(2), product(3)], vec![]);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_rotation_loop(state.clone(), rx));

        // Drop to Manual before the first advance and idle well past several
        // rotation periods.
        tokio::time::sleep(Duration::from_secs(1)).await;
        state.selection.write().auto_rotate = false;
        tokio::time::sleep(Duration::from_secs(30)).await;
        let frozen = state.selection.read().index;

        // Back to Auto: exactly one advance lands within one period plus the
        // re-check cadence, not two periods later.
        state.selection.write().auto_rotate = true;
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(state.selection.read().index, (frozen + 1) % 3);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
