// =============================================================================
// Order History Reducer — per-product price series from the order log
// =============================================================================
//
// Folds the full order history into a chronological, duplicate-timestamp-free
// sequence of observed price points for one product. A synthetic anchor point
// at the current price is appended when the series is empty or stale, so the
// chart and the forecast always have a usable starting point even for a
// long-idle product.
//
// Pure function of its inputs; recomputed fully on every snapshot or
// selection change.
// =============================================================================

use tracing::debug;

use crate::types::{Order, PricePoint, Product};

/// Derive the observed price series for `product` from `orders`.
///
/// * Every order line whose embedded product id matches emits one point at
///   the order's creation time with the price captured at time of sale.
/// * Points are sorted ascending by timestamp; runs of equal timestamps are
///   collapsed keeping the first point encountered at each distinct `t`.
/// * If the result is empty, or its last point is older than
///   `stale_anchor_ms` before `now_ms`, an anchor
///   `{t: lastSaleAt ?? now, price: current price}` is appended.
///
/// Output timestamps are strictly increasing.
pub fn derive_history(
    orders: &[Order],
    product: &Product,
    now_ms: i64,
    stale_anchor_ms: i64,
) -> Vec<PricePoint> {
    let mut points: Vec<PricePoint> = Vec::new();

    for order in orders {
        let Some(t) = order.created_at_ms() else {
            debug!(order_id = order.id, created_at = %order.created_at,
                "unparseable order timestamp — skipping its lines");
            continue;
        };
        for item in &order.items {
            if item.product.id == product.id {
                points.push(PricePoint {
                    t,
                    price: item.product.price,
                });
            }
        }
    }

    // Stable sort keeps encounter order within equal timestamps, so the dedup
    // below is a true first-wins collapse.
    points.sort_by_key(|p| p.t);
    points.dedup_by_key(|p| p.t);

    let needs_anchor = points
        .last()
        .map_or(true, |last| now_ms - last.t > stale_anchor_ms);

    if needs_anchor {
        let mut anchor_t = product.last_sale_ms().unwrap_or(now_ms);
        if let Some(last) = points.last().copied() {
            // A lastSaleAt older than the newest observed point would break
            // ascending order; pin the anchor to now instead.
            if anchor_t < last.t {
                anchor_t = now_ms;
            }
            // On a timestamp tie the anchor wins: it carries the
            // authoritative current price.
            if anchor_t == last.t {
                points.pop();
            }
        }
        points.push(PricePoint {
            t: anchor_t,
            price: product.price,
        });
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderItem, OrderLineProduct};

    const NOW: i64 = 1_714_564_800_000; // 2024-05-01T12:00:00Z
    const STALE: i64 = 55_000;

    fn product(id: i64, price: f64, last_sale_at: Option<&str>) -> Product {
        Product {
            id,
            name: format!("product-{id}"),
            description: None,
            price,
            sales_count: None,
            category_id: None,
            category_name: None,
            last_sale_at: last_sale_at.map(str::to_string),
            price_change: None,
            price_up: None,
            predicted_price: None,
        }
    }

    fn order(id: i64, created_at: &str, lines: &[(i64, f64)]) -> Order {
        Order {
            id,
            created_at: created_at.to_string(),
            total: 0.0,
            items: lines
                .iter()
                .map(|&(pid, price)| OrderItem {
                    quantity: 1,
                    product: OrderLineProduct {
                        id: pid,
                        name: format!("product-{pid}"),
                        price,
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn strictly_increasing_and_sorted() {
        let orders = vec![
            order(1, "2024-05-01T11:59:30Z", &[(1, 3.2)]),
            order(2, "2024-05-01T11:58:00Z", &[(1, 3.0)]),
            order(3, "2024-05-01T11:59:30Z", &[(1, 3.4)]), // duplicate timestamp
            order(4, "2024-05-01T11:59:50Z", &[(1, 3.5)]),
        ];
        let p = product(1, 3.5, None);
        let hist = derive_history(&orders, &p, NOW, STALE);

        for pair in hist.windows(2) {
            assert!(pair[0].t < pair[1].t, "timestamps must strictly increase");
        }
    }

    #[test]
    fn dedup_keeps_first_point_at_each_timestamp() {
        let orders = vec![
            order(1, "2024-05-01T11:59:30Z", &[(1, 3.2)]),
            order(2, "2024-05-01T11:59:30Z", &[(1, 9.9)]),
        ];
        let p = product(1, 3.2, None);
        let hist = derive_history(&orders, &p, NOW, STALE);

        let t = crate::types::parse_timestamp_ms("2024-05-01T11:59:30Z").unwrap();
        let at_t = hist.iter().find(|pt| pt.t == t).unwrap();
        assert!((at_t.price - 3.2).abs() < f64::EPSILON);
    }

    #[test]
    fn other_products_are_excluded() {
        let orders = vec![order(1, "2024-05-01T11:59:50Z", &[(2, 4.0), (1, 3.0)])];
        let p = product(1, 3.0, None);
        let hist = derive_history(&orders, &p, NOW, STALE);
        assert_eq!(hist.len(), 1);
        assert!((hist[0].price - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_orders_yield_anchor_at_now() {
        let p = product(1, 2.0, None);
        let hist = derive_history(&[], &p, NOW, STALE);
        assert_eq!(hist.len(), 1);
        assert_eq!(hist[0].t, NOW);
        assert!((hist[0].price - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn anchor_uses_last_sale_at_when_present() {
        let p = product(1, 2.5, Some("2024-05-01T11:59:58Z"));
        let hist = derive_history(&[], &p, NOW, STALE);
        assert_eq!(hist.len(), 1);
        assert_eq!(
            hist[0].t,
            crate::types::parse_timestamp_ms("2024-05-01T11:59:58Z").unwrap()
        );
        assert!((hist[0].price - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn stale_series_gets_anchor_appended() {
        // Last sale two minutes ago — well past the 55 s window.
        let orders = vec![order(1, "2024-05-01T11:58:00Z", &[(1, 3.0)])];
        let p = product(1, 2.7, None);
        let hist = derive_history(&orders, &p, NOW, STALE);

        assert_eq!(hist.len(), 2);
        let last = hist.last().unwrap();
        assert_eq!(last.t, NOW);
        assert!((last.price - 2.7).abs() < f64::EPSILON);
    }

    #[test]
    fn fresh_series_gets_no_anchor() {
        // 30 s old — within the stale window, so no anchor.
        let orders = vec![order(1, "2024-05-01T11:59:30Z", &[(1, 3.0)])];
        let p = product(1, 2.7, None);
        let hist = derive_history(&orders, &p, NOW, STALE);

        assert_eq!(hist.len(), 1);
        assert!((hist[0].price - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stale_last_sale_at_falls_back_to_now() {
        // lastSaleAt predates the newest observed point; anchoring there
        // would break ordering, so the anchor lands on `now`.
        let orders = vec![order(1, "2024-05-01T11:58:00Z", &[(1, 3.0)])];
        let p = product(1, 2.7, Some("2024-05-01T11:50:00Z"));
        let hist = derive_history(&orders, &p, NOW, STALE);

        let last = hist.last().unwrap();
        assert_eq!(last.t, NOW);
        for pair in hist.windows(2) {
            assert!(pair[0].t < pair[1].t);
        }
    }
}
