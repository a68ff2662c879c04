// =============================================================================
// Movers/Board Aggregator — secondary display surfaces
// =============================================================================
//
// Two pure aggregations over the latest product snapshot:
//
//   * Grouped board — products bucketed by upper-cased category label, with a
//     configured set of categories pinned first and the rest alphabetical;
//     products alphabetical within a category. Feeds the tile board on the
//     left of the TV layout.
//   * Movers ticker — every product ranked by absolute price change,
//     truncated to a limit. Feeds the scrolling ticker at the bottom.
//
// Both are recomputed from scratch on every refresh.
// =============================================================================

use std::collections::HashMap;

use serde::Serialize;

use crate::types::Product;

/// One category bucket of the grouped board.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub products: Vec<Product>,
}

/// One entry of the movers ticker.
#[derive(Debug, Clone, Serialize)]
pub struct Mover {
    pub id: i64,
    pub name: String,
    /// Signed price change; 0 when the backend reports none.
    pub delta: f64,
    pub up: bool,
    pub price: f64,
}

/// Partition the snapshot into category buckets.
///
/// Categories named in `preferred` (upper-cased labels) come first in the
/// given order; all others follow alphabetically. Products are alphabetical
/// by name within each bucket.
pub fn group_by_category(products: &[Product], preferred: &[String]) -> Vec<CategoryGroup> {
    let mut buckets: HashMap<String, Vec<Product>> = HashMap::new();
    for p in products {
        buckets.entry(p.category_label()).or_default().push(p.clone());
    }

    let mut groups: Vec<CategoryGroup> = buckets
        .into_iter()
        .map(|(category, mut products)| {
            products.sort_by(|a, b| a.name.cmp(&b.name));
            CategoryGroup { category, products }
        })
        .collect();

    let rank = |label: &str| {
        preferred
            .iter()
            .position(|c| c == label)
            .unwrap_or(usize::MAX)
    };
    groups.sort_by(|a, b| {
        rank(&a.category)
            .cmp(&rank(&b.category))
            .then_with(|| a.category.cmp(&b.category))
    });

    groups
}

/// Rank products by absolute price change, descending, keeping the top
/// `limit`. Equal deltas keep snapshot order (stable sort).
pub fn top_movers(products: &[Product], limit: usize) -> Vec<Mover> {
    let mut movers: Vec<Mover> = products
        .iter()
        .map(|p| Mover {
            id: p.id,
            name: p.name.clone(),
            delta: p.price_change.unwrap_or(0.0),
            up: p.price_up.unwrap_or(false),
            price: p.price,
        })
        .collect();

    movers.sort_by(|a, b| {
        b.delta
            .abs()
            .partial_cmp(&a.delta.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    movers.truncate(limit);
    movers
}
