// =============================================================================
// Selection/Rotation Controller — which product the TV chart shows
// =============================================================================
//
// Two modes: Auto (a timer advances the selection circularly) and Manual (the
// index only moves on an explicit pick). Starts in Auto. A manual pick always
// drops to Manual; the autoplay toggle flips modes at any time.
//
// On every snapshot refresh the selection is reconciled against the new
// product list: keep the same product id if it survived, otherwise fall back
// to the best seller, otherwise index 0.
// =============================================================================

use serde::Serialize;

use crate::types::Product;

/// Mutable selection state, owned by `AppState` behind a lock.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionState {
    /// Index into the current product snapshot. 0 on an empty snapshot
    /// (a null selection).
    pub index: usize,
    /// True in Auto mode.
    pub auto_rotate: bool,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            index: 0,
            auto_rotate: true,
        }
    }
}

impl SelectionState {
    /// The currently selected product, if the snapshot is non-empty.
    pub fn selected<'a>(&self, products: &'a [Product]) -> Option<&'a Product> {
        products.get(self.index)
    }

    /// Id of the currently selected product, if any.
    pub fn selected_id(&self, products: &[Product]) -> Option<i64> {
        self.selected(products).map(|p| p.id)
    }

    /// Advance the selection circularly by one. Only moves in Auto mode with
    /// more than one product; the rotation loop additionally gates on the
    /// same condition before calling this.
    pub fn advance(&mut self, product_count: usize) {
        if self.auto_rotate && product_count > 1 {
            self.index = (self.index + 1) % product_count;
        }
    }

    /// Explicit user pick: select the product with `id` and switch to Manual.
    /// Returns false (state unchanged) when the id is not in the snapshot.
    pub fn select_product(&mut self, products: &[Product], id: i64) -> bool {
        match products.iter().position(|p| p.id == id) {
            Some(idx) => {
                self.index = idx;
                self.auto_rotate = false;
                true
            }
            None => false,
        }
    }

    /// Reconcile the selection after a snapshot refresh.
    ///
    /// `previously_selected` is the id that was selected against the old
    /// snapshot (None when the old snapshot was empty). If that id survived,
    /// follow it to its new index; otherwise select the best seller; on an
    /// empty snapshot reset to 0.
    pub fn reconcile(&mut self, previously_selected: Option<i64>, products: &[Product]) {
        if let Some(id) = previously_selected {
            if let Some(idx) = products.iter().position(|p| p.id == id) {
                self.index = idx;
                return;
            }
        }
        if products.is_empty() {
            self.index = 0;
            return;
        }
        self.index = best_seller_index(products);
    }
}

/// Index of the product with the highest `salesCount`. Ties break in
/// snapshot order: the first maximum wins.
pub fn best_seller_index(products: &[Product]) -> usize {
    let mut best = 0;
    for (i, p) in products.iter().enumerate() {
        if p.sales_count() > products[best].sales_count() {
            best = i;
        }
    }
    best
}
