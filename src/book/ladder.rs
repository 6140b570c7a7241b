//! Sorted per-side ladder of aggregated price levels.
//!
//! A contiguous sorted `Vec` beats pointer-based maps at the depths seen in
//! practice (tens to low hundreds of levels): lookups are a binary search
//! over one cache-friendly allocation and the best level is always at
//! index 0. Bids sort descending, asks ascending.

use crate::types::{Price, PriceLevelL2, Quantity, Side, Timestamp};

/// Price-sorted sequence of [`PriceLevelL2`] for one side of a book.
#[derive(Debug, Clone)]
pub struct LevelLadder {
    side: Side,
    levels: Vec<PriceLevelL2>,
}

impl LevelLadder {
    /// Create an empty ladder for a side with the given initial capacity.
    pub fn new(side: Side, capacity: usize) -> Self {
        Self {
            side,
            levels: Vec::with_capacity(capacity),
        }
    }

    /// The side this ladder stores.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Number of levels.
    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if the ladder has no levels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Best level (index 0), if any.
    #[inline]
    pub fn best(&self) -> Option<&PriceLevelL2> {
        self.levels.first()
    }

    /// Level at a best-first index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&PriceLevelL2> {
        self.levels.get(index)
    }

    /// All levels, best first.
    #[inline]
    pub fn as_slice(&self) -> &[PriceLevelL2] {
        &self.levels
    }

    /// Top `depth` levels, best first (0 = all).
    pub fn prefix(&self, depth: usize) -> &[PriceLevelL2] {
        if depth == 0 || depth >= self.levels.len() {
            &self.levels
        } else {
            &self.levels[..depth]
        }
    }

    /// Whether `a` sorts before `b` on this side.
    #[inline(always)]
    fn sorts_before(&self, a: Price, b: Price) -> bool {
        match self.side {
            Side::Bid => a > b,
            Side::Ask => a < b,
        }
    }

    /// Index of the first level not sorting before `price`.
    #[inline]
    fn lower_bound(&self, price: Price) -> usize {
        self.levels
            .partition_point(|level| self.sorts_before(level.price, price))
    }

    /// Find the index of the level at `price`.
    #[inline]
    pub fn find(&self, price: Price) -> Option<usize> {
        let idx = self.lower_bound(price);
        (idx < self.levels.len() && self.levels[idx].price == price).then_some(idx)
    }

    /// Insert a new level or overwrite the existing one at `price`.
    ///
    /// Returns the level's best-first index and whether a new level was
    /// spliced in.
    pub fn insert_or_update(
        &mut self,
        price: Price,
        quantity: Quantity,
        timestamp: Timestamp,
    ) -> (usize, bool) {
        let idx = self.lower_bound(price);
        if idx < self.levels.len() && self.levels[idx].price == price {
            self.levels[idx].quantity = quantity;
            self.levels[idx].timestamp = timestamp;
            (idx, false)
        } else {
            self.levels
                .insert(idx, PriceLevelL2::new(price, quantity, timestamp));
            (idx, true)
        }
    }

    /// Remove the level at `price`. Returns true if it existed.
    pub fn erase(&mut self, price: Price) -> bool {
        if let Some(idx) = self.find(price) {
            self.levels.remove(idx);
            true
        } else {
            false
        }
    }

    /// Remove the level at a best-first index.
    pub fn erase_at(&mut self, index: usize) {
        self.levels.remove(index);
    }

    /// Remove all levels.
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Iterate levels best-first.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, PriceLevelL2> {
        self.levels.iter()
    }
}
