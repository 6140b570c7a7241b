//! Aggregated (Level-2) order book.
//!
//! `update_level` is the hot path: one binary search plus a splice, a
//! per-level observer event, and a coalesced top-of-book publication at
//! batch boundaries. The published top of book lives in a seqlock cell so
//! readers on other threads never block the writer.

use std::sync::Arc;

use crate::book::ladder::LevelLadder;
use crate::book::tob::{TobCell, TobSnapshot, TopOfBookReader};
use crate::book::{BookConfig, BookStats};
use crate::events::{PriceLevelUpdate, Trade, LAST_IN_BATCH, PRICE_CHANGED, QUANTITY_CHANGED};
use crate::observer::{BookObserver, ObserverSet};
use crate::types::{
    Price, PriceLevelL2, Quantity, SeqNum, Side, SymbolId, Timestamp, TopOfBook,
    INVALID_LEVEL_INDEX,
};

/// Level-2 book: one aggregate entry per price, per side.
///
/// Single writer per book; concurrent top-of-book readers go through the
/// seqlock (`get_top_of_book`, `get_best`, [`BookL2::top_of_book_reader`]).
#[derive(Debug)]
pub struct BookL2 {
    symbol: SymbolId,
    sides: [LevelLadder; 2],
    observers: ObserverSet,
    tob: Arc<TobCell>,
    cached_tob: TopOfBook,
    last_seq_num: SeqNum,
    change_starting_index: u16,
    stats: BookStats,
}

impl BookL2 {
    /// Create a book for `symbol` with default capacities.
    pub fn new(symbol: SymbolId) -> Self {
        Self::with_config(symbol, BookConfig::default())
    }

    /// Create a book for `symbol` with explicit capacities.
    pub fn with_config(symbol: SymbolId, config: BookConfig) -> Self {
        Self {
            symbol,
            sides: [
                LevelLadder::new(Side::Bid, config.level_capacity),
                LevelLadder::new(Side::Ask, config.level_capacity),
            ],
            observers: ObserverSet::new(),
            tob: Arc::new(TobCell::new(symbol)),
            cached_tob: TopOfBook::empty(symbol),
            last_seq_num: 0,
            change_starting_index: INVALID_LEVEL_INDEX,
            stats: BookStats::default(),
        }
    }

    /// Symbol this book tracks.
    #[inline]
    pub fn symbol(&self) -> SymbolId {
        self.symbol
    }

    /// Highest accepted sequence number (0 if untracked).
    #[inline]
    pub fn last_seq_num(&self) -> SeqNum {
        self.last_seq_num
    }

    /// Processing statistics.
    #[inline]
    pub fn stats(&self) -> &BookStats {
        &self.stats
    }

    /// Set, replace, or delete (quantity 0) the aggregate level at `price`.
    ///
    /// Emits a `PriceLevelUpdate` per applied change and, when the batch
    /// closes with the best level touched, a coalesced top-of-book event.
    /// Stale `seq_num`s (nonzero, below the highest accepted) are dropped
    /// silently.
    pub fn update_level(
        &mut self,
        side: Side,
        price: Price,
        quantity: Quantity,
        timestamp: Timestamp,
        seq_num: SeqNum,
        is_last_in_batch: bool,
    ) {
        if !self.accept_seq(seq_num) {
            return;
        }
        if quantity < 0 {
            return;
        }
        self.stats.updates_processed += 1;

        if quantity == 0 {
            let Some(level_idx) = self.sides[side.index()].find(price) else {
                return;
            };
            let level_idx_u16 = level_idx as u16;
            self.change_starting_index = self.change_starting_index.min(level_idx_u16);
            self.sides[side.index()].erase_at(level_idx);

            let mut change_flags = PRICE_CHANGED | QUANTITY_CHANGED;
            if is_last_in_batch {
                change_flags |= LAST_IN_BATCH;
            }
            self.observers.notify_price_level_update(&PriceLevelUpdate {
                symbol: self.symbol,
                side,
                price,
                quantity: 0,
                timestamp,
                level_index: level_idx_u16,
                change_flags,
                seq_num,
            });
        } else {
            let (level_idx, inserted) =
                self.sides[side.index()].insert_or_update(price, quantity, timestamp);
            let level_idx_u16 = level_idx as u16;
            self.change_starting_index = self.change_starting_index.min(level_idx_u16);

            let mut change_flags = if inserted {
                PRICE_CHANGED | QUANTITY_CHANGED
            } else {
                QUANTITY_CHANGED
            };
            if is_last_in_batch {
                change_flags |= LAST_IN_BATCH;
            }
            self.observers.notify_price_level_update(&PriceLevelUpdate {
                symbol: self.symbol,
                side,
                price,
                quantity,
                timestamp,
                level_index: level_idx_u16,
                change_flags,
                seq_num,
            });
        }

        if self.change_starting_index == 0 && is_last_in_batch {
            self.publish_tob_if_changed(timestamp);
            self.change_starting_index = INVALID_LEVEL_INDEX;
        }
    }

    /// Remove the level at `price` without emitting events.
    pub fn delete_level(&mut self, side: Side, price: Price) -> bool {
        self.sides[side.index()].erase(price)
    }

    /// Remove every level on one side without emitting events.
    pub fn clear_side(&mut self, side: Side) {
        self.sides[side.index()].clear();
    }

    /// Remove every level on both sides without emitting events.
    pub fn clear(&mut self) {
        self.sides[Side::Bid.index()].clear();
        self.sides[Side::Ask.index()].clear();
    }

    /// Last published best level for a side. Wait-free; may trail the
    /// containers until the next batch-closing update touches the top.
    pub fn get_best(&self, side: Side) -> Option<PriceLevelL2> {
        let snapshot = self.tob.read();
        let (price, level) = match side {
            Side::Bid => (snapshot.tob.best_bid, snapshot.best_bid),
            Side::Ask => (snapshot.tob.best_ask, snapshot.best_ask),
        };
        (price != 0).then_some(level)
    }

    /// Last published top-of-book snapshot. Wait-free.
    #[inline]
    pub fn get_top_of_book(&self) -> TopOfBook {
        self.tob.read().tob
    }

    /// A cloneable wait-free reader usable from other threads while this
    /// book is being written.
    pub fn top_of_book_reader(&self) -> TopOfBookReader {
        TopOfBookReader::new(Arc::clone(&self.tob))
    }

    /// Levels for one side, best first, up to `depth` (0 = all).
    pub fn get_levels(&self, side: Side, depth: usize) -> Vec<PriceLevelL2> {
        self.sides[side.index()].prefix(depth).to_vec()
    }

    /// Level at `price`, if present.
    pub fn get_level(&self, side: Side, price: Price) -> Option<PriceLevelL2> {
        let ladder = &self.sides[side.index()];
        ladder.find(price).and_then(|idx| ladder.get(idx)).copied()
    }

    /// Level at a best-first index.
    pub fn get_level_by_index(&self, side: Side, index: usize) -> Option<PriceLevelL2> {
        self.sides[side.index()].get(index).copied()
    }

    /// Number of levels on a side.
    #[inline]
    pub fn level_count(&self, side: Side) -> usize {
        self.sides[side.index()].len()
    }

    /// Check if one side has no levels.
    #[inline]
    pub fn is_side_empty(&self, side: Side) -> bool {
        self.sides[side.index()].is_empty()
    }

    /// Check if both sides are empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sides[Side::Bid.index()].is_empty() && self.sides[Side::Ask.index()].is_empty()
    }

    /// Replay the whole book to observers between `on_snapshot_begin` and
    /// `on_snapshot_end`, one `PriceLevelUpdate` per level.
    pub fn emit_snapshot(&self, timestamp: Timestamp) {
        self.observers
            .notify_snapshot_begin(self.symbol, self.last_seq_num, timestamp);

        for side in [Side::Bid, Side::Ask] {
            for (level_idx, level) in self.sides[side.index()].iter().enumerate() {
                self.observers.notify_price_level_update(&PriceLevelUpdate {
                    symbol: self.symbol,
                    side,
                    price: level.price,
                    quantity: level.quantity,
                    timestamp,
                    level_index: level_idx as u16,
                    change_flags: PRICE_CHANGED | QUANTITY_CHANGED,
                    seq_num: 0,
                });
            }
        }

        self.observers
            .notify_snapshot_end(self.symbol, self.last_seq_num, timestamp);
    }

    /// Route an externally produced trade through this book's observers.
    pub fn emit_trade(&self, trade: &Trade) {
        self.observers.notify_trade(trade);
    }

    /// Register an observer.
    pub fn add_observer(&mut self, observer: Arc<dyn BookObserver>) {
        self.observers.add(observer);
    }

    /// Remove an observer by identity. Returns true if found.
    pub fn remove_observer(&mut self, observer: &Arc<dyn BookObserver>) -> bool {
        self.observers.remove(observer)
    }

    /// Remove all observers.
    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    #[inline]
    fn accept_seq(&mut self, seq_num: SeqNum) -> bool {
        if seq_num > 0 {
            if seq_num < self.last_seq_num {
                log::debug!(
                    "symbol {}: dropping stale update seq={} < last={}",
                    self.symbol,
                    seq_num,
                    self.last_seq_num
                );
                self.stats.stale_rejections += 1;
                return false;
            }
            self.last_seq_num = seq_num;
        }
        true
    }

    fn publish_tob_if_changed(&mut self, timestamp: Timestamp) {
        let bid = self.sides[Side::Bid.index()].best().copied();
        let ask = self.sides[Side::Ask.index()].best().copied();

        let candidate = TopOfBook::new(
            self.symbol,
            bid.map_or(0, |l| l.price),
            bid.map_or(0, |l| l.quantity),
            ask.map_or(0, |l| l.price),
            ask.map_or(0, |l| l.quantity),
            timestamp,
        );

        let bid_changed = candidate.best_bid != self.cached_tob.best_bid
            || candidate.bid_quantity != self.cached_tob.bid_quantity;
        let ask_changed = candidate.best_ask != self.cached_tob.best_ask
            || candidate.ask_quantity != self.cached_tob.ask_quantity;

        if bid_changed || ask_changed {
            self.cached_tob = candidate;
            self.tob.publish(TobSnapshot {
                tob: candidate,
                best_bid: bid.unwrap_or_default(),
                best_ask: ask.unwrap_or_default(),
            });
            self.observers.notify_top_of_book_update(&candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYMBOL: SymbolId = 1;

    fn book() -> BookL2 {
        BookL2::new(SYMBOL)
    }

    fn update(book: &mut BookL2, side: Side, price: Price, quantity: Quantity, ts: Timestamp) {
        book.update_level(side, price, quantity, ts, 0, true);
    }

    // =========================================================================
    // State tests
    // =========================================================================

    #[test]
    fn test_initial_state() {
        let book = book();
        assert_eq!(book.symbol(), SYMBOL);
        assert!(book.is_empty());
        assert!(book.is_side_empty(Side::Bid));
        assert!(book.is_side_empty(Side::Ask));
        assert_eq!(book.level_count(Side::Bid), 0);
        assert!(book.get_best(Side::Bid).is_none());
        assert!(book.get_best(Side::Ask).is_none());
    }

    #[test]
    fn test_add_single_bid_level() {
        let mut book = book();
        update(&mut book, Side::Bid, 10000, 10, 1);

        assert!(!book.is_side_empty(Side::Bid));
        assert_eq!(book.level_count(Side::Bid), 1);

        let best = book.get_best(Side::Bid).unwrap();
        assert_eq!(best.price, 10000);
        assert_eq!(best.quantity, 10);
        assert_eq!(best.timestamp, 1);
    }

    #[test]
    fn test_bid_levels_sorted_descending() {
        let mut book = book();
        update(&mut book, Side::Bid, 10000, 10, 1);
        update(&mut book, Side::Bid, 10200, 20, 1);
        update(&mut book, Side::Bid, 9900, 30, 1);

        let levels = book.get_levels(Side::Bid, 0);
        let prices: Vec<Price> = levels.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![10200, 10000, 9900]);
        assert_eq!(book.get_best(Side::Bid).unwrap().price, 10200);
    }

    #[test]
    fn test_ask_levels_sorted_ascending() {
        let mut book = book();
        update(&mut book, Side::Ask, 10000, 10, 1);
        update(&mut book, Side::Ask, 10200, 20, 1);
        update(&mut book, Side::Ask, 9900, 30, 1);

        let levels = book.get_levels(Side::Ask, 0);
        let prices: Vec<Price> = levels.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![9900, 10000, 10200]);
        assert_eq!(book.get_best(Side::Ask).unwrap().price, 9900);
    }

    #[test]
    fn test_update_existing_level() {
        let mut book = book();
        update(&mut book, Side::Bid, 10000, 10, 1);
        update(&mut book, Side::Bid, 10000, 20, 2);

        assert_eq!(book.level_count(Side::Bid), 1);
        let best = book.get_best(Side::Bid).unwrap();
        assert_eq!(best.quantity, 20);
        assert_eq!(best.timestamp, 2);
    }

    #[test]
    fn test_zero_quantity_deletes_level() {
        let mut book = book();
        update(&mut book, Side::Bid, 10000, 10, 1);
        update(&mut book, Side::Bid, 10100, 20, 1);

        update(&mut book, Side::Bid, 10100, 0, 2);
        assert_eq!(book.level_count(Side::Bid), 1);
        assert_eq!(book.get_best(Side::Bid).unwrap().price, 10000);

        // Deleting an absent level is a no-op.
        update(&mut book, Side::Bid, 5000, 0, 3);
        assert_eq!(book.level_count(Side::Bid), 1);
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let mut book = book();
        update(&mut book, Side::Bid, 10000, -5, 1);
        assert!(book.is_empty());
    }

    #[test]
    fn test_delete_level_explicit() {
        let mut book = book();
        update(&mut book, Side::Ask, 10000, 10, 1);
        assert!(book.delete_level(Side::Ask, 10000));
        assert!(!book.delete_level(Side::Ask, 10000));
        assert!(book.is_side_empty(Side::Ask));
    }

    #[test]
    fn test_clear_and_clear_side() {
        let mut book = book();
        update(&mut book, Side::Bid, 10000, 10, 1);
        update(&mut book, Side::Ask, 10100, 20, 1);

        book.clear_side(Side::Bid);
        assert!(book.is_side_empty(Side::Bid));
        assert!(!book.is_side_empty(Side::Ask));

        book.clear();
        assert!(book.is_empty());
    }

    #[test]
    fn test_get_level_queries() {
        let mut book = book();
        update(&mut book, Side::Bid, 10000, 10, 1);
        update(&mut book, Side::Bid, 10100, 20, 1);

        assert_eq!(book.get_level(Side::Bid, 10000).unwrap().quantity, 10);
        assert!(book.get_level(Side::Bid, 12345).is_none());
        assert_eq!(book.get_level_by_index(Side::Bid, 0).unwrap().price, 10100);
        assert_eq!(book.get_level_by_index(Side::Bid, 1).unwrap().price, 10000);
        assert!(book.get_level_by_index(Side::Bid, 2).is_none());
        assert_eq!(book.get_levels(Side::Bid, 1).len(), 1);
    }

    // =========================================================================
    // Sequence number tests
    // =========================================================================

    #[test]
    fn test_stale_seq_rejected_silently() {
        let mut book = book();
        book.update_level(Side::Bid, 10000, 10, 1, 100, true);
        assert_eq!(book.last_seq_num(), 100);

        book.update_level(Side::Bid, 10100, 20, 2, 99, true);
        assert_eq!(book.level_count(Side::Bid), 1);
        assert_eq!(book.last_seq_num(), 100);
        assert_eq!(book.stats().stale_rejections, 1);

        // Equal and larger sequence numbers pass.
        book.update_level(Side::Bid, 10100, 20, 3, 100, true);
        book.update_level(Side::Bid, 10200, 30, 4, 101, true);
        assert_eq!(book.level_count(Side::Bid), 3);
        assert_eq!(book.last_seq_num(), 101);
    }

    #[test]
    fn test_zero_seq_bypasses_tracking() {
        let mut book = book();
        book.update_level(Side::Bid, 10000, 10, 1, 100, true);
        book.update_level(Side::Bid, 10100, 20, 2, 0, true);
        assert_eq!(book.level_count(Side::Bid), 2);
        assert_eq!(book.last_seq_num(), 100);
    }

    // =========================================================================
    // Top-of-book tests
    // =========================================================================

    #[test]
    fn test_tob_published_on_best_change() {
        let mut book = book();
        update(&mut book, Side::Bid, 10000, 10, 1);
        update(&mut book, Side::Ask, 10010, 20, 2);

        let tob = book.get_top_of_book();
        assert_eq!(tob.best_bid, 10000);
        assert_eq!(tob.bid_quantity, 10);
        assert_eq!(tob.best_ask, 10010);
        assert_eq!(tob.ask_quantity, 20);
        assert_eq!(tob.timestamp, 2);
    }

    #[test]
    fn test_tob_not_republished_for_deep_levels() {
        let mut book = book();
        update(&mut book, Side::Bid, 10000, 10, 1);
        // Worse level: published ToB must not move.
        update(&mut book, Side::Bid, 9900, 50, 2);

        let tob = book.get_top_of_book();
        assert_eq!(tob.best_bid, 10000);
        assert_eq!(tob.timestamp, 1);
    }

    #[test]
    fn test_tob_after_best_deleted() {
        let mut book = book();
        update(&mut book, Side::Bid, 10000, 10, 1);
        update(&mut book, Side::Bid, 9900, 30, 2);
        update(&mut book, Side::Bid, 10000, 0, 3);

        let tob = book.get_top_of_book();
        assert_eq!(tob.best_bid, 9900);
        assert_eq!(tob.bid_quantity, 30);
    }

    #[test]
    fn test_reader_handle_tracks_writer() {
        let mut book = book();
        let reader = book.top_of_book_reader();
        assert_eq!(reader.top_of_book().best_bid, 0);

        update(&mut book, Side::Bid, 10000, 10, 1);
        assert_eq!(reader.top_of_book().best_bid, 10000);
        assert_eq!(reader.best(Side::Bid).unwrap().quantity, 10);
        assert!(reader.best(Side::Ask).is_none());
    }

    #[test]
    fn test_batched_updates_defer_tob() {
        let mut book = book();
        book.update_level(Side::Bid, 10000, 10, 1, 0, false);
        // Not yet published: batch still open.
        assert_eq!(book.get_top_of_book().best_bid, 0);

        book.update_level(Side::Bid, 10000, 25, 2, 0, true);
        let tob = book.get_top_of_book();
        assert_eq!(tob.best_bid, 10000);
        assert_eq!(tob.bid_quantity, 25);
    }

    #[test]
    fn test_batch_not_touching_best_suppresses_tob() {
        let mut book = book();
        update(&mut book, Side::Bid, 10000, 10, 1);

        // Whole batch below the best: published ToB stays put.
        book.update_level(Side::Bid, 9900, 5, 2, 0, false);
        book.update_level(Side::Bid, 9800, 5, 3, 0, true);
        assert_eq!(book.get_top_of_book().timestamp, 1);
        assert_eq!(book.level_count(Side::Bid), 3);
    }
}
