//! Order-granular (Level-3) book.
//!
//! Every resting order is tracked individually with price-time priority
//! inside its level's queue; the aggregated L2 view falls out of the
//! levels' cached totals. Orders live in the slab pool and are addressed
//! by handle from both the order map and the level queues.
//!
//! Top-of-book queries compute from the best level of each side; the
//! cached last-published value only drives change detection so one batch
//! coalesces to at most one top-of-book notification.

use std::sync::Arc;

use ahash::AHashMap;

use crate::book::level::{LevelMap, OrderIter, PriceLevelL3};
use crate::book::pool::{Order, OrderHandle, OrderPool, NULL_HANDLE};
use crate::book::{BookConfig, BookStats};
use crate::error::validate_order_args;
use crate::events::{
    OrderUpdate, PriceLevelUpdate, Trade, LAST_IN_BATCH, PRICE_CHANGED, QUANTITY_CHANGED,
};
use crate::observer::{BookObserver, ObserverSet};
use crate::types::{
    OrderId, Price, PriceLevelL2, Quantity, SeqNum, Side, SymbolId, Timestamp, TopOfBook,
    INVALID_LEVEL_INDEX,
};

/// Level-3 book: order-by-order state with an aggregated view on demand.
///
/// Single writer per book. Reads require a quiescent writer or external
/// synchronization.
#[derive(Debug)]
pub struct BookL3 {
    symbol: SymbolId,
    sides: [LevelMap; 2],
    order_map: AHashMap<OrderId, OrderHandle>,
    pool: OrderPool,
    observers: ObserverSet,
    cached_tob: TopOfBook,
    last_seq_num: SeqNum,
    stats: BookStats,
}

impl BookL3 {
    /// Create a book for `symbol` with default capacities.
    pub fn new(symbol: SymbolId) -> Self {
        Self::with_config(symbol, BookConfig::default())
    }

    /// Create a book for `symbol` with explicit capacities.
    pub fn with_config(symbol: SymbolId, config: BookConfig) -> Self {
        Self {
            symbol,
            sides: [
                LevelMap::new(Side::Bid, config.level_capacity),
                LevelMap::new(Side::Ask, config.level_capacity),
            ],
            order_map: AHashMap::with_capacity(config.order_capacity),
            pool: OrderPool::new(config.order_capacity),
            observers: ObserverSet::new(),
            cached_tob: TopOfBook::empty(symbol),
            last_seq_num: 0,
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

    /// Add a new order, or modify the existing order with this id.
    ///
    /// An existing order must be on the same side (id reuse across sides
    /// is rejected). `quantity == 0` deletes; identical price and quantity
    /// is an idempotent no-op. New orders are gated through
    /// [`validate_order_args`]; returns false on stale sequence, invalid
    /// arguments, or side mismatch.
    pub fn add_or_modify_order(
        &mut self,
        order_id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
        timestamp: Timestamp,
        priority: u64,
        seq_num: SeqNum,
        is_last_in_batch: bool,
    ) -> bool {
        if !self.accept_seq(seq_num) {
            return false;
        }

        if let Some(&handle) = self.order_map.get(&order_id) {
            let order = self.pool.get(handle);
            if order.side != side {
                log::warn!(
                    "symbol {}: order {} re-used across sides, rejecting",
                    self.symbol,
                    order_id
                );
                return false;
            }
            if quantity <= 0 {
                return if quantity == 0 {
                    self.delete_order(order_id, seq_num, is_last_in_batch)
                } else {
                    false
                };
            }
            if order.price == price && order.quantity == quantity {
                // Idempotent update, nothing to do.
                return true;
            }
            self.pool.get_mut(handle).timestamp = timestamp;
            return self.modify_order(order_id, price, quantity, seq_num, is_last_in_batch);
        }

        if validate_order_args(order_id, price, quantity).is_err() {
            return false;
        }

        let handle = self
            .pool
            .alloc(order_id, price, quantity, side, timestamp, priority);
        if handle == NULL_HANDLE {
            return false;
        }

        let (level_idx, is_new) = self.sides[side.index()].get_or_create(price);
        self.sides[side.index()]
            .get_mut(level_idx)
            .insert_order(&mut self.pool, handle);
        self.order_map.insert(order_id, handle);
        self.stats.updates_processed += 1;

        let mut order_flags = PRICE_CHANGED | QUANTITY_CHANGED;
        let mut level_flags = QUANTITY_CHANGED;
        if is_new {
            level_flags |= PRICE_CHANGED;
        }
        if is_last_in_batch {
            order_flags |= LAST_IN_BATCH;
            level_flags |= LAST_IN_BATCH;
        }

        let level_total = self.sides[side.index()].get(level_idx).unwrap().total_quantity();
        self.notify_order_update(handle, timestamp, level_idx as u16, order_flags, seq_num);
        self.notify_price_level_update(
            side,
            price,
            level_total,
            timestamp,
            level_idx as u16,
            level_flags,
            seq_num,
        );
        self.publish_tob_if_changed(timestamp, order_flags);

        true
    }

    /// Strict add: fails if the id is already present.
    ///
    /// A `priority` of 0 substitutes the timestamp (price-time priority).
    pub fn add_order(
        &mut self,
        order_id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
        timestamp: Timestamp,
        priority: u64,
        seq_num: SeqNum,
        is_last_in_batch: bool,
    ) -> bool {
        if !self.accept_seq(seq_num) {
            return false;
        }
        if self.order_map.contains_key(&order_id) {
            return false;
        }
        let priority = if priority == 0 { timestamp } else { priority };
        self.add_or_modify_order(
            order_id,
            side,
            price,
            quantity,
            timestamp,
            priority,
            seq_num,
            is_last_in_batch,
        )
    }

    /// Change an order's price and/or quantity. `new_quantity == 0`
    /// deletes. Notifications reuse the order's stored timestamp.
    pub fn modify_order(
        &mut self,
        order_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
        seq_num: SeqNum,
        is_last_in_batch: bool,
    ) -> bool {
        if !self.accept_seq(seq_num) {
            return false;
        }
        let Some(&handle) = self.order_map.get(&order_id) else {
            return false;
        };
        if new_quantity < 0 {
            return false;
        }
        if new_quantity == 0 {
            return self.delete_order(order_id, seq_num, is_last_in_batch);
        }

        let (timestamp, old_price, old_quantity, side) = {
            let order = self.pool.get(handle);
            (order.timestamp, order.price, order.quantity, order.side)
        };

        let price_changed = new_price != old_price;
        let quantity_changed = new_quantity != old_quantity;
        if !price_changed && !quantity_changed {
            return true;
        }
        self.stats.updates_processed += 1;

        if price_changed {
            // Remove from the old level; its update never closes the batch.
            if let Some(old_idx) = self.sides[side.index()].find(old_price) {
                self.sides[side.index()]
                    .get_mut(old_idx)
                    .remove_order(&mut self.pool, handle);
                let old_total = self.sides[side.index()].get(old_idx).unwrap().total_quantity();

                let mut old_level_flags = QUANTITY_CHANGED;
                if self.sides[side.index()].remove_if_empty(old_price) {
                    old_level_flags |= PRICE_CHANGED;
                }
                self.notify_price_level_update(
                    side,
                    old_price,
                    old_total,
                    timestamp,
                    old_idx as u16,
                    old_level_flags,
                    seq_num,
                );
            }

            {
                let order = self.pool.get_mut(handle);
                order.price = new_price;
                order.quantity = new_quantity;
            }

            let (new_idx, is_new) = self.sides[side.index()].get_or_create(new_price);
            self.sides[side.index()]
                .get_mut(new_idx)
                .insert_order(&mut self.pool, handle);

            let mut order_flags = PRICE_CHANGED;
            if quantity_changed {
                order_flags |= QUANTITY_CHANGED;
            }
            let mut level_flags = QUANTITY_CHANGED;
            if is_new {
                level_flags |= PRICE_CHANGED;
            }
            if is_last_in_batch {
                order_flags |= LAST_IN_BATCH;
                level_flags |= LAST_IN_BATCH;
            }

            let new_total = self.sides[side.index()].get(new_idx).unwrap().total_quantity();
            self.notify_order_update(handle, timestamp, new_idx as u16, order_flags, seq_num);
            self.notify_price_level_update(
                side,
                new_price,
                new_total,
                timestamp,
                new_idx as u16,
                level_flags,
                seq_num,
            );
            self.publish_tob_if_changed(timestamp, order_flags);
        } else {
            let (level_idx, is_new) = self.sides[side.index()].get_or_create(old_price);
            self.sides[side.index()]
                .get_mut(level_idx)
                .update_quantity(old_quantity, new_quantity);
            self.pool.get_mut(handle).quantity = new_quantity;

            let mut order_flags = QUANTITY_CHANGED;
            let mut level_flags = QUANTITY_CHANGED;
            if is_new {
                level_flags |= PRICE_CHANGED;
            }
            if is_last_in_batch {
                order_flags |= LAST_IN_BATCH;
                level_flags |= LAST_IN_BATCH;
            }

            let level_total = self.sides[side.index()].get(level_idx).unwrap().total_quantity();
            self.notify_order_update(handle, timestamp, level_idx as u16, order_flags, seq_num);
            self.notify_price_level_update(
                side,
                old_price,
                level_total,
                timestamp,
                level_idx as u16,
                level_flags,
                seq_num,
            );
            self.publish_tob_if_changed(timestamp, order_flags);
        }

        true
    }

    /// Remove an order from the book and return it to the pool.
    pub fn delete_order(
        &mut self,
        order_id: OrderId,
        seq_num: SeqNum,
        is_last_in_batch: bool,
    ) -> bool {
        if !self.accept_seq(seq_num) {
            return false;
        }
        let Some(&handle) = self.order_map.get(&order_id) else {
            return false;
        };

        let order = *self.pool.get(handle);
        let side = order.side;
        let price = order.price;
        let timestamp = order.timestamp;

        let Some(level_idx) = self.sides[side.index()].find(price) else {
            // Order tracked but its level is gone: emit the deletion with
            // an invalid index and drop the record.
            log::warn!(
                "symbol {}: order {} has no level at price {}, dropping",
                self.symbol,
                order_id,
                price
            );
            let mut order_flags = PRICE_CHANGED | QUANTITY_CHANGED;
            if is_last_in_batch {
                order_flags |= LAST_IN_BATCH;
            }
            self.notify_order_delete(&order, timestamp, INVALID_LEVEL_INDEX, order_flags, seq_num);
            self.order_map.remove(&order_id);
            self.pool.free(handle);
            return false;
        };

        self.sides[side.index()]
            .get_mut(level_idx)
            .remove_order(&mut self.pool, handle);
        let level_total = self.sides[side.index()].get(level_idx).unwrap().total_quantity();
        self.order_map.remove(&order_id);
        self.stats.updates_processed += 1;

        let mut order_flags = PRICE_CHANGED | QUANTITY_CHANGED;
        let mut level_flags = QUANTITY_CHANGED;
        if self.sides[side.index()].remove_if_empty(price) {
            level_flags |= PRICE_CHANGED;
        }
        if is_last_in_batch {
            order_flags |= LAST_IN_BATCH;
            level_flags |= LAST_IN_BATCH;
        }

        self.notify_order_delete(&order, timestamp, level_idx as u16, order_flags, seq_num);
        self.notify_price_level_update(
            side,
            price,
            level_total,
            timestamp,
            level_idx as u16,
            level_flags,
            seq_num,
        );
        self.pool.free(handle);
        self.publish_tob_if_changed(timestamp, order_flags);

        true
    }

    /// Execute (fill) part or all of an order. A full fill deletes it,
    /// a partial fill reduces its quantity in place. The executed quantity
    /// must satisfy `0 < executed_quantity <= resting`; violations return
    /// false and assert in debug builds.
    pub fn execute_order(
        &mut self,
        order_id: OrderId,
        executed_quantity: Quantity,
        seq_num: SeqNum,
        is_last_in_batch: bool,
    ) -> bool {
        if !self.accept_seq(seq_num) {
            return false;
        }
        let Some(&handle) = self.order_map.get(&order_id) else {
            return false;
        };

        let (price, quantity) = {
            let order = self.pool.get(handle);
            (order.price, order.quantity)
        };
        if executed_quantity <= 0 || executed_quantity > quantity {
            debug_assert!(
                executed_quantity > 0 && executed_quantity <= quantity,
                "executed quantity {executed_quantity} out of range for order {order_id} (resting {quantity})"
            );
            return false;
        }

        let remaining = quantity - executed_quantity;
        if remaining == 0 {
            self.delete_order(order_id, seq_num, is_last_in_batch)
        } else {
            self.modify_order(order_id, price, remaining, seq_num, is_last_in_batch)
        }
    }

    /// Look up an order by id.
    pub fn find_order(&self, order_id: OrderId) -> Option<&Order> {
        self.order_map.get(&order_id).map(|&h| self.pool.get(h))
    }

    /// Best level on a side as an aggregate.
    pub fn get_best(&self, side: Side) -> Option<PriceLevelL2> {
        self.sides[side.index()].best().map(|level| {
            PriceLevelL2::new(
                level.price,
                level.total_quantity(),
                level.front_timestamp(&self.pool),
            )
        })
    }

    /// Top of book computed from the best level of each side. The
    /// timestamp is the later of the two head orders' timestamps.
    pub fn get_top_of_book(&self) -> TopOfBook {
        let mut tob = TopOfBook::empty(self.symbol);
        if let Some(bid) = self.sides[Side::Bid.index()].best() {
            tob.best_bid = bid.price;
            tob.bid_quantity = bid.total_quantity();
            tob.timestamp = bid.front_timestamp(&self.pool);
        }
        if let Some(ask) = self.sides[Side::Ask.index()].best() {
            tob.best_ask = ask.price;
            tob.ask_quantity = ask.total_quantity();
            let ask_ts = ask.front_timestamp(&self.pool);
            if ask_ts > tob.timestamp {
                tob.timestamp = ask_ts;
            }
        }
        tob
    }

    /// Aggregated L2 view of a side, best first, up to `depth` (0 = all).
    pub fn get_levels_l2(&self, side: Side, depth: usize) -> Vec<PriceLevelL2> {
        let levels = self.sides[side.index()].as_slice();
        let count = if depth == 0 {
            levels.len()
        } else {
            depth.min(levels.len())
        };
        levels[..count]
            .iter()
            .map(|level| {
                PriceLevelL2::new(
                    level.price,
                    level.total_quantity(),
                    level.front_timestamp(&self.pool),
                )
            })
            .collect()
    }

    /// Order-granular levels of a side, best first.
    #[inline]
    pub fn get_levels_l3(&self, side: Side) -> &[PriceLevelL3] {
        self.sides[side.index()].as_slice()
    }

    /// Level at `price` with its best-first index.
    pub fn get_level(&self, side: Side, price: Price) -> Option<(&PriceLevelL3, u16)> {
        let map = &self.sides[side.index()];
        map.find(price).map(|idx| (map.get(idx).unwrap(), idx as u16))
    }

    /// Iterate a level's orders in priority order.
    #[inline]
    pub fn orders_in<'a>(&'a self, level: &PriceLevelL3) -> OrderIter<'a> {
        level.orders.iter(&self.pool)
    }

    /// Number of levels on a side.
    #[inline]
    pub fn level_count(&self, side: Side) -> usize {
        self.sides[side.index()].len()
    }

    /// Total number of resting orders.
    #[inline]
    pub fn order_count(&self) -> usize {
        self.order_map.len()
    }

    /// Number of resting orders on one side.
    pub fn order_count_on(&self, side: Side) -> usize {
        self.sides[side.index()]
            .iter()
            .map(|level| level.order_count())
            .sum()
    }

    /// Check if one side has no orders.
    #[inline]
    pub fn is_side_empty(&self, side: Side) -> bool {
        self.sides[side.index()].is_empty()
    }

    /// Check if both sides are empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sides[Side::Bid.index()].is_empty() && self.sides[Side::Ask.index()].is_empty()
    }

    /// Drop every order on one side without emitting events.
    pub fn clear_side(&mut self, side: Side) {
        let levels = &mut self.sides[side.index()];
        for level in levels.iter_mut() {
            let mut cursor = level.orders.front();
            while cursor != NULL_HANDLE {
                let next = self.pool.get(cursor).next;
                let order_id = self.pool.get(cursor).order_id;
                self.order_map.remove(&order_id);
                self.pool.free(cursor);
                cursor = next;
            }
        }
        levels.clear();
    }

    /// Drop every order on both sides without emitting events.
    pub fn clear(&mut self) {
        self.clear_side(Side::Bid);
        self.clear_side(Side::Ask);
    }

    /// Replay the whole book to observers between `on_snapshot_begin` and
    /// `on_snapshot_end`, one `OrderUpdate` per resting order, levels
    /// best-first and orders in priority order.
    pub fn emit_snapshot(&self, timestamp: Timestamp) {
        self.observers
            .notify_snapshot_begin(self.symbol, self.last_seq_num, timestamp);

        for side in [Side::Bid, Side::Ask] {
            for (level_idx, level) in self.sides[side.index()].iter().enumerate() {
                for order in level.orders.iter(&self.pool) {
                    self.observers.notify_order_update(&OrderUpdate {
                        symbol: self.symbol,
                        order_id: order.order_id,
                        side: order.side,
                        price: order.price,
                        quantity: order.quantity,
                        timestamp,
                        price_level_index: level_idx as u16,
                        priority: order.priority,
                        change_flags: PRICE_CHANGED | QUANTITY_CHANGED,
                        seq_num: 0,
                    });
                }
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

    fn notify_order_update(
        &self,
        handle: OrderHandle,
        timestamp: Timestamp,
        level_index: u16,
        change_flags: u8,
        seq_num: SeqNum,
    ) {
        let order = self.pool.get(handle);
        self.observers.notify_order_update(&OrderUpdate {
            symbol: self.symbol,
            order_id: order.order_id,
            side: order.side,
            price: order.price,
            quantity: order.quantity,
            timestamp,
            price_level_index: level_index,
            priority: order.priority,
            change_flags,
            seq_num,
        });
    }

    fn notify_order_delete(
        &self,
        order: &Order,
        timestamp: Timestamp,
        level_index: u16,
        change_flags: u8,
        seq_num: SeqNum,
    ) {
        self.observers.notify_order_update(&OrderUpdate {
            symbol: self.symbol,
            order_id: order.order_id,
            side: order.side,
            price: order.price,
            quantity: 0,
            timestamp,
            price_level_index: level_index,
            priority: order.priority,
            change_flags,
            seq_num,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn notify_price_level_update(
        &self,
        side: Side,
        price: Price,
        total_quantity: Quantity,
        timestamp: Timestamp,
        level_index: u16,
        change_flags: u8,
        seq_num: SeqNum,
    ) {
        self.observers.notify_price_level_update(&PriceLevelUpdate {
            symbol: self.symbol,
            side,
            price,
            quantity: total_quantity,
            timestamp,
            level_index,
            change_flags,
            seq_num,
        });
    }

    /// Emit a top-of-book notification iff the closing update of a batch
    /// left the top different from the last published value.
    fn publish_tob_if_changed(&mut self, timestamp: Timestamp, update_flags: u8) {
        if update_flags & LAST_IN_BATCH == 0 {
            return;
        }

        let bid = self.sides[Side::Bid.index()].best();
        let ask = self.sides[Side::Ask.index()].best();
        let candidate = TopOfBook::new(
            self.symbol,
            bid.map_or(0, |l| l.price),
            bid.map_or(0, |l| l.total_quantity()),
            ask.map_or(0, |l| l.price),
            ask.map_or(0, |l| l.total_quantity()),
            timestamp,
        );

        let bid_changed = candidate.best_bid != self.cached_tob.best_bid
            || candidate.bid_quantity != self.cached_tob.bid_quantity;
        let ask_changed = candidate.best_ask != self.cached_tob.best_ask
            || candidate.ask_quantity != self.cached_tob.ask_quantity;

        if bid_changed || ask_changed {
            self.cached_tob = candidate;
            self.observers.notify_top_of_book_update(&candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYMBOL: SymbolId = 1;

    fn book() -> BookL3 {
        BookL3::new(SYMBOL)
    }

    fn add(book: &mut BookL3, id: OrderId, side: Side, price: Price, qty: Quantity, prio: u64) -> bool {
        book.add_order(id, side, price, qty, prio, prio, 0, true)
    }

    // =========================================================================
    // Add / lookup
    // =========================================================================

    #[test]
    fn test_initial_state() {
        let book = book();
        assert!(book.is_empty());
        assert_eq!(book.order_count(), 0);
        assert_eq!(book.level_count(Side::Bid), 0);
        assert!(book.find_order(1).is_none());
        assert!(book.get_best(Side::Bid).is_none());
    }

    #[test]
    fn test_add_order() {
        let mut book = book();
        assert!(add(&mut book, 1, Side::Bid, 10000, 10, 1));

        assert_eq!(book.order_count(), 1);
        assert_eq!(book.order_count_on(Side::Bid), 1);
        assert_eq!(book.level_count(Side::Bid), 1);

        let order = book.find_order(1).unwrap();
        assert_eq!(order.price, 10000);
        assert_eq!(order.quantity, 10);
        assert_eq!(order.side, Side::Bid);

        let best = book.get_best(Side::Bid).unwrap();
        assert_eq!(best.price, 10000);
        assert_eq!(best.quantity, 10);
    }

    #[test]
    fn test_strict_add_rejects_duplicate() {
        let mut book = book();
        assert!(add(&mut book, 1, Side::Bid, 10000, 10, 1));
        assert!(!add(&mut book, 1, Side::Bid, 10100, 20, 2));
        assert_eq!(book.order_count(), 1);
        assert_eq!(book.find_order(1).unwrap().price, 10000);
    }

    #[test]
    fn test_add_rejects_non_positive_quantity() {
        let mut book = book();
        assert!(!add(&mut book, 1, Side::Bid, 10000, 0, 1));
        assert!(!add(&mut book, 1, Side::Bid, 10000, -5, 1));
        assert!(book.is_empty());
    }

    #[test]
    fn test_add_rejects_invalid_id_and_price() {
        let mut book = book();
        assert!(!add(&mut book, 0, Side::Bid, 10000, 10, 1));
        assert!(!add(&mut book, 1, Side::Bid, 0, 10, 1));
        assert!(!add(&mut book, 1, Side::Bid, -100, 10, 1));
        assert!(book.is_empty());
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn test_priority_zero_uses_timestamp() {
        let mut book = book();
        assert!(book.add_order(1, Side::Bid, 10000, 10, 777, 0, 0, true));
        assert_eq!(book.find_order(1).unwrap().priority, 777);
    }

    #[test]
    fn test_priority_ordering_at_level() {
        let mut book = book();
        // Arrive with priorities 2, 1, 3.
        add(&mut book, 2, Side::Bid, 10000, 20, 2);
        add(&mut book, 1, Side::Bid, 10000, 10, 1);
        add(&mut book, 3, Side::Bid, 10000, 30, 3);

        let (level, idx) = book.get_level(Side::Bid, 10000).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(level.total_quantity(), 60);
        let ids: Vec<OrderId> = book.orders_in(level).map(|o| o.order_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_side_mismatch_rejected() {
        let mut book = book();
        add(&mut book, 1, Side::Bid, 10000, 10, 1);
        assert!(!book.add_or_modify_order(1, Side::Ask, 10000, 20, 2, 2, 0, true));
        assert_eq!(book.find_order(1).unwrap().quantity, 10);
        assert_eq!(book.order_count_on(Side::Ask), 0);
    }

    #[test]
    fn test_add_or_modify_idempotent() {
        let mut book = book();
        book.add_or_modify_order(1, Side::Bid, 10000, 10, 1, 1, 0, true);
        assert!(book.add_or_modify_order(1, Side::Bid, 10000, 10, 2, 1, 0, true));
        assert_eq!(book.order_count(), 1);
        assert_eq!(book.find_order(1).unwrap().quantity, 10);
        // Timestamp is untouched on the idempotent path.
        assert_eq!(book.find_order(1).unwrap().timestamp, 1);
    }

    // =========================================================================
    // Modify
    // =========================================================================

    #[test]
    fn test_modify_quantity_only() {
        let mut book = book();
        add(&mut book, 1, Side::Bid, 10000, 10, 1);
        add(&mut book, 2, Side::Bid, 10000, 20, 2);

        assert!(book.modify_order(1, 10000, 15, 0, true));
        assert_eq!(book.find_order(1).unwrap().quantity, 15);
        let (level, _) = book.get_level(Side::Bid, 10000).unwrap();
        assert_eq!(level.total_quantity(), 35);
        // Queue position is preserved on quantity-only changes.
        let ids: Vec<OrderId> = book.orders_in(level).map(|o| o.order_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_modify_price_moves_levels() {
        let mut book = book();
        add(&mut book, 1, Side::Bid, 10000, 10, 1);

        assert!(book.modify_order(1, 10100, 10, 0, true));
        assert_eq!(book.level_count(Side::Bid), 1);
        assert!(book.get_level(Side::Bid, 10000).is_none());
        let (level, idx) = book.get_level(Side::Bid, 10100).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(level.total_quantity(), 10);
        assert_eq!(book.find_order(1).unwrap().price, 10100);
    }

    #[test]
    fn test_modify_unknown_order() {
        let mut book = book();
        assert!(!book.modify_order(99, 10000, 10, 0, true));
    }

    #[test]
    fn test_modify_no_change_is_noop() {
        let mut book = book();
        add(&mut book, 1, Side::Bid, 10000, 10, 1);
        assert!(book.modify_order(1, 10000, 10, 0, true));
        assert_eq!(book.find_order(1).unwrap().quantity, 10);
    }

    #[test]
    fn test_modify_zero_quantity_deletes() {
        let mut book = book();
        add(&mut book, 1, Side::Bid, 10000, 10, 1);
        assert!(book.modify_order(1, 10000, 0, 0, true));
        assert!(book.is_empty());
        assert!(book.find_order(1).is_none());
    }

    // =========================================================================
    // Delete / execute
    // =========================================================================

    #[test]
    fn test_delete_order() {
        let mut book = book();
        add(&mut book, 1, Side::Bid, 10000, 10, 1);
        add(&mut book, 2, Side::Bid, 10000, 20, 2);

        assert!(book.delete_order(1, 0, true));
        assert_eq!(book.order_count(), 1);
        assert_eq!(book.level_count(Side::Bid), 1);
        let (level, _) = book.get_level(Side::Bid, 10000).unwrap();
        assert_eq!(level.total_quantity(), 20);

        // Last order at the level removes the level too.
        assert!(book.delete_order(2, 0, true));
        assert!(book.is_empty());
        assert!(!book.delete_order(2, 0, true));
    }

    #[test]
    fn test_execute_partial_then_full() {
        let mut book = book();
        add(&mut book, 1, Side::Ask, 10010, 100, 1);

        assert!(book.execute_order(1, 30, 0, true));
        assert_eq!(book.find_order(1).unwrap().quantity, 70);
        let (level, _) = book.get_level(Side::Ask, 10010).unwrap();
        assert_eq!(level.total_quantity(), 70);

        assert!(book.execute_order(1, 70, 0, true));
        assert!(book.find_order(1).is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn test_execute_unknown_order_rejected() {
        let mut book = book();
        assert!(!book.execute_order(99, 10, 0, true));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn test_execute_zero_quantity_asserts() {
        let mut book = book();
        add(&mut book, 1, Side::Ask, 10010, 100, 1);
        book.execute_order(1, 0, 0, true);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn test_execute_negative_quantity_asserts() {
        let mut book = book();
        add(&mut book, 1, Side::Ask, 10010, 100, 1);
        book.execute_order(1, -5, 0, true);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn test_execute_beyond_resting_asserts() {
        let mut book = book();
        add(&mut book, 1, Side::Ask, 10010, 100, 1);
        book.execute_order(1, 101, 0, true);
    }

    // =========================================================================
    // Sequence numbers
    // =========================================================================

    #[test]
    fn test_stale_seq_rejected() {
        let mut book = book();
        assert!(book.add_order(1, Side::Bid, 10000, 10, 1, 1, 100, true));
        assert!(!book.add_order(2, Side::Bid, 10100, 20, 2, 2, 99, true));

        assert_eq!(book.order_count(), 1);
        assert_eq!(book.last_seq_num(), 100);
        assert_eq!(book.stats().stale_rejections, 1);

        assert!(!book.modify_order(1, 10000, 5, 99, true));
        assert!(!book.delete_order(1, 99, true));
        assert!(!book.execute_order(1, 5, 99, true));
        assert_eq!(book.find_order(1).unwrap().quantity, 10);
    }

    // =========================================================================
    // Views
    // =========================================================================

    #[test]
    fn test_l2_aggregation() {
        let mut book = book();
        add(&mut book, 1, Side::Bid, 10000, 10, 1);
        add(&mut book, 2, Side::Bid, 10000, 20, 2);
        add(&mut book, 3, Side::Bid, 9900, 30, 3);
        add(&mut book, 4, Side::Ask, 10010, 40, 4);

        let bids = book.get_levels_l2(Side::Bid, 0);
        assert_eq!(bids.len(), 2);
        assert_eq!(bids[0].price, 10000);
        assert_eq!(bids[0].quantity, 30);
        assert_eq!(bids[0].timestamp, 1);
        assert_eq!(bids[1].price, 9900);

        assert_eq!(book.get_levels_l2(Side::Bid, 1).len(), 1);
        assert_eq!(book.get_levels_l3(Side::Ask).len(), 1);
    }

    #[test]
    fn test_top_of_book_live() {
        let mut book = book();
        add(&mut book, 1, Side::Bid, 10000, 10, 5);
        add(&mut book, 2, Side::Ask, 10010, 20, 9);

        let tob = book.get_top_of_book();
        assert_eq!(tob.best_bid, 10000);
        assert_eq!(tob.bid_quantity, 10);
        assert_eq!(tob.best_ask, 10010);
        assert_eq!(tob.ask_quantity, 20);
        // Later of the two head-order timestamps.
        assert_eq!(tob.timestamp, 9);
    }

    #[test]
    fn test_clear_returns_orders_to_pool() {
        let mut book = book();
        add(&mut book, 1, Side::Bid, 10000, 10, 1);
        add(&mut book, 2, Side::Bid, 9900, 20, 2);
        add(&mut book, 3, Side::Ask, 10010, 30, 3);

        book.clear_side(Side::Bid);
        assert!(book.is_side_empty(Side::Bid));
        assert_eq!(book.order_count(), 1);
        assert!(book.find_order(1).is_none());
        assert!(book.find_order(3).is_some());

        book.clear();
        assert!(book.is_empty());
        assert_eq!(book.order_count(), 0);
    }
}
