//! Order-granular price levels.
//!
//! Each [`PriceLevelL3`] owns a doubly-linked queue of orders threaded
//! through the pool's `prev`/`next` handles, kept in non-decreasing
//! priority order (lower priority value = earlier in queue, ties append at
//! the tail). [`LevelMap`] keeps one side's levels sorted best-first in a
//! contiguous vector, so the level index reported in events is just the
//! position of the level.

use crate::book::pool::{Order, OrderHandle, OrderPool, NULL_HANDLE};
use crate::types::{Price, Quantity, Side, Timestamp};

/// Intrusive doubly-linked order queue (head = best priority).
#[derive(Debug, Clone, Copy)]
pub struct OrderQueue {
    head: OrderHandle,
    tail: OrderHandle,
    len: usize,
}

impl OrderQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            head: NULL_HANDLE,
            tail: NULL_HANDLE,
            len: 0,
        }
    }

    /// Number of orders in the queue.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Handle of the head (earliest-priority) order.
    #[inline]
    pub fn front(&self) -> OrderHandle {
        self.head
    }

    /// Splice `handle` in priority order: past every resident with
    /// `priority <= order.priority`, before the first strictly greater.
    pub fn insert_by_priority(&mut self, pool: &mut OrderPool, handle: OrderHandle) {
        let priority = pool.get(handle).priority;

        let mut cursor = self.head;
        while cursor != NULL_HANDLE && pool.get(cursor).priority <= priority {
            cursor = pool.get(cursor).next;
        }

        if cursor == NULL_HANDLE {
            self.push_back(pool, handle);
        } else {
            self.insert_before(pool, cursor, handle);
        }
    }

    fn push_back(&mut self, pool: &mut OrderPool, handle: OrderHandle) {
        if self.tail == NULL_HANDLE {
            debug_assert!(self.head == NULL_HANDLE);
            self.head = handle;
            self.tail = handle;
            let node = pool.get_mut(handle);
            node.prev = NULL_HANDLE;
            node.next = NULL_HANDLE;
        } else {
            pool.get_mut(self.tail).next = handle;
            let node = pool.get_mut(handle);
            node.prev = self.tail;
            node.next = NULL_HANDLE;
            self.tail = handle;
        }
        self.len += 1;
    }

    fn insert_before(&mut self, pool: &mut OrderPool, at: OrderHandle, handle: OrderHandle) {
        let prev = pool.get(at).prev;
        {
            let node = pool.get_mut(handle);
            node.prev = prev;
            node.next = at;
        }
        pool.get_mut(at).prev = handle;
        if prev == NULL_HANDLE {
            debug_assert!(self.head == at);
            self.head = handle;
        } else {
            pool.get_mut(prev).next = handle;
        }
        self.len += 1;
    }

    /// Unlink `handle` from anywhere in the queue.
    pub fn remove(&mut self, pool: &mut OrderPool, handle: OrderHandle) {
        let (prev, next) = {
            let node = pool.get(handle);
            (node.prev, node.next)
        };

        if prev == NULL_HANDLE {
            debug_assert!(self.head == handle);
            self.head = next;
        } else {
            pool.get_mut(prev).next = next;
        }
        if next == NULL_HANDLE {
            debug_assert!(self.tail == handle);
            self.tail = prev;
        } else {
            pool.get_mut(next).prev = prev;
        }

        let node = pool.get_mut(handle);
        node.prev = NULL_HANDLE;
        node.next = NULL_HANDLE;
        self.len -= 1;
    }

    /// Iterate orders head-to-tail.
    #[inline]
    pub fn iter<'a>(&self, pool: &'a OrderPool) -> OrderIter<'a> {
        OrderIter {
            pool,
            cursor: self.head,
        }
    }
}

impl Default for OrderQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a queue's orders in priority order.
pub struct OrderIter<'a> {
    pool: &'a OrderPool,
    cursor: OrderHandle,
}

impl<'a> Iterator for OrderIter<'a> {
    type Item = &'a Order;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NULL_HANDLE {
            return None;
        }
        let order = self.pool.get(self.cursor);
        self.cursor = order.next;
        Some(order)
    }
}

/// One price level of an L3 book: the order queue plus a cached aggregate.
#[derive(Debug, Clone, Copy)]
pub struct PriceLevelL3 {
    /// Price of this level
    pub price: Price,
    /// Orders at this price, priority-ordered
    pub orders: OrderQueue,
    total_quantity: Quantity,
}

impl PriceLevelL3 {
    /// Create an empty level at `price`.
    pub fn new(price: Price) -> Self {
        Self {
            price,
            orders: OrderQueue::new(),
            total_quantity: 0,
        }
    }

    /// Cached total quantity (invariant: sum over the queue).
    #[inline]
    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    /// Number of orders at this level.
    #[inline]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Check if no orders rest at this level.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Timestamp of the head order, 0 when empty.
    #[inline]
    pub fn front_timestamp(&self, pool: &OrderPool) -> Timestamp {
        let head = self.orders.front();
        if head == NULL_HANDLE {
            0
        } else {
            pool.get(head).timestamp
        }
    }

    /// Splice an order into the queue and add its quantity.
    pub fn insert_order(&mut self, pool: &mut OrderPool, handle: OrderHandle) {
        self.total_quantity += pool.get(handle).quantity;
        self.orders.insert_by_priority(pool, handle);
        #[cfg(debug_assertions)]
        self.verify_invariant(pool);
    }

    /// Unlink an order and subtract its quantity.
    pub fn remove_order(&mut self, pool: &mut OrderPool, handle: OrderHandle) {
        self.total_quantity -= pool.get(handle).quantity;
        self.orders.remove(pool, handle);
        #[cfg(debug_assertions)]
        self.verify_invariant(pool);
    }

    /// Adjust the cached total for an in-place quantity change.
    #[inline]
    pub fn update_quantity(&mut self, old: Quantity, new: Quantity) {
        self.total_quantity = self.total_quantity - old + new;
    }

    /// Verify that the cached total matches the queue sum.
    #[cfg(debug_assertions)]
    pub fn verify_invariant(&self, pool: &OrderPool) {
        let actual: Quantity = self.orders.iter(pool).map(|o| o.quantity).sum();
        debug_assert_eq!(
            actual, self.total_quantity,
            "price level {} total out of sync: actual={}, cached={}",
            self.price, actual, self.total_quantity
        );
    }
}

/// Sorted best-first map of L3 levels for one side.
#[derive(Debug)]
pub struct LevelMap {
    side: Side,
    levels: Vec<PriceLevelL3>,
}

impl LevelMap {
    /// Create an empty map for a side with the given initial capacity.
    pub fn new(side: Side, capacity: usize) -> Self {
        Self {
            side,
            levels: Vec::with_capacity(capacity),
        }
    }

    /// The side this map stores.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Number of levels.
    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if the map has no levels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// All levels, best first.
    #[inline]
    pub fn as_slice(&self) -> &[PriceLevelL3] {
        &self.levels
    }

    /// Best level (index 0), if any.
    #[inline]
    pub fn best(&self) -> Option<&PriceLevelL3> {
        self.levels.first()
    }

    /// Level at a best-first index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&PriceLevelL3> {
        self.levels.get(index)
    }

    /// Mutable level at a best-first index.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut PriceLevelL3 {
        &mut self.levels[index]
    }

    #[inline(always)]
    fn sorts_before(&self, a: Price, b: Price) -> bool {
        match self.side {
            Side::Bid => a > b,
            Side::Ask => a < b,
        }
    }

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

    /// Find or create the level at `price`.
    ///
    /// Returns the level's best-first index and whether it was created.
    pub fn get_or_create(&mut self, price: Price) -> (usize, bool) {
        let idx = self.lower_bound(price);
        if idx < self.levels.len() && self.levels[idx].price == price {
            (idx, false)
        } else {
            self.levels.insert(idx, PriceLevelL3::new(price));
            (idx, true)
        }
    }

    /// Remove the level at `price` if it holds no orders.
    pub fn remove_if_empty(&mut self, price: Price) -> bool {
        if let Some(idx) = self.find(price) {
            if self.levels[idx].is_empty() {
                self.levels.remove(idx);
                return true;
            }
        }
        false
    }

    /// Remove all levels.
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Iterate levels best-first.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, PriceLevelL3> {
        self.levels.iter()
    }

    /// Mutably iterate levels best-first.
    #[inline]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, PriceLevelL3> {
        self.levels.iter_mut()
    }
}
