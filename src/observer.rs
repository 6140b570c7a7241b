//! Observer trait and fan-out.
//!
//! Callbacks run inline on the writer's thread: they must not block, and
//! must not call mutating operations on the same book. Observer set
//! changes follow the same single-writer discipline as mutations.

use std::sync::Arc;

use crate::events::{OrderUpdate, PriceLevelUpdate, Trade};
use crate::types::{SeqNum, SymbolId, Timestamp, TopOfBook};

/// Receiver for book events. All methods default to no-ops so
/// implementations override only what they care about.
pub trait BookObserver: Send + Sync {
    /// A price level changed (L2 event).
    fn on_price_level_update(&self, _update: &PriceLevelUpdate) {}

    /// An individual order changed (L3 event).
    fn on_order_update(&self, _update: &OrderUpdate) {}

    /// A trade was routed through the book.
    fn on_trade(&self, _trade: &Trade) {}

    /// The top of book changed.
    fn on_top_of_book_update(&self, _tob: &TopOfBook) {}

    /// A full-book snapshot walk is starting.
    fn on_snapshot_begin(&self, _symbol: SymbolId, _seq_num: SeqNum, _timestamp: Timestamp) {}

    /// A full-book snapshot walk finished.
    fn on_snapshot_end(&self, _symbol: SymbolId, _seq_num: SeqNum, _timestamp: Timestamp) {}
}

/// Fan-out list of observers, identified by `Arc` pointer identity.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn BookObserver>>,
}

impl ObserverSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer.
    pub fn add(&mut self, observer: Arc<dyn BookObserver>) {
        self.observers.push(observer);
    }

    /// Remove an observer by pointer identity. Returns true if found.
    pub fn remove(&mut self, observer: &Arc<dyn BookObserver>) -> bool {
        if let Some(pos) = self
            .observers
            .iter()
            .position(|o| Arc::ptr_eq(o, observer))
        {
            self.observers.remove(pos);
            true
        } else {
            false
        }
    }

    /// Remove all observers.
    pub fn clear(&mut self) {
        self.observers.clear();
    }

    /// Number of registered observers.
    #[inline]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Check if no observers are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn notify_price_level_update(&self, update: &PriceLevelUpdate) {
        for observer in &self.observers {
            observer.on_price_level_update(update);
        }
    }

    #[inline]
    pub(crate) fn notify_order_update(&self, update: &OrderUpdate) {
        for observer in &self.observers {
            observer.on_order_update(update);
        }
    }

    #[inline]
    pub(crate) fn notify_trade(&self, trade: &Trade) {
        for observer in &self.observers {
            observer.on_trade(trade);
        }
    }

    #[inline]
    pub(crate) fn notify_top_of_book_update(&self, tob: &TopOfBook) {
        for observer in &self.observers {
            observer.on_top_of_book_update(tob);
        }
    }

    #[inline]
    pub(crate) fn notify_snapshot_begin(&self, symbol: SymbolId, seq_num: SeqNum, timestamp: Timestamp) {
        for observer in &self.observers {
            observer.on_snapshot_begin(symbol, seq_num, timestamp);
        }
    }

    #[inline]
    pub(crate) fn notify_snapshot_end(&self, symbol: SymbolId, seq_num: SeqNum, timestamp: Timestamp) {
        for observer in &self.observers {
            observer.on_snapshot_end(symbol, seq_num, timestamp);
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("len", &self.observers.len())
            .finish()
    }
}
