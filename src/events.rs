//! Event records delivered to book observers.
//!
//! Every mutation emits at most one `OrderUpdate` (L3 only) and one or two
//! `PriceLevelUpdate`s; a batch terminates with at most one top-of-book
//! notification. `quantity == 0` always encodes deletion.

use serde::{Deserialize, Serialize};

use crate::types::{OrderId, Price, Quantity, SeqNum, Side, SymbolId, Timestamp};

/// The level's membership changed: it was created or destroyed.
pub const PRICE_CHANGED: u8 = 0x01;

/// The reported quantity differs from the previous value.
pub const QUANTITY_CHANGED: u8 = 0x02;

/// Terminal event of a caller-defined batch.
pub const LAST_IN_BATCH: u8 = 0x04;

/// Aggregated (L2) price level update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevelUpdate {
    /// Symbol identifier
    pub symbol: SymbolId,
    /// Bid or Ask
    pub side: Side,
    /// Price level
    pub price: Price,
    /// New total quantity at this level (0 = delete)
    pub quantity: Quantity,
    /// Update timestamp
    pub timestamp: Timestamp,
    /// 0-based index in best-first order (0 = best); `INVALID_LEVEL_INDEX` if unknown
    pub level_index: u16,
    /// Bitset of `PRICE_CHANGED` / `QUANTITY_CHANGED` / `LAST_IN_BATCH`
    pub change_flags: u8,
    /// Feed sequence number, 0 when untracked
    pub seq_num: SeqNum,
}

impl PriceLevelUpdate {
    /// Check if this update deletes the level.
    #[inline]
    pub fn is_delete(&self) -> bool {
        self.quantity == 0
    }

    /// Check if the level was created or destroyed.
    #[inline]
    pub fn price_changed(&self) -> bool {
        self.change_flags & PRICE_CHANGED != 0
    }

    /// Check if the quantity changed.
    #[inline]
    pub fn quantity_changed(&self) -> bool {
        self.change_flags & QUANTITY_CHANGED != 0
    }

    /// Check if this event terminates a batch.
    #[inline]
    pub fn is_last_in_batch(&self) -> bool {
        self.change_flags & LAST_IN_BATCH != 0
    }

    /// Check if the affected level is within the top N.
    #[inline]
    pub fn is_top_n(&self, n: u16) -> bool {
        self.level_index < n
    }
}

/// Order-granular (L3) update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// Symbol identifier
    pub symbol: SymbolId,
    /// Unique order identifier
    pub order_id: OrderId,
    /// Bid or Ask
    pub side: Side,
    /// Order price
    pub price: Price,
    /// Order quantity (0 = delete)
    pub quantity: Quantity,
    /// Update timestamp
    pub timestamp: Timestamp,
    /// Index of the order's price level in best-first order
    pub price_level_index: u16,
    /// Queue priority (lower = earlier)
    pub priority: u64,
    /// Bitset of `PRICE_CHANGED` / `QUANTITY_CHANGED` / `LAST_IN_BATCH`
    pub change_flags: u8,
    /// Feed sequence number, 0 when untracked
    pub seq_num: SeqNum,
}

impl OrderUpdate {
    /// Check if this update deletes the order.
    #[inline]
    pub fn is_delete(&self) -> bool {
        self.quantity == 0
    }

    /// Check if the order's price changed (added or moved).
    #[inline]
    pub fn price_changed(&self) -> bool {
        self.change_flags & PRICE_CHANGED != 0
    }

    /// Check if the quantity changed.
    #[inline]
    pub fn quantity_changed(&self) -> bool {
        self.change_flags & QUANTITY_CHANGED != 0
    }

    /// Check if this event terminates a batch.
    #[inline]
    pub fn is_last_in_batch(&self) -> bool {
        self.change_flags & LAST_IN_BATCH != 0
    }

    /// Check if the order's level is within the top N.
    #[inline]
    pub fn is_top_n(&self, n: u16) -> bool {
        self.price_level_index < n
    }
}

/// An executed trade. The book engines never originate trades; external
/// components route them through [`crate::book::BookL3::emit_trade`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Symbol identifier
    pub symbol: SymbolId,
    /// Trade price
    pub price: Price,
    /// Trade quantity
    pub quantity: Quantity,
    /// Trade timestamp
    pub timestamp: Timestamp,
    /// OrderId of the aggressive (incoming) order
    pub aggressive_order_id: OrderId,
    /// OrderId of the passive (resting) order
    pub passive_order_id: OrderId,
    /// Side that initiated the trade
    pub aggressor_side: Side,
}
