//! Core types shared by the L2 and L3 book engines.
//!
//! All numeric types are fixed-width integers so book state has a
//! predictable memory layout:
//! - Prices are fixed-point signed integers; the scaling policy belongs to
//!   the feed adapter, not to this crate.
//! - Quantities are signed so that `0` can encode "delete" on the wire
//!   while the containers only ever store positive values.

use serde::{Deserialize, Serialize};

/// Price in fixed-point representation (scaling is feed-defined).
pub type Price = i64;

/// Quantity (volume). A value of 0 encodes "delete" in update paths.
pub type Quantity = i64;

/// Unique order identifier, unique within one book.
pub type OrderId = u64;

/// Instrument handle.
pub type SymbolId = u16;

/// Nanoseconds since epoch.
pub type Timestamp = u64;

/// Feed sequence number. 0 means "untracked" and bypasses gap detection.
pub type SeqNum = u64;

/// Sentinel level index for events that cannot name a level (0 = best).
pub const INVALID_LEVEL_INDEX: u16 = u16::MAX;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// Buy order (bid)
    Bid = 0,
    /// Sell order (ask)
    Ask = 1,
}

impl Side {
    /// Array index for per-side storage.
    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The opposing side.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Check if this is a bid.
    #[inline(always)]
    pub fn is_bid(self) -> bool {
        matches!(self, Side::Bid)
    }

    /// Check if this is an ask.
    #[inline(always)]
    pub fn is_ask(self) -> bool {
        matches!(self, Side::Ask)
    }
}

/// Aggregated price level: total resting quantity at one price.
///
/// Stored only while `quantity > 0`; an update to zero removes the entry
/// from its ladder instead of storing it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevelL2 {
    /// Price level
    pub price: Price,
    /// Total quantity resting at this price
    pub quantity: Quantity,
    /// Last update timestamp
    pub timestamp: Timestamp,
}

impl PriceLevelL2 {
    /// Create a new level.
    #[inline]
    pub fn new(price: Price, quantity: Quantity, timestamp: Timestamp) -> Self {
        Self {
            price,
            quantity,
            timestamp,
        }
    }

    /// A level with zero quantity denotes absence.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }
}

/// Top-of-book snapshot: best bid and ask with their aggregate quantities.
///
/// A price of 0 on either side means that side is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopOfBook {
    /// Symbol identifier
    pub symbol: SymbolId,
    /// Best bid price (highest buy price), 0 if no bids
    pub best_bid: Price,
    /// Total quantity at best bid
    pub bid_quantity: Quantity,
    /// Best ask price (lowest sell price), 0 if no asks
    pub best_ask: Price,
    /// Total quantity at best ask
    pub ask_quantity: Quantity,
    /// Snapshot timestamp
    pub timestamp: Timestamp,
}

impl TopOfBook {
    /// Create a snapshot with all fields.
    #[inline]
    pub fn new(
        symbol: SymbolId,
        best_bid: Price,
        bid_quantity: Quantity,
        best_ask: Price,
        ask_quantity: Quantity,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            symbol,
            best_bid,
            bid_quantity,
            best_ask,
            ask_quantity,
            timestamp,
        }
    }

    /// Empty snapshot for a symbol.
    #[inline]
    pub fn empty(symbol: SymbolId) -> Self {
        Self {
            symbol,
            ..Default::default()
        }
    }

    /// Spread between best ask and best bid, 0 if crossed or one-sided.
    #[inline]
    pub fn spread(&self) -> Price {
        if self.best_ask > self.best_bid {
            self.best_ask - self.best_bid
        } else {
            0
        }
    }

    /// Midpoint of best bid and best ask.
    #[inline]
    pub fn mid_price(&self) -> Price {
        (self.best_bid + self.best_ask) / 2
    }

    /// Check if the book is crossed (bid >= ask with both sides present).
    #[inline]
    pub fn is_crossed(&self) -> bool {
        self.best_bid >= self.best_ask && self.best_bid > 0 && self.best_ask > 0
    }

    /// Check if there is a valid bid.
    #[inline]
    pub fn has_bid(&self) -> bool {
        self.best_bid > 0 && self.bid_quantity > 0
    }

    /// Check if there is a valid ask.
    #[inline]
    pub fn has_ask(&self) -> bool {
        self.best_ask > 0 && self.ask_quantity > 0
    }

    /// Check if both sides are present.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.has_bid() && self.has_ask()
    }
}
