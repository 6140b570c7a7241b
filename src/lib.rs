//! # lob-engine
//!
//! In-memory limit-order-book state for market-data consumers: aggregated
//! (L2) and order-by-order (L3) views per instrument, built to ingest
//! high-frequency incremental feed updates with sub-microsecond mutation
//! cost.
//!
//! ## Features
//!
//! - **L2 books**: one aggregate entry per price, contiguous sorted
//!   ladders, seqlock-published top of book readable wait-free from other
//!   threads
//! - **L3 books**: every resting order tracked with price-time priority,
//!   O(1) id lookup through a slab-pooled order index, aggregated L2 view
//!   on demand
//! - **Sequence gating**: stale feed messages (monotonic `seq_num`)
//!   dropped silently
//! - **Batch coalescing**: at most one top-of-book notification per
//!   caller-defined batch
//! - **Observers**: synchronous fan-out of level, order, trade, top-of-book
//!   and snapshot events
//! - **Registry**: multi-instrument dispatch with read-mostly locking
//!
//! ## Quick Start
//!
//! ```rust
//! use lob_engine::{BookL3, Side};
//!
//! let mut book = BookL3::new(1);
//!
//! // order_id, side, price, quantity, timestamp, priority, seq_num, last-in-batch
//! book.add_order(1001, Side::Bid, 100_000, 50, 1, 0, 0, true);
//! book.add_order(1002, Side::Ask, 100_010, 30, 2, 0, 0, true);
//!
//! let tob = book.get_top_of_book();
//! assert_eq!(tob.best_bid, 100_000);
//! assert_eq!(tob.best_ask, 100_010);
//! assert_eq!(tob.spread(), 10);
//! ```
//!
//! ## Multi-instrument dispatch
//!
//! ```rust
//! use lob_engine::{BookL2, BookRegistry, Side};
//!
//! let registry: BookRegistry<BookL2> = BookRegistry::new();
//! let book = registry.get_or_create(42);
//! book.lock().unwrap().update_level(Side::Bid, 100_000, 25, 1, 0, true);
//! assert_eq!(registry.count(), 1);
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | `Price`, `Quantity`, `Side`, `PriceLevelL2`, `TopOfBook` |
//! | [`events`] | `PriceLevelUpdate`, `OrderUpdate`, `Trade`, change flags |
//! | [`observer`] | `BookObserver` trait and fan-out |
//! | [`book`] | `BookL2`, `BookL3`, containers, pool, `BookRegistry` |
//! | [`error`] | `BookError` and validation helpers |
//!
//! ## Concurrency model
//!
//! Each book has at most one writer at a time; the registry's lock covers
//! only its symbol map. Top-of-book reads on L2 books are wait-free
//! against the writer via a seqlock ([`TopOfBookReader`]); every other
//! query needs a quiescent writer or external synchronization. Observer
//! callbacks run inline on the writer thread and must not mutate the same
//! book.

pub mod book;
pub mod error;
pub mod events;
pub mod observer;
pub mod types;

// Re-exports - Core types
pub use types::{
    OrderId, Price, PriceLevelL2, Quantity, SeqNum, Side, SymbolId, Timestamp, TopOfBook,
    INVALID_LEVEL_INDEX,
};

// Re-exports - Events
pub use events::{
    OrderUpdate, PriceLevelUpdate, Trade, LAST_IN_BATCH, PRICE_CHANGED, QUANTITY_CHANGED,
};

// Re-exports - Books
pub use book::{
    BookConfig, BookL2, BookL3, BookRegistry, BookStats, InstrumentBook, Order, TopOfBookReader,
};

// Re-exports - Observers
pub use observer::{BookObserver, ObserverSet};

// Re-exports - Errors
pub use error::{validate_order_args, BookError, Result};
