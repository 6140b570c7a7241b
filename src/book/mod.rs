//! Book engines: per-side containers, the order pool, the L2 and L3 books
//! and the multi-instrument registry.

pub mod l2;
pub mod l3;
pub mod ladder;
pub mod level;
pub mod pool;
pub mod registry;
mod tob;

pub use l2::BookL2;
pub use l3::BookL3;
pub use ladder::LevelLadder;
pub use level::{LevelMap, OrderIter, OrderQueue, PriceLevelL3};
pub use pool::{Order, OrderHandle, OrderPool, NULL_HANDLE};
pub use registry::{BookRegistry, InstrumentBook};
pub use tob::TopOfBookReader;

/// Capacity hints for a new book.
#[derive(Debug, Clone, Copy)]
pub struct BookConfig {
    /// Initial price levels reserved per side
    pub level_capacity: usize,
    /// Initial order records reserved in the pool (L3 only)
    pub order_capacity: usize,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            level_capacity: 32,
            order_capacity: 1024,
        }
    }
}

impl BookConfig {
    /// Set the per-side level capacity.
    pub fn with_level_capacity(mut self, capacity: usize) -> Self {
        self.level_capacity = capacity;
        self
    }

    /// Set the order pool capacity.
    pub fn with_order_capacity(mut self, capacity: usize) -> Self {
        self.order_capacity = capacity;
        self
    }
}

/// Per-book processing counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookStats {
    /// Updates accepted past sequence gating and validation
    pub updates_processed: u64,
    /// Nonzero-sequence updates dropped as stale
    pub stale_rejections: u64,
}
