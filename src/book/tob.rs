//! Seqlock-published top-of-book cache.
//!
//! The writer brackets each publication with an odd/even counter; readers
//! retry while the counter is odd or changed across their copy. This gives
//! wait-free, never-blocking-the-writer reads of the ~48-byte snapshot.
//!
//! Safety contract: exactly one thread calls [`TobCell::publish`] at a
//! time (the book's single-writer discipline). Readers may run on any
//! number of threads concurrently.

use std::cell::UnsafeCell;
use std::hint;
use std::ptr;
use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{PriceLevelL2, Side, SymbolId, TopOfBook};

/// Everything published per top-of-book change: the snapshot plus copies
/// of the full best level on each side for `get_best`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TobSnapshot {
    pub tob: TopOfBook,
    pub best_bid: PriceLevelL2,
    pub best_ask: PriceLevelL2,
}

pub(crate) struct TobCell {
    seq: AtomicU64,
    data: UnsafeCell<TobSnapshot>,
}

// SAFETY: all access to `data` is mediated by the seqlock protocol below;
// torn reads are detected and retried, and publish() is single-writer by
// the book contract.
unsafe impl Sync for TobCell {}
unsafe impl Send for TobCell {}

impl TobCell {
    pub(crate) fn new(symbol: SymbolId) -> Self {
        let mut snapshot = TobSnapshot::default();
        snapshot.tob.symbol = symbol;
        Self {
            seq: AtomicU64::new(0),
            data: UnsafeCell::new(snapshot),
        }
    }

    /// Publish a new snapshot. Single-writer only.
    pub(crate) fn publish(&self, snapshot: TobSnapshot) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        // SAFETY: single writer; readers detect this window via the odd
        // counter and retry.
        unsafe { ptr::write(self.data.get(), snapshot) };
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Copy out a consistent snapshot, retrying across writer windows.
    pub(crate) fn read(&self) -> TobSnapshot {
        loop {
            let seq_before = self.seq.load(Ordering::Acquire);
            if seq_before & 1 != 0 {
                hint::spin_loop();
                continue;
            }
            // SAFETY: a plain copy; if the writer raced us the counter
            // check below rejects the torn value.
            let snapshot = unsafe { ptr::read_volatile(self.data.get()) };
            fence(Ordering::Acquire);
            let seq_after = self.seq.load(Ordering::Relaxed);
            if seq_before == seq_after {
                return snapshot;
            }
            hint::spin_loop();
        }
    }
}

impl std::fmt::Debug for TobCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TobCell")
            .field("seq", &self.seq.load(Ordering::Relaxed))
            .finish()
    }
}

/// Cloneable wait-free reader onto an L2 book's published top of book.
///
/// Obtained from [`crate::book::BookL2::top_of_book_reader`]; valid for
/// the lifetime of the `Arc`ed cell, independent of the writer thread.
#[derive(Clone, Debug)]
pub struct TopOfBookReader {
    cell: Arc<TobCell>,
}

impl TopOfBookReader {
    pub(crate) fn new(cell: Arc<TobCell>) -> Self {
        Self { cell }
    }

    /// Latest published top-of-book snapshot.
    #[inline]
    pub fn top_of_book(&self) -> TopOfBook {
        self.cell.read().tob
    }

    /// Latest published best level for a side, if that side is non-empty.
    pub fn best(&self, side: Side) -> Option<PriceLevelL2> {
        let snapshot = self.cell.read();
        let (price, level) = match side {
            Side::Bid => (snapshot.tob.best_bid, snapshot.best_bid),
            Side::Ask => (snapshot.tob.best_ask, snapshot.best_ask),
        };
        (price != 0).then_some(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    fn snapshot(bid: i64, bid_qty: i64, ask: i64, ask_qty: i64) -> TobSnapshot {
        TobSnapshot {
            tob: TopOfBook::new(1, bid, bid_qty, ask, ask_qty, 42),
            best_bid: PriceLevelL2::new(bid, bid_qty, 42),
            best_ask: PriceLevelL2::new(ask, ask_qty, 42),
        }
    }

    #[test]
    fn test_initial_read_is_empty() {
        let cell = TobCell::new(7);
        let value = cell.read();
        assert_eq!(value.tob.symbol, 7);
        assert_eq!(value.tob.best_bid, 0);
        assert_eq!(value.tob.best_ask, 0);
    }

    #[test]
    fn test_publish_then_read() {
        let cell = TobCell::new(1);
        cell.publish(snapshot(10000, 10, 10010, 20));

        let value = cell.read();
        assert_eq!(value.tob.best_bid, 10000);
        assert_eq!(value.tob.bid_quantity, 10);
        assert_eq!(value.tob.best_ask, 10010);
        assert_eq!(value.best_bid.price, 10000);
        assert_eq!(value.best_ask.quantity, 20);
    }

    #[test]
    fn test_reader_handle_best() {
        let cell = Arc::new(TobCell::new(1));
        cell.publish(snapshot(10000, 10, 0, 0));

        let reader = TopOfBookReader::new(cell);
        let bid = reader.best(Side::Bid).unwrap();
        assert_eq!(bid.price, 10000);
        assert_eq!(bid.quantity, 10);
        assert!(reader.best(Side::Ask).is_none());
    }

    #[test]
    fn test_concurrent_reads_see_consistent_pairs() {
        // Writer always publishes bid == ask - 10 and bid_qty == ask_qty;
        // any torn read breaks that relation.
        let cell = Arc::new(TobCell::new(1));
        cell.publish(snapshot(10000, 1, 10010, 1));
        let stop = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let value = cell.read();
                        assert_eq!(value.tob.best_ask - value.tob.best_bid, 10);
                        assert_eq!(value.tob.bid_quantity, value.tob.ask_quantity);
                        assert_eq!(value.best_bid.price, value.tob.best_bid);
                        assert_eq!(value.best_ask.price, value.tob.best_ask);
                    }
                })
            })
            .collect();

        for i in 0..100_000i64 {
            let bid = 10000 + (i % 500);
            cell.publish(snapshot(bid, i % 97 + 1, bid + 10, i % 97 + 1));
        }
        stop.store(true, Ordering::Relaxed);
        for handle in readers {
            handle.join().unwrap();
        }
    }
}
