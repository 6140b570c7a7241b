//! Multi-instrument book registry.
//!
//! The registry's `RwLock` guards only the symbol map: lookups take shared
//! mode, creation upgrades to exclusive and re-checks, removal and clear
//! take exclusive mode. Each book is handed out as `Arc<Mutex<B>>`: the
//! per-book mutex is the caller-side serialization the single-writer
//! contract requires, and books for different symbols mutate concurrently
//! without touching each other.

use std::sync::{Arc, Mutex, RwLock};

use ahash::AHashMap;

use crate::book::{BookConfig, BookL2, BookL3};
use crate::error::{BookError, Result};
use crate::types::SymbolId;

/// A per-instrument book the registry can create on demand.
pub trait InstrumentBook: Send {
    /// Create an empty book for `symbol` with default configuration.
    fn for_symbol(symbol: SymbolId) -> Self;

    /// The symbol this book tracks.
    fn symbol(&self) -> SymbolId;
}

impl InstrumentBook for BookL2 {
    fn for_symbol(symbol: SymbolId) -> Self {
        BookL2::with_config(symbol, BookConfig::default())
    }

    fn symbol(&self) -> SymbolId {
        BookL2::symbol(self)
    }
}

impl InstrumentBook for BookL3 {
    fn for_symbol(symbol: SymbolId) -> Self {
        BookL3::with_config(symbol, BookConfig::default())
    }

    fn symbol(&self) -> SymbolId {
        BookL3::symbol(self)
    }
}

/// Registry dispatching symbols to per-instrument books.
///
/// Generic over the book type so the per-symbol hot path never goes
/// through dynamic dispatch.
pub struct BookRegistry<B> {
    books: RwLock<AHashMap<SymbolId, Arc<Mutex<B>>>>,
}

impl<B: InstrumentBook> BookRegistry<B> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            books: RwLock::new(AHashMap::new()),
        }
    }

    /// Create a registry pre-sized for `capacity` symbols.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            books: RwLock::new(AHashMap::with_capacity(capacity)),
        }
    }

    /// Get the book for `symbol`, creating it on first access.
    pub fn get_or_create(&self, symbol: SymbolId) -> Arc<Mutex<B>> {
        {
            let books = self.books.read().unwrap();
            if let Some(book) = books.get(&symbol) {
                return Arc::clone(book);
            }
        }

        let mut books = self.books.write().unwrap();
        // Another thread may have inserted while we upgraded.
        if let Some(book) = books.get(&symbol) {
            return Arc::clone(book);
        }

        log::debug!("registry: creating book for symbol {symbol}");
        let book = Arc::new(Mutex::new(B::for_symbol(symbol)));
        books.insert(symbol, Arc::clone(&book));
        book
    }

    /// Get the book for `symbol` if it exists.
    pub fn get(&self, symbol: SymbolId) -> Option<Arc<Mutex<B>>> {
        self.books.read().unwrap().get(&symbol).cloned()
    }

    /// Get the book for `symbol`, failing with `SymbolNotFound` when no
    /// book has been registered for it.
    pub fn try_get(&self, symbol: SymbolId) -> Result<Arc<Mutex<B>>> {
        self.get(symbol).ok_or(BookError::SymbolNotFound(symbol))
    }

    /// Check if a book exists for `symbol`.
    pub fn has(&self, symbol: SymbolId) -> bool {
        self.books.read().unwrap().contains_key(&symbol)
    }

    /// Drop the book for `symbol`. Returns true if it existed.
    pub fn remove(&self, symbol: SymbolId) -> bool {
        self.books.write().unwrap().remove(&symbol).is_some()
    }

    /// All registered symbols, in no particular order.
    pub fn symbols(&self) -> Vec<SymbolId> {
        self.books.read().unwrap().keys().copied().collect()
    }

    /// Number of registered books.
    pub fn count(&self) -> usize {
        self.books.read().unwrap().len()
    }

    /// Drop every book.
    pub fn clear(&self) {
        self.books.write().unwrap().clear();
    }

    /// Reserve map capacity for at least `capacity` symbols.
    pub fn reserve(&self, capacity: usize) {
        self.books.write().unwrap().reserve(capacity);
    }
}

impl<B: InstrumentBook> Default for BookRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}
