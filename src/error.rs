//! Error types for the book engine.
//!
//! Book mutation operations report data-plane failures as boolean results
//! (stale sequence numbers and unknown ids are routine under feed replay);
//! `BookError` covers the validation and registry surfaces.

use thiserror::Error;

use crate::types::{OrderId, Price, Quantity, SymbolId};

/// Result type alias for book operations.
pub type Result<T> = std::result::Result<T, BookError>;

/// Main error type for book operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    /// Invalid order ID (zero is reserved)
    #[error("Invalid order ID: {0}")]
    InvalidOrderId(OrderId),

    /// Order not found in the book
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Invalid price (zero or negative)
    #[error("Invalid price: {0}")]
    InvalidPrice(Price),

    /// Invalid quantity (negative, or zero where a positive value is required)
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(Quantity),

    /// Symbol not registered
    #[error("Symbol not found: {0}")]
    SymbolNotFound(SymbolId),

    /// Internal book state inconsistency detected
    #[error("Book inconsistency: {0}")]
    InconsistentState(String),
}

/// Validate the argument triple common to order mutations.
///
/// The L3 book gates every new order through this; feed adapters can call
/// it directly when they want the error value instead of the books'
/// boolean rejections.
pub fn validate_order_args(order_id: OrderId, price: Price, quantity: Quantity) -> Result<()> {
    if order_id == 0 {
        return Err(BookError::InvalidOrderId(0));
    }
    if price <= 0 {
        return Err(BookError::InvalidPrice(price));
    }
    if quantity <= 0 {
        return Err(BookError::InvalidQuantity(quantity));
    }
    Ok(())
}
