//! Unified error type for the obligation ledger.
//!
//! Validation problems (bad amounts, missing selections, malformed months) are reported before
//! any record is written. Storage errors from `SeaORM` are propagated unchanged.

use crate::entities::BillStatus;
use thiserror::Error;

/// Every failure the engine reports to its caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Error raised by the record store
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decimal conversion overflowed or lost meaning
    #[error("Decimal error: {0}")]
    Decimal(#[from] rust_decimal::Error),

    /// A payment amount was zero, negative or otherwise unusable (minor units)
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount in minor units
        amount: i64,
    },

    /// A decimal string could not be read as money
    #[error("Invalid amount text: '{value}'")]
    InvalidAmountText {
        /// The rejected input
        value: String,
    },

    /// A required selection (account, card, ...) was not provided
    #[error("Missing selection: {field}")]
    MissingSelection {
        /// Name of the missing field
        field: &'static str,
    },

    /// A month string was not `YYYY-MM`
    #[error("Invalid month: '{value}'")]
    InvalidMonth {
        /// The rejected input
        value: String,
    },

    /// A due day outside 1..=31
    #[error("Invalid due day: {day}")]
    InvalidDueDay {
        /// The rejected day
        day: i32,
    },

    /// A record id no longer exists
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type name
        entity: &'static str,
        /// Missing id
        id: String,
    },

    /// A bill state transition that its current status does not allow
    #[error("Cannot {action} a bill that is {}", status.as_str())]
    InvalidTransition {
        /// The attempted transition
        action: &'static str,
        /// Status the bill was in
        status: BillStatus,
    },

    /// The payment is larger than what is left to pay; the caller must confirm it
    #[error("Payment of {amount} exceeds the remaining balance of {remaining}")]
    ExceedsRemaining {
        /// Requested payment (minor units)
        amount: i64,
        /// Remaining balance (minor units)
        remaining: i64,
    },

    /// Undo addressed a payment outside the bill's history
    #[error("Payment index {index} out of range (bill has {len} payments)")]
    PaymentIndex {
        /// Requested index
        index: usize,
        /// Number of payments on the bill
        len: usize,
    },
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// True for input problems detected before any state was touched.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount { .. }
                | Self::InvalidAmountText { .. }
                | Self::MissingSelection { .. }
                | Self::InvalidMonth { .. }
                | Self::InvalidDueDay { .. }
                | Self::ExceedsRemaining { .. }
                | Self::InvalidTransition { .. }
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
