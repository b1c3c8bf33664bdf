/// Loan payment allocation across installments
pub mod allocator;

/// Bill state machine, self-repair and payments
pub mod bill;

/// Bill generation from templates and installment plans
pub mod generator;

/// Credit-card invoice reconciliation per holder
pub mod invoice;

/// Loan balances, payments and installment schedules
pub mod loan;

/// Minor-unit money helpers
pub mod money;

/// `YYYY-MM` months and due-date clamping
pub mod month;

/// Ledger transactions written as payment side effects
pub mod transaction;

/// Filtered, sorted month listings
pub mod view;
