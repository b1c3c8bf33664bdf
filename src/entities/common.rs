//! Value types shared by several entities: string-backed status enums and the JSON list
//! columns (tags, bill payment history, installment allocations).

use chrono::NaiveDate;
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a bill or a loan installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    /// Nothing paid yet
    #[sea_orm(string_value = "open")]
    Open,
    /// Some money applied, balance remains
    #[sea_orm(string_value = "partial")]
    Partial,
    /// Settled within tolerance
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Deliberately not paid this period
    #[sea_orm(string_value = "skipped")]
    Skipped,
}

impl BillStatus {
    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Partial => "partial",
            Self::Paid => "paid",
            Self::Skipped => "skipped",
        }
    }
}

/// Installments move through the same states as bills.
pub type InstallmentStatus = BillStatus;

/// Which side of a peer-to-peer loan the household is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
#[serde(rename_all = "snake_case")]
pub enum LoanRole {
    /// The household borrowed the money
    #[sea_orm(string_value = "i_owe")]
    IOwe,
    /// The household lent the money
    #[sea_orm(string_value = "owed_to_me")]
    OwedToMe,
}

/// Persisted loan state. Display code uses [`crate::core::loan::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// Still being repaid
    #[sea_orm(string_value = "open")]
    Open,
    /// Finished
    #[sea_orm(string_value = "closed")]
    Closed,
}

/// Card holder a card transaction or invoice payment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
#[serde(rename_all = "lowercase")]
pub enum CardHolder {
    /// Primary card holder
    #[sea_orm(string_value = "main")]
    Main,
    /// Additional (secondary) card
    #[sea_orm(string_value = "additional")]
    Additional,
}

/// Kind of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Money spent from an account or on a card
    #[sea_orm(string_value = "EXPENSE")]
    Expense,
    /// Payment of a credit-card invoice (negative value)
    #[sea_orm(string_value = "INVOICE_PAYMENT")]
    InvoicePayment,
}

/// Instrument a bill payment was made with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum PayVia {
    /// Debited from a bank account
    #[sea_orm(string_value = "account")]
    Account,
    /// Charged to a credit card
    #[sea_orm(string_value = "card")]
    Card,
}

impl PayVia {
    /// Stored string form, also used by the legacy `paid_via_type` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Card => "card",
        }
    }

    /// Reads a legacy `paid_via_type` value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "account" => Some(Self::Account),
            "card" => Some(Self::Card),
            _ => None,
        }
    }
}

/// Free-form labels attached to templates, plans and bills.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Tags(pub Vec<String>);

impl Tags {
    /// True when no tag is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `tag` is one of the labels.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// One entry of a bill's payment history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillPayment {
    /// Payment date
    pub date: NaiveDate,
    /// Amount in minor units
    pub amount: i64,
    /// Instrument used
    pub via: PayVia,
    /// Account or card id
    pub via_id: String,
    /// Card holder, for card payments
    #[serde(default)]
    pub holder: Option<CardHolder>,
    /// Ledger transaction created for this payment
    #[serde(default)]
    pub tx_id: Option<String>,
}

/// Append-only payment history of a bill.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct BillPayments(pub Vec<BillPayment>);

impl BillPayments {
    /// Sum of all recorded payments.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.0.iter().map(|p| p.amount).sum()
    }
}

/// Money a single loan payment contributed to an installment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Funding loan payment
    pub payment_id: String,
    /// Applied amount in minor units
    pub amount: i64,
}

/// Back-references from an installment to the payments that funded it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Allocations(pub Vec<Allocation>);
