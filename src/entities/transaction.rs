//! Transaction entity - the household ledger the engine writes side effects into.
//!
//! Bill payments create `EXPENSE` rows (account- or card-linked); invoice payments create
//! negative `INVOICE_PAYMENT` rows. Card-linked rows carry `card_id`, `card_holder` and the
//! `invoice_month` they are billed in.

use super::common::{CardHolder, TransactionKind};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Caller-generated unique id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Booking date
    pub date: NaiveDate,
    /// Human-readable description
    pub description: String,
    /// Value in minor units of `currency` (expenses positive, invoice payments negative)
    pub value: i64,
    /// Value converted to the base currency, when `currency` differs from it
    pub value_brl: Option<i64>,
    /// ISO currency code of `value`
    pub currency: String,
    /// Expense or invoice payment
    pub kind: TransactionKind,
    /// Account debited, for account transactions
    pub account_id: Option<String>,
    /// Card charged, for card transactions
    #[sea_orm(indexed)]
    pub card_id: Option<String>,
    /// Card holder, for card transactions
    pub card_holder: Option<CardHolder>,
    /// Invoice month the card transaction is billed in (`YYYY-MM`)
    #[sea_orm(indexed)]
    pub invoice_month: Option<String>,
    /// Bill this transaction pays, if any
    pub bill_id: Option<String>,
    /// Category reference
    pub category_id: Option<String>,
    /// When the transaction was recorded
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Value in the base currency.
    #[must_use]
    pub fn base_value(&self) -> i64 {
        self.value_brl.unwrap_or(self.value)
    }
}

/// `Transaction` has no relationships enforced by the store
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
