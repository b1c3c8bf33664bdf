//! Invoice payment entity - a payment registered against one credit-card invoice for one
//! holder. Shares its `tx_id` with the negative `INVOICE_PAYMENT` ledger transaction.
use super::common::CardHolder;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invoice payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoice_payments")]
pub struct Model {
    /// Caller-generated unique id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Card the invoice belongs to
    pub card_id: String,
    /// Invoice month (`YYYY-MM`)
    pub invoice_month: String,
    /// `card_id__invoice_month`, indexed for cascading deletes
    #[sea_orm(indexed)]
    pub invoice_key: String,
    /// Holder whose share is being paid
    pub holder: CardHolder,
    /// Payment date
    pub date: NaiveDate,
    /// Amount in minor units (positive)
    pub amount: i64,
    /// Account the payment was debited from
    pub account_id: String,
    /// Linked ledger transaction
    pub tx_id: String,
    /// When the payment was recorded
    pub created_at: DateTime<Utc>,
}

/// `InvoicePayment` links to its transaction by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
