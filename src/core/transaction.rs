//! Ledger transaction operations.
//!
//! The engine does not own the household ledger, it only writes side effects into it: an
//! expense when a bill is paid, a negative invoice-payment row when a card invoice is paid.
//! Every row written here is referenced by id from the record that caused it, so the effect
//! can be reversed later.

use crate::{
    core::month::YearMonth,
    entities::{CardHolder, Transaction, TransactionKind, transaction},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, prelude::*};
use uuid::Uuid;

/// Fields of a transaction about to be written.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Booking date
    pub date: NaiveDate,
    /// Description shown in the ledger
    pub description: String,
    /// Value in minor units
    pub value: i64,
    /// Value in the base currency, when converted
    pub value_brl: Option<i64>,
    /// ISO currency code
    pub currency: String,
    /// Expense or invoice payment
    pub kind: TransactionKind,
    /// Account debited
    pub account_id: Option<String>,
    /// Card charged, with its holder and invoice month
    pub card: Option<(String, CardHolder, YearMonth)>,
    /// Bill being paid
    pub bill_id: Option<String>,
    /// Category reference
    pub category_id: Option<String>,
}

/// Generates a fresh globally unique record id.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Writes a transaction under `id` and returns the stored row.
pub async fn create_transaction<C>(db: &C, id: String, new: NewTransaction) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let (card_id, card_holder, invoice_month) = match new.card {
        Some((card_id, holder, month)) => (Some(card_id), Some(holder), Some(month.to_string())),
        None => (None, None, None),
    };

    let model = transaction::ActiveModel {
        id: Set(id),
        date: Set(new.date),
        description: Set(new.description),
        value: Set(new.value),
        value_brl: Set(new.value_brl),
        currency: Set(new.currency),
        kind: Set(new.kind),
        account_id: Set(new.account_id),
        card_id: Set(card_id),
        card_holder: Set(card_holder),
        invoice_month: Set(invoice_month),
        bill_id: Set(new.bill_id),
        category_id: Set(new.category_id),
        created_at: Set(chrono::Utc::now()),
    };

    Ok(model.insert(db).await?)
}

/// Retrieves a transaction by id.
pub async fn get_transaction_by_id<C>(db: &C, id: &str) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Deletes a transaction. Returns `false` when it was already gone.
pub async fn delete_transaction<C>(db: &C, id: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = Transaction::delete_by_id(id.to_string()).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// All transactions billed on a card invoice, payments included, oldest first.
pub async fn get_transactions_for_invoice<C>(
    db: &C,
    card_id: &str,
    month: YearMonth,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::CardId.eq(card_id))
        .filter(transaction::Column::InvoiceMonth.eq(month.to_string()))
        .order_by_asc(transaction::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deletes every transaction billed on a card invoice; returns how many were removed.
pub async fn delete_transactions_for_invoice<C>(db: &C, card_id: &str, month: YearMonth) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = Transaction::delete_many()
        .filter(transaction::Column::CardId.eq(card_id))
        .filter(transaction::Column::InvoiceMonth.eq(month.to_string()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
