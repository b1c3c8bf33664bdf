//! Credit-card invoice reconciliation.
//!
//! An invoice is the set of card transactions billed in one month, split between the main and
//! the additional card holder. Registered invoice payments are matched against that total per
//! holder. A payment is always written together with a negative `INVOICE_PAYMENT` ledger row
//! that shares its `tx_id`, and the two are removed together.

use crate::{
    config::LedgerConfig,
    core::{
        money::{self, TOLERANCE},
        month::YearMonth,
        transaction::{self as ledger, NewTransaction, new_id},
    },
    entities::{CardHolder, InvoicePayment, TransactionKind, invoice_payment, transaction},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::fmt;
use tracing::{info, instrument};

/// Key grouping every payment of one invoice.
#[must_use]
pub fn invoice_key(card_id: &str, month: YearMonth) -> String {
    format!("{card_id}__{month}")
}

/// Reconciliation status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    /// Nothing meaningful paid
    Open,
    /// Some paid, balance remains
    Partial,
    /// Fully paid
    Paid,
}

impl InvoiceStatus {
    /// Label shown to the household.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "ABERTA",
            Self::Partial => "PARCIAL",
            Self::Paid => "PAGA",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status for an invoice's global totals.
///
/// `PAGA` needs something to have been charged; an empty invoice stays `ABERTA`.
#[must_use]
pub const fn invoice_status(total: i64, paid: i64, remaining: i64) -> InvoiceStatus {
    if remaining <= TOLERANCE && total > 0 {
        InvoiceStatus::Paid
    } else if paid > TOLERANCE && remaining > TOLERANCE {
        InvoiceStatus::Partial
    } else {
        InvoiceStatus::Open
    }
}

/// Charged, paid and outstanding amounts for one holder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HolderTotals {
    /// Sum of card expenses in the base currency
    pub total: i64,
    /// Sum of registered invoice payments
    pub paid: i64,
    /// `max(0, total - paid)`
    pub remaining: i64,
}

impl HolderTotals {
    const fn new(total: i64, paid: i64) -> Self {
        let remaining = total - paid;
        Self {
            total,
            paid,
            remaining: if remaining > 0 { remaining } else { 0 },
        }
    }
}

/// Reconciled view of one invoice.
#[derive(Debug, Clone)]
pub struct InvoiceSummary {
    /// Card the invoice belongs to
    pub card_id: String,
    /// Invoice month
    pub month: YearMonth,
    /// Main holder's share
    pub main: HolderTotals,
    /// Additional holder's share
    pub additional: HolderTotals,
    /// Sum over both holders
    pub total: i64,
    /// Sum over both holders
    pub paid: i64,
    /// Sum of per-holder remaining amounts
    pub remaining: i64,
    /// Reconciliation status
    pub status: InvoiceStatus,
    /// Registered payments, oldest first
    pub payments: Vec<invoice_payment::Model>,
}

impl InvoiceSummary {
    /// Totals of one holder.
    #[must_use]
    pub const fn holder(&self, holder: CardHolder) -> HolderTotals {
        match holder {
            CardHolder::Main => self.main,
            CardHolder::Additional => self.additional,
        }
    }
}

/// Reconciles card transactions against registered payments.
///
/// Invoice-payment ledger rows are ignored; the payment records are counted instead. A
/// transaction with no holder belongs to the main holder.
#[must_use]
pub fn reconcile(
    card_id: &str,
    month: YearMonth,
    transactions: &[transaction::Model],
    payments: Vec<invoice_payment::Model>,
) -> InvoiceSummary {
    let charged = |holder: CardHolder| -> i64 {
        transactions
            .iter()
            .filter(|t| t.kind != TransactionKind::InvoicePayment)
            .filter(|t| t.card_holder.unwrap_or(CardHolder::Main) == holder)
            .map(transaction::Model::base_value)
            .sum()
    };
    let paid = |holder: CardHolder| -> i64 {
        payments
            .iter()
            .filter(|p| p.holder == holder)
            .map(|p| p.amount)
            .sum()
    };

    let main = HolderTotals::new(charged(CardHolder::Main), paid(CardHolder::Main));
    let additional = HolderTotals::new(charged(CardHolder::Additional), paid(CardHolder::Additional));
    let total = main.total + additional.total;
    let paid = main.paid + additional.paid;
    let remaining = main.remaining + additional.remaining;

    InvoiceSummary {
        card_id: card_id.to_string(),
        month,
        main,
        additional,
        total,
        paid,
        remaining,
        status: invoice_status(total, paid, remaining),
        payments,
    }
}

/// Registered payments of one invoice, oldest first.
pub async fn get_invoice_payments<C>(db: &C, card_id: &str, month: YearMonth) -> Result<Vec<invoice_payment::Model>>
where
    C: ConnectionTrait,
{
    InvoicePayment::find()
        .filter(invoice_payment::Column::InvoiceKey.eq(invoice_key(card_id, month)))
        .order_by_asc(invoice_payment::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Loads and reconciles one invoice.
///
/// # Arguments
/// * `db` - Database connection
/// * `card_id` - Card the invoice belongs to
/// * `month` - Invoice month
///
/// # Returns
/// * Per-holder and global totals with the invoice status; an invoice with no records is an
///   empty `ABERTA` summary, not an error
pub async fn invoice_summary(db: &DatabaseConnection, card_id: &str, month: YearMonth) -> Result<InvoiceSummary> {
    let transactions = ledger::get_transactions_for_invoice(db, card_id, month).await?;
    let payments = get_invoice_payments(db, card_id, month).await?;
    Ok(reconcile(card_id, month, &transactions, payments))
}

/// An invoice payment to register.
#[derive(Debug, Clone)]
pub struct NewInvoicePayment {
    /// Card being paid
    pub card_id: String,
    /// Invoice month being paid
    pub month: YearMonth,
    /// Holder whose share is paid
    pub holder: CardHolder,
    /// Amount in minor units; must be positive
    pub amount: i64,
    /// Payment date
    pub date: NaiveDate,
    /// Account debited
    pub account_id: String,
}

/// Registers an invoice payment and its negative ledger transaction under one shared id.
///
/// # Errors
/// [`Error::InvalidAmount`] for a non-positive amount; [`Error::MissingSelection`] when no card
/// or account is given. Nothing is written in either case.
#[instrument(skip(db, config, new), fields(card_id = %new.card_id, month = %new.month, amount = new.amount))]
pub async fn register_invoice_payment(
    db: &DatabaseConnection,
    config: &LedgerConfig,
    new: NewInvoicePayment,
) -> Result<invoice_payment::Model> {
    if new.amount <= 0 {
        return Err(Error::InvalidAmount { amount: new.amount });
    }
    if new.card_id.trim().is_empty() {
        return Err(Error::MissingSelection { field: "card" });
    }
    if new.account_id.trim().is_empty() {
        return Err(Error::MissingSelection { field: "account" });
    }

    let tx_id = new_id();
    let txn = db.begin().await?;
    ledger::create_transaction(
        &txn,
        tx_id.clone(),
        NewTransaction {
            date: new.date,
            description: format!("Invoice payment {} {}", new.card_id, new.month),
            value: -new.amount,
            value_brl: None,
            currency: config.base_currency.clone(),
            kind: TransactionKind::InvoicePayment,
            account_id: Some(new.account_id.clone()),
            card: Some((new.card_id.clone(), new.holder, new.month)),
            bill_id: None,
            category_id: None,
        },
    )
    .await?;

    let payment = invoice_payment::ActiveModel {
        id: Set(new_id()),
        invoice_key: Set(invoice_key(&new.card_id, new.month)),
        card_id: Set(new.card_id),
        invoice_month: Set(new.month.to_string()),
        holder: Set(new.holder),
        date: Set(new.date),
        amount: Set(new.amount),
        account_id: Set(new.account_id),
        tx_id: Set(tx_id),
        created_at: Set(Utc::now()),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(
        "Invoice payment {} registered for {}",
        payment.id, payment.invoice_key
    );
    Ok(payment)
}

/// Removes one invoice payment and its ledger transaction.
///
/// Returns `false` if the payment no longer exists.
#[instrument(skip(db))]
pub async fn delete_invoice_payment(db: &DatabaseConnection, payment_id: &str) -> Result<bool> {
    let txn = db.begin().await?;
    let Some(payment) = InvoicePayment::find_by_id(payment_id.to_string())
        .one(&txn)
        .await?
    else {
        return Ok(false);
    };

    ledger::delete_transaction(&txn, &payment.tx_id).await?;
    payment.delete(&txn).await?;
    txn.commit().await?;

    info!("Deleted invoice payment {}", payment_id);
    Ok(true)
}

/// Counts of records removed by [`delete_invoice`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvoiceDeletion {
    /// Invoice payments removed
    pub payments: u64,
    /// Card transactions removed, payment rows included
    pub transactions: u64,
}

/// Deletes an invoice: its payments with their ledger rows, then every card transaction
/// billed on it.
#[instrument(skip(db))]
pub async fn delete_invoice(db: &DatabaseConnection, card_id: &str, month: YearMonth) -> Result<InvoiceDeletion> {
    let txn = db.begin().await?;

    let mut deletion = InvoiceDeletion::default();
    for payment in get_invoice_payments(&txn, card_id, month).await? {
        if ledger::delete_transaction(&txn, &payment.tx_id).await? {
            deletion.transactions += 1;
        }
    }
    deletion.payments = InvoicePayment::delete_many()
        .filter(invoice_payment::Column::InvoiceKey.eq(invoice_key(card_id, month)))
        .exec(&txn)
        .await?
        .rows_affected;
    deletion.transactions += ledger::delete_transactions_for_invoice(&txn, card_id, month).await?;
    txn.commit().await?;

    info!(
        "Deleted invoice {}: {} payments, {} transactions",
        invoice_key(card_id, month),
        deletion.payments,
        deletion.transactions
    );
    Ok(deletion)
}

/// Formats an invoice summary for display.
///
/// # Arguments
/// * `summary` - The reconciled invoice
/// * `currency` - Currency the totals are expressed in
///
/// # Returns
/// * A status line, one line per holder with charges or payments, and a total line
#[must_use]
pub fn format_invoice_summary(summary: &InvoiceSummary, currency: &str) -> String {
    let line = |label: &str, totals: HolderTotals| {
        format!(
            "  {label}: {} charged, {} paid, {} remaining",
            money::format_money(totals.total, currency),
            money::format_money(totals.paid, currency),
            money::format_money(totals.remaining, currency)
        )
    };

    let mut lines = vec![format!(
        "Invoice {} {}: {}",
        summary.card_id, summary.month, summary.status
    )];
    lines.extend(
        [("Main", summary.main), ("Additional", summary.additional)]
            .into_iter()
            .filter(|(_, totals)| totals.total != 0 || totals.paid != 0)
            .map(|(label, totals)| line(label, totals)),
    );
    lines.push(line(
        "Total",
        HolderTotals {
            total: summary.total,
            paid: summary.paid,
            remaining: summary.remaining,
        },
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn march() -> YearMonth {
        month("2024-03")
    }

    async fn charge(
        db: &DatabaseConnection,
        holder: Option<CardHolder>,
        value: i64,
        value_brl: Option<i64>,
    ) -> Result<transaction::Model> {
        let tx = ledger::create_transaction(
            db,
            new_id(),
            NewTransaction {
                date: date(2024, 3, 5),
                description: "Card purchase".to_string(),
                value,
                value_brl,
                currency: if value_brl.is_some() { "USD" } else { "BRL" }.to_string(),
                kind: TransactionKind::Expense,
                account_id: None,
                card: Some(("visa".to_string(), CardHolder::Main, march())),
                bill_id: None,
                category_id: None,
            },
        )
        .await?;
        // The helper always stamps a holder; clear or override it to cover rows without one.
        let mut active: transaction::ActiveModel = tx.into();
        active.card_holder = Set(holder);
        Ok(active.update(db).await?)
    }

    fn pay(holder: CardHolder, amount: i64) -> NewInvoicePayment {
        NewInvoicePayment {
            card_id: "visa".to_string(),
            month: march(),
            holder,
            amount,
            date: date(2024, 4, 5),
            account_id: "checking".to_string(),
        }
    }

    #[test]
    fn test_invoice_status_scenarios() {
        assert_eq!(invoice_status(50_000, 50_000, 0), InvoiceStatus::Paid);
        assert_eq!(invoice_status(50_000, 20_000, 30_000), InvoiceStatus::Partial);
        assert_eq!(invoice_status(50_000, 0, 50_000), InvoiceStatus::Open);
        assert_eq!(invoice_status(0, 0, 0), InvoiceStatus::Open);
        assert_eq!(invoice_status(50_000, 49_999, 1), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::Partial.as_str(), "PARCIAL");
    }

    #[test]
    fn test_invoice_key() {
        assert_eq!(invoice_key("visa", month("2024-03")), "visa__2024-03");
    }

    #[tokio::test]
    async fn test_summary_partitions_by_holder() -> Result<()> {
        let db = setup_test_db().await?;
        charge(&db, Some(CardHolder::Main), 20_000, None).await?;
        charge(&db, None, 10_000, None).await?;
        charge(&db, Some(CardHolder::Additional), 4_000, Some(20_000)).await?;

        let summary = invoice_summary(&db, "visa", march()).await?;
        assert_eq!(summary.main.total, 30_000);
        assert_eq!(summary.additional.total, 20_000);
        assert_eq!(summary.total, 50_000);
        assert_eq!(summary.status, InvoiceStatus::Open);
        Ok(())
    }

    #[tokio::test]
    async fn test_payments_move_status_to_paid() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        charge(&db, Some(CardHolder::Main), 30_000, None).await?;
        charge(&db, Some(CardHolder::Additional), 20_000, None).await?;

        let payment = register_invoice_payment(&db, &config, pay(CardHolder::Main, 20_000)).await?;
        let tx = ledger::get_transaction_by_id(&db, &payment.tx_id).await?.unwrap();
        assert_eq!(tx.value, -20_000);
        assert_eq!(tx.kind, TransactionKind::InvoicePayment);

        let summary = invoice_summary(&db, "visa", march()).await?;
        assert_eq!(summary.total, 50_000);
        assert_eq!(summary.paid, 20_000);
        assert_eq!(summary.status, InvoiceStatus::Partial);
        assert_eq!(summary.holder(CardHolder::Main).remaining, 10_000);

        register_invoice_payment(&db, &config, pay(CardHolder::Main, 10_000)).await?;
        register_invoice_payment(&db, &config, pay(CardHolder::Additional, 20_000)).await?;
        let summary = invoice_summary(&db, "visa", march()).await?;
        assert_eq!(summary.remaining, 0);
        assert_eq!(summary.status, InvoiceStatus::Paid);
        assert_eq!(summary.payments.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_overpaying_one_holder_does_not_cover_the_other() -> Result<()> {
        let db = setup_test_db().await?;
        charge(&db, Some(CardHolder::Main), 10_000, None).await?;
        charge(&db, Some(CardHolder::Additional), 10_000, None).await?;
        register_invoice_payment(&db, &test_config(), pay(CardHolder::Main, 20_000)).await?;

        let summary = invoice_summary(&db, "visa", march()).await?;
        assert_eq!(summary.main.remaining, 0);
        assert_eq!(summary.additional.remaining, 10_000);
        assert_eq!(summary.remaining, 10_000);
        assert_eq!(summary.status, InvoiceStatus::Partial);
        Ok(())
    }

    #[tokio::test]
    async fn test_register_validates_before_writing() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();

        let err = register_invoice_payment(&db, &config, pay(CardHolder::Main, 0)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAmount { amount: 0 }));

        let mut no_account = pay(CardHolder::Main, 100);
        no_account.account_id = String::new();
        let err = register_invoice_payment(&db, &config, no_account).await.unwrap_err();
        assert!(matches!(err, Error::MissingSelection { field: "account" }));

        assert!(get_invoice_payments(&db, "visa", march()).await?.is_empty());
        assert!(ledger::get_transactions_for_invoice(&db, "visa", march()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_invoice_payment_removes_linked_transaction() -> Result<()> {
        let db = setup_test_db().await?;
        charge(&db, Some(CardHolder::Main), 10_000, None).await?;
        let payment = register_invoice_payment(&db, &test_config(), pay(CardHolder::Main, 10_000)).await?;

        assert!(delete_invoice_payment(&db, &payment.id).await?);
        assert!(ledger::get_transaction_by_id(&db, &payment.tx_id).await?.is_none());
        assert!(!delete_invoice_payment(&db, &payment.id).await?);

        let summary = invoice_summary(&db, "visa", march()).await?;
        assert_eq!(summary.status, InvoiceStatus::Open);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_invoice_cascades() -> Result<()> {
        let db = setup_test_db().await?;
        charge(&db, Some(CardHolder::Main), 10_000, None).await?;
        charge(&db, Some(CardHolder::Additional), 5_000, None).await?;
        register_invoice_payment(&db, &test_config(), pay(CardHolder::Main, 10_000)).await?;

        let deletion = delete_invoice(&db, "visa", march()).await?;
        assert_eq!(deletion.payments, 1);
        assert_eq!(deletion.transactions, 3);

        assert!(get_invoice_payments(&db, "visa", march()).await?.is_empty());
        assert!(ledger::get_transactions_for_invoice(&db, "visa", march()).await?.is_empty());
        Ok(())
    }

    #[test]
    fn test_format_invoice_summary() {
        let summary = reconcile("visa", month("2024-03"), &[], Vec::new());
        let text = format_invoice_summary(&summary, "BRL");
        assert!(text.starts_with("Invoice visa 2024-03: ABERTA"));
        assert!(!text.contains("Main"));
        assert!(text.contains("Total: R$ 0.00 charged"));
    }
}
