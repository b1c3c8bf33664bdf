//! Bill state machine.
//!
//! A bill moves `open → partial → paid`, `open → skipped` and `skipped → open`. Every payment is
//! appended to the bill's history together with the ledger transaction it created, so `undo`
//! can remove both. The legacy single-payment columns (`paid_at`, `paid_tx_id`,
//! `paid_via_type`, `paid_via_id`) mirror the latest payment for older readers.
//!
//! Records written before the state machine existed are healed by [`repair_bill`], a pure
//! function applied whenever a month of bills is loaded.

use crate::{
    config::LedgerConfig,
    core::{
        money::{self, TOLERANCE},
        month::YearMonth,
        transaction::{self as ledger, NewTransaction},
    },
    entities::{Bill, BillPayment, BillPayments, BillStatus, CardHolder, PayVia, TransactionKind, bill},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument, warn};

/// Instrument a bill is paid with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Debit a bank account
    Account {
        /// Account id
        account_id: String,
    },
    /// Charge a credit card; the expense lands on the invoice of the payment month
    Card {
        /// Card id
        card_id: String,
        /// Holder the charge belongs to
        holder: CardHolder,
    },
}

impl PaymentMethod {
    const fn via(&self) -> PayVia {
        match self {
            Self::Account { .. } => PayVia::Account,
            Self::Card { .. } => PayVia::Card,
        }
    }

    fn id(&self) -> &str {
        match self {
            Self::Account { account_id } => account_id,
            Self::Card { card_id, .. } => card_id,
        }
    }

    const fn holder(&self) -> Option<CardHolder> {
        match self {
            Self::Account { .. } => None,
            Self::Card { holder, .. } => Some(*holder),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.id().trim().is_empty() {
            return Err(Error::MissingSelection {
                field: match self {
                    Self::Account { .. } => "account",
                    Self::Card { .. } => "card",
                },
            });
        }
        Ok(())
    }
}

/// A payment the caller wants to record on a bill.
#[derive(Debug, Clone)]
pub struct PayRequest {
    /// Amount in minor units; must be positive
    pub amount: i64,
    /// Payment date
    pub date: NaiveDate,
    /// Instrument used
    pub method: PaymentMethod,
    /// Set once the user confirmed paying more than the remaining balance
    pub confirm_overpay: bool,
}

/// Status implied by a paid amount.
#[must_use]
pub const fn derive_status(paid: i64, amount: i64) -> BillStatus {
    if paid <= 0 {
        BillStatus::Open
    } else if money::is_settled(paid, amount) {
        BillStatus::Paid
    } else {
        BillStatus::Partial
    }
}

fn clear_payment_fields(bill: &mut bill::Model) {
    bill.paid_amount = Some(0);
    bill.payments = BillPayments::default();
    bill.paid_at = None;
    bill.paid_tx_id = None;
    bill.paid_via_type = None;
    bill.paid_via_id = None;
    bill.paid = bill.paid.map(|_| false);
}

fn carries_payment_fields(bill: &bill::Model) -> bool {
    bill.paid_so_far() > 0
        || !bill.payments.0.is_empty()
        || bill.paid_at.is_some()
        || bill.paid_tx_id.is_some()
        || bill.paid_via_type.is_some()
        || bill.paid_via_id.is_some()
        || bill.paid == Some(true)
}

/// Points the legacy single-payment columns at the latest payment, or clears them.
fn sync_legacy_fields(bill: &mut bill::Model) {
    match bill.payments.0.last() {
        Some(last) => {
            bill.paid_at = Some(last.date);
            bill.paid_tx_id.clone_from(&last.tx_id);
            bill.paid_via_type = Some(last.via.as_str().to_string());
            bill.paid_via_id = Some(last.via_id.clone());
        }
        None => {
            bill.paid_at = None;
            bill.paid_tx_id = None;
            bill.paid_via_type = None;
            bill.paid_via_id = None;
        }
    }
    let status = bill.current_status();
    bill.paid = Some(status == BillStatus::Paid);
}

/// Synthesizes a single history entry from the legacy payment columns.
///
/// Applies to bills that carry a paid amount and at least one legacy field but have an empty
/// history. Returns `None` when nothing needs upgrading.
#[must_use]
pub fn upgrade_legacy_payment(bill: &bill::Model) -> Option<bill::Model> {
    let has_legacy = bill.paid_at.is_some() || bill.paid_tx_id.is_some() || bill.paid_via_id.is_some();
    if !bill.payments.0.is_empty() || bill.paid_so_far() <= 0 || !has_legacy {
        return None;
    }

    let mut upgraded = bill.clone();
    upgraded.payments = BillPayments(vec![BillPayment {
        date: bill.paid_at.unwrap_or(bill.due_date),
        amount: bill.paid_so_far(),
        via: bill
            .paid_via_type
            .as_deref()
            .and_then(PayVia::parse)
            .unwrap_or(PayVia::Account),
        via_id: bill.paid_via_id.clone().unwrap_or_default(),
        holder: None,
        tx_id: bill.paid_tx_id.clone(),
    }]);
    Some(upgraded)
}

/// Re-derives a bill's status from its stored fields.
///
/// Rules, applied in order:
/// 1. missing `status` is inferred from the legacy `paid` flag;
/// 2. `paid` without a paid amount is backfilled to the full amount, any other status with a
///    payment history but no paid amount takes it from the history (capped at the amount);
/// 3. `open` with money paid becomes `partial`;
/// 4. `partial` with nothing paid becomes `open`;
/// 5. `partial` covering the amount becomes `paid`;
/// 6. `skipped` carrying payment fields has them cleared;
///
/// then the legacy payment columns are upgraded into the history. Returns `None` when the bill
/// is already consistent; untouched fields are never modified.
#[must_use]
pub fn repair_bill(bill: &bill::Model) -> Option<bill::Model> {
    let mut fixed = bill.clone();

    if fixed.status.is_none() {
        fixed.status = Some(if fixed.paid == Some(true) {
            BillStatus::Paid
        } else {
            BillStatus::Open
        });
    }

    let mut status = fixed.current_status();
    if status == BillStatus::Paid && fixed.paid_so_far() <= 0 {
        fixed.paid_amount = Some(fixed.amount);
    } else if status != BillStatus::Skipped && fixed.paid_so_far() <= 0 && !fixed.payments.0.is_empty() {
        fixed.paid_amount = Some(fixed.payments.total().clamp(0, fixed.amount));
    }
    if status == BillStatus::Open && fixed.paid_so_far() > 0 {
        status = BillStatus::Partial;
    }
    if status == BillStatus::Partial && fixed.paid_so_far() <= 0 {
        status = BillStatus::Open;
    }
    if status == BillStatus::Partial && money::is_settled(fixed.paid_so_far(), fixed.amount) {
        status = BillStatus::Paid;
    }
    if status == BillStatus::Skipped && carries_payment_fields(&fixed) {
        clear_payment_fields(&mut fixed);
    }
    fixed.status = Some(status);

    if let Some(upgraded) = upgrade_legacy_payment(&fixed) {
        fixed = upgraded;
    }

    (fixed != *bill).then_some(fixed)
}

/// Runs [`repair_bill`] over a set of bills.
///
/// Returns only the bills that changed, and how many there were. Persisting them is up to
/// the caller.
#[must_use]
pub fn repair_bills(bills: &[bill::Model]) -> (Vec<bill::Model>, usize) {
    let repaired: Vec<bill::Model> = bills.iter().filter_map(repair_bill).collect();
    let count = repaired.len();
    (repaired, count)
}

/// Replaces the whole stored record with `model`.
pub(crate) async fn save_bill<C>(db: &C, model: bill::Model) -> Result<bill::Model>
where
    C: ConnectionTrait,
{
    Ok(bill::ActiveModel::from(model).reset_all().update(db).await?)
}

/// Retrieves a bill by id.
pub async fn get_bill_by_id<C>(db: &C, bill_id: &str) -> Result<Option<bill::Model>>
where
    C: ConnectionTrait,
{
    Bill::find_by_id(bill_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Fetches one bill and runs [`repair_bill`] on it, so transitions see its real state.
async fn load_repaired<C>(db: &C, bill_id: &str) -> Result<bill::Model>
where
    C: ConnectionTrait,
{
    let stored = get_bill_by_id(db, bill_id)
        .await?
        .ok_or_else(|| Error::not_found("bill", bill_id))?;
    Ok(repair_bill(&stored).unwrap_or(stored))
}

/// Loads every bill of a month, repaired.
///
/// Repaired records are written back one by one; a failed write is logged and does not fail
/// the read, the repaired version is returned either way.
#[instrument(skip(db))]
pub async fn load_bills_for_month(db: &DatabaseConnection, month: YearMonth) -> Result<Vec<bill::Model>> {
    let bills = Bill::find()
        .filter(bill::Column::Month.eq(month.to_string()))
        .order_by_asc(bill::Column::DueDate)
        .all(db)
        .await?;

    let mut loaded = Vec::with_capacity(bills.len());
    let mut repaired_count = 0usize;
    for stored in bills {
        match repair_bill(&stored) {
            Some(fixed) => {
                repaired_count += 1;
                if let Err(e) = save_bill(db, fixed.clone()).await {
                    warn!("Failed to persist repair of bill {}: {}", fixed.id, e);
                }
                loaded.push(fixed);
            }
            None => loaded.push(stored),
        }
    }

    if repaired_count > 0 {
        info!("Repaired {} bills for {}", repaired_count, month);
    }
    Ok(loaded)
}

/// Records a payment on a bill.
///
/// Creates the ledger transaction (an expense on the account or card), appends the payment to
/// the bill's history and re-derives its status. The bill's paid amount never exceeds its
/// amount; an overpayment must be confirmed by the caller and is kept whole in the history and
/// the ledger.
///
/// # Errors
/// * [`Error::InvalidAmount`] for a non-positive amount
/// * [`Error::MissingSelection`] without an account or card id
/// * [`Error::NotFound`] if the bill no longer exists
/// * [`Error::InvalidTransition`] on a skipped bill
/// * [`Error::ExceedsRemaining`] when the amount exceeds the balance and was not confirmed
#[instrument(skip(db, config, request), fields(amount = request.amount))]
pub async fn pay_bill(
    db: &DatabaseConnection,
    config: &LedgerConfig,
    bill_id: &str,
    request: PayRequest,
) -> Result<bill::Model> {
    if request.amount <= 0 {
        return Err(Error::InvalidAmount {
            amount: request.amount,
        });
    }
    request.method.validate()?;

    let txn = db.begin().await?;

    let mut bill = load_repaired(&txn, bill_id).await?;

    let status = bill.current_status();
    if matches!(status, BillStatus::Skipped | BillStatus::Paid) {
        return Err(Error::InvalidTransition {
            action: "pay",
            status,
        });
    }

    let remaining = bill.remaining();
    if request.amount > remaining + TOLERANCE && !request.confirm_overpay {
        return Err(Error::ExceedsRemaining {
            amount: request.amount,
            remaining,
        });
    }

    let value_brl = if bill.currency == config.base_currency {
        None
    } else {
        Some(money::convert(request.amount, config.exchange_rate)?)
    };
    let card = match &request.method {
        PaymentMethod::Card { card_id, holder } => {
            Some((card_id.clone(), *holder, YearMonth::of(request.date)))
        }
        PaymentMethod::Account { .. } => None,
    };
    let account_id = match &request.method {
        PaymentMethod::Account { account_id } => Some(account_id.clone()),
        PaymentMethod::Card { .. } => None,
    };

    let tx_id = ledger::new_id();
    ledger::create_transaction(
        &txn,
        tx_id.clone(),
        NewTransaction {
            date: request.date,
            description: bill.display_name(),
            value: request.amount,
            value_brl,
            currency: bill.currency.clone(),
            kind: TransactionKind::Expense,
            account_id,
            card,
            bill_id: Some(bill.id.clone()),
            category_id: bill.category_id.clone(),
        },
    )
    .await?;

    bill.payments.0.push(BillPayment {
        date: request.date,
        amount: request.amount,
        via: request.method.via(),
        via_id: request.method.id().to_string(),
        holder: request.method.holder(),
        tx_id: Some(tx_id),
    });
    let paid = (bill.paid_so_far() + request.amount).min(bill.amount);
    bill.paid_amount = Some(paid);
    bill.status = Some(derive_status(paid, bill.amount));
    sync_legacy_fields(&mut bill);

    let saved = save_bill(&txn, bill).await?;
    txn.commit().await?;

    info!(
        "Paid {} on bill '{}' ({} → {})",
        request.amount,
        saved.display_name(),
        status.as_str(),
        saved.current_status().as_str()
    );
    Ok(saved)
}

/// Removes the payment at `payment_index` from a bill's history.
///
/// Deletes its ledger transaction, recomputes the paid amount from the remaining history and
/// re-derives the status. Falling back to `open` clears the legacy payment columns.
///
/// # Errors
/// * [`Error::NotFound`] if the bill no longer exists
/// * [`Error::PaymentIndex`] if the index is outside the history
#[instrument(skip(db))]
pub async fn undo_bill_payment(
    db: &DatabaseConnection,
    bill_id: &str,
    payment_index: usize,
) -> Result<bill::Model> {
    let txn = db.begin().await?;

    let mut bill = load_repaired(&txn, bill_id).await?;

    let len = bill.payments.0.len();
    if payment_index >= len {
        return Err(Error::PaymentIndex {
            index: payment_index,
            len,
        });
    }

    let removed = bill.payments.0.remove(payment_index);
    if let Some(tx_id) = &removed.tx_id {
        if !ledger::delete_transaction(&txn, tx_id).await? {
            debug!("Transaction {} of bill {} was already gone", tx_id, bill.id);
        }
    }

    let paid = bill.payments.total().min(bill.amount).max(0);
    bill.paid_amount = Some(paid);
    bill.status = Some(derive_status(paid, bill.amount));
    sync_legacy_fields(&mut bill);

    let saved = save_bill(&txn, bill).await?;
    txn.commit().await?;

    info!(
        "Undid payment of {} on bill '{}', now {}",
        removed.amount,
        saved.display_name(),
        saved.current_status().as_str()
    );
    Ok(saved)
}

/// Marks an open bill as skipped for its month.
///
/// # Errors
/// [`Error::InvalidTransition`] unless the bill is open; [`Error::NotFound`] if it is gone.
#[instrument(skip(db))]
pub async fn skip_bill(db: &DatabaseConnection, bill_id: &str) -> Result<bill::Model> {
    let mut bill = load_repaired(db, bill_id).await?;

    let status = bill.current_status();
    if status != BillStatus::Open {
        return Err(Error::InvalidTransition {
            action: "skip",
            status,
        });
    }

    clear_payment_fields(&mut bill);
    bill.status = Some(BillStatus::Skipped);
    bill.skipped_at = Some(Utc::now());

    let saved = save_bill(db, bill).await?;
    info!("Skipped bill '{}' for {}", saved.display_name(), saved.month);
    Ok(saved)
}

/// Returns a skipped bill to open.
///
/// # Errors
/// [`Error::InvalidTransition`] unless the bill is skipped; [`Error::NotFound`] if it is gone.
#[instrument(skip(db))]
pub async fn unskip_bill(db: &DatabaseConnection, bill_id: &str) -> Result<bill::Model> {
    let mut bill = load_repaired(db, bill_id).await?;

    let status = bill.current_status();
    if status != BillStatus::Skipped {
        return Err(Error::InvalidTransition {
            action: "unskip",
            status,
        });
    }

    bill.status = Some(BillStatus::Open);
    bill.skipped_at = None;
    let saved = save_bill(db, bill).await?;
    info!("Unskipped bill '{}'", saved.display_name());
    Ok(saved)
}

/// Pays the remaining balance of every open or partial bill of a month.
///
/// Bills are paid one after another with no rollback: if one fails, the bills already paid
/// stay paid and the error is returned. Running it again only touches what is still open.
#[instrument(skip(db, config, method))]
pub async fn pay_all_open(
    db: &DatabaseConnection,
    config: &LedgerConfig,
    month: YearMonth,
    method: &PaymentMethod,
    date: NaiveDate,
) -> Result<Vec<bill::Model>> {
    method.validate()?;
    let bills = load_bills_for_month(db, month).await?;

    let mut paid = Vec::new();
    for bill in bills {
        let status = bill.current_status();
        if !matches!(status, BillStatus::Open | BillStatus::Partial) || bill.remaining() <= 0 {
            continue;
        }
        let request = PayRequest {
            amount: bill.remaining(),
            date,
            method: method.clone(),
            confirm_overpay: false,
        };
        paid.push(pay_bill(db, config, &bill.id, request).await?);
    }

    info!("Marked {} bills paid for {}", paid.len(), month);
    Ok(paid)
}
