//! Loan ledger.
//!
//! A loan's balance (`saldo`) is `max(0, principal - sum of payments)`, derived on every read.
//! An open loan whose balance is within a cent of zero is shown as closed without the stored
//! status changing.

use crate::{
    core::{
        allocator::{self, AllocationOutcome},
        money::TOLERANCE,
        month::YearMonth,
        transaction::new_id,
    },
    entities::{
        Allocations, InstallmentStatus, Loan, LoanInstallment, LoanPayment, LoanStatus, loan,
        loan_installment, loan_payment,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Derived state of a loan.
#[derive(Debug, Clone)]
pub struct LoanSummary {
    /// The stored loan
    pub loan: loan::Model,
    /// Sum of all payments
    pub total_paid: i64,
    /// Outstanding balance, never negative
    pub saldo: i64,
    /// Status for display and filtering
    pub effective_status: LoanStatus,
    /// Installments fully paid
    pub installments_paid: usize,
    /// Installments open or partial
    pub installments_open: usize,
    /// Due date of the earliest open or partial installment
    pub next_due: Option<NaiveDate>,
}

/// A loan payment to record.
#[derive(Debug, Clone)]
pub struct NewLoanPayment {
    /// Loan being repaid
    pub loan_id: String,
    /// Payment date
    pub date: NaiveDate,
    /// Amount in minor units; must be positive
    pub amount: i64,
    /// Account the money moved through
    pub account_id: Option<String>,
    /// Person who paid or received
    pub person_id: Option<String>,
}

/// A stored payment and how it was allocated.
#[derive(Debug, Clone)]
pub struct LoanPaymentOutcome {
    /// The stored payment
    pub payment: loan_payment::Model,
    /// Allocation across installments
    pub allocation: AllocationOutcome,
}

/// Outcome of generating a loan's installment schedule.
#[derive(Debug, Clone, Default)]
pub struct InstallmentReport {
    /// Installments created by this run
    pub created: Vec<loan_installment::Model>,
    /// Installments that already existed
    pub already_existed: usize,
}

/// Sum of payment amounts.
#[must_use]
pub fn total_paid(payments: &[loan_payment::Model]) -> i64 {
    payments.iter().map(|p| p.amount).sum()
}

/// Outstanding balance: `max(0, principal - total_paid)`.
#[must_use]
pub const fn saldo(principal: i64, total_paid: i64) -> i64 {
    let balance = principal - total_paid;
    if balance > 0 { balance } else { 0 }
}

/// Status to show for a loan: open loans with nothing left to pay read as closed.
#[must_use]
pub fn effective_status(loan: &loan::Model, saldo: i64) -> LoanStatus {
    if loan.status == LoanStatus::Open && saldo <= TOLERANCE {
        LoanStatus::Closed
    } else {
        loan.status
    }
}

/// Payments of a loan, oldest first.
pub async fn get_loan_payments<C>(db: &C, loan_id: &str) -> Result<Vec<loan_payment::Model>>
where
    C: ConnectionTrait,
{
    LoanPayment::find()
        .filter(loan_payment::Column::LoanId.eq(loan_id))
        .order_by_asc(loan_payment::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Installments of a loan in schedule order.
pub async fn get_loan_installments<C>(db: &C, loan_id: &str) -> Result<Vec<loan_installment::Model>>
where
    C: ConnectionTrait,
{
    LoanInstallment::find()
        .filter(loan_installment::Column::LoanId.eq(loan_id))
        .order_by_asc(loan_installment::Column::DueDate)
        .order_by_asc(loan_installment::Column::InstallmentNo)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn summarize(db: &DatabaseConnection, loan: loan::Model) -> Result<LoanSummary> {
    let payments = get_loan_payments(db, &loan.id).await?;
    let installments = get_loan_installments(db, &loan.id).await?;

    let total_paid = total_paid(&payments);
    let saldo = saldo(loan.principal, total_paid);
    let open: Vec<&loan_installment::Model> = installments
        .iter()
        .filter(|i| matches!(i.status, InstallmentStatus::Open | InstallmentStatus::Partial))
        .collect();

    Ok(LoanSummary {
        effective_status: effective_status(&loan, saldo),
        total_paid,
        saldo,
        installments_paid: installments
            .iter()
            .filter(|i| i.status == InstallmentStatus::Paid)
            .count(),
        installments_open: open.len(),
        next_due: open.first().map(|i| i.due_date),
        loan,
    })
}

/// Derives paid total, balance and display status of one loan.
///
/// # Arguments
/// * `db` - Database connection
/// * `loan_id` - The loan to summarize
///
/// # Returns
/// * The stored loan with its derived totals, installment counts and next due date
///
/// # Errors
/// [`Error::NotFound`] if the loan does not exist.
pub async fn loan_summary(db: &DatabaseConnection, loan_id: &str) -> Result<LoanSummary> {
    let loan = Loan::find_by_id(loan_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("loan", loan_id))?;
    summarize(db, loan).await
}

/// Summaries of all loans, optionally only those whose effective status matches.
///
/// # Arguments
/// * `db` - Database connection
/// * `status` - Keep only loans whose effective status is this one; `None` keeps all
///
/// # Returns
/// * Summaries ordered by start date
pub async fn list_loans(db: &DatabaseConnection, status: Option<LoanStatus>) -> Result<Vec<LoanSummary>> {
    let loans = Loan::find()
        .order_by_asc(loan::Column::StartDate)
        .all(db)
        .await?;

    let mut summaries = Vec::with_capacity(loans.len());
    for loan in loans {
        let summary = summarize(db, loan).await?;
        if status.is_none_or(|s| s == summary.effective_status) {
            summaries.push(summary);
        }
    }
    Ok(summaries)
}

/// Creates every missing installment of a loan's schedule.
///
/// Installment `i` falls in the month of `start_date` plus `i - 1`, on the loan's due day
/// (the start date's day when unset) clamped to the month's length.
///
/// # Errors
/// [`Error::NotFound`] if the loan does not exist; [`Error::MissingSelection`] if it has no
/// installment count or amount.
#[instrument(skip(db))]
pub async fn generate_loan_installments(db: &DatabaseConnection, loan_id: &str) -> Result<InstallmentReport> {
    let loan = Loan::find_by_id(loan_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("loan", loan_id))?;

    let total = loan
        .total_installments
        .filter(|n| *n > 0)
        .ok_or(Error::MissingSelection {
            field: "total_installments",
        })?;
    let amount = loan
        .installment_amount
        .filter(|a| *a > 0)
        .ok_or(Error::MissingSelection {
            field: "installment_amount",
        })?;
    #[allow(clippy::cast_possible_wrap)]
    let due_day = loan.due_day.unwrap_or(loan.start_date.day() as i32);
    let start = YearMonth::of(loan.start_date);

    let existing: Vec<i32> = get_loan_installments(db, &loan.id)
        .await?
        .iter()
        .map(|i| i.installment_no)
        .collect();

    let mut report = InstallmentReport::default();
    for number in 1..=total {
        if existing.contains(&number) {
            report.already_existed += 1;
            continue;
        }
        let due_date = start.add_months(number - 1).day_clamped(due_day)?;
        let installment = loan_installment::ActiveModel {
            id: Set(new_id()),
            loan_id: Set(loan.id.clone()),
            installment_no: Set(number),
            installment_total: Set(total),
            due_date: Set(due_date),
            amount: Set(amount),
            paid_amount: Set(0),
            status: Set(InstallmentStatus::Open),
            allocations: Set(Allocations::default()),
        };
        report.created.push(installment.insert(db).await?);
    }

    info!(
        "Loan '{}': {} installments created, {} already existed",
        loan.description,
        report.created.len(),
        report.already_existed
    );
    Ok(report)
}

/// Records a loan payment and allocates it across the loan's installments.
///
/// # Errors
/// [`Error::InvalidAmount`] for a non-positive amount; [`Error::NotFound`] if the loan is gone.
#[instrument(skip(db, new), fields(loan_id = %new.loan_id, amount = new.amount))]
pub async fn register_loan_payment(db: &DatabaseConnection, new: NewLoanPayment) -> Result<LoanPaymentOutcome> {
    if new.amount <= 0 {
        return Err(Error::InvalidAmount { amount: new.amount });
    }

    let txn = db.begin().await?;
    Loan::find_by_id(new.loan_id.clone())
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("loan", new.loan_id.as_str()))?;

    let payment = loan_payment::ActiveModel {
        id: Set(new_id()),
        loan_id: Set(new.loan_id),
        date: Set(new.date),
        amount: Set(new.amount),
        account_id: Set(new.account_id),
        person_id: Set(new.person_id),
        created_at: Set(Utc::now()),
    }
    .insert(&txn)
    .await?;

    let allocation = allocator::allocate(&txn, &payment).await?;
    txn.commit().await?;

    info!(
        "Loan payment {} of {}: {} allocated, {} unallocated",
        payment.id,
        payment.amount,
        allocation.total_applied(),
        allocation.unallocated
    );
    Ok(LoanPaymentOutcome {
        payment,
        allocation,
    })
}

/// Deletes a loan payment after rolling back its allocation.
///
/// Returns `false` if the payment no longer exists.
#[instrument(skip(db))]
pub async fn delete_loan_payment(db: &DatabaseConnection, payment_id: &str) -> Result<bool> {
    let txn = db.begin().await?;
    let Some(payment) = LoanPayment::find_by_id(payment_id.to_string())
        .one(&txn)
        .await?
    else {
        return Ok(false);
    };

    let released = allocator::deallocate(&txn, &payment).await?;
    payment.delete(&txn).await?;
    txn.commit().await?;

    info!("Deleted loan payment {} ({} installments released)", payment_id, released);
    Ok(true)
}

/// Deletes a loan with its payments and installments.
///
/// Returns `false` if the loan no longer exists.
#[instrument(skip(db))]
pub async fn delete_loan(db: &DatabaseConnection, loan_id: &str) -> Result<bool> {
    let txn = db.begin().await?;
    let Some(loan) = Loan::find_by_id(loan_id.to_string()).one(&txn).await? else {
        return Ok(false);
    };

    let payments = LoanPayment::delete_many()
        .filter(loan_payment::Column::LoanId.eq(loan_id))
        .exec(&txn)
        .await?;
    let installments = LoanInstallment::delete_many()
        .filter(loan_installment::Column::LoanId.eq(loan_id))
        .exec(&txn)
        .await?;
    loan.delete(&txn).await?;
    txn.commit().await?;

    info!(
        "Deleted loan {} with {} payments and {} installments",
        loan_id, payments.rows_affected, installments.rows_affected
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn payment(loan_id: &str, amount: i64) -> NewLoanPayment {
        NewLoanPayment {
            loan_id: loan_id.to_string(),
            date: date(2024, 2, 1),
            amount,
            account_id: Some("checking".to_string()),
            person_id: None,
        }
    }

    #[test]
    fn test_saldo_never_negative() {
        assert_eq!(saldo(30_000, 10_000), 20_000);
        assert_eq!(saldo(30_000, 30_000), 0);
        assert_eq!(saldo(30_000, 45_000), 0);
    }

    #[tokio::test]
    async fn test_overpayment_scenario_keeps_loan_open_with_balance() -> Result<()> {
        let db = setup_test_db().await?;
        let loan = create_test_loan(&db, 30_000, None, None).await?;
        create_test_installment(&db, &loan.id, 1, date(2024, 2, 15), 10_000).await?;
        create_test_installment(&db, &loan.id, 2, date(2024, 3, 15), 10_000).await?;

        let outcome = register_loan_payment(&db, payment(&loan.id, 25_000)).await?;
        assert_eq!(outcome.allocation.total_applied(), 20_000);
        assert_eq!(outcome.allocation.unallocated, 5_000);

        let installments = get_loan_installments(&db, &loan.id).await?;
        assert!(installments.iter().all(|i| i.status == InstallmentStatus::Paid));
        assert!(installments.iter().all(|i| i.paid_amount == 10_000));

        let summary = loan_summary(&db, &loan.id).await?;
        assert_eq!(summary.total_paid, 25_000);
        assert_eq!(summary.saldo, 5_000);
        assert_eq!(summary.effective_status, LoanStatus::Open);
        assert_eq!(summary.installments_paid, 2);
        assert!(summary.next_due.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_loan_auto_closes_for_display_only() -> Result<()> {
        let db = setup_test_db().await?;
        let loan = create_test_loan(&db, 20_000, None, None).await?;
        create_test_installment(&db, &loan.id, 1, date(2024, 2, 15), 10_000).await?;
        create_test_installment(&db, &loan.id, 2, date(2024, 3, 15), 10_000).await?;

        register_loan_payment(&db, payment(&loan.id, 25_000)).await?;

        let summary = loan_summary(&db, &loan.id).await?;
        assert_eq!(summary.saldo, 0);
        assert_eq!(summary.effective_status, LoanStatus::Closed);
        assert_eq!(summary.loan.status, LoanStatus::Open);

        let stored = Loan::find_by_id(loan.id.clone()).one(&db).await?.unwrap();
        assert_eq!(stored.status, LoanStatus::Open);

        assert_eq!(list_loans(&db, Some(LoanStatus::Closed)).await?.len(), 1);
        assert!(list_loans(&db, Some(LoanStatus::Open)).await?.is_empty());
        assert_eq!(list_loans(&db, None).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_register_rejects_non_positive_amount() -> Result<()> {
        let db = setup_test_db().await?;
        let loan = create_test_loan(&db, 20_000, None, None).await?;

        let err = register_loan_payment(&db, payment(&loan.id, 0)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAmount { amount: 0 }));
        assert!(get_loan_payments(&db, &loan.id).await?.is_empty());

        let err = register_loan_payment(&db, payment("ghost", 100)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "loan", .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_payment_reverses_allocation() -> Result<()> {
        let db = setup_test_db().await?;
        let loan = create_test_loan(&db, 30_000, None, None).await?;
        create_test_installment(&db, &loan.id, 1, date(2024, 2, 15), 10_000).await?;
        create_test_installment(&db, &loan.id, 2, date(2024, 3, 15), 10_000).await?;

        let first = register_loan_payment(&db, payment(&loan.id, 5_000)).await?;
        let second = register_loan_payment(&db, payment(&loan.id, 10_000)).await?;

        assert!(delete_loan_payment(&db, &second.payment.id).await?);
        let installments = get_loan_installments(&db, &loan.id).await?;
        assert_eq!(installments[0].paid_amount, 5_000);
        assert_eq!(installments[0].status, InstallmentStatus::Partial);
        assert_eq!(installments[0].paid_payment_ids(), vec![first.payment.id.as_str()]);
        assert_eq!(installments[1].paid_amount, 0);
        assert_eq!(installments[1].status, InstallmentStatus::Open);

        assert!(delete_loan_payment(&db, &first.payment.id).await?);
        let installments = get_loan_installments(&db, &loan.id).await?;
        assert!(installments.iter().all(|i| i.paid_amount == 0));
        assert!(installments.iter().all(|i| i.status == InstallmentStatus::Open));

        assert!(!delete_loan_payment(&db, &first.payment.id).await?);
        assert_eq!(loan_summary(&db, &loan.id).await?.total_paid, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_loan_cascades() -> Result<()> {
        let db = setup_test_db().await?;
        let loan = create_test_loan(&db, 30_000, None, None).await?;
        let other = create_test_loan(&db, 10_000, None, None).await?;
        create_test_installment(&db, &loan.id, 1, date(2024, 2, 15), 10_000).await?;
        create_test_installment(&db, &other.id, 1, date(2024, 2, 15), 10_000).await?;
        register_loan_payment(&db, payment(&loan.id, 10_000)).await?;
        register_loan_payment(&db, payment(&other.id, 1_000)).await?;

        assert!(delete_loan(&db, &loan.id).await?);
        assert!(Loan::find_by_id(loan.id.clone()).one(&db).await?.is_none());
        assert!(get_loan_payments(&db, &loan.id).await?.is_empty());
        assert!(get_loan_installments(&db, &loan.id).await?.is_empty());

        assert_eq!(get_loan_payments(&db, &other.id).await?.len(), 1);
        assert_eq!(get_loan_installments(&db, &other.id).await?.len(), 1);

        assert!(!delete_loan(&db, &loan.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_loan_installments() -> Result<()> {
        let db = setup_test_db().await?;
        let mut fixture = create_test_loan(&db, 30_000, Some(3), Some(10_000)).await?;
        fixture.due_day = Some(31);
        let loan = loan::ActiveModel::from(fixture).reset_all().update(&db).await?;

        let report = generate_loan_installments(&db, &loan.id).await?;
        let dues: Vec<NaiveDate> = report.created.iter().map(|i| i.due_date).collect();
        assert_eq!(dues, vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31)]);
        assert!(report.created.iter().all(|i| i.installment_total == 3));

        let again = generate_loan_installments(&db, &loan.id).await?;
        assert!(again.created.is_empty());
        assert_eq!(again.already_existed, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_requires_schedule() -> Result<()> {
        let db = setup_test_db().await?;
        let loan = create_test_loan(&db, 30_000, None, None).await?;
        let err = generate_loan_installments(&db, &loan.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::MissingSelection {
                field: "total_installments"
            }
        ));
        Ok(())
    }
}
