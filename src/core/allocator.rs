//! Loan payment allocation.
//!
//! A loan payment is spread over the loan's open and partial installments, earliest due date
//! first, filling each before the next one gets anything. Whatever is left once every
//! installment is covered stays unallocated; it still lowers the loan balance. Allocation
//! happens exactly once, when the payment is created, and is undone only by [`deallocate`].

use crate::{
    core::money,
    entities::{Allocation, InstallmentStatus, LoanInstallment, loan_installment, loan_payment},
    errors::Result,
};
use sea_orm::{QueryOrder, prelude::*};
use tracing::debug;

/// Money one installment received from a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedShare {
    /// Installment that received the money
    pub installment_id: String,
    /// Amount applied in minor units
    pub amount: i64,
}

/// Result of allocating one payment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationOutcome {
    /// Shares in the order they were applied
    pub applied: Vec<AppliedShare>,
    /// Part of the payment no installment could take
    pub unallocated: i64,
}

impl AllocationOutcome {
    /// Total applied to installments.
    #[must_use]
    pub fn total_applied(&self) -> i64 {
        self.applied.iter().map(|s| s.amount).sum()
    }
}

const fn is_allocatable(status: InstallmentStatus) -> bool {
    matches!(status, InstallmentStatus::Open | InstallmentStatus::Partial)
}

/// Allocates `amount` from `payment_id` across `installments` in place.
///
/// Installments are ordered by due date (then installment number); only open and partial ones
/// take money. Each receives at most its outstanding balance and is marked `paid` once covered
/// within tolerance, `partial` otherwise.
pub fn allocate_across(
    installments: &mut [loan_installment::Model],
    payment_id: &str,
    amount: i64,
) -> AllocationOutcome {
    installments.sort_by_key(|i| (i.due_date, i.installment_no));

    let mut remaining = amount;
    let mut outcome = AllocationOutcome::default();
    for installment in installments.iter_mut() {
        if remaining <= 0 {
            break;
        }
        if !is_allocatable(installment.status) {
            continue;
        }
        let rest = installment.amount - installment.paid_amount;
        if rest <= 0 {
            continue;
        }

        let applied = rest.min(remaining);
        installment.paid_amount += applied;
        installment.allocations.0.push(Allocation {
            payment_id: payment_id.to_string(),
            amount: applied,
        });
        installment.status = if money::is_settled(installment.paid_amount, installment.amount) {
            InstallmentStatus::Paid
        } else {
            InstallmentStatus::Partial
        };
        remaining -= applied;
        outcome.applied.push(AppliedShare {
            installment_id: installment.id.clone(),
            amount: applied,
        });
    }

    outcome.unallocated = remaining.max(0);
    outcome
}

/// Takes back everything `payment_id` contributed to an installment.
///
/// The paid amount never drops below zero and the status falls back to `open` or `partial`,
/// never `paid`. Returns `None` if the payment did not fund this installment.
#[must_use]
pub fn release(installment: &loan_installment::Model, payment_id: &str) -> Option<loan_installment::Model> {
    let contributed: i64 = installment
        .allocations
        .0
        .iter()
        .filter(|a| a.payment_id == payment_id)
        .map(|a| a.amount)
        .sum();
    if !installment.paid_payment_ids().contains(&payment_id) {
        return None;
    }

    let mut released = installment.clone();
    released.allocations.0.retain(|a| a.payment_id != payment_id);
    released.paid_amount = (released.paid_amount - contributed).max(0);
    released.status = if released.paid_amount == 0 {
        InstallmentStatus::Open
    } else {
        InstallmentStatus::Partial
    };
    Some(released)
}

async fn save_installment<C>(db: &C, model: loan_installment::Model) -> Result<loan_installment::Model>
where
    C: ConnectionTrait,
{
    Ok(loan_installment::ActiveModel::from(model)
        .reset_all()
        .update(db)
        .await?)
}

/// Allocates a freshly created payment across its loan's installments and stores the result.
///
/// # Arguments
/// * `db` - Database connection or open transaction
/// * `payment` - The payment just inserted
///
/// # Returns
/// * The share each installment received and the part left unallocated
pub async fn allocate<C>(db: &C, payment: &loan_payment::Model) -> Result<AllocationOutcome>
where
    C: ConnectionTrait,
{
    let mut installments = LoanInstallment::find()
        .filter(loan_installment::Column::LoanId.eq(payment.loan_id.as_str()))
        .filter(
            loan_installment::Column::Status
                .is_in([InstallmentStatus::Open, InstallmentStatus::Partial]),
        )
        .order_by_asc(loan_installment::Column::DueDate)
        .all(db)
        .await?;

    let outcome = allocate_across(&mut installments, &payment.id, payment.amount);
    for installment in installments {
        if outcome.applied.iter().any(|s| s.installment_id == installment.id) {
            save_installment(db, installment).await?;
        }
    }

    debug!(
        "Payment {} allocated {} across {} installments, {} unallocated",
        payment.id,
        outcome.total_applied(),
        outcome.applied.len(),
        outcome.unallocated
    );
    Ok(outcome)
}

/// Rolls a payment's allocation back on every installment of its loan it funded.
///
/// # Arguments
/// * `db` - Database connection or open transaction
/// * `payment` - The payment about to be deleted
///
/// # Returns
/// * The number of installments changed
pub async fn deallocate<C>(db: &C, payment: &loan_payment::Model) -> Result<usize>
where
    C: ConnectionTrait,
{
    let installments = LoanInstallment::find()
        .filter(loan_installment::Column::LoanId.eq(payment.loan_id.as_str()))
        .all(db)
        .await?;

    let mut changed = 0;
    for installment in installments {
        if let Some(released) = release(&installment, &payment.id) {
            save_installment(db, released).await?;
            changed += 1;
        }
    }
    debug!("Payment {} released from {} installments", payment.id, changed);
    Ok(changed)
}
