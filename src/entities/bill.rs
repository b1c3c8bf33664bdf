//! Bill entity - one obligation instance for one calendar month.
//!
//! A bill is generated from a template (`template_id` + `month`) or from a plan
//! (`plan_id` + `installment_number`), or entered by hand. Money is in minor units.
//!
//! `status`, `paid`, `paid_amount` and the `paid_*` columns are nullable because older records
//! were written before the status machine existed; the repair pass in
//! [`crate::core::bill`] normalizes them when bills are loaded.

use super::common::{BillPayments, BillStatus, Tags};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bill database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bills")]
pub struct Model {
    /// Caller-generated unique id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Template that generated this bill
    pub template_id: Option<String>,
    /// Plan that generated this bill
    pub plan_id: Option<String>,
    /// Position within the plan (1-based)
    pub installment_number: Option<i32>,
    /// Number of installments in the plan
    pub installment_total: Option<i32>,
    /// Display name
    pub name: String,
    /// Calendar month the bill belongs to (`YYYY-MM`)
    pub month: String,
    /// Due date inside `month`
    pub due_date: NaiveDate,
    /// Amount due in minor units
    pub amount: i64,
    /// ISO currency code
    pub currency: String,
    /// Category reference
    pub category_id: Option<String>,
    /// Person reference
    pub person_id: Option<String>,
    /// Labels
    #[sea_orm(column_type = "Json")]
    pub tags: Tags,
    /// Current status; `None` on legacy records
    pub status: Option<BillStatus>,
    /// Legacy paid flag from before `status` existed
    pub paid: Option<bool>,
    /// Amount paid so far in minor units
    pub paid_amount: Option<i64>,
    /// Payment history, oldest first
    #[sea_orm(column_type = "Json")]
    pub payments: BillPayments,
    /// Legacy: date of the last payment
    pub paid_at: Option<NaiveDate>,
    /// Legacy: transaction of the last payment
    pub paid_tx_id: Option<String>,
    /// Legacy: instrument type of the last payment
    pub paid_via_type: Option<String>,
    /// Legacy: instrument id of the last payment
    pub paid_via_id: Option<String>,
    /// When the bill was skipped
    pub skipped_at: Option<DateTime<Utc>>,
    /// Preferred payment instrument type
    pub default_pay_type: Option<String>,
    /// Preferred account or card id
    pub default_pay_id: Option<String>,
    /// Set when the user edited the bill; blocks template sync
    pub user_edited: bool,
    /// Manual ordering within a month
    pub sort_order: i32,
    /// Pinned bills are listed first
    pub pinned: bool,
    /// When the bill was created
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Status with legacy records read as open.
    #[must_use]
    pub fn current_status(&self) -> BillStatus {
        self.status.unwrap_or(BillStatus::Open)
    }

    /// Paid amount with a missing value read as zero.
    #[must_use]
    pub fn paid_so_far(&self) -> i64 {
        self.paid_amount.unwrap_or(0)
    }

    /// Amount still owed, never negative.
    #[must_use]
    pub fn remaining(&self) -> i64 {
        (self.amount - self.paid_so_far()).max(0)
    }

    /// Name with the installment suffix for plan bills, e.g. `"Sofa (3/10)"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (self.installment_number, self.installment_total) {
            (Some(n), Some(total)) => format!("{} ({n}/{total})", self.name),
            _ => self.name.clone(),
        }
    }
}

/// `Bill` keeps template/plan ids as plain references so history survives template deletion
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
