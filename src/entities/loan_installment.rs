//! Loan installment entity - one scheduled repayment of a loan.
//!
//! `allocations` records which loan payments funded the installment and how much each one
//! contributed, so deleting a payment can roll its allocation back.

use super::common::{Allocations, InstallmentStatus};
use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Loan installment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loan_installments")]
pub struct Model {
    /// Caller-generated unique id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owning loan
    pub loan_id: String,
    /// Position in the schedule (1-based)
    pub installment_no: i32,
    /// Number of installments in the schedule
    pub installment_total: i32,
    /// Due date
    pub due_date: NaiveDate,
    /// Amount due in minor units
    pub amount: i64,
    /// Amount allocated so far in minor units
    pub paid_amount: i64,
    /// Current status
    pub status: InstallmentStatus,
    /// Payments that funded this installment
    #[sea_orm(column_type = "Json")]
    pub allocations: Allocations,
}

impl Model {
    /// Ids of the payments that funded this installment.
    #[must_use]
    pub fn paid_payment_ids(&self) -> Vec<&str> {
        self.allocations
            .0
            .iter()
            .map(|a| a.payment_id.as_str())
            .collect()
    }
}

/// Each installment belongs to one loan
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Owning loan
    #[sea_orm(
        belongs_to = "super::loan::Entity",
        from = "Column::LoanId",
        to = "super::loan::Column::Id"
    )]
    Loan,
}

impl Related<super::loan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
