//! Loan payment entity - money actually handed over for a loan. Append-only; deleting one
//! reverses its allocation on every installment it funded.
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Loan payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loan_payments")]
pub struct Model {
    /// Caller-generated unique id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Loan being repaid
    pub loan_id: String,
    /// Payment date
    pub date: NaiveDate,
    /// Amount in minor units
    pub amount: i64,
    /// Account the money moved through
    pub account_id: Option<String>,
    /// Person who paid or received
    pub person_id: Option<String>,
    /// When the payment was recorded
    pub created_at: DateTime<Utc>,
}

/// Each payment belongs to one loan
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
