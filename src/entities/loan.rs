//! Loan entity - a peer-to-peer loan, either owed by the household or owed to it.
//!
//! A loan owns its installments and payments; the balance (`saldo`) is derived from payments
//! and never stored.

use super::common::{LoanRole, LoanStatus};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Loan database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    /// Caller-generated unique id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Short description ("Car repair from Ana")
    pub description: String,
    /// Amount lent in minor units
    pub principal: i64,
    /// ISO currency code
    pub currency: String,
    /// Which side the household is on
    pub role: LoanRole,
    /// Person who borrowed
    pub borrower_person_id: Option<String>,
    /// Person who lent
    pub lender_person_id: Option<String>,
    /// Number of installments, when repaid in installments
    pub total_installments: Option<i32>,
    /// Amount of each installment in minor units
    pub installment_amount: Option<i64>,
    /// Due day of installments, clamped per month
    pub due_day: Option<i32>,
    /// Date the loan was made
    pub start_date: NaiveDate,
    /// Persisted status
    pub status: LoanStatus,
    /// When the loan was created
    pub created_at: DateTime<Utc>,
}

/// Defines relationships between Loan and its children
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One loan has many installments
    #[sea_orm(has_many = "super::loan_installment::Entity")]
    Installments,
    /// One loan has many payments
    #[sea_orm(has_many = "super::loan_payment::Entity")]
    Payments,
}

impl Related<super::loan_installment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Installments.def()
    }
}

impl Related<super::loan_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
