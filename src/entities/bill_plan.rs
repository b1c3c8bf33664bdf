//! Bill plan entity - a fixed number of monthly installments (e.g., a TV bought in 10x).
use super::common::Tags;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bill plan database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bill_plans")]
pub struct Model {
    /// Caller-generated unique id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Amount of each installment in minor units
    pub amount: i64,
    /// Number of installments the plan generates
    pub total_installments: i32,
    /// Month of the first installment (`YYYY-MM`)
    pub start_month: String,
    /// Due day, clamped per month
    pub due_day: i32,
    /// ISO currency code
    pub currency: String,
    /// Category reference
    pub category_id: Option<String>,
    /// Person reference
    pub person_id: Option<String>,
    /// Labels copied onto generated bills
    #[sea_orm(column_type = "Json")]
    pub tags: Tags,
    /// Preferred payment instrument type
    pub default_pay_type: Option<String>,
    /// Preferred account or card id
    pub default_pay_id: Option<String>,
    /// Only active plans propagate edits to future installments
    pub active: bool,
    /// When the plan was created
    pub created_at: DateTime<Utc>,
}

/// `BillPlan` has no relationships enforced by the store
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
