//! Bill template entity - a recurring monthly obligation (rent, internet, school fees).
//!
//! Templates are user-authored and long-lived. Generated bills keep a `template_id` back-reference
//! and a snapshot of the template's fields at generation time.

use super::common::Tags;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bill template database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bill_templates")]
pub struct Model {
    /// Caller-generated unique id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name of the bill (e.g., "Rent")
    pub name: String,
    /// Monthly amount in minor units
    pub amount: i64,
    /// ISO currency code
    pub currency: String,
    /// Category reference, managed elsewhere
    pub category_id: Option<String>,
    /// Person reference, managed elsewhere
    pub person_id: Option<String>,
    /// Day of month the bill falls due (1-31, clamped per month)
    pub due_day: i32,
    /// Labels copied onto generated bills
    #[sea_orm(column_type = "Json")]
    pub tags: Tags,
    /// Preferred payment instrument type (`"account"` or `"card"`)
    pub default_pay_type: Option<String>,
    /// Preferred account or card id
    pub default_pay_id: Option<String>,
    /// Inactive templates are ignored by month generation
    pub active: bool,
    /// Manual ordering within a month
    pub sort_order: i32,
    /// Pinned bills are listed first
    pub pinned: bool,
    /// When the template was created
    pub created_at: DateTime<Utc>,
}

/// `BillTemplate` has no relationships enforced by the store
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
