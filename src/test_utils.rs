//! Shared test utilities for the obligation ledger.
//!
//! This module provides helpers for setting up an in-memory store and creating templates,
//! plans, bills and loans with sensible defaults.

use crate::{
    config::LedgerConfig,
    core::{month::YearMonth, transaction::new_id},
    entities::{
        BillPayments, BillStatus, InstallmentStatus, LoanRole, LoanStatus, Tags, bill, bill_plan,
        bill_template, loan, loan_installment,
    },
    errors::Result,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all store-backed tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Ledger configuration with BRL as base currency and a 5.00 exchange rate.
#[must_use]
pub fn test_config() -> LedgerConfig {
    LedgerConfig {
        exchange_rate: rust_decimal::Decimal::new(500, 2),
        ..LedgerConfig::default()
    }
}

/// Shorthand for a date in tests.
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// Shorthand for a month in tests.
#[must_use]
pub fn month(text: &str) -> YearMonth {
    text.parse().unwrap_or_else(|_| YearMonth::current())
}

/// Creates an active BRL template with no category, person or tags.
pub async fn create_test_template(
    db: &DatabaseConnection,
    name: &str,
    amount: i64,
    due_day: i32,
) -> Result<bill_template::Model> {
    let template = bill_template::ActiveModel {
        id: Set(new_id()),
        name: Set(name.to_string()),
        amount: Set(amount),
        currency: Set("BRL".to_string()),
        category_id: Set(None),
        person_id: Set(None),
        due_day: Set(due_day),
        tags: Set(Tags::default()),
        default_pay_type: Set(None),
        default_pay_id: Set(None),
        active: Set(true),
        sort_order: Set(0),
        pinned: Set(false),
        created_at: Set(Utc::now()),
    };
    Ok(template.insert(db).await?)
}

/// Creates an active BRL plan.
pub async fn create_test_plan(
    db: &DatabaseConnection,
    name: &str,
    amount: i64,
    total_installments: i32,
    start_month: &str,
    due_day: i32,
) -> Result<bill_plan::Model> {
    let plan = bill_plan::ActiveModel {
        id: Set(new_id()),
        name: Set(name.to_string()),
        amount: Set(amount),
        total_installments: Set(total_installments),
        start_month: Set(start_month.to_string()),
        due_day: Set(due_day),
        currency: Set("BRL".to_string()),
        category_id: Set(None),
        person_id: Set(None),
        tags: Set(Tags::default()),
        default_pay_type: Set(None),
        default_pay_id: Set(None),
        active: Set(true),
        created_at: Set(Utc::now()),
    };
    Ok(plan.insert(db).await?)
}

/// Builds an open bill (not stored) due on the 10th of `month_text`.
#[must_use]
pub fn bill_fixture(name: &str, month_text: &str, amount: i64) -> bill::Model {
    let due_date = month(month_text).day_clamped(10).unwrap_or_default();
    bill::Model {
        id: new_id(),
        template_id: None,
        plan_id: None,
        installment_number: None,
        installment_total: None,
        name: name.to_string(),
        month: month_text.to_string(),
        due_date,
        amount,
        currency: "BRL".to_string(),
        category_id: None,
        person_id: None,
        tags: Tags::default(),
        status: Some(BillStatus::Open),
        paid: None,
        paid_amount: Some(0),
        payments: BillPayments::default(),
        paid_at: None,
        paid_tx_id: None,
        paid_via_type: None,
        paid_via_id: None,
        skipped_at: None,
        default_pay_type: None,
        default_pay_id: None,
        user_edited: false,
        sort_order: 0,
        pinned: false,
        created_at: Utc::now(),
    }
}

/// Stores a bill as-is.
pub async fn insert_bill(db: &DatabaseConnection, model: bill::Model) -> Result<bill::Model> {
    Ok(bill::ActiveModel::from(model).reset_all().insert(db).await?)
}

/// Creates and stores an open bill.
pub async fn create_test_bill(
    db: &DatabaseConnection,
    name: &str,
    month_text: &str,
    amount: i64,
) -> Result<bill::Model> {
    insert_bill(db, bill_fixture(name, month_text, amount)).await
}

/// Creates an open loan the household owes, starting 2024-01-15.
pub async fn create_test_loan(
    db: &DatabaseConnection,
    principal: i64,
    total_installments: Option<i32>,
    installment_amount: Option<i64>,
) -> Result<loan::Model> {
    let loan = loan::ActiveModel {
        id: Set(new_id()),
        description: Set("Test loan".to_string()),
        principal: Set(principal),
        currency: Set("BRL".to_string()),
        role: Set(LoanRole::IOwe),
        borrower_person_id: Set(None),
        lender_person_id: Set(Some("ana".to_string())),
        total_installments: Set(total_installments),
        installment_amount: Set(installment_amount),
        due_day: Set(Some(15)),
        start_date: Set(date(2024, 1, 15)),
        status: Set(LoanStatus::Open),
        created_at: Set(Utc::now()),
    };
    Ok(loan.insert(db).await?)
}

/// Creates an open installment with nothing paid.
pub async fn create_test_installment(
    db: &DatabaseConnection,
    loan_id: &str,
    installment_no: i32,
    due_date: NaiveDate,
    amount: i64,
) -> Result<loan_installment::Model> {
    let installment = loan_installment::ActiveModel {
        id: Set(new_id()),
        loan_id: Set(loan_id.to_string()),
        installment_no: Set(installment_no),
        installment_total: Set(installment_no.max(1)),
        due_date: Set(due_date),
        amount: Set(amount),
        paid_amount: Set(0),
        status: Set(InstallmentStatus::Open),
        allocations: Set(crate::entities::Allocations::default()),
    };
    Ok(installment.insert(db).await?)
}
