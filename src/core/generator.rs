//! Bill generation from templates and plans.
//!
//! Generation is always triggered explicitly and is idempotent: a template produces at most one
//! bill per month, a plan at most one bill per installment number. Bills that already exist
//! are counted, never recreated. Each bill is written on its own; a failure part-way leaves the
//! bills created so far in place, and re-running picks up where it stopped.

use crate::{
    core::{bill::save_bill, month::YearMonth, transaction::new_id},
    entities::{
        Bill, BillPayments, BillPlan, BillStatus, BillTemplate, bill, bill_plan, bill_template,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{debug, info, instrument};

/// Options for [`generate_month`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Also sync existing open, unedited bills from their templates
    pub update_existing: bool,
}

/// Outcome of a generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Bills created by this run
    pub created: Vec<bill::Model>,
    /// Bills that already existed and were left alone (or synced)
    pub already_existed: usize,
    /// Existing bills refreshed from their template
    pub updated: usize,
}

/// Outcome of editing a plan.
#[derive(Debug, Clone)]
pub struct PlanUpdateResult {
    /// The stored plan
    pub plan: bill_plan::Model,
    /// Open future installments re-stamped from the plan
    pub restamped: usize,
}

fn bill_from_template(
    template: &bill_template::Model,
    month: YearMonth,
) -> Result<bill::ActiveModel> {
    let due_date = month.day_clamped(template.due_day)?;
    Ok(bill::ActiveModel {
        id: Set(new_id()),
        template_id: Set(Some(template.id.clone())),
        plan_id: Set(None),
        installment_number: Set(None),
        installment_total: Set(None),
        name: Set(template.name.clone()),
        month: Set(month.to_string()),
        due_date: Set(due_date),
        amount: Set(template.amount),
        currency: Set(template.currency.clone()),
        category_id: Set(template.category_id.clone()),
        person_id: Set(template.person_id.clone()),
        tags: Set(template.tags.clone()),
        status: Set(Some(BillStatus::Open)),
        paid: Set(None),
        paid_amount: Set(Some(0)),
        payments: Set(BillPayments::default()),
        paid_at: Set(None),
        paid_tx_id: Set(None),
        paid_via_type: Set(None),
        paid_via_id: Set(None),
        skipped_at: Set(None),
        default_pay_type: Set(template.default_pay_type.clone()),
        default_pay_id: Set(template.default_pay_id.clone()),
        user_edited: Set(false),
        sort_order: Set(template.sort_order),
        pinned: Set(template.pinned),
        created_at: Set(Utc::now()),
    })
}

fn bill_from_plan(plan: &bill_plan::Model, installment: i32, month: YearMonth) -> Result<bill::ActiveModel> {
    let due_date = month.day_clamped(plan.due_day)?;
    Ok(bill::ActiveModel {
        id: Set(new_id()),
        template_id: Set(None),
        plan_id: Set(Some(plan.id.clone())),
        installment_number: Set(Some(installment)),
        installment_total: Set(Some(plan.total_installments)),
        name: Set(plan.name.clone()),
        month: Set(month.to_string()),
        due_date: Set(due_date),
        amount: Set(plan.amount),
        currency: Set(plan.currency.clone()),
        category_id: Set(plan.category_id.clone()),
        person_id: Set(plan.person_id.clone()),
        tags: Set(plan.tags.clone()),
        status: Set(Some(BillStatus::Open)),
        paid: Set(None),
        paid_amount: Set(Some(0)),
        payments: Set(BillPayments::default()),
        paid_at: Set(None),
        paid_tx_id: Set(None),
        paid_via_type: Set(None),
        paid_via_id: Set(None),
        skipped_at: Set(None),
        default_pay_type: Set(plan.default_pay_type.clone()),
        default_pay_id: Set(plan.default_pay_id.clone()),
        user_edited: Set(false),
        sort_order: Set(0),
        pinned: Set(false),
        created_at: Set(Utc::now()),
    })
}

/// Brings an existing bill in line with its template.
///
/// Only open bills the user has not edited are touched. Name and amount are always refreshed;
/// category, person, tags, currency and default payment fields are filled only when empty.
/// Returns `None` when the bill is left as it is.
#[must_use]
pub fn sync_from_template(bill: &bill::Model, template: &bill_template::Model) -> Option<bill::Model> {
    if bill.current_status() != BillStatus::Open || bill.user_edited {
        return None;
    }

    let mut synced = bill.clone();
    synced.name.clone_from(&template.name);
    synced.amount = template.amount;
    if synced.currency.is_empty() {
        synced.currency.clone_from(&template.currency);
    }
    if synced.category_id.is_none() {
        synced.category_id.clone_from(&template.category_id);
    }
    if synced.person_id.is_none() {
        synced.person_id.clone_from(&template.person_id);
    }
    if synced.tags.is_empty() {
        synced.tags = template.tags.clone();
    }
    if synced.default_pay_type.is_none() {
        synced.default_pay_type.clone_from(&template.default_pay_type);
    }
    if synced.default_pay_id.is_none() {
        synced.default_pay_id.clone_from(&template.default_pay_id);
    }

    (synced != *bill).then_some(synced)
}

/// Creates this month's bill for every active template that does not have one yet.
///
/// With `update_existing`, bills that already exist are synced from their template through
/// [`sync_from_template`].
#[instrument(skip(db))]
pub async fn generate_month(
    db: &DatabaseConnection,
    month: YearMonth,
    options: GenerateOptions,
) -> Result<GenerationReport> {
    let templates = BillTemplate::find()
        .filter(bill_template::Column::Active.eq(true))
        .order_by_asc(bill_template::Column::SortOrder)
        .all(db)
        .await?;

    let mut report = GenerationReport::default();
    for template in templates {
        let existing = Bill::find()
            .filter(bill::Column::TemplateId.eq(template.id.as_str()))
            .filter(bill::Column::Month.eq(month.to_string()))
            .one(db)
            .await?;

        match existing {
            Some(bill) => {
                report.already_existed += 1;
                if options.update_existing {
                    if let Some(synced) = sync_from_template(&bill, &template) {
                        debug!("Syncing bill '{}' from its template", synced.name);
                        save_bill(db, synced).await?;
                        report.updated += 1;
                    }
                }
            }
            None => {
                let created = bill_from_template(&template, month)?.insert(db).await?;
                debug!("Created bill '{}' due {}", created.name, created.due_date);
                report.created.push(created);
            }
        }
    }

    info!(
        "Generated {}: {} created, {} already existed, {} updated",
        month,
        report.created.len(),
        report.already_existed,
        report.updated
    );
    Ok(report)
}

/// Creates every missing installment bill of a plan.
///
/// Installment `i` falls in `start_month + (i - 1)` on the plan's due day, clamped to the
/// month's length.
///
/// # Errors
/// [`Error::NotFound`] if the plan does not exist; [`Error::InvalidMonth`] if its start month
/// is malformed.
#[instrument(skip(db))]
pub async fn generate_plan_installments(db: &DatabaseConnection, plan_id: &str) -> Result<GenerationReport> {
    let plan = BillPlan::find_by_id(plan_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("bill plan", plan_id))?;
    let start: YearMonth = plan.start_month.parse()?;

    let mut report = GenerationReport::default();
    for installment in 1..=plan.total_installments {
        let exists = Bill::find()
            .filter(bill::Column::PlanId.eq(plan.id.as_str()))
            .filter(bill::Column::InstallmentNumber.eq(installment))
            .count(db)
            .await?
            > 0;
        if exists {
            report.already_existed += 1;
            continue;
        }

        let month = start.add_months(installment - 1);
        let created = bill_from_plan(&plan, installment, month)?.insert(db).await?;
        report.created.push(created);
    }

    info!(
        "Plan '{}': {} installments created, {} already existed",
        plan.name,
        report.created.len(),
        report.already_existed
    );
    Ok(report)
}

/// Re-stamps an open installment bill from its plan. Returns `None` if nothing changes.
pub fn restamp_from_plan(bill: &bill::Model, plan: &bill_plan::Model) -> Result<Option<bill::Model>> {
    let month: YearMonth = bill.month.parse()?;
    let mut stamped = bill.clone();
    stamped.due_date = month.day_clamped(plan.due_day)?;
    stamped.amount = plan.amount;
    stamped.currency.clone_from(&plan.currency);
    stamped.category_id.clone_from(&plan.category_id);
    stamped.tags = plan.tags.clone();
    stamped.default_pay_type.clone_from(&plan.default_pay_type);
    stamped.default_pay_id.clone_from(&plan.default_pay_id);
    Ok((stamped != *bill).then_some(stamped))
}

/// Stores an edited plan.
///
/// When the plan is active and `update_future` is set, every still-open bill of the plan in
/// `current_month` or later is re-stamped with the plan's due date, amount, currency,
/// category, tags and default payment fields. Paid, partial and skipped installments are left
/// untouched.
#[instrument(skip(db, plan), fields(plan_id = %plan.id))]
pub async fn update_plan(
    db: &DatabaseConnection,
    plan: bill_plan::Model,
    update_future: bool,
    current_month: YearMonth,
) -> Result<PlanUpdateResult> {
    let plan = bill_plan::ActiveModel::from(plan)
        .reset_all()
        .update(db)
        .await?;

    let mut restamped = 0;
    if plan.active && update_future {
        let future = Bill::find()
            .filter(bill::Column::PlanId.eq(plan.id.as_str()))
            .filter(bill::Column::Month.gte(current_month.to_string()))
            .filter(bill::Column::Status.eq(BillStatus::Open))
            .all(db)
            .await?;

        for bill in future {
            if let Some(stamped) = restamp_from_plan(&bill, &plan)? {
                save_bill(db, stamped).await?;
                restamped += 1;
            }
        }
        info!("Re-stamped {} future installments of '{}'", restamped, plan.name);
    }

    Ok(PlanUpdateResult { plan, restamped })
}

/// Formats a generation report into a human-readable summary.
///
/// # Arguments
/// * `label` - Heading for the summary, usually the month or the plan
/// * `report` - The generation report to format
///
/// # Returns
/// * One header line followed by one line per created bill
#[must_use]
pub fn format_generation_summary(label: &str, report: &GenerationReport) -> String {
    let mut lines = vec![format!(
        "{label} - {} created, {} already existed, {} updated",
        report.created.len(),
        report.already_existed,
        report.updated
    )];
    lines.extend(report.created.iter().map(|bill| {
        format!(
            "  + {} due {} ({})",
            bill.display_name(),
            bill.due_date,
            crate::core::money::format_money(bill.amount, &bill.currency)
        )
    }));
    lines.join("\n")
}
