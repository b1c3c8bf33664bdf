//! Ledger configuration loading from ledger.toml
//!
//! Holds the base currency, the single exchange rate used to convert foreign-currency
//! payments into it, and the bill templates, installment plans and loans seeded into the
//! store on request.

use crate::{
    core::{money::to_minor, month::YearMonth, transaction::new_id},
    entities::{
        BillPlan, BillTemplate, Loan, LoanRole, LoanStatus, Tags, bill_plan, bill_template, loan,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{Set, prelude::*};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

fn default_base_currency() -> String {
    "BRL".to_string()
}

const fn default_exchange_rate() -> Decimal {
    Decimal::ONE
}

const fn default_due_day() -> i32 {
    10
}

const fn default_active() -> bool {
    true
}

/// Configuration structure representing the entire ledger.toml file
#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Currency all reports are expressed in
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// Rate from any other currency into the base currency
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: Decimal,
    /// Bill templates to seed
    #[serde(default)]
    pub templates: Vec<TemplateConfig>,
    /// Installment plans to seed
    #[serde(default)]
    pub plans: Vec<PlanConfig>,
    /// Loans to seed
    #[serde(default)]
    pub loans: Vec<LoanConfig>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            exchange_rate: default_exchange_rate(),
            templates: Vec::new(),
            plans: Vec::new(),
            loans: Vec::new(),
        }
    }
}

/// Configuration for a single seeded bill template
#[derive(Debug, Deserialize, Clone)]
pub struct TemplateConfig {
    /// Template name, unique among seeded templates
    pub name: String,
    /// Monthly amount as a decimal (e.g., `189.90`)
    pub amount: Decimal,
    /// Currency; defaults to the base currency
    pub currency: Option<String>,
    /// Due day of month
    #[serde(default = "default_due_day")]
    pub due_day: i32,
    /// Category reference
    pub category_id: Option<String>,
    /// Labels
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether month generation picks it up
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Configuration for a seeded installment plan
#[derive(Debug, Deserialize, Clone)]
pub struct PlanConfig {
    /// Plan name, unique among seeded plans
    pub name: String,
    /// Installment amount as a decimal
    pub amount: Decimal,
    /// Number of installments
    pub total_installments: i32,
    /// Month of the first installment (`YYYY-MM`)
    pub start_month: String,
    /// Currency; defaults to the base currency
    pub currency: Option<String>,
    /// Due day of month
    #[serde(default = "default_due_day")]
    pub due_day: i32,
    /// Category reference
    pub category_id: Option<String>,
    /// Labels
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether edits propagate to future installments
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Configuration for a seeded loan
#[derive(Debug, Deserialize, Clone)]
pub struct LoanConfig {
    /// Loan description, unique among seeded loans
    pub description: String,
    /// Amount lent as a decimal
    pub principal: Decimal,
    /// Currency; defaults to the base currency
    pub currency: Option<String>,
    /// `i_owe` or `owed_to_me`
    pub role: LoanRole,
    /// Person who borrowed
    pub borrower_person_id: Option<String>,
    /// Person who lent
    pub lender_person_id: Option<String>,
    /// Number of installments, when repaid in installments
    pub total_installments: Option<i32>,
    /// Installment amount as a decimal
    pub installment_amount: Option<Decimal>,
    /// Due day of installments; the start date's day when unset
    pub due_day: Option<i32>,
    /// Date the loan was made
    pub start_date: NaiveDate,
}

/// Loads ledger configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LedgerConfig> {
    let path_ref = path.as_ref();
    debug!("Loading ledger configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses ledger configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<LedgerConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse ledger.toml: {e}"),
    })
}

/// Loads ledger.toml from the working directory, falling back to defaults when it is absent.
pub fn load_default_config() -> Result<LedgerConfig> {
    let path = Path::new("ledger.toml");
    if path.exists() {
        load_config(path)
    } else {
        info!("No ledger.toml found, using default configuration");
        Ok(LedgerConfig::default())
    }
}

/// Inserts every configured template whose name is not in the store yet.
///
/// Returns the templates that were created; running it again creates nothing.
pub async fn seed_templates(
    db: &DatabaseConnection,
    config: &LedgerConfig,
) -> Result<Vec<bill_template::Model>> {
    let mut created = Vec::new();

    for (position, template) in config.templates.iter().enumerate() {
        let existing = BillTemplate::find()
            .filter(bill_template::Column::Name.eq(template.name.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            debug!("Template '{}' already exists, skipping", template.name);
            continue;
        }
        if !(1..=31).contains(&template.due_day) {
            return Err(Error::InvalidDueDay {
                day: template.due_day,
            });
        }

        let model = bill_template::ActiveModel {
            id: Set(new_id()),
            name: Set(template.name.clone()),
            amount: Set(to_minor(template.amount)?),
            currency: Set(template
                .currency
                .clone()
                .unwrap_or_else(|| config.base_currency.clone())),
            category_id: Set(template.category_id.clone()),
            person_id: Set(None),
            due_day: Set(template.due_day),
            tags: Set(template.tags.iter().cloned().collect::<Tags>()),
            default_pay_type: Set(None),
            default_pay_id: Set(None),
            active: Set(template.active),
            sort_order: Set(i32::try_from(position).unwrap_or(i32::MAX)),
            pinned: Set(false),
            created_at: Set(chrono::Utc::now()),
        };
        info!("Seeding bill template '{}'", template.name);
        created.push(model.insert(db).await?);
    }

    Ok(created)
}

/// Inserts every configured plan whose name is not in the store yet.
///
/// Only the plan is stored; its installment bills are created by plan generation.
///
/// # Errors
/// [`Error::InvalidMonth`] for a bad start month, [`Error::InvalidDueDay`] for a due day
/// outside 1..=31 and [`Error::InvalidAmount`] for a plan without installments.
pub async fn seed_plans(db: &DatabaseConnection, config: &LedgerConfig) -> Result<Vec<bill_plan::Model>> {
    let mut created = Vec::new();

    for plan in &config.plans {
        let existing = BillPlan::find()
            .filter(bill_plan::Column::Name.eq(plan.name.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            debug!("Plan '{}' already exists, skipping", plan.name);
            continue;
        }
        let start: YearMonth = plan.start_month.parse()?;
        if !(1..=31).contains(&plan.due_day) {
            return Err(Error::InvalidDueDay { day: plan.due_day });
        }
        if plan.total_installments <= 0 {
            return Err(Error::InvalidAmount {
                amount: i64::from(plan.total_installments),
            });
        }

        let model = bill_plan::ActiveModel {
            id: Set(new_id()),
            name: Set(plan.name.clone()),
            amount: Set(to_minor(plan.amount)?),
            total_installments: Set(plan.total_installments),
            start_month: Set(start.to_string()),
            due_day: Set(plan.due_day),
            currency: Set(plan
                .currency
                .clone()
                .unwrap_or_else(|| config.base_currency.clone())),
            category_id: Set(plan.category_id.clone()),
            person_id: Set(None),
            tags: Set(plan.tags.iter().cloned().collect::<Tags>()),
            default_pay_type: Set(None),
            default_pay_id: Set(None),
            active: Set(plan.active),
            created_at: Set(chrono::Utc::now()),
        };
        info!("Seeding bill plan '{}'", plan.name);
        created.push(model.insert(db).await?);
    }

    Ok(created)
}

/// Inserts every configured loan whose description is not in the store yet, as an open loan.
pub async fn seed_loans(db: &DatabaseConnection, config: &LedgerConfig) -> Result<Vec<loan::Model>> {
    let mut created = Vec::new();

    for entry in &config.loans {
        let existing = Loan::find()
            .filter(loan::Column::Description.eq(entry.description.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            debug!("Loan '{}' already exists, skipping", entry.description);
            continue;
        }
        if let Some(day) = entry.due_day.filter(|d| !(1..=31).contains(d)) {
            return Err(Error::InvalidDueDay { day });
        }
        let principal = to_minor(entry.principal)?;
        if principal <= 0 {
            return Err(Error::InvalidAmount { amount: principal });
        }

        let model = loan::ActiveModel {
            id: Set(new_id()),
            description: Set(entry.description.clone()),
            principal: Set(principal),
            currency: Set(entry
                .currency
                .clone()
                .unwrap_or_else(|| config.base_currency.clone())),
            role: Set(entry.role),
            borrower_person_id: Set(entry.borrower_person_id.clone()),
            lender_person_id: Set(entry.lender_person_id.clone()),
            total_installments: Set(entry.total_installments),
            installment_amount: Set(entry.installment_amount.map(to_minor).transpose()?),
            due_day: Set(entry.due_day),
            start_date: Set(entry.start_date),
            status: Set(LoanStatus::Open),
            created_at: Set(chrono::Utc::now()),
        };
        info!("Seeding loan '{}'", entry.description);
        created.push(model.insert(db).await?);
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_db;
    use std::str::FromStr;

    #[test]
    fn test_parse_ledger_config() {
        let config = parse_config(
            r#"
            base_currency = "BRL"
            exchange_rate = "5.10"

            [[templates]]
            name = "Rent"
            amount = "1800.00"
            due_day = 5
            tags = ["home"]

            [[templates]]
            name = "Streaming"
            amount = 39.9
            currency = "USD"
            active = false
        "#,
        )
        .unwrap();

        assert_eq!(config.base_currency, "BRL");
        assert_eq!(config.exchange_rate, Decimal::from_str("5.10").unwrap());
        assert_eq!(config.templates.len(), 2);
        assert_eq!(config.templates[0].due_day, 5);
        assert_eq!(config.templates[0].tags, vec!["home".to_string()]);
        assert!(config.templates[0].active);
        assert_eq!(config.templates[1].due_day, 10);
        assert_eq!(config.templates[1].currency.as_deref(), Some("USD"));
        assert!(!config.templates[1].active);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.base_currency, "BRL");
        assert_eq!(config.exchange_rate, Decimal::ONE);
        assert!(config.templates.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            parse_config("base_currency = "),
            Err(Error::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_seed_templates_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(
            r#"
            [[templates]]
            name = "Internet"
            amount = "99.90"
            due_day = 15
        "#,
        )?;

        let first = seed_templates(&db, &config).await?;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].amount, 9_990);
        assert_eq!(first[0].currency, "BRL");

        let second = seed_templates(&db, &config).await?;
        assert!(second.is_empty());
        assert_eq!(BillTemplate::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_plans_is_idempotent_and_generates() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(
            r#"
            [[plans]]
            name = "Notebook"
            amount = "350.00"
            total_installments = 3
            start_month = "2024-11"
            due_day = 31
        "#,
        )?;

        let first = seed_plans(&db, &config).await?;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].amount, 35_000);
        assert_eq!(first[0].currency, "BRL");
        assert!(first[0].active);
        assert!(seed_plans(&db, &config).await?.is_empty());

        let report = crate::core::generator::generate_plan_installments(&db, &first[0].id).await?;
        let months: Vec<&str> = report.created.iter().map(|b| b.month.as_str()).collect();
        assert_eq!(months, vec!["2024-11", "2024-12", "2025-01"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_plans_rejects_bad_start_month() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(
            r#"
            [[plans]]
            name = "Sofa"
            amount = "100"
            total_installments = 2
            start_month = "2024-13"
        "#,
        )?;

        let err = seed_plans(&db, &config).await.unwrap_err();
        assert!(matches!(err, Error::InvalidMonth { .. }));
        assert_eq!(BillPlan::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_loans_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(
            r#"
            base_currency = "BRL"

            [[loans]]
            description = "Car repair from Ana"
            principal = "1200.00"
            role = "i_owe"
            lender_person_id = "ana"
            total_installments = 4
            installment_amount = "300.00"
            start_date = "2024-02-15"
        "#,
        )?;

        let first = seed_loans(&db, &config).await?;
        assert_eq!(first.len(), 1);
        let stored = &first[0];
        assert_eq!(stored.principal, 120_000);
        assert_eq!(stored.installment_amount, Some(30_000));
        assert_eq!(stored.role, LoanRole::IOwe);
        assert_eq!(stored.status, LoanStatus::Open);
        assert_eq!(stored.start_date, NaiveDate::from_ymd_opt(2024, 2, 15).unwrap());
        assert!(seed_loans(&db, &config).await?.is_empty());
        assert_eq!(Loan::find().count(&db).await?, 1);
        Ok(())
    }
}
