use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use obligation_ledger::{
    config::{
        LedgerConfig,
        database::{create_connection, create_tables},
        ledger::{load_default_config, seed_loans, seed_plans, seed_templates},
    },
    core::{
        bill::{PayRequest, PaymentMethod, pay_all_open, pay_bill, skip_bill, undo_bill_payment, unskip_bill},
        generator::{GenerateOptions, format_generation_summary, generate_month, generate_plan_installments},
        invoice::{
            NewInvoicePayment, delete_invoice, delete_invoice_payment, format_invoice_summary,
            invoice_summary, register_invoice_payment,
        },
        loan::{
            NewLoanPayment, delete_loan, delete_loan_payment, generate_loan_installments, list_loans,
            loan_summary, register_loan_payment,
        },
        money::{format_money, parse_amount},
        month::YearMonth,
        view::{ViewState, list_month},
    },
    entities::{BillStatus, CardHolder, LoanStatus, bill},
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "obligation-ledger")]
#[command(version, about = "Household bills, installment plans, loans and card invoices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the bills of a month from the active templates
    Generate {
        /// Month to generate (YYYY-MM)
        month: YearMonth,

        /// Also sync bills that already exist from their template
        #[arg(long)]
        update_existing: bool,
    },

    /// Create the missing installment bills of a plan
    Plan {
        /// Plan id
        plan_id: String,
    },

    /// List the bills of a month
    Month {
        /// Month to list (YYYY-MM)
        month: YearMonth,

        /// Only bills in this status
        #[arg(short, long)]
        status: Option<StatusFilter>,

        /// Only bills of this category
        #[arg(long)]
        category: Option<String>,

        /// Only bills of this person
        #[arg(long)]
        person: Option<String>,

        /// Only bills carrying this tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Show a card invoice reconciled per holder
    Invoice {
        /// Card id
        card_id: String,

        /// Invoice month (YYYY-MM)
        month: YearMonth,
    },

    /// Show a loan's balance and installments
    Loan {
        /// Loan id
        loan_id: String,
    },

    /// List loans with their balances
    Loans {
        /// Only loans in this status (closed includes fully repaid open loans)
        #[arg(short, long)]
        status: Option<LoanStatusFilter>,
    },

    /// Insert the templates, plans and loans listed in ledger.toml that do not exist yet
    Seed,

    /// Record a payment on a bill
    Pay {
        /// Bill id
        bill_id: String,

        /// Amount paid (e.g. 150.00 or 150,00)
        #[arg(value_parser = parse_amount)]
        amount: i64,

        #[command(flatten)]
        method: MethodArgs,

        /// Payment date (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Accept paying more than the remaining balance
        #[arg(long)]
        confirm_overpay: bool,
    },

    /// Remove one payment from a bill's history
    Undo {
        /// Bill id
        bill_id: String,

        /// Position of the payment in the history, starting at 0
        index: usize,
    },

    /// Mark an open bill as skipped for its month
    Skip {
        /// Bill id
        bill_id: String,
    },

    /// Reopen a skipped bill
    Unskip {
        /// Bill id
        bill_id: String,
    },

    /// Pay the remaining balance of every open bill of a month
    PayAll {
        /// Month to settle (YYYY-MM)
        month: YearMonth,

        #[command(flatten)]
        method: MethodArgs,

        /// Payment date (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Create the missing installments of a loan
    LoanInstallments {
        /// Loan id
        loan_id: String,
    },

    /// Record a loan payment and allocate it to the installments
    LoanPay {
        /// Loan id
        loan_id: String,

        /// Amount paid
        #[arg(value_parser = parse_amount)]
        amount: i64,

        /// Account the money moved through
        #[arg(long)]
        account: Option<String>,

        /// Person who paid or received
        #[arg(long)]
        person: Option<String>,

        /// Payment date (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Delete a loan payment and release its allocation
    LoanPaymentDelete {
        /// Loan payment id
        payment_id: String,
    },

    /// Delete a loan with its installments and payments
    LoanDelete {
        /// Loan id
        loan_id: String,
    },

    /// Pay a card invoice for one holder
    InvoicePay {
        /// Card id
        card_id: String,

        /// Invoice month (YYYY-MM)
        month: YearMonth,

        /// Amount paid
        #[arg(value_parser = parse_amount)]
        amount: i64,

        /// Account debited
        #[arg(long)]
        account: String,

        /// Holder whose share is paid
        #[arg(long, value_enum, default_value_t = HolderArg::Main)]
        holder: HolderArg,

        /// Payment date (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Delete an invoice payment and its ledger row
    InvoicePaymentDelete {
        /// Invoice payment id
        payment_id: String,
    },

    /// Delete an invoice with its payments and card transactions
    InvoiceDelete {
        /// Card id
        card_id: String,

        /// Invoice month (YYYY-MM)
        month: YearMonth,
    },
}

/// Account or card a bill is paid with
#[derive(Args)]
struct MethodArgs {
    /// Debit this account
    #[arg(long, conflicts_with = "card", required_unless_present = "card")]
    account: Option<String>,

    /// Charge this card
    #[arg(long)]
    card: Option<String>,

    /// Card holder the charge belongs to, main when omitted
    #[arg(long, value_enum, requires = "card")]
    holder: Option<HolderArg>,
}

impl MethodArgs {
    fn into_method(self) -> Result<PaymentMethod> {
        match (self.account, self.card) {
            (Some(account_id), _) => Ok(PaymentMethod::Account { account_id }),
            (None, Some(card_id)) => Ok(PaymentMethod::Card {
                card_id,
                holder: self.holder.unwrap_or(HolderArg::Main).into(),
            }),
            (None, None) => Err(Error::MissingSelection { field: "account" }),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum HolderArg {
    Main,
    Additional,
}

impl From<HolderArg> for CardHolder {
    fn from(holder: HolderArg) -> Self {
        match holder {
            HolderArg::Main => Self::Main,
            HolderArg::Additional => Self::Additional,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LoanStatusFilter {
    Open,
    Closed,
}

impl From<LoanStatusFilter> for LoanStatus {
    fn from(filter: LoanStatusFilter) -> Self {
        match filter {
            LoanStatusFilter::Open => Self::Open,
            LoanStatusFilter::Closed => Self::Closed,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusFilter {
    Open,
    Partial,
    Paid,
    Skipped,
}

impl From<StatusFilter> for BillStatus {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Open => Self::Open,
            StatusFilter::Partial => Self::Partial,
            StatusFilter::Paid => Self::Paid,
            StatusFilter::Skipped => Self::Skipped,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load ledger.toml (defaults when absent)
    let config = load_default_config()
        .inspect_err(|e| error!("Failed to load ledger configuration: {}", e))?;

    // 4. Connect and make sure every table exists
    if std::env::var("DATABASE_URL").is_err() {
        std::fs::create_dir_all("data")?;
    }
    let db = create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))?;

    run(&db, &config, cli.command).await
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn print_bill(bill: &bill::Model) {
    println!(
        "  [{:>7}] {:<30} due {}  {} (paid {})  {}",
        bill.current_status().as_str(),
        bill.display_name(),
        bill.due_date,
        format_money(bill.amount, &bill.currency),
        format_money(bill.paid_so_far(), &bill.currency),
        bill.id
    );
}

async fn run(db: &DatabaseConnection, config: &LedgerConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Generate {
            month,
            update_existing,
        } => {
            let report = generate_month(db, month, GenerateOptions { update_existing }).await?;
            println!("{}", format_generation_summary(&month.to_string(), &report));
        }
        Commands::Plan { plan_id } => {
            let report = generate_plan_installments(db, &plan_id).await?;
            println!("{}", format_generation_summary(&format!("Plan {plan_id}"), &report));
        }
        Commands::Month {
            month,
            status,
            category,
            person,
            tag,
        } => {
            let state = ViewState {
                month,
                status: status.map(Into::into),
                category_id: category,
                person_id: person,
                tag,
            };
            let (state, listing) = list_month(db, state).await?;
            let currency = config.base_currency.as_str();
            println!("Bills for {}", state.month);
            for bill in &listing.bills {
                print_bill(bill);
            }
            let totals = listing.totals;
            println!(
                "Total {}, paid {}, remaining {} ({} open, {} partial, {} paid, {} skipped)",
                format_money(totals.total, currency),
                format_money(totals.paid, currency),
                format_money(totals.remaining, currency),
                totals.open,
                totals.partial,
                totals.paid_count,
                totals.skipped
            );
        }
        Commands::Invoice { card_id, month } => {
            let summary = invoice_summary(db, &card_id, month).await?;
            println!("{}", format_invoice_summary(&summary, &config.base_currency));
        }
        Commands::Loan { loan_id } => {
            let summary = loan_summary(db, &loan_id).await?;
            let currency = summary.loan.currency.as_str();
            println!("{} ({:?})", summary.loan.description, summary.effective_status);
            println!(
                "  Principal {}, paid {}, balance {}",
                format_money(summary.loan.principal, currency),
                format_money(summary.total_paid, currency),
                format_money(summary.saldo, currency)
            );
            println!(
                "  Installments: {} paid, {} open{}",
                summary.installments_paid,
                summary.installments_open,
                summary
                    .next_due
                    .map(|d| format!(", next due {d}"))
                    .unwrap_or_default()
            );
        }
        Commands::Loans { status } => {
            for summary in list_loans(db, status.map(Into::into)).await? {
                let currency = summary.loan.currency.as_str();
                println!(
                    "  [{:?}] {:<30} balance {} of {}  {}",
                    summary.effective_status,
                    summary.loan.description,
                    format_money(summary.saldo, currency),
                    format_money(summary.loan.principal, currency),
                    summary.loan.id
                );
            }
        }
        Commands::Seed => {
            let templates = seed_templates(db, config).await?;
            println!("Seeded {} templates", templates.len());
            for template in &templates {
                println!(
                    "  + {} on day {} ({})",
                    template.name,
                    template.due_day,
                    format_money(template.amount, &template.currency)
                );
            }
            let plans = seed_plans(db, config).await?;
            println!("Seeded {} plans", plans.len());
            for plan in &plans {
                println!(
                    "  + {} {}x {} from {}  {}",
                    plan.name,
                    plan.total_installments,
                    format_money(plan.amount, &plan.currency),
                    plan.start_month,
                    plan.id
                );
            }
            let loans = seed_loans(db, config).await?;
            println!("Seeded {} loans", loans.len());
            for loan in &loans {
                println!(
                    "  + {} ({})  {}",
                    loan.description,
                    format_money(loan.principal, &loan.currency),
                    loan.id
                );
            }
        }
        Commands::Pay {
            bill_id,
            amount,
            method,
            date,
            confirm_overpay,
        } => {
            let request = PayRequest {
                amount,
                date: date.unwrap_or_else(today),
                method: method.into_method()?,
                confirm_overpay,
            };
            let bill = pay_bill(db, config, &bill_id, request).await?;
            print_bill(&bill);
        }
        Commands::Undo { bill_id, index } => {
            let bill = undo_bill_payment(db, &bill_id, index).await?;
            print_bill(&bill);
        }
        Commands::Skip { bill_id } => {
            let bill = skip_bill(db, &bill_id).await?;
            print_bill(&bill);
        }
        Commands::Unskip { bill_id } => {
            let bill = unskip_bill(db, &bill_id).await?;
            print_bill(&bill);
        }
        Commands::PayAll {
            month,
            method,
            date,
        } => {
            let method = method.into_method()?;
            let paid = pay_all_open(db, config, month, &method, date.unwrap_or_else(today)).await?;
            println!("Paid {} bills for {}", paid.len(), month);
            for bill in &paid {
                print_bill(bill);
            }
        }
        Commands::LoanInstallments { loan_id } => {
            let report = generate_loan_installments(db, &loan_id).await?;
            println!(
                "{} installments created, {} already existed",
                report.created.len(),
                report.already_existed
            );
            for installment in &report.created {
                println!(
                    "  + #{} due {} ({})",
                    installment.installment_no,
                    installment.due_date,
                    format_money(installment.amount, &config.base_currency)
                );
            }
        }
        Commands::LoanPay {
            loan_id,
            amount,
            account,
            person,
            date,
        } => {
            let outcome = register_loan_payment(
                db,
                NewLoanPayment {
                    loan_id,
                    date: date.unwrap_or_else(today),
                    amount,
                    account_id: account,
                    person_id: person,
                },
            )
            .await?;
            let currency = config.base_currency.as_str();
            println!(
                "Loan payment {}: {} allocated, {} unallocated",
                outcome.payment.id,
                format_money(outcome.allocation.total_applied(), currency),
                format_money(outcome.allocation.unallocated, currency)
            );
        }
        Commands::LoanPaymentDelete { payment_id } => {
            if delete_loan_payment(db, &payment_id).await? {
                println!("Deleted loan payment {payment_id}");
            } else {
                println!("Loan payment {payment_id} not found");
            }
        }
        Commands::LoanDelete { loan_id } => {
            if delete_loan(db, &loan_id).await? {
                println!("Deleted loan {loan_id}");
            } else {
                println!("Loan {loan_id} not found");
            }
        }
        Commands::InvoicePay {
            card_id,
            month,
            amount,
            account,
            holder,
            date,
        } => {
            let payment = register_invoice_payment(
                db,
                config,
                NewInvoicePayment {
                    card_id,
                    month,
                    holder: holder.into(),
                    amount,
                    date: date.unwrap_or_else(today),
                    account_id: account,
                },
            )
            .await?;
            println!(
                "Invoice payment {} of {} on {}",
                payment.id,
                format_money(payment.amount, &config.base_currency),
                payment.invoice_key
            );
        }
        Commands::InvoicePaymentDelete { payment_id } => {
            if delete_invoice_payment(db, &payment_id).await? {
                println!("Deleted invoice payment {payment_id}");
            } else {
                println!("Invoice payment {payment_id} not found");
            }
        }
        Commands::InvoiceDelete { card_id, month } => {
            let deletion = delete_invoice(db, &card_id, month).await?;
            println!(
                "Deleted {} payments and {} transactions of {} {}",
                deletion.payments, deletion.transactions, card_id, month
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("obligation-ledger").chain(args.iter().copied()))
    }

    #[test]
    fn test_pay_parses_amount_and_card() {
        let cli = parse(&["pay", "bill-1", "89,90", "--card", "visa", "--holder", "additional"]).unwrap();
        let Commands::Pay {
            amount,
            method,
            confirm_overpay,
            ..
        } = cli.command
        else {
            panic!("expected pay");
        };
        assert_eq!(amount, 8_990);
        assert!(!confirm_overpay);
        assert_eq!(
            method.into_method().unwrap(),
            PaymentMethod::Card {
                card_id: "visa".to_string(),
                holder: CardHolder::Additional,
            }
        );
    }

    #[test]
    fn test_pay_needs_exactly_one_instrument() {
        assert!(parse(&["pay", "bill-1", "10"]).is_err());
        assert!(parse(&["pay", "bill-1", "10", "--account", "checking", "--card", "visa"]).is_err());
        assert!(parse(&["pay", "bill-1", "10", "--account", "checking", "--holder", "main"]).is_err());
    }

    #[test]
    fn test_pay_rejects_bad_amount() {
        assert!(parse(&["pay", "bill-1", "ten", "--account", "checking"]).is_err());
    }

    #[test]
    fn test_invoice_pay_defaults_to_main_holder() {
        let cli = parse(&[
            "invoice-pay",
            "visa",
            "2024-03",
            "250.00",
            "--account",
            "checking",
            "--date",
            "2024-04-05",
        ])
        .unwrap();
        let Commands::InvoicePay {
            month,
            amount,
            holder,
            date,
            ..
        } = cli.command
        else {
            panic!("expected invoice-pay");
        };
        assert_eq!(month.to_string(), "2024-03");
        assert_eq!(amount, 25_000);
        assert_eq!(CardHolder::from(holder), CardHolder::Main);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 4, 5));
    }
}
