//! Entity module - Contains all SeaORM entity definitions for the record store.
//! Each entity type is one keyed table; each has a Model struct for data and an Entity
//! struct for operations. Ids are caller-generated strings.

pub mod bill;
pub mod bill_plan;
pub mod bill_template;
pub mod common;
pub mod invoice_payment;
pub mod loan;
pub mod loan_installment;
pub mod loan_payment;
pub mod transaction;

pub use bill::{Column as BillColumn, Entity as Bill, Model as BillModel};
pub use bill_plan::{Column as BillPlanColumn, Entity as BillPlan, Model as BillPlanModel};
pub use bill_template::{
    Column as BillTemplateColumn, Entity as BillTemplate, Model as BillTemplateModel,
};
pub use common::{
    Allocation, Allocations, BillPayment, BillPayments, BillStatus, CardHolder, InstallmentStatus,
    LoanRole, LoanStatus, PayVia, Tags, TransactionKind,
};
pub use invoice_payment::{
    Column as InvoicePaymentColumn, Entity as InvoicePayment, Model as InvoicePaymentModel,
};
pub use loan::{Column as LoanColumn, Entity as Loan, Model as LoanModel};
pub use loan_installment::{
    Column as LoanInstallmentColumn, Entity as LoanInstallment, Model as LoanInstallmentModel,
};
pub use loan_payment::{
    Column as LoanPaymentColumn, Entity as LoanPayment, Model as LoanPaymentModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
