//! Database configuration module for the obligation ledger.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`. Tables and
//! their indexes are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.

use crate::entities::{
    Bill, BillPlan, BillTemplate, InvoicePayment, Loan, LoanInstallment, LoanPayment, Transaction,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/obligations.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or the default path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(&get_database_url())
        .await
        .map_err(Into::into)
}

async fn create_table_for<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(builder.build(&table)).await?;
    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(builder.build(&index)).await?;
    }
    Ok(())
}

/// Creates every table (and its indexes) if it does not exist yet.
///
/// Loans are created before installments and payments because those reference them.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table_for(db, &schema, BillTemplate).await?;
    create_table_for(db, &schema, BillPlan).await?;
    create_table_for(db, &schema, Bill).await?;
    create_table_for(db, &schema, Loan).await?;
    create_table_for(db, &schema, LoanInstallment).await?;
    create_table_for(db, &schema, LoanPayment).await?;
    create_table_for(db, &schema, InvoicePayment).await?;
    create_table_for(db, &schema, Transaction).await?;

    Ok(())
}
