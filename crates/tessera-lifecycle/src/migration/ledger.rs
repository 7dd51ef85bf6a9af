//! Per-database migration ledger
//!
//! Each physical database carries its own `migration_ledger` table,
//! created on demand, recording `(unit_name, batch, applied_at)` for
//! every unit ever applied to it. The table is append-only in normal
//! operation; a force re-apply updates the existing row in place.

use std::collections::HashSet;

use sea_orm::sea_query::{Alias, ColumnDef, Expr, OnConflict, Query, Table};
use sea_orm::{ConnectionTrait, DbErr, DeriveIden};

#[derive(DeriveIden)]
enum MigrationLedger {
    Table,
    Id,
    UnitName,
    Batch,
    AppliedAt,
}

/// Create the ledger table if this database has never been migrated.
pub async fn ensure_table(conn: &impl ConnectionTrait) -> Result<(), DbErr> {
    let stmt = Table::create()
        .table(MigrationLedger::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(MigrationLedger::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(MigrationLedger::UnitName)
                .string_len(191)
                .not_null()
                .unique_key(),
        )
        .col(ColumnDef::new(MigrationLedger::Batch).integer().not_null())
        .col(ColumnDef::new(MigrationLedger::AppliedAt).timestamp().not_null())
        .to_owned();

    let backend = conn.get_database_backend();
    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Unit names already applied to this database.
pub async fn applied_units(conn: &impl ConnectionTrait) -> Result<HashSet<String>, DbErr> {
    let query = Query::select()
        .column(MigrationLedger::UnitName)
        .from(MigrationLedger::Table)
        .to_owned();

    let backend = conn.get_database_backend();
    let rows = conn.query_all(backend.build(&query)).await?;
    rows.iter()
        .map(|row| row.try_get::<String>("", "unit_name"))
        .collect()
}

/// Batch number for the units applied in the current run (max + 1).
pub async fn next_batch(conn: &impl ConnectionTrait) -> Result<i32, DbErr> {
    let query = Query::select()
        .expr_as(Expr::col(MigrationLedger::Batch).max(), Alias::new("max_batch"))
        .from(MigrationLedger::Table)
        .to_owned();

    let backend = conn.get_database_backend();
    let row = conn.query_one(backend.build(&query)).await?;
    let max: Option<i32> = match row {
        Some(row) => row.try_get("", "max_batch")?,
        None => None,
    };
    Ok(max.unwrap_or(0) + 1)
}

/// Record a unit as applied.
///
/// Runs after the unit's own transaction commits, so a crash mid-unit
/// leaves the ledger reflecting only fully-applied units. The upsert
/// path only fires on a force re-apply of an already-recorded unit.
pub async fn record(conn: &impl ConnectionTrait, unit_name: &str, batch: i32) -> Result<(), DbErr> {
    let insert = Query::insert()
        .into_table(MigrationLedger::Table)
        .columns([
            MigrationLedger::UnitName,
            MigrationLedger::Batch,
            MigrationLedger::AppliedAt,
        ])
        .values_panic([
            unit_name.into(),
            batch.into(),
            chrono::Utc::now().naive_utc().into(),
        ])
        .on_conflict(
            OnConflict::column(MigrationLedger::UnitName)
                .update_columns([MigrationLedger::Batch, MigrationLedger::AppliedAt])
                .to_owned(),
        )
        .to_owned();

    let backend = conn.get_database_backend();
    conn.execute(backend.build(&insert)).await?;
    Ok(())
}
