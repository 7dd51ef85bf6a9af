//! Migration unit creating the per-tenant roles table.

use async_trait::async_trait;
use sea_orm::sea_query::{ColumnDef, Expr, Table};
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr, DeriveIden};

use crate::migration::MigrationUnit;

#[derive(DeriveIden)]
enum Roles {
    Table,
    Id,
    Name,
    Slug,
    IsAdmin,
    GmtCreate,
    GmtModified,
}

pub struct CreateRoles;

#[async_trait]
impl MigrationUnit for CreateRoles {
    fn name(&self) -> &'static str {
        "2024_06_01_000001_create_roles"
    }

    async fn apply(&self, tx: &DatabaseTransaction) -> Result<(), DbErr> {
        let backend = tx.get_database_backend();

        let table = Table::create()
            .table(Roles::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Roles::Id)
                    .big_integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(Roles::Name).string().not_null())
            .col(
                ColumnDef::new(Roles::Slug)
                    .string_len(191)
                    .not_null()
                    .unique_key(),
            )
            .col(
                ColumnDef::new(Roles::IsAdmin)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(
                ColumnDef::new(Roles::GmtCreate)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(Roles::GmtModified)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();
        tx.execute(backend.build(&table)).await?;

        Ok(())
    }
}
