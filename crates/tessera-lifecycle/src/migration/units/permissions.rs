//! Migration unit creating the per-tenant permissions table.

use async_trait::async_trait;
use sea_orm::sea_query::{ColumnDef, Expr, Table};
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr, DeriveIden};

use crate::migration::MigrationUnit;

#[derive(DeriveIden)]
enum Permissions {
    Table,
    Id,
    Name,
    PermissionKey,
    RouteName,
    GmtCreate,
    GmtModified,
}

pub struct CreatePermissions;

#[async_trait]
impl MigrationUnit for CreatePermissions {
    fn name(&self) -> &'static str {
        "2024_06_01_000002_create_permissions"
    }

    async fn apply(&self, tx: &DatabaseTransaction) -> Result<(), DbErr> {
        let backend = tx.get_database_backend();

        let table = Table::create()
            .table(Permissions::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Permissions::Id)
                    .big_integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(Permissions::Name).string().not_null())
            .col(
                ColumnDef::new(Permissions::PermissionKey)
                    .string_len(32)
                    .not_null()
                    .unique_key(),
            )
            .col(ColumnDef::new(Permissions::RouteName).string().not_null())
            .col(
                ColumnDef::new(Permissions::GmtCreate)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(Permissions::GmtModified)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();
        tx.execute(backend.build(&table)).await?;

        Ok(())
    }
}
