//! Migration unit creating the per-tenant users table.

use async_trait::async_trait;
use sea_orm::sea_query::{ColumnDef, Expr, Index, Table};
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr, DeriveIden};

use crate::migration::MigrationUnit;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Name,
    Email,
    Password,
    RoleId,
    GmtCreate,
    GmtModified,
}

pub struct CreateUsers;

#[async_trait]
impl MigrationUnit for CreateUsers {
    fn name(&self) -> &'static str {
        "2024_06_01_000003_create_users"
    }

    async fn apply(&self, tx: &DatabaseTransaction) -> Result<(), DbErr> {
        let backend = tx.get_database_backend();

        let table = Table::create()
            .table(Users::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Users::Id)
                    .big_integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(Users::Name).string().not_null())
            .col(
                ColumnDef::new(Users::Email)
                    .string_len(191)
                    .not_null()
                    .unique_key(),
            )
            .col(ColumnDef::new(Users::Password).string().not_null())
            .col(ColumnDef::new(Users::RoleId).big_integer())
            .col(
                ColumnDef::new(Users::GmtCreate)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(Users::GmtModified)
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();
        tx.execute(backend.build(&table)).await?;

        let role_index = Index::create()
            .name("idx_users_role")
            .table(Users::Table)
            .col(Users::RoleId)
            .to_owned();
        super::create_index(tx, &role_index).await?;

        Ok(())
    }
}
