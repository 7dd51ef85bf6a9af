//! Database lifecycle manager
//!
//! Owns physical database existence checks, creation, migration
//! execution against the per-database ledger, and the mirrored tenant
//! row inside a tenant's dedicated database.

use std::sync::Arc;

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, EntityTrait,
    Statement, TransactionTrait,
};
use tracing::{info, warn};

use tessera_common::{TENANT_CONNECTION, TesseraError, is_valid_identifier};
use tessera_persistence::entity::tenant;
use tessera_persistence::{BootstrapResult, MigrateOutcome};

use crate::bootstrap::TenantBootstrap;
use crate::migration::{self, MigrationSet, ledger};
use crate::registry::ConnectionRegistry;

/// Map a connection-time [`DbErr`] to the domain error taxonomy.
///
/// A missing physical database is recoverable by an operator (create it,
/// run the fleet migration) and is reported distinctly from transport or
/// credential failures. MySQL reports it as error 1049, Postgres as
/// SQLSTATE 3D000; the message text is matched as a fallback because
/// drivers rewrap the code inconsistently.
pub fn classify_db_error(err: &DbErr, database: &str) -> TesseraError {
    let message = err.to_string();
    let missing = message.contains("1049")
        || message.contains("3D000")
        || message.contains("Unknown database")
        || message.contains("does not exist");
    if missing {
        TesseraError::DatabaseMissing(database.to_string())
    } else {
        TesseraError::Connectivity(message)
    }
}

fn is_already_exists(err: &DbErr) -> bool {
    let message = err.to_string();
    // MySQL 1007, Postgres 42P04
    message.contains("1007") || message.contains("42P04") || message.contains("exists")
}

/// Whether a query failed because the table itself is absent, as opposed
/// to the connection or the query going wrong. MySQL 1146, Postgres
/// 42P01, SQLite "no such table".
fn is_missing_table(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("1146")
        || message.contains("42P01")
        || message.contains("doesn't exist")
        || message.contains("does not exist")
        || message.contains("no such table")
}

fn exists_query(backend: DatabaseBackend, database: &str) -> Statement {
    match backend {
        DatabaseBackend::Postgres => Statement::from_sql_and_values(
            backend,
            "SELECT 1 FROM pg_database WHERE datname = $1",
            [database.into()],
        ),
        _ => Statement::from_sql_and_values(
            backend,
            "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?",
            [database.into()],
        ),
    }
}

fn create_statement(backend: DatabaseBackend, database: &str) -> Statement {
    // Identifier validated by the caller; DDL cannot take bind parameters.
    let sql = match backend {
        DatabaseBackend::Postgres => format!("CREATE DATABASE \"{}\"", database),
        _ => format!(
            "CREATE DATABASE `{}` CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
            database
        ),
    };
    Statement::from_string(backend, sql)
}

fn drop_statement(backend: DatabaseBackend, database: &str) -> Statement {
    let sql = match backend {
        DatabaseBackend::Postgres => format!("DROP DATABASE IF EXISTS \"{}\"", database),
        _ => format!("DROP DATABASE IF EXISTS `{}`", database),
    };
    Statement::from_string(backend, sql)
}

/// Apply every pending unit of the given sets against an open
/// connection, one transaction per unit, in lexical name order.
///
/// The ledger row for a unit is written only after that unit's
/// transaction commits; a crash mid-run re-applies at most the unit that
/// was in flight. `force` re-applies units the ledger already records
/// (the ledger row is updated in place).
pub(crate) async fn apply_plan(
    conn: &DatabaseConnection,
    sets: &[MigrationSet],
    force: bool,
) -> Result<MigrateOutcome, TesseraError> {
    let mut outcome = MigrateOutcome::default();

    ledger::ensure_table(conn)
        .await
        .map_err(|e| TesseraError::DatabaseError(e.to_string()))?;
    let applied = ledger::applied_units(conn)
        .await
        .map_err(|e| TesseraError::DatabaseError(e.to_string()))?;
    let batch = ledger::next_batch(conn)
        .await
        .map_err(|e| TesseraError::DatabaseError(e.to_string()))?;

    for unit in migration::plan(sets) {
        if !force && applied.contains(unit.name()) {
            outcome.skipped += 1;
            continue;
        }
        let tx = conn
            .begin()
            .await
            .map_err(|e| TesseraError::DatabaseError(e.to_string()))?;
        unit.apply(&tx).await.map_err(|e| TesseraError::MigrationFailed {
            unit: unit.name().to_string(),
            message: e.to_string(),
        })?;
        tx.commit()
            .await
            .map_err(|e| TesseraError::DatabaseError(e.to_string()))?;
        ledger::record(conn, unit.name(), batch)
            .await
            .map_err(|e| TesseraError::DatabaseError(e.to_string()))?;
        info!(unit = unit.name(), "Applied migration unit");
        outcome.applied.push(unit.name().to_string());
    }

    Ok(outcome)
}

/// Existence, creation, migration, and tenant-row mirroring for
/// dedicated databases.
///
/// All catalog queries run on the shared connection; per-database work
/// runs on registry connections handed out under the caller's name.
pub struct LifecycleManager {
    registry: Arc<ConnectionRegistry>,
    shared: Arc<DatabaseConnection>,
    bootstrap: Option<Arc<TenantBootstrap>>,
}

impl LifecycleManager {
    pub fn new(registry: Arc<ConnectionRegistry>, shared: Arc<DatabaseConnection>) -> Self {
        Self {
            registry,
            shared,
            bootstrap: None,
        }
    }

    /// Attach the bootstrap collaborator run after tenant migrations.
    pub fn with_bootstrap(mut self, bootstrap: Arc<TenantBootstrap>) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Whether the physical database exists. Read-only catalog query.
    pub async fn database_exists(&self, database: &str) -> Result<bool, TesseraError> {
        if !is_valid_identifier(database) {
            return Err(TesseraError::IllegalArgument(format!(
                "invalid database name: '{}'",
                database
            )));
        }
        let backend = self.shared.get_database_backend();
        let row = self
            .shared
            .query_one(exists_query(backend, database))
            .await
            .map_err(|e| TesseraError::DatabaseError(e.to_string()))?;
        Ok(row.is_some())
    }

    /// Create the physical database; a concurrent creator winning the
    /// race is treated as success.
    pub async fn create_database(&self, database: &str) -> Result<(), TesseraError> {
        if !is_valid_identifier(database) {
            return Err(TesseraError::IllegalArgument(format!(
                "invalid database name: '{}'",
                database
            )));
        }
        let backend = self.shared.get_database_backend();
        match self.shared.execute(create_statement(backend, database)).await {
            Ok(_) => {
                info!(database = database, "Created database");
                Ok(())
            }
            Err(e) if is_already_exists(&e) => Ok(()),
            Err(e) => Err(TesseraError::DatabaseError(e.to_string())),
        }
    }

    /// Destructive removal of a dedicated database. Operator tooling only.
    pub async fn drop_database(&self, database: &str) -> Result<(), TesseraError> {
        if !is_valid_identifier(database) {
            return Err(TesseraError::IllegalArgument(format!(
                "invalid database name: '{}'",
                database
            )));
        }
        let backend = self.shared.get_database_backend();
        self.registry.purge(database);
        self.shared
            .execute(drop_statement(backend, database))
            .await
            .map_err(|e| TesseraError::DatabaseError(e.to_string()))?;
        warn!(database = database, "Dropped database");
        Ok(())
    }

    /// Create the database when missing, then apply every pending unit of
    /// the given sets. When `copy` is given, the tenant row is mirrored
    /// into the target database under its original primary key.
    pub async fn ensure_and_migrate(
        &self,
        conn_name: &str,
        database: &str,
        sets: &[MigrationSet],
        copy: Option<&tenant::Model>,
        force: bool,
    ) -> Result<MigrateOutcome, TesseraError> {
        let mut created_database = false;
        if !self.database_exists(database).await? {
            self.create_database(database).await?;
            created_database = true;
        }

        let conn = self.registry.ensure(conn_name, database).await?;
        let mut outcome = apply_plan(conn.as_ref(), sets, force).await?;
        outcome.created_database = created_database;

        if let Some(tenant) = copy {
            self.sync_owner_record(conn.as_ref(), tenant).await?;
        }

        Ok(outcome)
    }

    /// Unit names of the given sets not yet recorded in the database's
    /// ledger. Never creates or writes anything; a missing database or
    /// ledger table means every unit is pending, while any other failure
    /// to read the ledger is reported rather than shadowed.
    pub async fn pending_units(
        &self,
        database: &str,
        sets: &[MigrationSet],
    ) -> Result<Vec<String>, TesseraError> {
        let all: Vec<String> = migration::plan(sets)
            .iter()
            .map(|u| u.name().to_string())
            .collect();

        if !self.database_exists(database).await? {
            return Ok(all);
        }
        let name = ConnectionRegistry::ephemeral_name();
        let conn = match self.registry.ensure(&name, database).await {
            Ok(conn) => conn,
            Err(TesseraError::DatabaseMissing(_)) => return Ok(all),
            Err(e) => return Err(e),
        };
        let applied = match ledger::applied_units(conn.as_ref()).await {
            Ok(applied) => applied,
            // Ledger table absent on a never-migrated database.
            Err(e) if is_missing_table(&e) => Default::default(),
            Err(e) => {
                self.registry.purge(&name);
                return Err(TesseraError::DatabaseError(e.to_string()));
            }
        };
        self.registry.purge(&name);
        Ok(all.into_iter().filter(|n| !applied.contains(n)).collect())
    }

    /// Upsert the tenant's own row into its dedicated database, keeping
    /// the shared-database primary key.
    pub async fn sync_owner_record(
        &self,
        conn: &DatabaseConnection,
        tenant: &tenant::Model,
    ) -> Result<(), TesseraError> {
        let row = tenant::ActiveModel {
            id: Set(tenant.id),
            name: Set(tenant.name.clone()),
            domain: Set(tenant.domain.clone()),
            status: Set(tenant.status.clone()),
            database: Set(tenant.database.clone()),
            settings: Set(tenant.settings.clone()),
            email: Set(tenant.email.clone()),
            deleted_at: Set(tenant.deleted_at),
            gmt_create: Set(tenant.gmt_create),
            gmt_modified: Set(tenant.gmt_modified),
        };
        tenant::Entity::insert(row)
            .on_conflict(
                OnConflict::column(tenant::Column::Id)
                    .update_columns([
                        tenant::Column::Name,
                        tenant::Column::Domain,
                        tenant::Column::Status,
                        tenant::Column::Database,
                        tenant::Column::Settings,
                        tenant::Column::Email,
                        tenant::Column::DeletedAt,
                        tenant::Column::GmtModified,
                    ])
                    .to_owned(),
            )
            .exec(conn)
            .await
            .map_err(|e| TesseraError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Remove the mirrored tenant row from a dedicated database.
    pub async fn delete_owner_record(
        &self,
        conn: &DatabaseConnection,
        tenant_id: i64,
    ) -> Result<(), TesseraError> {
        tenant::Entity::delete_by_id(tenant_id)
            .exec(conn)
            .await
            .map_err(|e| TesseraError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Run first-use bootstrap on a tenant's dedicated database through
    /// the named connection.
    ///
    /// Bootstrap failure never fails the caller: the migration already
    /// succeeded, and bootstrap re-runs on the tenant's next first use.
    /// Returns `None` when no bootstrap collaborator is attached or the
    /// run failed.
    pub async fn run_bootstrap(
        &self,
        tenant: &tenant::Model,
        conn_name: &str,
        database: &str,
    ) -> Option<BootstrapResult> {
        let bootstrap = self.bootstrap.as_ref()?;
        let conn = match self.registry.ensure(conn_name, database).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(tenant_id = tenant.id, error = %e, "Tenant bootstrap failed");
                return None;
            }
        };
        match bootstrap.run(tenant, conn.as_ref()).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(tenant_id = tenant.id, error = %e, "Tenant bootstrap failed");
                None
            }
        }
    }

    /// Ensure a tenant's dedicated database exists and is migrated, then
    /// run first-use bootstrap.
    pub async fn ensure_and_migrate_tenant(
        &self,
        tenant: &tenant::Model,
        force: bool,
    ) -> Result<(MigrateOutcome, Option<BootstrapResult>), TesseraError> {
        let database = tenant
            .database
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                TesseraError::IllegalArgument(format!(
                    "tenant {} has no dedicated database",
                    tenant.id
                ))
            })?;

        let outcome = self
            .ensure_and_migrate(
                TENANT_CONNECTION,
                database,
                &[MigrationSet::Tenant],
                Some(tenant),
                force,
            )
            .await?;

        let bootstrap = self.run_bootstrap(tenant, TENANT_CONNECTION, database).await;

        Ok((outcome, bootstrap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectOptions, Database};

    async fn sqlite() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1);
        Database::connect(opt).await.unwrap()
    }

    #[test]
    fn test_classify_unknown_database_mysql() {
        let err = DbErr::Custom("error 1049 (42000): Unknown database 'acme'".to_string());
        assert!(matches!(
            classify_db_error(&err, "acme"),
            TesseraError::DatabaseMissing(name) if name == "acme"
        ));
    }

    #[test]
    fn test_classify_missing_database_postgres() {
        let err = DbErr::Custom("FATAL: database \"acme\" does not exist (SQLSTATE 3D000)".into());
        assert!(matches!(
            classify_db_error(&err, "acme"),
            TesseraError::DatabaseMissing(_)
        ));
    }

    #[test]
    fn test_classify_other_failure_is_connectivity() {
        let err = DbErr::Custom("Access denied for user 'tessera'@'%'".to_string());
        assert!(matches!(
            classify_db_error(&err, "acme"),
            TesseraError::Connectivity(_)
        ));
    }

    #[test]
    fn test_already_exists_detection() {
        assert!(is_already_exists(&DbErr::Custom(
            "error 1007 (HY000): Can't create database 'acme'; database exists".into()
        )));
        assert!(is_already_exists(&DbErr::Custom(
            "ERROR: database \"acme\" already exists (SQLSTATE 42P04)".into()
        )));
        assert!(!is_already_exists(&DbErr::Custom("connection refused".into())));
    }

    #[test]
    fn test_missing_table_detection() {
        assert!(is_missing_table(&DbErr::Custom(
            "error 1146 (42S02): Table 'acme.migration_ledger' doesn't exist".into()
        )));
        assert!(is_missing_table(&DbErr::Custom(
            "ERROR: relation \"migration_ledger\" does not exist (SQLSTATE 42P01)".into()
        )));
        assert!(is_missing_table(&DbErr::Custom(
            "no such table: migration_ledger".into()
        )));
        assert!(!is_missing_table(&DbErr::Custom("connection refused".into())));
        assert!(!is_missing_table(&DbErr::Custom(
            "Access denied for user 'tessera'@'%'".into()
        )));
    }

    #[test]
    fn test_exists_query_per_backend() {
        let mysql = exists_query(DatabaseBackend::MySql, "acme");
        assert!(mysql.sql.contains("information_schema.SCHEMATA"));
        let pg = exists_query(DatabaseBackend::Postgres, "acme");
        assert!(pg.sql.contains("pg_database"));
    }

    #[test]
    fn test_create_statement_quotes_identifier() {
        let mysql = create_statement(DatabaseBackend::MySql, "acme");
        assert!(mysql.sql.starts_with("CREATE DATABASE `acme`"));
        let pg = create_statement(DatabaseBackend::Postgres, "acme");
        assert_eq!(pg.sql, "CREATE DATABASE \"acme\"");
    }

    #[test]
    fn test_drop_statement_is_idempotent() {
        let mysql = drop_statement(DatabaseBackend::MySql, "acme");
        assert!(mysql.sql.contains("IF EXISTS"));
    }

    #[tokio::test]
    async fn test_apply_plan_second_run_applies_nothing() {
        let conn = sqlite().await;
        let first = apply_plan(&conn, &[MigrationSet::Tenant], false).await.unwrap();
        assert!(!first.applied.is_empty());
        assert_eq!(first.skipped, 0);

        let second = apply_plan(&conn, &[MigrationSet::Tenant], false).await.unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(second.skipped, first.applied.len());

        let recorded = ledger::applied_units(&conn).await.unwrap();
        assert_eq!(recorded.len(), first.applied.len());
    }

    #[tokio::test]
    async fn test_apply_plan_force_reapplies_without_duplicating_ledger() {
        let conn = sqlite().await;
        let first = apply_plan(&conn, &[MigrationSet::Tenant], false).await.unwrap();

        let forced = apply_plan(&conn, &[MigrationSet::Tenant], true).await.unwrap();
        assert_eq!(forced.applied, first.applied);
        assert_eq!(forced.skipped, 0);

        let recorded = ledger::applied_units(&conn).await.unwrap();
        assert_eq!(recorded.len(), first.applied.len());
    }
}
