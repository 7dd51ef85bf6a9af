//! Fleet migration orchestrator
//!
//! Walks every tenant, client, and store that declares a dedicated
//! database and brings each one up to date, sequentially, with a bounded
//! per-entity timeout. One entity's failure is recorded and the walk
//! continues; the report carries a row per entity plus aggregate counts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::{info, warn};

use tessera_common::TesseraError;
use tessera_persistence::entity::{client, store, tenant};
use tessera_persistence::{
    BootstrapResult, EntityOutcome, FleetEntityKind, FleetOutcome, FleetReport, MigrateOutcome,
};

use crate::manager::LifecycleManager;
use crate::migration::MigrationSet;
use crate::registry::ConnectionRegistry;

const MIN_ENTITY_TIMEOUT_SECS: u64 = 5;
const MAX_ENTITY_TIMEOUT_SECS: u64 = 3600;

/// Narrowing applied before the walk; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct FleetFilter {
    pub kind: Option<FleetEntityKind>,
    pub database: Option<String>,
}

impl FleetFilter {
    fn matches_kind(&self, kind: FleetEntityKind) -> bool {
        self.kind.is_none_or(|k| k == kind)
    }

    fn matches_database(&self, database: &str) -> bool {
        self.database.as_deref().is_none_or(|d| d == database)
    }
}

/// Migration sets per entity kind plus the per-entity timeout.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub entity_timeout_secs: u64,
    pub tenant_sets: Vec<MigrationSet>,
    pub client_sets: Vec<MigrationSet>,
    pub store_sets: Vec<MigrationSet>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            entity_timeout_secs: 600,
            tenant_sets: vec![MigrationSet::Tenant],
            client_sets: vec![MigrationSet::Client],
            store_sets: vec![MigrationSet::Store],
        }
    }
}

impl FleetConfig {
    fn sets_for(&self, kind: FleetEntityKind) -> &[MigrationSet] {
        match kind {
            FleetEntityKind::Tenant => &self.tenant_sets,
            FleetEntityKind::Client => &self.client_sets,
            FleetEntityKind::Store => &self.store_sets,
        }
    }

    fn entity_timeout(&self) -> Duration {
        Duration::from_secs(
            self.entity_timeout_secs
                .clamp(MIN_ENTITY_TIMEOUT_SECS, MAX_ENTITY_TIMEOUT_SECS),
        )
    }
}

/// Per-database migration operations the orchestrator drives.
///
/// [`LifecycleManager`] is the production implementation; the seam keeps
/// sequencing, failure isolation, and dry-run behavior testable without
/// a live server.
#[async_trait]
pub trait EntityMigrator: Send + Sync {
    async fn migrate(
        &self,
        conn_name: &str,
        database: &str,
        sets: &[MigrationSet],
        copy: Option<&tenant::Model>,
        force: bool,
    ) -> Result<MigrateOutcome, TesseraError>;

    async fn pending(
        &self,
        database: &str,
        sets: &[MigrationSet],
    ) -> Result<Vec<String>, TesseraError>;

    async fn bootstrap(
        &self,
        tenant: &tenant::Model,
        conn_name: &str,
        database: &str,
    ) -> Option<BootstrapResult>;

    fn release(&self, conn_name: &str);
}

#[async_trait]
impl EntityMigrator for LifecycleManager {
    async fn migrate(
        &self,
        conn_name: &str,
        database: &str,
        sets: &[MigrationSet],
        copy: Option<&tenant::Model>,
        force: bool,
    ) -> Result<MigrateOutcome, TesseraError> {
        self.ensure_and_migrate(conn_name, database, sets, copy, force).await
    }

    async fn pending(
        &self,
        database: &str,
        sets: &[MigrationSet],
    ) -> Result<Vec<String>, TesseraError> {
        self.pending_units(database, sets).await
    }

    async fn bootstrap(
        &self,
        tenant: &tenant::Model,
        conn_name: &str,
        database: &str,
    ) -> Option<BootstrapResult> {
        self.run_bootstrap(tenant, conn_name, database).await
    }

    fn release(&self, conn_name: &str) {
        self.registry().purge(conn_name);
    }
}

struct FleetEntity {
    kind: FleetEntityKind,
    id: i64,
    name: String,
    database: String,
    /// Present for tenants so the row can be mirrored into the target.
    tenant_copy: Option<tenant::Model>,
}

pub struct FleetOrchestrator {
    migrator: Arc<dyn EntityMigrator>,
    shared: Arc<DatabaseConnection>,
    config: FleetConfig,
}

impl FleetOrchestrator {
    pub fn new(
        migrator: Arc<dyn EntityMigrator>,
        shared: Arc<DatabaseConnection>,
        config: FleetConfig,
    ) -> Self {
        Self {
            migrator,
            shared,
            config,
        }
    }

    /// Run the walk. Collection errors abort the run; per-entity errors
    /// never do.
    pub async fn run(
        &self,
        filter: &FleetFilter,
        dry_run: bool,
        force: bool,
    ) -> Result<FleetReport, TesseraError> {
        let entities = self.collect(filter).await?;
        info!(entities = entities.len(), dry_run = dry_run, "Starting fleet migration");

        let mut report = FleetReport {
            dry_run,
            ..Default::default()
        };
        for entity in entities {
            let outcome = self.migrate_entity(&entity, dry_run, force).await;
            if let FleetOutcome::Error(message) = &outcome {
                warn!(
                    kind = %entity.kind,
                    entity_id = entity.id,
                    database = entity.database,
                    error = message,
                    "Fleet entity failed"
                );
            }
            report.push(EntityOutcome {
                kind: entity.kind,
                entity_id: entity.id,
                name: entity.name,
                database: entity.database,
                outcome,
            });
        }
        info!(
            success = report.success,
            errors = report.errors,
            skipped = report.skipped,
            "Fleet migration finished"
        );
        Ok(report)
    }

    async fn migrate_entity(
        &self,
        entity: &FleetEntity,
        dry_run: bool,
        force: bool,
    ) -> FleetOutcome {
        let sets = self.config.sets_for(entity.kind);
        if sets.is_empty() {
            return FleetOutcome::Skipped(format!(
                "no migration sets configured for {}",
                entity.kind
            ));
        }

        if dry_run {
            return match self.migrator.pending(&entity.database, sets).await {
                Ok(pending) => FleetOutcome::Success(MigrateOutcome {
                    applied: pending,
                    skipped: 0,
                    created_database: false,
                }),
                Err(e) => FleetOutcome::Error(e.to_string()),
            };
        }

        let conn_name = ConnectionRegistry::ephemeral_name();
        let work = async {
            let result = self
                .migrator
                .migrate(
                    &conn_name,
                    &entity.database,
                    sets,
                    entity.tenant_copy.as_ref(),
                    force,
                )
                .await?;
            // Tenants get first-use bootstrap as part of their fleet pass.
            if let Some(tenant) = &entity.tenant_copy {
                let bootstrap = self
                    .migrator
                    .bootstrap(tenant, &conn_name, &entity.database)
                    .await;
                if let Some(bootstrap) = bootstrap {
                    info!(
                        tenant_id = tenant.id,
                        was_empty = bootstrap.was_empty,
                        "Tenant bootstrap ran"
                    );
                }
            }
            Ok::<_, TesseraError>(result)
        };
        let timeout = self.config.entity_timeout();
        let outcome = match tokio::time::timeout(timeout, work).await {
            Ok(Ok(result)) => FleetOutcome::Success(result),
            Ok(Err(e)) => FleetOutcome::Error(e.to_string()),
            Err(_) => FleetOutcome::Error(format!(
                "timed out after {}s",
                timeout.as_secs()
            )),
        };
        self.migrator.release(&conn_name);
        outcome
    }

    /// Entities declaring a dedicated database, in tenant/client/store
    /// order, soft-deleted rows excluded.
    async fn collect(&self, filter: &FleetFilter) -> Result<Vec<FleetEntity>, TesseraError> {
        let fail = |e: sea_orm::DbErr| TesseraError::DatabaseError(e.to_string());
        let mut entities = Vec::new();

        if filter.matches_kind(FleetEntityKind::Tenant) {
            let tenants = tenant::Entity::find()
                .filter(tenant::Column::Database.is_not_null())
                .filter(tenant::Column::DeletedAt.is_null())
                .all(self.shared.as_ref())
                .await
                .map_err(fail)?;
            for t in tenants {
                let Some(database) = t.database.clone().filter(|d| !d.is_empty()) else {
                    continue;
                };
                if !filter.matches_database(&database) {
                    continue;
                }
                entities.push(FleetEntity {
                    kind: FleetEntityKind::Tenant,
                    id: t.id,
                    name: t.name.clone(),
                    database,
                    tenant_copy: Some(t),
                });
            }
        }

        if filter.matches_kind(FleetEntityKind::Client) {
            let clients = client::Entity::find()
                .filter(client::Column::Database.is_not_null())
                .filter(client::Column::DeletedAt.is_null())
                .all(self.shared.as_ref())
                .await
                .map_err(fail)?;
            for c in clients {
                let Some(database) = c.database.filter(|d| !d.is_empty()) else {
                    continue;
                };
                if !filter.matches_database(&database) {
                    continue;
                }
                entities.push(FleetEntity {
                    kind: FleetEntityKind::Client,
                    id: c.id,
                    name: c.name,
                    database,
                    tenant_copy: None,
                });
            }
        }

        if filter.matches_kind(FleetEntityKind::Store) {
            let stores = store::Entity::find()
                .filter(store::Column::Database.is_not_null())
                .filter(store::Column::DeletedAt.is_null())
                .all(self.shared.as_ref())
                .await
                .map_err(fail)?;
            for s in stores {
                let Some(database) = s.database.filter(|d| !d.is_empty()) else {
                    continue;
                };
                if !filter.matches_database(&database) {
                    continue;
                }
                entities.push(FleetEntity {
                    kind: FleetEntityKind::Store,
                    id: s.id,
                    name: s.name,
                    database,
                    tenant_copy: None,
                });
            }
        }

        Ok(entities)
    }
}
