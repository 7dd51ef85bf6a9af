//! Domain to tenant resolution
//!
//! Resolves the request host against domain bindings (with an optional
//! legacy fallback to the tenants table's own domain column), checks the
//! tenant is live, resolves the binding's owner, and computes the
//! routing decision. When the decision names a dedicated database, a
//! connection handle is acquired up front and carried in the resolved
//! context.

use std::sync::Arc;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::{debug, warn};

use tessera_common::TesseraError;
use tessera_lifecycle::ConnectionProvider;
use tessera_persistence::entity::{client, domain_binding, store, tenant};
use tessera_persistence::{Owner, OwnerKind, TenantStatus};

use crate::context::{RequestScope, Resolution, TenantContext};
use crate::route::route_database;

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Host that short-circuits to `Administrative`
    pub admin_host: Option<String>,
    /// Also consult the legacy `tenants.domain` column on a binding miss
    pub legacy_domain_lookup: bool,
    /// Serve the shared database instead of failing when the dedicated
    /// database is unreachable at request time
    pub degrade_to_shared: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            admin_host: None,
            legacy_domain_lookup: true,
            degrade_to_shared: false,
        }
    }
}

pub struct DomainResolver {
    shared: Arc<DatabaseConnection>,
    provider: Arc<dyn ConnectionProvider>,
    settings: ResolverSettings,
}

impl DomainResolver {
    pub fn new(
        shared: Arc<DatabaseConnection>,
        provider: Arc<dyn ConnectionProvider>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            shared,
            provider,
            settings,
        }
    }

    /// Resolve `host` within `scope`, computing at most once per scope.
    pub async fn resolve<'a>(
        &self,
        scope: &'a RequestScope,
        host: &str,
    ) -> Result<&'a Resolution, TesseraError> {
        let host = host.trim().to_ascii_lowercase();
        if host.is_empty() {
            return Err(TesseraError::IllegalArgument(
                "request host must not be empty".to_string(),
            ));
        }
        scope.cell.get_or_try_init(|| self.lookup(host)).await
    }

    async fn lookup(&self, host: String) -> Result<Resolution, TesseraError> {
        let fail = |e: sea_orm::DbErr| TesseraError::DatabaseError(e.to_string());

        if self.settings.admin_host.as_deref() == Some(host.as_str()) {
            return Ok(Resolution::Administrative);
        }

        let binding = domain_binding::Entity::find()
            .filter(domain_binding::Column::Domain.eq(&host))
            .one(self.shared.as_ref())
            .await
            .map_err(fail)?;

        if let Some(b) = binding {
            if let Some(tenant) = self.live_tenant(b.tenant_id).await? {
                return self
                    .hydrate(&host, tenant, b.owner_type.as_deref(), b.owner_id)
                    .await;
            }
            // A stale binding to an archived or removed tenant does not
            // end the search; the legacy column may still name a live one.
            debug!(host = host, tenant_id = b.tenant_id, "Binding targets a dead tenant");
        }

        if self.settings.legacy_domain_lookup {
            let legacy = tenant::Entity::find()
                .filter(tenant::Column::Domain.eq(&host))
                .filter(tenant::Column::DeletedAt.is_null())
                .one(self.shared.as_ref())
                .await
                .map_err(fail)?;
            if let Some(t) = legacy {
                if let Some(tenant) = self.live_tenant(t.id).await? {
                    return self.hydrate(&host, tenant, None, None).await;
                }
            }
        }

        Ok(Resolution::NotATenant)
    }

    /// Refetch a tenant by id; only published, non-deleted tenants count.
    async fn live_tenant(&self, tenant_id: i64) -> Result<Option<tenant::Model>, TesseraError> {
        let found = tenant::Entity::find_by_id(tenant_id)
            .one(self.shared.as_ref())
            .await
            .map_err(|e| TesseraError::DatabaseError(e.to_string()))?;
        Ok(found.filter(|t| {
            t.deleted_at.is_none() && t.status.parse::<TenantStatus>() == Ok(TenantStatus::Published)
        }))
    }

    async fn hydrate(
        &self,
        host: &str,
        tenant: tenant::Model,
        owner_tag: Option<&str>,
        owner_id: Option<i64>,
    ) -> Result<Resolution, TesseraError> {
        let owner = self.resolve_owner(owner_tag, owner_id).await?;
        let mut database = route_database(&tenant, owner.as_ref());

        let handle = match &database {
            Some(db) => match self.provider.acquire(db).await {
                Ok(handle) => Some(handle),
                Err(e) if self.settings.degrade_to_shared => {
                    warn!(
                        host = host,
                        database = db,
                        error = %e,
                        "Dedicated database unreachable, serving shared"
                    );
                    database = None;
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        Ok(Resolution::Tenant(Box::new(TenantContext {
            tenant,
            owner,
            database,
            handle,
        })))
    }

    /// Resolve the binding's polymorphic owner. Unknown tags, dangling
    /// ids, and soft-deleted owners all degrade to "no owner".
    async fn resolve_owner(
        &self,
        tag: Option<&str>,
        owner_id: Option<i64>,
    ) -> Result<Option<Owner>, TesseraError> {
        let fail = |e: sea_orm::DbErr| TesseraError::DatabaseError(e.to_string());
        let (Some(kind), Some(owner_id)) = (tag.and_then(OwnerKind::from_tag), owner_id) else {
            return Ok(None);
        };

        match kind {
            OwnerKind::Client => {
                let found = client::Entity::find_by_id(owner_id)
                    .one(self.shared.as_ref())
                    .await
                    .map_err(fail)?;
                Ok(found
                    .filter(|c| c.deleted_at.is_none())
                    .map(Owner::Client))
            }
            OwnerKind::Store => {
                let Some(store) = store::Entity::find_by_id(owner_id)
                    .one(self.shared.as_ref())
                    .await
                    .map_err(fail)?
                    .filter(|s| s.deleted_at.is_none())
                else {
                    return Ok(None);
                };
                let parent = match store.client_id {
                    Some(client_id) => client::Entity::find_by_id(client_id)
                        .one(self.shared.as_ref())
                        .await
                        .map_err(fail)?
                        .filter(|c| c.deleted_at.is_none()),
                    None => None,
                };
                Ok(Some(Owner::Store {
                    store,
                    client: parent,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase};

    struct StubProvider {
        handle: Option<Arc<DatabaseConnection>>,
    }

    #[async_trait]
    impl ConnectionProvider for StubProvider {
        async fn acquire(&self, database: &str) -> Result<Arc<DatabaseConnection>, TesseraError> {
            match &self.handle {
                Some(handle) => Ok(handle.clone()),
                None => Err(TesseraError::Connectivity(format!(
                    "no route to '{}'",
                    database
                ))),
            }
        }
    }

    fn tenant(id: i64, status: &str, database: Option<&str>) -> tenant::Model {
        tenant::Model {
            id,
            name: "acme".to_string(),
            domain: None,
            status: status.to_string(),
            database: database.map(str::to_string),
            settings: None,
            email: None,
            deleted_at: None,
            gmt_create: Default::default(),
            gmt_modified: Default::default(),
        }
    }

    fn binding(
        domain: &str,
        tenant_id: i64,
        owner_type: Option<&str>,
        owner_id: Option<i64>,
    ) -> domain_binding::Model {
        domain_binding::Model {
            id: 1,
            domain: domain.to_string(),
            tenant_id,
            owner_type: owner_type.map(str::to_string),
            owner_id,
            is_primary: true,
            gmt_create: Default::default(),
            gmt_modified: Default::default(),
        }
    }

    fn resolver(shared: DatabaseConnection, settings: ResolverSettings) -> DomainResolver {
        let provider = Arc::new(StubProvider {
            handle: Some(Arc::new(
                MockDatabase::new(DatabaseBackend::MySql).into_connection(),
            )),
        });
        DomainResolver::new(Arc::new(shared), provider, settings)
    }

    fn no_legacy() -> ResolverSettings {
        ResolverSettings {
            legacy_domain_lookup: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_host_is_rejected() {
        let shared = MockDatabase::new(DatabaseBackend::MySql).into_connection();
        let resolver = resolver(shared, no_legacy());
        let scope = RequestScope::new();
        let err = resolver.resolve(&scope, "  ").await;
        assert!(matches!(err, Err(TesseraError::IllegalArgument(_))));
    }

    #[tokio::test]
    async fn test_admin_host_short_circuits() {
        let shared = MockDatabase::new(DatabaseBackend::MySql).into_connection();
        let settings = ResolverSettings {
            admin_host: Some("admin.example.com".to_string()),
            ..no_legacy()
        };
        let resolver = resolver(shared, settings);
        let scope = RequestScope::new();
        let resolution = resolver.resolve(&scope, "Admin.Example.COM").await.unwrap();
        assert!(matches!(resolution, Resolution::Administrative));
    }

    #[tokio::test]
    async fn test_unknown_domain_is_not_a_tenant() {
        let shared = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([Vec::<domain_binding::Model>::new()])
            .into_connection();
        let resolver = resolver(shared, no_legacy());
        let scope = RequestScope::new();
        let resolution = resolver.resolve(&scope, "nobody.example.com").await.unwrap();
        assert!(matches!(resolution, Resolution::NotATenant));
    }

    #[tokio::test]
    async fn test_legacy_domain_column_fallback() {
        let t = tenant(7, "published", None);
        let shared = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([Vec::<domain_binding::Model>::new()])
            .append_query_results([vec![t.clone()], vec![t]])
            .into_connection();
        let resolver = resolver(shared, ResolverSettings::default());
        let scope = RequestScope::new();
        let resolution = resolver.resolve(&scope, "acme.example.com").await.unwrap();
        match resolution {
            Resolution::Tenant(ctx) => {
                assert_eq!(ctx.tenant.id, 7);
                assert_eq!(ctx.database, None);
                assert!(ctx.handle.is_none());
            }
            other => panic!("expected tenant resolution, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unpublished_tenant_is_not_a_tenant() {
        let shared = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![binding("acme.example.com", 7, None, None)]])
            .append_query_results([vec![tenant(7, "archived", Some("acme"))]])
            .into_connection();
        let resolver = resolver(shared, no_legacy());
        let scope = RequestScope::new();
        let resolution = resolver.resolve(&scope, "acme.example.com").await.unwrap();
        assert!(matches!(resolution, Resolution::NotATenant));
    }

    #[tokio::test]
    async fn test_stale_binding_falls_back_to_legacy_domain() {
        // The binding names an archived tenant; the legacy column binds
        // the same domain to a live one, which must win.
        let live = tenant(8, "published", None);
        let shared = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![binding("acme.example.com", 7, None, None)]])
            .append_query_results([vec![tenant(7, "archived", Some("acme"))]])
            .append_query_results([vec![live.clone()], vec![live]])
            .into_connection();
        let resolver = resolver(shared, ResolverSettings::default());
        let scope = RequestScope::new();
        let resolution = resolver.resolve(&scope, "acme.example.com").await.unwrap();
        match resolution {
            Resolution::Tenant(ctx) => assert_eq!(ctx.tenant.id, 8),
            other => panic!("expected tenant resolution, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_inherits_parent_client_database() {
        let store_model = store::Model {
            id: 10,
            tenant_id: 7,
            client_id: Some(5),
            name: "shop".to_string(),
            database: None,
            deleted_at: None,
            gmt_create: Default::default(),
            gmt_modified: Default::default(),
        };
        let client_model = client::Model {
            id: 5,
            tenant_id: 7,
            name: "client-5".to_string(),
            database: Some("client_42".to_string()),
            deleted_at: None,
            gmt_create: Default::default(),
            gmt_modified: Default::default(),
        };
        let shared = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![binding(
                "shop.example.com",
                7,
                Some("store"),
                Some(10),
            )]])
            .append_query_results([vec![tenant(7, "published", Some("acme"))]])
            .append_query_results([vec![store_model]])
            .append_query_results([vec![client_model]])
            .into_connection();
        let resolver = resolver(shared, no_legacy());
        let scope = RequestScope::new();
        let resolution = resolver.resolve(&scope, "shop.example.com").await.unwrap();
        match resolution {
            Resolution::Tenant(ctx) => {
                assert_eq!(ctx.database.as_deref(), Some("client_42"));
                assert_eq!(ctx.store_id(), Some(10));
                assert_eq!(ctx.client_id(), Some(5));
                assert!(ctx.handle.is_some());
            }
            other => panic!("expected tenant resolution, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_degrades_to_shared_when_configured() {
        let shared = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![binding("acme.example.com", 7, None, None)]])
            .append_query_results([vec![tenant(7, "published", Some("acme"))]])
            .into_connection();
        let provider = Arc::new(StubProvider { handle: None });
        let settings = ResolverSettings {
            degrade_to_shared: true,
            ..no_legacy()
        };
        let resolver = DomainResolver::new(Arc::new(shared), provider, settings);
        let scope = RequestScope::new();
        let resolution = resolver.resolve(&scope, "acme.example.com").await.unwrap();
        match resolution {
            Resolution::Tenant(ctx) => {
                assert_eq!(ctx.database, None);
                assert!(ctx.handle.is_none());
            }
            other => panic!("expected tenant resolution, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_database_fails_without_degrade() {
        let shared = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![binding("acme.example.com", 7, None, None)]])
            .append_query_results([vec![tenant(7, "published", Some("acme"))]])
            .into_connection();
        let provider = Arc::new(StubProvider { handle: None });
        let resolver = DomainResolver::new(Arc::new(shared), provider, no_legacy());
        let scope = RequestScope::new();
        let err = resolver.resolve(&scope, "acme.example.com").await;
        assert!(matches!(err, Err(TesseraError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_resolution_memoized_per_scope() {
        // The mock queues results for exactly one lookup; a second
        // resolve in the same scope must not touch the database.
        let t = tenant(7, "published", None);
        let shared = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![binding("acme.example.com", 7, None, None)]])
            .append_query_results([vec![t]])
            .into_connection();
        let resolver = resolver(shared, no_legacy());
        let scope = RequestScope::new();
        let first = resolver.resolve(&scope, "acme.example.com").await.unwrap();
        assert!(matches!(first, Resolution::Tenant(_)));
        let second = resolver.resolve(&scope, "acme.example.com").await.unwrap();
        assert!(matches!(second, Resolution::Tenant(_)));
    }
}
