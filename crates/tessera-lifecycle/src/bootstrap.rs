//! First-use tenant bootstrap
//!
//! Provisions the baseline security data inside a freshly migrated
//! tenant database: an admin role, the permission catalogue, and (when
//! the tenant has a contact address) an admin user with generated
//! credentials. Runs are serialized per tenant and re-check emptiness
//! under the lock, so concurrent first requests provision exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
};
use tokio::sync::Mutex;
use tracing::info;

use tessera_common::{TesseraError, generate_password, permission_key, slugify};
use tessera_persistence::BootstrapResult;
use tessera_persistence::entity::{permission, role, tenant, user};

const GENERATED_PASSWORD_LEN: usize = 16;

/// One guarded action on a resource, discovered from the application's
/// route table.
#[derive(Debug, Clone)]
pub struct ResourceAction {
    pub name: String,
    pub route_name: String,
}

/// Read-only source of the permission catalogue.
pub trait ResourceCatalog: Send + Sync {
    fn actions(&self) -> Vec<ResourceAction>;
}

/// Fixed catalogue handed in at construction time.
pub struct StaticResourceCatalog {
    actions: Vec<ResourceAction>,
}

impl StaticResourceCatalog {
    pub fn new(actions: Vec<ResourceAction>) -> Self {
        Self { actions }
    }
}

impl ResourceCatalog for StaticResourceCatalog {
    fn actions(&self) -> Vec<ResourceAction> {
        self.actions.clone()
    }
}

/// Generated admin credentials, only ever held in memory on the way to
/// the notifier.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

/// Delivery boundary for bootstrap notifications. Message rendering and
/// transport live behind this trait.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        tenant: &tenant::Model,
        credentials: Option<&AdminCredentials>,
    ) -> Result<(), TesseraError>;
}

/// Notifier that records the event in the log instead of sending mail.
/// Credentials are never written out.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        tenant: &tenant::Model,
        credentials: Option<&AdminCredentials>,
    ) -> Result<(), TesseraError> {
        info!(
            tenant_id = tenant.id,
            credentials_generated = credentials.is_some(),
            "Tenant bootstrap notification"
        );
        Ok(())
    }
}

/// Role used when the shared database carries no admin role template.
#[derive(Debug, Clone)]
pub struct RoleTemplate {
    pub name: String,
    pub slug: String,
}

impl Default for RoleTemplate {
    fn default() -> Self {
        Self {
            name: "Administrator".to_string(),
            slug: "administrator".to_string(),
        }
    }
}

pub struct TenantBootstrap {
    shared: Arc<DatabaseConnection>,
    catalog: Arc<dyn ResourceCatalog>,
    notifier: Arc<dyn Notifier>,
    fallback_role: RoleTemplate,
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl TenantBootstrap {
    pub fn new(
        shared: Arc<DatabaseConnection>,
        catalog: Arc<dyn ResourceCatalog>,
        notifier: Arc<dyn Notifier>,
        fallback_role: RoleTemplate,
    ) -> Self {
        Self {
            shared,
            catalog,
            notifier,
            fallback_role,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, tenant_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(tenant_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Provision baseline data in `conn` (the tenant's database) if its
    /// baseline tables are all empty. The tenant contact is notified on
    /// every run; generated credentials are attached only when an admin
    /// user was created this run.
    pub async fn run(
        &self,
        tenant: &tenant::Model,
        conn: &DatabaseConnection,
    ) -> Result<BootstrapResult, TesseraError> {
        let lock = self.lock_for(tenant.id);
        let _guard = lock.lock().await;

        let fail = |e: sea_orm::DbErr| TesseraError::BootstrapFailed {
            tenant_id: tenant.id,
            message: e.to_string(),
        };

        let email = tenant.email.as_deref().filter(|e| !e.is_empty());

        let users = user::Entity::find().count(conn).await.map_err(fail)?;
        let roles = role::Entity::find().count(conn).await.map_err(fail)?;
        let permissions = permission::Entity::find().count(conn).await.map_err(fail)?;
        if users + roles + permissions > 0 {
            // Already provisioned; the tenant contact still hears that
            // their database came up, just without fresh credentials.
            let mut result = BootstrapResult::default();
            if email.is_some() {
                self.notifier.notify(tenant, None).await?;
                result.notified = true;
            }
            return Ok(result);
        }

        let mut result = BootstrapResult {
            was_empty: true,
            ..Default::default()
        };

        let template = self.role_template().await?;
        let role_id = self.ensure_role(conn, &template, tenant.id).await?;
        result.role_id = Some(role_id);

        result.permissions_written = self.write_permissions(conn, tenant.id).await?;

        let mut credentials = None;
        if let Some(email) = email {
            let password = generate_password(GENERATED_PASSWORD_LEN);
            let hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST).map_err(|e| {
                TesseraError::BootstrapFailed {
                    tenant_id: tenant.id,
                    message: e.to_string(),
                }
            })?;
            let inserted = user::Entity::insert(user::ActiveModel {
                name: Set(template.name.clone()),
                email: Set(email.to_string()),
                password: Set(hash),
                role_id: Set(Some(role_id)),
                ..Default::default()
            })
            .exec(conn)
            .await
            .map_err(fail)?;
            result.user_id = Some(inserted.last_insert_id);
            credentials = Some(AdminCredentials {
                email: email.to_string(),
                password,
            });
        }

        if email.is_some() {
            self.notifier.notify(tenant, credentials.as_ref()).await?;
            result.notified = true;
        }

        info!(
            tenant_id = tenant.id,
            permissions = result.permissions_written,
            admin_user = result.user_id.is_some(),
            "Bootstrapped tenant"
        );
        Ok(result)
    }

    /// Admin role template: the shared database's admin role when one
    /// exists, otherwise the configured fallback. A shared database
    /// without a roles table also yields the fallback.
    async fn role_template(&self) -> Result<RoleTemplate, TesseraError> {
        let shared_admin = role::Entity::find()
            .filter(role::Column::IsAdmin.eq(true))
            .one(self.shared.as_ref())
            .await;
        Ok(match shared_admin {
            Ok(Some(role)) => RoleTemplate {
                name: role.name,
                slug: role.slug,
            },
            Ok(None) => self.fallback_role.clone(),
            Err(e) => {
                tracing::debug!(error = %e, "No role template readable from shared database");
                self.fallback_role.clone()
            }
        })
    }

    async fn ensure_role(
        &self,
        conn: &DatabaseConnection,
        template: &RoleTemplate,
        tenant_id: i64,
    ) -> Result<i64, TesseraError> {
        let fail = |e: sea_orm::DbErr| TesseraError::BootstrapFailed {
            tenant_id,
            message: e.to_string(),
        };
        let slug = slugify(&template.slug);
        if let Some(existing) = role::Entity::find()
            .filter(role::Column::Slug.eq(slug.clone()))
            .one(conn)
            .await
            .map_err(fail)?
        {
            return Ok(existing.id);
        }
        let inserted = role::Entity::insert(role::ActiveModel {
            name: Set(template.name.clone()),
            slug: Set(slug),
            is_admin: Set(true),
            ..Default::default()
        })
        .exec(conn)
        .await
        .map_err(fail)?;
        Ok(inserted.last_insert_id)
    }

    /// Regenerate the permission catalogue. Rows are keyed by the
    /// deterministic route hash, so re-runs update in place.
    async fn write_permissions(
        &self,
        conn: &DatabaseConnection,
        tenant_id: i64,
    ) -> Result<usize, TesseraError> {
        let actions = self.catalog.actions();
        for action in &actions {
            permission::Entity::insert(permission::ActiveModel {
                name: Set(action.name.clone()),
                key: Set(permission_key(&action.route_name)),
                route_name: Set(action.route_name.clone()),
                ..Default::default()
            })
            .on_conflict(
                OnConflict::column(permission::Column::Key)
                    .update_columns([
                        permission::Column::Name,
                        permission::Column::RouteName,
                        permission::Column::GmtModified,
                    ])
                    .to_owned(),
            )
            .exec(conn)
            .await
            .map_err(|e| TesseraError::BootstrapFailed {
                tenant_id,
                message: e.to_string(),
            })?;
        }
        Ok(actions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectOptions, Database};

    use crate::manager::apply_plan;
    use crate::migration::MigrationSet;

    async fn migrated_tenant_db() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1);
        let conn = Database::connect(opt).await.unwrap();
        apply_plan(&conn, &[MigrationSet::Tenant], false).await.unwrap();
        conn
    }

    async fn empty_shared() -> Arc<DatabaseConnection> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1);
        Arc::new(Database::connect(opt).await.unwrap())
    }

    fn tenant_with_email(email: Option<&str>) -> tenant::Model {
        tenant::Model {
            id: 7,
            name: "acme".to_string(),
            domain: None,
            status: "published".to_string(),
            database: Some("acme".to_string()),
            settings: None,
            email: email.map(str::to_string),
            deleted_at: None,
            gmt_create: Default::default(),
            gmt_modified: Default::default(),
        }
    }

    /// Records whether each delivery carried generated credentials.
    #[derive(Default)]
    struct RecordingNotifier {
        deliveries: std::sync::Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(
            &self,
            _tenant: &tenant::Model,
            credentials: Option<&AdminCredentials>,
        ) -> Result<(), TesseraError> {
            self.deliveries.lock().unwrap().push(credentials.is_some());
            Ok(())
        }
    }

    fn catalog() -> Arc<StaticResourceCatalog> {
        Arc::new(StaticResourceCatalog::new(vec![
            ResourceAction {
                name: "List users".to_string(),
                route_name: "users.index".to_string(),
            },
            ResourceAction {
                name: "Delete user".to_string(),
                route_name: "users.destroy".to_string(),
            },
        ]))
    }

    #[test]
    fn test_fallback_role_defaults() {
        let template = RoleTemplate::default();
        assert_eq!(template.name, "Administrator");
        assert_eq!(template.slug, "administrator");
    }

    #[test]
    fn test_static_catalog_preserves_actions() {
        let catalog = StaticResourceCatalog::new(vec![
            ResourceAction {
                name: "List users".to_string(),
                route_name: "users.index".to_string(),
            },
            ResourceAction {
                name: "Delete user".to_string(),
                route_name: "users.destroy".to_string(),
            },
        ]);
        let actions = catalog.actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].route_name, "users.index");
    }

    #[test]
    fn test_permission_keys_distinct_per_route() {
        assert_ne!(
            permission_key("users.index"),
            permission_key("users.destroy")
        );
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let tenant = tenant::Model {
            id: 7,
            name: "acme".to_string(),
            domain: None,
            status: "published".to_string(),
            database: Some("acme".to_string()),
            settings: None,
            email: Some("admin@acme.test".to_string()),
            deleted_at: None,
            gmt_create: Default::default(),
            gmt_modified: Default::default(),
        };
        let creds = AdminCredentials {
            email: "admin@acme.test".to_string(),
            password: "irrelevant".to_string(),
        };
        assert!(LogNotifier.notify(&tenant, Some(&creds)).await.is_ok());
        assert!(LogNotifier.notify(&tenant, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_provisions_empty_database_and_sends_credentials() {
        let conn = migrated_tenant_db().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let bootstrap = TenantBootstrap::new(
            empty_shared().await,
            catalog(),
            notifier.clone(),
            RoleTemplate::default(),
        );
        let tenant = tenant_with_email(Some("admin@acme.test"));

        let result = bootstrap.run(&tenant, &conn).await.unwrap();
        assert!(result.was_empty);
        assert!(result.role_id.is_some());
        assert!(result.user_id.is_some());
        assert_eq!(result.permissions_written, 2);
        assert!(result.notified);
        assert_eq!(*notifier.deliveries.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn test_notifies_on_already_provisioned_database() {
        let conn = migrated_tenant_db().await;
        role::Entity::insert(role::ActiveModel {
            name: Set("Administrator".to_string()),
            slug: Set("administrator".to_string()),
            is_admin: Set(true),
            ..Default::default()
        })
        .exec(&conn)
        .await
        .unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let bootstrap = TenantBootstrap::new(
            empty_shared().await,
            catalog(),
            notifier.clone(),
            RoleTemplate::default(),
        );
        let tenant = tenant_with_email(Some("admin@acme.test"));

        let result = bootstrap.run(&tenant, &conn).await.unwrap();
        assert!(!result.was_empty);
        assert!(result.role_id.is_none());
        assert!(result.user_id.is_none());
        assert!(result.notified);
        // Delivered, but without credentials.
        assert_eq!(*notifier.deliveries.lock().unwrap(), vec![false]);

        let roles = role::Entity::find().count(&conn).await.unwrap();
        assert_eq!(roles, 1);
    }

    #[tokio::test]
    async fn test_second_run_provisions_nothing_but_still_notifies() {
        let conn = migrated_tenant_db().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let bootstrap = TenantBootstrap::new(
            empty_shared().await,
            catalog(),
            notifier.clone(),
            RoleTemplate::default(),
        );
        let tenant = tenant_with_email(Some("admin@acme.test"));

        bootstrap.run(&tenant, &conn).await.unwrap();
        let second = bootstrap.run(&tenant, &conn).await.unwrap();
        assert!(!second.was_empty);
        assert!(second.notified);
        assert_eq!(*notifier.deliveries.lock().unwrap(), vec![true, false]);

        let users = user::Entity::find().count(&conn).await.unwrap();
        assert_eq!(users, 1);
    }

    #[tokio::test]
    async fn test_no_contact_address_skips_notification() {
        let conn = migrated_tenant_db().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let bootstrap = TenantBootstrap::new(
            empty_shared().await,
            catalog(),
            notifier.clone(),
            RoleTemplate::default(),
        );
        let tenant = tenant_with_email(None);

        let result = bootstrap.run(&tenant, &conn).await.unwrap();
        assert!(result.was_empty);
        assert!(result.user_id.is_none());
        assert!(!result.notified);
        assert!(notifier.deliveries.lock().unwrap().is_empty());
    }
}
