//! Configuration loading and access
//!
//! Settings come from `conf/application.yml` (optional) overlaid with
//! `TESSERA_*` environment variables and the command line's explicit
//! overrides. Accessors carry the defaults so a bare environment still
//! yields a runnable configuration (except for the database URL, which
//! has no sensible default).

use std::time::Duration;

use config::{Config, Environment};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use tessera_common::TesseraError;
use tessera_lifecycle::manager::classify_db_error;
use tessera_lifecycle::registry::PoolSettings;
use tessera_lifecycle::{FleetConfig, MigrationSet};
use tessera_lifecycle::bootstrap::RoleTemplate;
use tessera_routing::ResolverSettings;

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn load(database_url: Option<String>) -> Result<Self, TesseraError> {
        let mut builder = Config::builder()
            .add_source(
                Environment::with_prefix("tessera")
                    .separator(".")
                    .try_parsing(true),
            )
            .add_source(config::File::with_name("conf/application.yml").required(false));

        if let Some(url) = database_url {
            builder = builder
                .set_override("db.url", url)
                .map_err(|e| TesseraError::ConfigError(e.to_string()))?;
        }

        let config = builder
            .build()
            .map_err(|e| TesseraError::ConfigError(e.to_string()))?;
        Ok(Configuration { config })
    }

    // ========================================================================
    // Database
    // ========================================================================

    pub fn database_url(&self) -> Result<String, TesseraError> {
        self.config.get_string("db.url").map_err(|_| {
            TesseraError::ConfigError(
                "db.url is not configured (set TESSERA_DB.URL, --db-url, or conf/application.yml)"
                    .to_string(),
            )
        })
    }

    pub fn pool_settings(&self) -> PoolSettings {
        let defaults = PoolSettings::default();
        PoolSettings {
            max_connections: self
                .config
                .get_int("db.pool.maximumPoolSize")
                .map(|v| v as u32)
                .unwrap_or(defaults.max_connections),
            min_connections: self
                .config
                .get_int("db.pool.minimumPoolSize")
                .map(|v| v as u32)
                .unwrap_or(defaults.min_connections),
            connect_timeout: self
                .config
                .get_int("db.pool.connectionTimeout")
                .map(|v| Duration::from_secs(v as u64))
                .unwrap_or(defaults.connect_timeout),
            acquire_timeout: self
                .config
                .get_int("db.pool.acquireTimeout")
                .map(|v| Duration::from_secs(v as u64))
                .unwrap_or(defaults.acquire_timeout),
        }
    }

    /// Open the shared-database connection.
    pub async fn database_connection(&self) -> Result<DatabaseConnection, TesseraError> {
        let url = self.database_url()?;
        let pool = self.pool_settings();

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(pool.max_connections)
            .min_connections(pool.min_connections)
            .connect_timeout(pool.connect_timeout)
            .acquire_timeout(pool.acquire_timeout)
            .sqlx_logging(false);

        Database::connect(opt)
            .await
            .map_err(|e| classify_db_error(&e, "shared"))
    }

    // ========================================================================
    // Tenancy
    // ========================================================================

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            admin_host: self.config.get_string("tenancy.adminHost").ok(),
            legacy_domain_lookup: self
                .config
                .get_bool("tenancy.legacyDomainLookup")
                .unwrap_or(true),
            degrade_to_shared: self
                .config
                .get_bool("tenancy.degradeToShared")
                .unwrap_or(false),
        }
    }

    pub fn fallback_role(&self) -> RoleTemplate {
        let defaults = RoleTemplate::default();
        RoleTemplate {
            name: self
                .config
                .get_string("bootstrap.roleName")
                .unwrap_or(defaults.name),
            slug: self
                .config
                .get_string("bootstrap.roleSlug")
                .unwrap_or(defaults.slug),
        }
    }

    // ========================================================================
    // Fleet
    // ========================================================================

    pub fn fleet_config(&self) -> Result<FleetConfig, TesseraError> {
        let defaults = FleetConfig::default();
        Ok(FleetConfig {
            entity_timeout_secs: self
                .config
                .get_int("fleet.entityTimeoutSecs")
                .map(|v| v as u64)
                .unwrap_or(defaults.entity_timeout_secs),
            tenant_sets: self.migration_sets("fleet.tenantSets", defaults.tenant_sets)?,
            client_sets: self.migration_sets("fleet.clientSets", defaults.client_sets)?,
            store_sets: self.migration_sets("fleet.storeSets", defaults.store_sets)?,
        })
    }

    fn migration_sets(
        &self,
        key: &str,
        default: Vec<MigrationSet>,
    ) -> Result<Vec<MigrationSet>, TesseraError> {
        let Ok(values) = self.config.get_array(key) else {
            return Ok(default);
        };
        values
            .into_iter()
            .map(|v| {
                let name = v
                    .into_string()
                    .map_err(|e| TesseraError::ConfigError(e.to_string()))?;
                name.parse::<MigrationSet>()
                    .map_err(|_| TesseraError::MigrationSetUnknown(name))
            })
            .collect()
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn log_dir(&self) -> Option<String> {
        self.config.get_string("logging.path").ok()
    }

    pub fn log_level(&self) -> String {
        self.config
            .get_string("logging.level")
            .unwrap_or("info".to_string())
    }

    pub fn log_console(&self) -> bool {
        self.config.get_bool("logging.console").unwrap_or(true)
    }

    pub fn log_file(&self) -> bool {
        self.config.get_bool("logging.file").unwrap_or(false)
    }
}
