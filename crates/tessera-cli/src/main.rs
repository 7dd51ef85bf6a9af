//! Operator command line for Tessera.
//!
//! `tessera fleet-migrate` walks every tenant, client, and store with a
//! dedicated database and brings each one up to date. `tessera resolve`
//! answers "where would a request for this host run" for diagnostics,
//! and `tessera bootstrap-tenant` migrates and bootstraps one tenant.

mod config;
mod logging;

use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use sea_orm::EntityTrait;
use tracing::info;

use tessera_common::TesseraError;
use tessera_lifecycle::bootstrap::{LogNotifier, StaticResourceCatalog, TenantBootstrap};
use tessera_lifecycle::fleet::{FleetFilter, FleetOrchestrator};
use tessera_lifecycle::manager::LifecycleManager;
use tessera_lifecycle::registry::ConnectionRegistry;
use tessera_persistence::entity::tenant;
use tessera_persistence::{FleetEntityKind, FleetOutcome, FleetReport};
use tessera_routing::{DomainResolver, RequestScope, Resolution};

use crate::config::Configuration;
use crate::logging::LoggingConfig;

#[derive(Debug, Parser)]
#[command(name = "tessera", version, about = "Multi-tenant database lifecycle tooling")]
struct Cli {
    #[arg(long = "db-url", env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create and migrate every dedicated database in the fleet
    FleetMigrate(FleetMigrateArgs),
    /// Resolve a host name the way request handling would
    Resolve(ResolveArgs),
    /// Migrate and bootstrap a single tenant's dedicated database
    BootstrapTenant(BootstrapTenantArgs),
}

#[derive(Debug, Args)]
struct FleetMigrateArgs {
    /// Only walk entities of this kind (tenant | client | store)
    #[arg(long = "entity-type")]
    entity_type: Option<FleetEntityKind>,

    /// Only walk entities declaring this database name
    #[arg(long)]
    database: Option<String>,

    /// Report pending units without creating or changing anything
    #[arg(long)]
    dry_run: bool,

    /// Re-apply units the ledger already records
    #[arg(long)]
    force: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long = "yes")]
    yes: bool,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Host name to resolve, e.g. acme.example.com
    host: String,
}

#[derive(Debug, Args)]
struct BootstrapTenantArgs {
    #[arg(long = "tenant-id")]
    tenant_id: i64,

    /// Re-apply migration units the ledger already records
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            if let Some(remediation) = e
                .downcast_ref::<TesseraError>()
                .and_then(|e| e.remediation())
            {
                eprintln!("{}", remediation.explanation);
                for step in remediation.steps {
                    eprintln!("  - {}", step);
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let configuration = Configuration::load(cli.database_url)?;

    let logging = LoggingConfig::from_settings(
        configuration.log_dir(),
        configuration.log_console(),
        configuration.log_file(),
        &configuration.log_level(),
    );
    let _logging_guard = logging::init_logging(&logging)?;

    match cli.command {
        Command::FleetMigrate(args) => fleet_migrate(&configuration, args).await,
        Command::Resolve(args) => resolve(&configuration, args).await,
        Command::BootstrapTenant(args) => bootstrap_tenant(&configuration, args).await,
    }
}

async fn fleet_migrate(
    configuration: &Configuration,
    args: FleetMigrateArgs,
) -> anyhow::Result<ExitCode> {
    if !args.yes && !args.dry_run && !confirm(&args)? {
        println!("Aborted.");
        return Ok(ExitCode::SUCCESS);
    }

    let shared = Arc::new(configuration.database_connection().await?);
    let registry = Arc::new(ConnectionRegistry::new(
        &configuration.database_url()?,
        configuration.pool_settings(),
    )?);
    // Tenants touched by the walk get first-use bootstrap, same as the
    // single-tenant path.
    let bootstrap = Arc::new(TenantBootstrap::new(
        shared.clone(),
        Arc::new(StaticResourceCatalog::new(Vec::new())),
        Arc::new(LogNotifier),
        configuration.fallback_role(),
    ));
    let manager = Arc::new(
        LifecycleManager::new(registry, shared.clone()).with_bootstrap(bootstrap),
    );
    let orchestrator =
        FleetOrchestrator::new(manager, shared, configuration.fleet_config()?);

    let filter = FleetFilter {
        kind: args.entity_type,
        database: args.database,
    };
    info!(dry_run = args.dry_run, force = args.force, "Fleet migration requested");
    let report = orchestrator.run(&filter, args.dry_run, args.force).await?;

    print_report(&report);
    if report.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn resolve(configuration: &Configuration, args: ResolveArgs) -> anyhow::Result<ExitCode> {
    let shared = Arc::new(configuration.database_connection().await?);
    let registry = Arc::new(ConnectionRegistry::new(
        &configuration.database_url()?,
        configuration.pool_settings(),
    )?);
    let resolver = DomainResolver::new(shared, registry, configuration.resolver_settings());

    let scope = RequestScope::new();
    match resolver.resolve(&scope, &args.host).await? {
        Resolution::Administrative => println!("{}: administrative host", args.host),
        Resolution::NotATenant => println!("{}: no published tenant bound", args.host),
        Resolution::Tenant(ctx) => {
            println!("{}: tenant {} ({})", args.host, ctx.tenant.id, ctx.tenant.name);
            match &ctx.database {
                Some(db) => println!("  database: {}", db),
                None => println!("  database: shared"),
            }
            if let Some(client_id) = ctx.client_id() {
                println!("  client: {}", client_id);
            }
            if let Some(store_id) = ctx.store_id() {
                println!("  store: {}", store_id);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn bootstrap_tenant(
    configuration: &Configuration,
    args: BootstrapTenantArgs,
) -> anyhow::Result<ExitCode> {
    let shared = Arc::new(configuration.database_connection().await?);
    let registry = Arc::new(ConnectionRegistry::new(
        &configuration.database_url()?,
        configuration.pool_settings(),
    )?);
    // The permission catalogue lives with the embedding application; the
    // CLI bootstrap provisions role and admin user only.
    let bootstrap = Arc::new(TenantBootstrap::new(
        shared.clone(),
        Arc::new(StaticResourceCatalog::new(Vec::new())),
        Arc::new(LogNotifier),
        configuration.fallback_role(),
    ));
    let manager =
        LifecycleManager::new(registry, shared.clone()).with_bootstrap(bootstrap);

    let tenant = tenant::Entity::find_by_id(args.tenant_id)
        .one(shared.as_ref())
        .await
        .map_err(|e| TesseraError::DatabaseError(e.to_string()))?
        .ok_or(TesseraError::TenantNotExist(args.tenant_id))?;

    let (outcome, bootstrap_result) = manager.ensure_and_migrate_tenant(&tenant, args.force).await?;
    println!(
        "tenant {}: {} applied, {} skipped{}",
        tenant.id,
        outcome.applied.len(),
        outcome.skipped,
        if outcome.created_database {
            ", database created"
        } else {
            ""
        }
    );
    match bootstrap_result {
        Some(result) if result.was_empty => println!(
            "  bootstrapped: role {:?}, admin user {:?}, notified: {}",
            result.role_id, result.user_id, result.notified
        ),
        Some(_) => println!("  bootstrap: already provisioned"),
        None => println!("  bootstrap: failed or not run (see log)"),
    }
    Ok(ExitCode::SUCCESS)
}

fn confirm(args: &FleetMigrateArgs) -> anyhow::Result<bool> {
    let scope = match (&args.entity_type, &args.database) {
        (Some(kind), Some(db)) => format!("{} databases named '{}'", kind, db),
        (Some(kind), None) => format!("all {} databases", kind),
        (None, Some(db)) => format!("databases named '{}'", db),
        (None, None) => "ALL dedicated databases".to_string(),
    };
    print!(
        "This will create and migrate {}{}. Continue? [y/N] ",
        scope,
        if args.force { " (force re-apply)" } else { "" }
    );
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn print_report(report: &FleetReport) {
    if report.dry_run {
        println!("Dry run: nothing was created or changed.\n");
    }
    println!(
        "{:<8} {:<24} {:<24} {}",
        "KIND", "NAME", "DATABASE", "OUTCOME"
    );
    for entry in &report.entries {
        let detail = match &entry.outcome {
            FleetOutcome::Success(outcome) if report.dry_run => {
                format!("{} pending", outcome.applied.len())
            }
            FleetOutcome::Success(outcome) => format!(
                "success ({} applied, {} skipped{})",
                outcome.applied.len(),
                outcome.skipped,
                if outcome.created_database {
                    ", database created"
                } else {
                    ""
                }
            ),
            FleetOutcome::Error(message) => format!("error: {}", message),
            FleetOutcome::Skipped(reason) => format!("skipped: {}", reason),
        };
        println!(
            "{:<8} {:<24} {:<24} {}",
            entry.kind.to_string(),
            entry.name,
            entry.database,
            detail
        );
    }
    println!(
        "\n{} entities: {} succeeded, {} failed, {} skipped",
        report.entries.len(),
        report.success,
        report.errors,
        report.skipped
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_fleet_migrate_flags() {
        let cli = Cli::parse_from([
            "tessera",
            "fleet-migrate",
            "--entity-type",
            "client",
            "--database",
            "client_42",
            "--dry-run",
            "--force",
            "-y",
        ]);
        let Command::FleetMigrate(args) = cli.command else {
            panic!("expected fleet-migrate");
        };
        assert_eq!(args.entity_type, Some(FleetEntityKind::Client));
        assert_eq!(args.database.as_deref(), Some("client_42"));
        assert!(args.dry_run);
        assert!(args.force);
        assert!(args.yes);
    }

    #[test]
    fn test_cli_rejects_unknown_entity_type() {
        let result = Cli::try_parse_from(["tessera", "fleet-migrate", "--entity-type", "shard"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_resolve_and_bootstrap() {
        let cli = Cli::parse_from(["tessera", "resolve", "acme.example.com"]);
        assert!(matches!(cli.command, Command::Resolve(_)));

        let cli = Cli::parse_from(["tessera", "bootstrap-tenant", "--tenant-id", "7", "--force"]);
        let Command::BootstrapTenant(args) = cli.command else {
            panic!("expected bootstrap-tenant");
        };
        assert_eq!(args.tenant_id, 7);
        assert!(args.force);
    }

    #[test]
    fn test_report_rendering_counts() {
        use tessera_persistence::{EntityOutcome, MigrateOutcome};

        let mut report = FleetReport::default();
        report.push(EntityOutcome {
            kind: FleetEntityKind::Tenant,
            entity_id: 1,
            name: "acme".to_string(),
            database: "acme".to_string(),
            outcome: FleetOutcome::Success(MigrateOutcome::default()),
        });
        report.push(EntityOutcome {
            kind: FleetEntityKind::Store,
            entity_id: 10,
            name: "shop".to_string(),
            database: "shop_db".to_string(),
            outcome: FleetOutcome::Error("timed out after 600s".to_string()),
        });
        print_report(&report);
        assert!(report.has_failures());
    }
}
