//! Domain model types shared by the routing and lifecycle layers
//!
//! These types are decoupled from any specific storage backend and carry
//! no query logic of their own.

use serde::{Deserialize, Serialize};

use crate::entity::{client, store};

/// Tenant lifecycle status; only `published` tenants are resolvable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantStatus {
    Draft,
    Published,
    Archived,
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantStatus::Draft => write!(f, "draft"),
            TenantStatus::Published => write!(f, "published"),
            TenantStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TenantStatus::Draft),
            "published" => Ok(TenantStatus::Published),
            "archived" => Ok(TenantStatus::Archived),
            other => Err(format!("unknown tenant status: {}", other)),
        }
    }
}

/// Supported polymorphic owner kinds for domain bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerKind {
    Client,
    Store,
}

impl OwnerKind {
    /// Parse the `owner_type` tag stored on a domain binding.
    ///
    /// Unrecognized tags yield `None`; the binding is then treated as if
    /// no owner were present.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "client" => Some(OwnerKind::Client),
            "store" => Some(OwnerKind::Store),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            OwnerKind::Client => "client",
            OwnerKind::Store => "store",
        }
    }
}

/// Resolved owner of a domain binding.
///
/// A tagged union over the finite set of supported owner kinds; a store
/// carries its parent client (when one exists) so the routing decision
/// can consult the parent's database without further lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Client(client::Model),
    Store {
        store: store::Model,
        client: Option<client::Model>,
    },
}

impl Owner {
    pub fn kind(&self) -> OwnerKind {
        match self {
            Owner::Client(_) => OwnerKind::Client,
            Owner::Store { .. } => OwnerKind::Store,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Owner::Client(c) => c.id,
            Owner::Store { store, .. } => store.id,
        }
    }

    /// Database dictated by this owner, honoring the store-over-parent
    /// priority. `None` defers to the tenant's own routing.
    pub fn database_name(&self) -> Option<&str> {
        match self {
            Owner::Client(c) => c.database.as_deref().filter(|d| !d.is_empty()),
            Owner::Store { store, client } => store
                .database
                .as_deref()
                .filter(|d| !d.is_empty())
                .or_else(|| {
                    client
                        .as_ref()
                        .and_then(|c| c.database.as_deref())
                        .filter(|d| !d.is_empty())
                }),
        }
    }
}

/// Outcome of a single `ensure_and_migrate` call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrateOutcome {
    /// Unit names newly applied in this call, in application order
    pub applied: Vec<String>,
    /// Count of units skipped because the ledger already recorded them
    pub skipped: usize,
    /// Whether the database had to be created first
    pub created_database: bool,
}

/// Ephemeral result of a tenant bootstrap run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapResult {
    /// Whether the baseline tables were empty before this run
    pub was_empty: bool,
    pub role_id: Option<i64>,
    pub user_id: Option<i64>,
    pub permissions_written: usize,
    pub notified: bool,
}

/// Kinds of entities the fleet orchestrator walks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FleetEntityKind {
    Tenant,
    Client,
    Store,
}

impl std::fmt::Display for FleetEntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FleetEntityKind::Tenant => write!(f, "tenant"),
            FleetEntityKind::Client => write!(f, "client"),
            FleetEntityKind::Store => write!(f, "store"),
        }
    }
}

impl std::str::FromStr for FleetEntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tenant" => Ok(FleetEntityKind::Tenant),
            "client" => Ok(FleetEntityKind::Client),
            "store" => Ok(FleetEntityKind::Store),
            other => Err(format!("unknown entity kind: {}", other)),
        }
    }
}

/// Per-entity classification after a fleet run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FleetOutcome {
    Success(MigrateOutcome),
    Error(String),
    Skipped(String),
}

impl FleetOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FleetOutcome::Success(_) => "success",
            FleetOutcome::Error(_) => "error",
            FleetOutcome::Skipped(_) => "skipped",
        }
    }
}

/// One row of the fleet report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityOutcome {
    pub kind: FleetEntityKind,
    pub entity_id: i64,
    pub name: String,
    pub database: String,
    pub outcome: FleetOutcome,
}

/// Aggregated result of a fleet migration run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetReport {
    pub entries: Vec<EntityOutcome>,
    pub success: usize,
    pub errors: usize,
    pub skipped: usize,
    pub dry_run: bool,
}

impl FleetReport {
    pub fn push(&mut self, entry: EntityOutcome) {
        match entry.outcome {
            FleetOutcome::Success(_) => self.success += 1,
            FleetOutcome::Error(_) => self.errors += 1,
            FleetOutcome::Skipped(_) => self.skipped += 1,
        }
        self.entries.push(entry);
    }

    /// True iff at least one entity ended in error; `skipped` never
    /// counts as failure.
    pub fn has_failures(&self) -> bool {
        self.errors > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: i64, database: Option<&str>) -> client::Model {
        client::Model {
            id,
            tenant_id: 1,
            name: format!("client-{}", id),
            database: database.map(str::to_string),
            deleted_at: None,
            gmt_create: Default::default(),
            gmt_modified: Default::default(),
        }
    }

    fn store(id: i64, client_id: Option<i64>, database: Option<&str>) -> store::Model {
        store::Model {
            id,
            tenant_id: 1,
            client_id,
            name: format!("store-{}", id),
            database: database.map(str::to_string),
            deleted_at: None,
            gmt_create: Default::default(),
            gmt_modified: Default::default(),
        }
    }

    #[test]
    fn test_tenant_status_round_trip() {
        for s in ["draft", "published", "archived"] {
            let parsed: TenantStatus = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
        assert!("deleted".parse::<TenantStatus>().is_err());
    }

    #[test]
    fn test_owner_kind_from_tag() {
        assert_eq!(OwnerKind::from_tag("client"), Some(OwnerKind::Client));
        assert_eq!(OwnerKind::from_tag("store"), Some(OwnerKind::Store));
        assert_eq!(OwnerKind::from_tag("warehouse"), None);
        assert_eq!(OwnerKind::from_tag(""), None);
    }

    #[test]
    fn test_store_database_wins_over_parent() {
        let owner = Owner::Store {
            store: store(1, Some(10), Some("store_db")),
            client: Some(client(10, Some("client_db"))),
        };
        assert_eq!(owner.database_name(), Some("store_db"));
    }

    #[test]
    fn test_store_falls_back_to_parent_client() {
        let owner = Owner::Store {
            store: store(1, Some(10), None),
            client: Some(client(10, Some("client_42"))),
        };
        assert_eq!(owner.database_name(), Some("client_42"));
    }

    #[test]
    fn test_empty_database_treated_as_absent() {
        let owner = Owner::Client(client(1, Some("")));
        assert_eq!(owner.database_name(), None);
    }

    #[test]
    fn test_fleet_report_counts() {
        let mut report = FleetReport::default();
        report.push(EntityOutcome {
            kind: FleetEntityKind::Tenant,
            entity_id: 1,
            name: "t1".into(),
            database: "t_a".into(),
            outcome: FleetOutcome::Success(MigrateOutcome::default()),
        });
        report.push(EntityOutcome {
            kind: FleetEntityKind::Tenant,
            entity_id: 2,
            name: "t2".into(),
            database: "t_b".into(),
            outcome: FleetOutcome::Error("unreachable".into()),
        });
        report.push(EntityOutcome {
            kind: FleetEntityKind::Store,
            entity_id: 3,
            name: "s1".into(),
            database: "s_a".into(),
            outcome: FleetOutcome::Skipped("no migration sets".into()),
        });

        assert_eq!(report.success, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.has_failures());
    }

    #[test]
    fn test_skipped_is_not_failure() {
        let mut report = FleetReport::default();
        report.push(EntityOutcome {
            kind: FleetEntityKind::Client,
            entity_id: 1,
            name: "c1".into(),
            database: "c_a".into(),
            outcome: FleetOutcome::Skipped("no migration sets".into()),
        });
        assert!(!report.has_failures());
    }
}
