//! Database routing decision
//!
//! A pure, total function over already-resolved models. Empty-string
//! database names count as absent.

use tessera_persistence::Owner;
use tessera_persistence::entity::tenant;

/// Database a request bound to `tenant` (and optionally `owner`) should
/// run against. `None` means the shared database.
///
/// Priority: store's own database, then the store's parent client's,
/// then the client's, then the tenant's, then shared.
pub fn route_database(tenant: &tenant::Model, owner: Option<&Owner>) -> Option<String> {
    owner
        .and_then(|o| o.database_name())
        .or_else(|| tenant.database.as_deref().filter(|d| !d.is_empty()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_persistence::entity::{client, store};

    fn tenant(database: Option<&str>) -> tenant::Model {
        tenant::Model {
            id: 1,
            name: "acme".to_string(),
            domain: None,
            status: "published".to_string(),
            database: database.map(str::to_string),
            settings: None,
            email: None,
            deleted_at: None,
            gmt_create: Default::default(),
            gmt_modified: Default::default(),
        }
    }

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

    fn store(database: Option<&str>, client_id: Option<i64>) -> store::Model {
        store::Model {
            id: 10,
            tenant_id: 1,
            client_id,
            name: "shop".to_string(),
            database: database.map(str::to_string),
            deleted_at: None,
            gmt_create: Default::default(),
            gmt_modified: Default::default(),
        }
    }

    #[test]
    fn test_store_database_wins() {
        let owner = Owner::Store {
            store: store(Some("store_db"), Some(5)),
            client: Some(client(5, Some("client_db"))),
        };
        let t = tenant(Some("tenant_db"));
        assert_eq!(route_database(&t, Some(&owner)).as_deref(), Some("store_db"));
    }

    #[test]
    fn test_store_falls_back_to_parent_client() {
        let owner = Owner::Store {
            store: store(None, Some(5)),
            client: Some(client(5, Some("client_42"))),
        };
        let t = tenant(Some("tenant_db"));
        assert_eq!(route_database(&t, Some(&owner)).as_deref(), Some("client_42"));
    }

    #[test]
    fn test_store_without_databases_uses_tenant() {
        let owner = Owner::Store {
            store: store(None, Some(5)),
            client: Some(client(5, None)),
        };
        let t = tenant(Some("tenant_db"));
        assert_eq!(route_database(&t, Some(&owner)).as_deref(), Some("tenant_db"));
    }

    #[test]
    fn test_client_database_beats_tenant() {
        let owner = Owner::Client(client(5, Some("client_db")));
        let t = tenant(Some("tenant_db"));
        assert_eq!(route_database(&t, Some(&owner)).as_deref(), Some("client_db"));
    }

    #[test]
    fn test_no_owner_uses_tenant_database() {
        let t = tenant(Some("tenant_db"));
        assert_eq!(route_database(&t, None).as_deref(), Some("tenant_db"));
    }

    #[test]
    fn test_nothing_configured_means_shared() {
        let t = tenant(None);
        assert_eq!(route_database(&t, None), None);
        let owner = Owner::Client(client(5, None));
        assert_eq!(route_database(&t, Some(&owner)), None);
    }

    #[test]
    fn test_empty_string_counts_as_absent() {
        let t = tenant(Some(""));
        assert_eq!(route_database(&t, None), None);
        let owner = Owner::Store {
            store: store(Some(""), Some(5)),
            client: Some(client(5, Some(""))),
        };
        assert_eq!(route_database(&t, Some(&owner)), None);
    }
}
