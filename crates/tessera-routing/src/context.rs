//! Request-scoped resolution state
//!
//! A [`RequestScope`] lives exactly as long as one request and memoizes
//! the domain resolution: repeated lookups within the request see the
//! same answer without touching the database again. Nothing here is
//! shared across requests.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::sync::OnceCell;

use tessera_persistence::Owner;
use tessera_persistence::entity::tenant;

/// What a host name resolved to.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The configured administrative sub-domain
    Administrative,
    /// No published tenant is bound to this domain
    NotATenant,
    Tenant(Box<TenantContext>),
}

/// Everything request handling needs to know about the resolved tenant.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant: tenant::Model,
    pub owner: Option<Owner>,
    /// Effective database for this request; `None` means shared
    pub database: Option<String>,
    /// Open handle to `database`; carried with the context instead of
    /// living in any process-wide slot
    pub handle: Option<Arc<DatabaseConnection>>,
}

impl TenantContext {
    pub fn client_id(&self) -> Option<i64> {
        match &self.owner {
            Some(Owner::Client(c)) => Some(c.id),
            Some(Owner::Store { client, .. }) => client.as_ref().map(|c| c.id),
            None => None,
        }
    }

    pub fn store_id(&self) -> Option<i64> {
        match &self.owner {
            Some(Owner::Store { store, .. }) => Some(store.id),
            _ => None,
        }
    }
}

/// One request's memoization cell.
#[derive(Default)]
pub struct RequestScope {
    pub(crate) cell: OnceCell<Resolution>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The resolution, if one has been computed in this scope.
    pub fn resolution(&self) -> Option<&Resolution> {
        self.cell.get()
    }
}
