//! Tessera Routing - domain resolution and database routing
//!
//! Maps an incoming request's host to a tenant context: which tenant (if
//! any) the domain belongs to, which owner entity the binding points at,
//! and which physical database the request should run against. The
//! resolution is computed at most once per request scope.

pub mod context;
pub mod resolver;
pub mod route;

pub use context::{RequestScope, Resolution, TenantContext};
pub use resolver::{DomainResolver, ResolverSettings};
pub use route::route_database;
