//! Tessera Persistence - Database entities and domain model types
//!
//! This crate provides:
//! - SeaORM entity definitions for the shared database (tenants,
//!   domain bindings, clients, stores)
//! - SeaORM entity definitions for the per-tenant baseline tables
//!   (roles, permissions, users)
//! - Domain model types shared by the routing and lifecycle layers

pub mod entity;
pub mod model;

// Re-export sea-orm for convenience
pub use sea_orm;

// Re-export model types
pub use model::{
    BootstrapResult, EntityOutcome, FleetEntityKind, FleetOutcome, FleetReport, MigrateOutcome,
    Owner, OwnerKind, TenantStatus,
};
