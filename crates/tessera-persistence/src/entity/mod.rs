//! SeaORM entity definitions
//!
//! Shared-database entities: `tenant`, `domain_binding`, `client`, `store`.
//! Per-tenant baseline entities: `role`, `permission`, `user` (these tables
//! live inside each tenant's dedicated database; the same definitions are
//! used against the shared database when reading role templates).

pub mod client;
pub mod domain_binding;
pub mod permission;
pub mod role;
pub mod store;
pub mod tenant;
pub mod user;

pub mod prelude {
    pub use super::client::Entity as Client;
    pub use super::domain_binding::Entity as DomainBinding;
    pub use super::permission::Entity as Permission;
    pub use super::role::Entity as Role;
    pub use super::store::Entity as Store;
    pub use super::tenant::Entity as Tenant;
    pub use super::user::Entity as User;
}
