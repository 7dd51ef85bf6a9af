//! `SeaORM` Entity for the domain_bindings table
//!
//! Maps a domain string to exactly one tenant and optionally to a
//! polymorphic owner (client or store). The domain string is unique
//! across all bindings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "domain_bindings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub domain: String,
    pub tenant_id: i64,
    /// Owner tag: "client" | "store"; unrecognized tags are treated as
    /// if no owner were present
    pub owner_type: Option<String>,
    pub owner_id: Option<i64>,
    pub is_primary: bool,
    pub gmt_create: DateTime,
    pub gmt_modified: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
