//! `SeaORM` Entity for the permissions table (per-tenant baseline)
//!
//! One row per discoverable resource action, keyed by a deterministic
//! hash of the route name so regeneration upserts instead of duplicating.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "permissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// Deterministic hash of `route_name`, stable across regenerations
    #[sea_orm(unique, column_name = "permission_key")]
    pub key: String,
    pub route_name: String,
    pub gmt_create: DateTime,
    pub gmt_modified: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
