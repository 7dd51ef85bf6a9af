//! `SeaORM` Entity for the tenants table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// Legacy direct-domain column, superseded by domain_bindings
    pub domain: Option<String>,
    /// Lifecycle status: draft | published | archived
    pub status: String,
    /// Dedicated database name; None means the shared database is used
    #[sea_orm(column_name = "database_name")]
    pub database: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub settings: Option<Json>,
    /// Contact address used for bootstrap notifications
    pub email: Option<String>,
    pub deleted_at: Option<DateTime>,
    pub gmt_create: DateTime,
    pub gmt_modified: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::domain_binding::Entity")]
    DomainBinding,
    #[sea_orm(has_many = "super::client::Entity")]
    Client,
    #[sea_orm(has_many = "super::store::Entity")]
    Store,
}

impl Related<super::domain_binding::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DomainBinding.def()
    }
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
