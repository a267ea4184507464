//! Bucket entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A bucket groups bubbles.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bucket")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub account_id: String,

    pub name: String,

    pub created_at: DateTimeWithTimeZone,

    /// Bumped whenever the bucket changes; part of filter cache keys.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bubble::Entity")]
    Bubbles,
    #[sea_orm(has_many = "super::bucket_access::Entity")]
    Accesses,
}

impl Related<super::bubble::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bubbles.def()
    }
}

impl Related<super::bucket_access::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accesses.def()
    }
}

impl Related<super::filter::Entity> for Entity {
    fn to() -> RelationDef {
        super::filter_bucket::Relation::Filter.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::filter_bucket::Relation::Bucket.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
