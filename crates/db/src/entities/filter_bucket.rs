//! Filter bucket entity: a bucket selected by a filter.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Filter bucket entity: a bucket selected by a filter.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "filter_bucket")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub filter_id: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub bucket_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::filter::Entity",
        from = "Column::FilterId",
        to = "super::filter::Column::Id",
        on_delete = "Cascade"
    )]
    Filter,
    #[sea_orm(
        belongs_to = "super::bucket::Entity",
        from = "Column::BucketId",
        to = "super::bucket::Column::Id",
        on_delete = "Cascade"
    )]
    Bucket,
}

impl Related<super::filter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Filter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
