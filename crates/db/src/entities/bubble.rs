//! Bubble entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A bubble: a ticket living in a bucket.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bubble")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub bucket_id: String,

    pub creator_id: String,

    pub title: String,

    /// Rolling activity score, used by the `most_active` index.
    #[sea_orm(default_value = 0)]
    pub activity_score: i64,

    #[sea_orm(default_value = 0)]
    pub comments_count: i32,

    #[sea_orm(default_value = 0)]
    pub boosts_count: i32,

    /// Set when the bubble is popped (closed). Active bubbles have no pop time.
    #[sea_orm(nullable)]
    pub popped_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bucket::Entity",
        from = "Column::BucketId",
        to = "super::bucket::Column::Id",
        on_delete = "Cascade"
    )]
    Bucket,
    #[sea_orm(has_many = "super::tagging::Entity")]
    Taggings,
    #[sea_orm(has_many = "super::assignment::Entity")]
    Assignments,
}

impl Related<super::bucket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bucket.def()
    }
}

impl Related<super::tagging::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Taggings.def()
    }
}

impl Related<super::assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
