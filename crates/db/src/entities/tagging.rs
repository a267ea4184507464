//! Tagging entity: a tag applied to a bubble.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tagging entity: a tag applied to a bubble.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tagging")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub bubble_id: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub tag_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bubble::Entity",
        from = "Column::BubbleId",
        to = "super::bubble::Column::Id",
        on_delete = "Cascade"
    )]
    Bubble,
    #[sea_orm(
        belongs_to = "super::tag::Entity",
        from = "Column::TagId",
        to = "super::tag::Column::Id",
        on_delete = "Cascade"
    )]
    Tag,
}

impl Related<super::bubble::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bubble.def()
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
