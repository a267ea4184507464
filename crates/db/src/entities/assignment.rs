//! Assignment entity: a user assigned to a bubble.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Assignment entity: a user assigned to a bubble.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub bubble_id: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub assignee_id: String,
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
        belongs_to = "super::user::Entity",
        from = "Column::AssigneeId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Assignee,
}

impl Related<super::bubble::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bubble.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
