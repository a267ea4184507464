//! Filter assignee entity: an assignee selected by a filter.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Filter assignee entity: an assignee selected by a filter.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "filter_assignee")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub filter_id: String,

    #[sea_orm(primary_key, auto_increment = false)]
    pub assignee_id: String,
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
        belongs_to = "super::user::Entity",
        from = "Column::AssigneeId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Assignee,
}

impl Related<super::filter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Filter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
