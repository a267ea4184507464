//! Filter entity: a saved, deduplicated bubble query.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ordering (and, for `popped`, selection) applied to a filter's bubbles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexedBy {
    /// Highest activity score first.
    #[default]
    MostActive,
    /// Most comments first.
    MostDiscussed,
    /// Most boosts first.
    MostBoosted,
    /// Newest bubbles first.
    Newest,
    /// Oldest bubbles first.
    Oldest,
    /// Popped bubbles only, most recently popped first.
    Popped,
}

impl IndexedBy {
    /// All indexes, in display order.
    pub const ALL: [Self; 6] = [
        Self::MostActive,
        Self::MostDiscussed,
        Self::MostBoosted,
        Self::Newest,
        Self::Oldest,
        Self::Popped,
    ];

    /// The stored string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MostActive => "most_active",
            Self::MostDiscussed => "most_discussed",
            Self::MostBoosted => "most_boosted",
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Popped => "popped",
        }
    }

    #[must_use]
    pub const fn is_popped(self) -> bool {
        matches!(self, Self::Popped)
    }
}

impl std::fmt::Display for IndexedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assignment constraint of a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Assignments {
    /// No constraint. Stored as the empty string.
    #[default]
    #[serde(rename = "")]
    Any,
    /// Only bubbles nobody is assigned to.
    #[serde(rename = "unassigned")]
    Unassigned,
}

impl Assignments {
    #[must_use]
    pub const fn is_unassigned(self) -> bool {
        matches!(self, Self::Unassigned)
    }
}

/// Kind of record a filter can reference through its join tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Bucket,
    Tag,
    Assignee,
}

impl ResourceKind {
    pub const ALL: [Self; 3] = [Self::Bucket, Self::Tag, Self::Assignee];

    /// Key of the matching id list inside `params`.
    #[must_use]
    pub const fn ids_key(self) -> &'static str {
        match self {
            Self::Bucket => "bucket_ids",
            Self::Tag => "tag_ids",
            Self::Assignee => "assignee_ids",
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bucket" => Ok(Self::Bucket),
            "tag" => Ok(Self::Tag),
            "assignee" | "user" => Ok(Self::Assignee),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// Filter entity.
///
/// `params` holds the normalized specification with defaults elided. Its id
/// lists duplicate the `filter_bucket`/`filter_tag`/`filter_assignee` rows so
/// the unique index on `(creator_id, params)` deduplicates whole filters.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "filter")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// User who owns the filter.
    #[sea_orm(indexed)]
    pub creator_id: String,

    /// Normalized specification (JSON object, defaults elided, id lists sorted).
    #[sea_orm(column_type = "JsonBinary")]
    pub params: Json,

    pub created_at: DateTimeWithTimeZone,

    /// Touched whenever the filter or its references change.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Creator,
    #[sea_orm(has_many = "super::filter_bucket::Entity")]
    FilterBuckets,
    #[sea_orm(has_many = "super::filter_tag::Entity")]
    FilterTags,
    #[sea_orm(has_many = "super::filter_assignee::Entity")]
    FilterAssignees,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl Related<super::filter_bucket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FilterBuckets.def()
    }
}

impl Related<super::filter_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FilterTags.def()
    }
}

impl Related<super::filter_assignee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FilterAssignees.def()
    }
}

impl Related<super::bucket::Entity> for Entity {
    fn to() -> RelationDef {
        super::filter_bucket::Relation::Bucket.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::filter_bucket::Relation::Filter.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
