//! Bubble queries.
//!
//! [`BubbleSelect`] wraps a `sea_orm::Select` so scopes can be chained without
//! touching the database; rows are only loaded by [`BubbleSelect::fetch`].

use std::sync::Arc;

use bubbles_common::{AppError, AppResult};
use sea_orm::sea_query::Query;
use sea_orm::{
    ColumnTrait, DatabaseBackend, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, QueryTrait, Select,
};

use crate::entities::filter::IndexedBy;
use crate::entities::{assignment, bubble, bucket_access, tagging};

/// Repository for bubble operations.
#[derive(Clone)]
pub struct BubbleRepository {
    db: Arc<DatabaseConnection>,
}

impl BubbleRepository {
    /// Create a new bubble repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Bubbles in buckets the user has access to.
    #[must_use]
    pub fn accessible_bubbles(&self, user_id: &str) -> BubbleSelect {
        let accessible_buckets = Query::select()
            .column(bucket_access::Column::BucketId)
            .from(bucket_access::Entity)
            .and_where(bucket_access::Column::UserId.eq(user_id))
            .to_owned();

        BubbleSelect {
            db: self.db.clone(),
            select: bubble::Entity::find()
                .filter(bubble::Column::BucketId.in_subquery(accessible_buckets)),
        }
    }
}

/// A lazily evaluated, further-filterable bubble query.
#[derive(Clone, Debug)]
pub struct BubbleSelect {
    db: Arc<DatabaseConnection>,
    select: Select<bubble::Entity>,
}

impl BubbleSelect {
    /// Order (and for `popped`, restrict) by the given index.
    #[must_use]
    pub fn indexed_by(self, index: IndexedBy) -> Self {
        let select = match index {
            IndexedBy::MostActive => self.select.order_by_desc(bubble::Column::ActivityScore),
            IndexedBy::MostDiscussed => self.select.order_by_desc(bubble::Column::CommentsCount),
            IndexedBy::MostBoosted => self.select.order_by_desc(bubble::Column::BoostsCount),
            IndexedBy::Newest => self.select.order_by_desc(bubble::Column::CreatedAt),
            IndexedBy::Oldest => self.select.order_by_asc(bubble::Column::CreatedAt),
            IndexedBy::Popped => self
                .select
                .filter(bubble::Column::PoppedAt.is_not_null())
                .order_by_desc(bubble::Column::PoppedAt),
        };
        Self { select, ..self }
    }

    /// Bubbles that have not been popped.
    #[must_use]
    pub fn active(self) -> Self {
        self.filter(bubble::Column::PoppedAt.is_null())
    }

    /// Bubbles without any assignee.
    #[must_use]
    pub fn unassigned(self) -> Self {
        let assigned = Query::select()
            .column(assignment::Column::BubbleId)
            .from(assignment::Entity)
            .to_owned();
        self.filter(bubble::Column::Id.not_in_subquery(assigned))
    }

    /// Bubbles in any of the given buckets.
    #[must_use]
    pub fn in_bucket(self, bucket_ids: &[String]) -> Self {
        self.filter(bubble::Column::BucketId.is_in(bucket_ids.iter().cloned()))
    }

    /// Bubbles carrying any of the given tags.
    #[must_use]
    pub fn tagged_with(self, tag_ids: &[String]) -> Self {
        let tagged = Query::select()
            .column(tagging::Column::BubbleId)
            .from(tagging::Entity)
            .and_where(tagging::Column::TagId.is_in(tag_ids.iter().cloned()))
            .to_owned();
        self.filter(bubble::Column::Id.in_subquery(tagged))
    }

    /// Bubbles assigned to any of the given users.
    #[must_use]
    pub fn assigned_to(self, assignee_ids: &[String]) -> Self {
        let assigned = Query::select()
            .column(assignment::Column::BubbleId)
            .from(assignment::Entity)
            .and_where(assignment::Column::AssigneeId.is_in(assignee_ids.iter().cloned()))
            .to_owned();
        self.filter(bubble::Column::Id.in_subquery(assigned))
    }

    /// Render the composed query, for logging and tests.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.select
            .clone()
            .build(DatabaseBackend::Postgres)
            .to_string()
    }

    /// Run the query.
    pub async fn fetch(self, limit: u64) -> AppResult<Vec<bubble::Model>> {
        tracing::debug!(limit, "Fetching filtered bubbles");
        self.select
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    fn filter(self, condition: sea_orm::sea_query::SimpleExpr) -> Self {
        Self {
            select: self.select.filter(condition),
            ..self
        }
    }
}
