//! Repository for filter operations.

use std::sync::Arc;

use bubbles_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Select, Set, SqlErr, TransactionTrait,
};

use crate::entities::filter::{ActiveModel, Column, Entity, Model, ResourceKind};
use crate::entities::{bucket, filter_assignee, filter_bucket, filter_tag};

/// Input for inserting a filter together with its join rows.
#[derive(Debug, Clone)]
pub struct CreateFilterInput {
    /// Filter ID.
    pub id: String,
    /// Owning user ID.
    pub creator_id: String,
    /// Normalized params, already carrying the denormalized id lists.
    pub params: serde_json::Value,
    /// Buckets to link.
    pub bucket_ids: Vec<String>,
    /// Tags to link.
    pub tag_ids: Vec<String>,
    /// Assignees to link.
    pub assignee_ids: Vec<String>,
}

/// Live join-table ids of a filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRelationIds {
    pub bucket_ids: Vec<String>,
    pub tag_ids: Vec<String>,
    pub assignee_ids: Vec<String>,
}

/// Repository for filter operations.
#[derive(Clone)]
pub struct FilterRepository {
    db: Arc<DatabaseConnection>,
}

/// Map a write error, singling out collisions on the unique `(creator_id, params)` index.
fn map_write_err(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::UniquenessRace(detail),
        _ => AppError::Database(err.to_string()),
    }
}

fn map_db_err(err: DbErr) -> AppError {
    AppError::Database(err.to_string())
}

impl FilterRepository {
    /// Create a new filter repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert a filter and its join rows in one transaction.
    ///
    /// Returns [`AppError::UniquenessRace`] when an equal filter already exists
    /// for the creator.
    pub async fn create(&self, input: CreateFilterInput) -> AppResult<Model> {
        let now = Utc::now().fixed_offset();
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let model = ActiveModel {
            id: Set(input.id.clone()),
            creator_id: Set(input.creator_id),
            params: Set(input.params),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(map_write_err)?;

        insert_links(&txn, &input.id, ResourceKind::Bucket, &input.bucket_ids).await?;
        insert_links(&txn, &input.id, ResourceKind::Tag, &input.tag_ids).await?;
        insert_links(&txn, &input.id, ResourceKind::Assignee, &input.assignee_ids).await?;

        txn.commit().await.map_err(map_write_err)?;

        tracing::debug!(filter_id = %model.id, creator_id = %model.creator_id, "Inserted filter");
        Ok(model)
    }

    /// Find a filter by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Model>> {
        Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Find a filter by the exact columns of the unique index.
    pub async fn find_by_creator_and_params(
        &self,
        creator_id: &str,
        params: &serde_json::Value,
    ) -> AppResult<Option<Model>> {
        Entity::find()
            .filter(Column::CreatorId.eq(creator_id))
            .filter(Column::Params.eq(params.clone()))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Load the live join-table ids of a filter, each list sorted.
    pub async fn relation_ids(&self, filter_id: &str) -> AppResult<FilterRelationIds> {
        let db = self.db.as_ref();

        let bucket_ids = filter_bucket::Entity::find()
            .filter(filter_bucket::Column::FilterId.eq(filter_id))
            .order_by_asc(filter_bucket::Column::BucketId)
            .all(db)
            .await
            .map_err(map_db_err)?
            .into_iter()
            .map(|row| row.bucket_id)
            .collect();

        let tag_ids = filter_tag::Entity::find()
            .filter(filter_tag::Column::FilterId.eq(filter_id))
            .order_by_asc(filter_tag::Column::TagId)
            .all(db)
            .await
            .map_err(map_db_err)?
            .into_iter()
            .map(|row| row.tag_id)
            .collect();

        let assignee_ids = filter_assignee::Entity::find()
            .filter(filter_assignee::Column::FilterId.eq(filter_id))
            .order_by_asc(filter_assignee::Column::AssigneeId)
            .all(db)
            .await
            .map_err(map_db_err)?
            .into_iter()
            .map(|row| row.assignee_id)
            .collect();

        Ok(FilterRelationIds {
            bucket_ids,
            tag_ids,
            assignee_ids,
        })
    }

    /// IDs of filters whose params snapshot lists the resource.
    ///
    /// The snapshot, not the join tables, is searched: by the time a record is
    /// purged its join rows are usually gone through `ON DELETE CASCADE`.
    pub async fn find_ids_referencing(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> AppResult<Vec<String>> {
        let ids = referencing(kind, resource_id)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?
            .into_iter()
            .map(|model| model.id)
            .collect();
        Ok(ids)
    }

    /// Unlink a resource, store the shrunken params and touch `updated_at`.
    ///
    /// Returns `Ok(None)` when the filter no longer exists.
    pub async fn remove_reference(
        &self,
        filter_id: &str,
        kind: ResourceKind,
        resource_id: &str,
        params: serde_json::Value,
    ) -> AppResult<Option<Model>> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let Some(existing) = Entity::find_by_id(filter_id)
            .one(&txn)
            .await
            .map_err(map_db_err)?
        else {
            return Ok(None);
        };

        delete_link(&txn, filter_id, kind, resource_id).await?;

        let mut model: ActiveModel = existing.into();
        model.params = Set(params);
        model.updated_at = Set(Utc::now().fixed_offset());
        let updated = model.update(&txn).await.map_err(map_write_err)?;

        txn.commit().await.map_err(map_write_err)?;
        Ok(Some(updated))
    }

    /// Delete a filter. Join rows go with it through `ON DELETE CASCADE`.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected > 0)
    }

    /// Load the buckets with the given IDs (for cache versioning).
    pub async fn find_buckets(&self, bucket_ids: &[String]) -> AppResult<Vec<bucket::Model>> {
        if bucket_ids.is_empty() {
            return Ok(Vec::new());
        }

        bucket::Entity::find()
            .filter(bucket::Column::Id.is_in(bucket_ids.iter().cloned()))
            .order_by_asc(bucket::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }
}

/// Filters whose params list `resource_id` under the key of `kind` (jsonb containment).
fn referencing(kind: ResourceKind, resource_id: &str) -> Select<Entity> {
    let mut needle = serde_json::Map::new();
    needle.insert(kind.ids_key().to_string(), serde_json::json!([resource_id]));

    Entity::find()
        .filter(Expr::cust_with_values(
            r#""filter"."params" @> ?"#,
            [serde_json::Value::Object(needle)],
        ))
        .order_by_asc(Column::Id)
}

async fn insert_links(
    txn: &DatabaseTransaction,
    filter_id: &str,
    kind: ResourceKind,
    resource_ids: &[String],
) -> AppResult<()> {
    if resource_ids.is_empty() {
        return Ok(());
    }

    match kind {
        ResourceKind::Bucket => {
            filter_bucket::Entity::insert_many(resource_ids.iter().map(|id| {
                filter_bucket::ActiveModel {
                    filter_id: Set(filter_id.to_string()),
                    bucket_id: Set(id.clone()),
                }
            }))
            .exec(txn)
            .await
            .map_err(map_write_err)?;
        }
        ResourceKind::Tag => {
            filter_tag::Entity::insert_many(resource_ids.iter().map(|id| filter_tag::ActiveModel {
                filter_id: Set(filter_id.to_string()),
                tag_id: Set(id.clone()),
            }))
            .exec(txn)
            .await
            .map_err(map_write_err)?;
        }
        ResourceKind::Assignee => {
            filter_assignee::Entity::insert_many(resource_ids.iter().map(|id| {
                filter_assignee::ActiveModel {
                    filter_id: Set(filter_id.to_string()),
                    assignee_id: Set(id.clone()),
                }
            }))
            .exec(txn)
            .await
            .map_err(map_write_err)?;
        }
    }

    Ok(())
}

async fn delete_link(
    txn: &DatabaseTransaction,
    filter_id: &str,
    kind: ResourceKind,
    resource_id: &str,
) -> AppResult<()> {
    let result = match kind {
        ResourceKind::Bucket => {
            filter_bucket::Entity::delete_many()
                .filter(filter_bucket::Column::FilterId.eq(filter_id))
                .filter(filter_bucket::Column::BucketId.eq(resource_id))
                .exec(txn)
                .await
        }
        ResourceKind::Tag => {
            filter_tag::Entity::delete_many()
                .filter(filter_tag::Column::FilterId.eq(filter_id))
                .filter(filter_tag::Column::TagId.eq(resource_id))
                .exec(txn)
                .await
        }
        ResourceKind::Assignee => {
            filter_assignee::Entity::delete_many()
                .filter(filter_assignee::Column::FilterId.eq(filter_id))
                .filter(filter_assignee::Column::AssigneeId.eq(resource_id))
                .exec(txn)
                .await
        }
    };
    result.map_err(map_db_err)?;

    Ok(())
}
