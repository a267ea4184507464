//! Storage seams for filters, and their database implementations.

use async_trait::async_trait;
use bubbles_common::AppResult;
use bubbles_db::entities::filter::{self as filter_entity, ResourceKind};
use bubbles_db::repositories::{CreateFilterInput, FilterRepository, ResourceRepository};

use super::entity::{BucketVersion, Filter, NewFilter};
use super::params::FilterParams;

/// Persistence of filters.
///
/// Implementations must reject a second filter with the same creator and
/// params with [`AppError::UniquenessRace`](bubbles_common::AppError::UniquenessRace),
/// at insert time as well as when params change.
#[async_trait]
pub trait FilterStore: Send + Sync {
    /// Insert a filter and its relations atomically.
    async fn insert(&self, filter: NewFilter) -> AppResult<Filter>;

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Filter>>;

    /// Look up a filter by exactly the columns of the uniqueness constraint.
    async fn find_by_params(
        &self,
        creator_id: &str,
        params: &FilterParams,
    ) -> AppResult<Option<Filter>>;

    /// IDs of filters whose params list the given record, including after
    /// the record was deleted and its links cascaded away.
    async fn find_referencing(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> AppResult<Vec<String>>;

    /// Unlink a record, store new params and touch the filter, atomically.
    ///
    /// `Ok(None)` when the filter is gone.
    async fn remove_reference(
        &self,
        filter_id: &str,
        kind: ResourceKind,
        resource_id: &str,
        params: &FilterParams,
    ) -> AppResult<Option<Filter>>;

    async fn delete(&self, id: &str) -> AppResult<bool>;

    /// Versions of the given buckets. Missing buckets are left out.
    async fn bucket_versions(&self, bucket_ids: &[String]) -> AppResult<Vec<BucketVersion>>;
}

/// Account scoping of records a filter may reference.
#[async_trait]
pub trait ResourceScope: Send + Sync {
    /// Those of `ids` the creator's account does not own.
    async fn out_of_scope(
        &self,
        creator_id: &str,
        kind: ResourceKind,
        ids: &[String],
    ) -> AppResult<Vec<String>>;
}

async fn hydrate(repo: &FilterRepository, model: filter_entity::Model) -> AppResult<Filter> {
    let relations = repo.relation_ids(&model.id).await?;
    Filter::from_model(model, relations)
}

#[async_trait]
impl FilterStore for FilterRepository {
    async fn insert(&self, filter: NewFilter) -> AppResult<Filter> {
        let input = CreateFilterInput {
            id: filter.id,
            creator_id: filter.creator_id,
            params: filter.params.to_json()?,
            bucket_ids: filter.relations.bucket_ids.clone(),
            tag_ids: filter.relations.tag_ids.clone(),
            assignee_ids: filter.relations.assignee_ids.clone(),
        };
        let model = self.create(input).await?;
        Filter::from_model(model, filter.relations)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Filter>> {
        match Self::find_by_id(self, id).await? {
            Some(model) => hydrate(self, model).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_by_params(
        &self,
        creator_id: &str,
        params: &FilterParams,
    ) -> AppResult<Option<Filter>> {
        let params = params.to_json()?;
        match self.find_by_creator_and_params(creator_id, &params).await? {
            Some(model) => hydrate(self, model).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_referencing(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> AppResult<Vec<String>> {
        self.find_ids_referencing(kind, resource_id).await
    }

    async fn remove_reference(
        &self,
        filter_id: &str,
        kind: ResourceKind,
        resource_id: &str,
        params: &FilterParams,
    ) -> AppResult<Option<Filter>> {
        let params = params.to_json()?;
        match Self::remove_reference(self, filter_id, kind, resource_id, params).await? {
            Some(model) => hydrate(self, model).await.map(Some),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        Self::delete(self, id).await
    }

    async fn bucket_versions(&self, bucket_ids: &[String]) -> AppResult<Vec<BucketVersion>> {
        let buckets = self.find_buckets(bucket_ids).await?;
        Ok(buckets
            .into_iter()
            .map(|bucket| BucketVersion {
                id: bucket.id,
                updated_at: bucket.updated_at,
            })
            .collect())
    }
}

#[async_trait]
impl ResourceScope for ResourceRepository {
    async fn out_of_scope(
        &self,
        creator_id: &str,
        kind: ResourceKind,
        ids: &[String],
    ) -> AppResult<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let Some(account_id) = self.account_of(creator_id).await? else {
            return Ok(ids.to_vec());
        };
        let owned = self.ids_in_account(&account_id, kind, ids).await?;

        Ok(ids
            .iter()
            .filter(|id| !owned.contains(id.as_str()))
            .cloned()
            .collect())
    }
}
