//! Filter service.

use std::sync::Arc;

use bubbles_common::{AppError, AppResult, IdGenerator};
use bubbles_db::entities::filter::ResourceKind;
use bubbles_db::repositories::{FilterRepository, ResourceRepository};
use sea_orm::DatabaseConnection;

use crate::filter::{
    Filter, FilterParams, FilterStore, NewFilter, RawFilterParams, ReferenceRemoval, ResourceScope,
};

/// Filter service for business logic.
#[derive(Clone)]
pub struct FilterService {
    store: Arc<dyn FilterStore>,
    scope: Arc<dyn ResourceScope>,
    id_gen: IdGenerator,
}

impl FilterService {
    /// Create a new filter service.
    #[must_use]
    pub fn new(store: Arc<dyn FilterStore>, scope: Arc<dyn ResourceScope>) -> Self {
        Self {
            store,
            scope,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a filter service backed by the database.
    #[must_use]
    pub fn from_db(db: Arc<DatabaseConnection>) -> Self {
        Self::new(
            Arc::new(FilterRepository::new(db.clone())),
            Arc::new(ResourceRepository::new(db)),
        )
    }

    /// Find the creator's filter for these params, creating it if needed.
    ///
    /// Equal params always resolve to the same filter, including when two
    /// callers create it at the same time.
    pub async fn resolve(&self, raw: RawFilterParams, creator_id: &str) -> AppResult<Filter> {
        let params = raw.normalize()?;
        self.check_scope(creator_id, &params).await?;

        let new = NewFilter::new(self.id_gen.generate(), creator_id.to_string(), params);
        let params = new.params.clone();

        match self.store.insert(new).await {
            Ok(filter) => {
                tracing::info!(filter_id = %filter.id(), creator_id = %creator_id, "Created filter");
                Ok(filter)
            }
            Err(e) if e.is_uniqueness_race() => {
                tracing::debug!(creator_id = %creator_id, "Filter already exists, loading it");
                self.store
                    .find_by_params(creator_id, &params)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "Filter for creator {creator_id} vanished after a uniqueness race"
                        ))
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// [`resolve`](Self::resolve) params given as a JSON object.
    pub async fn resolve_json(
        &self,
        raw: serde_json::Value,
        creator_id: &str,
    ) -> AppResult<Filter> {
        self.resolve(RawFilterParams::from_json(raw)?, creator_id)
            .await
    }

    /// Get a filter by ID.
    pub async fn find(&self, id: &str) -> AppResult<Filter> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Filter not found: {id}")))
    }

    /// Drop a deleted record from a filter.
    ///
    /// Returns the touched filter, or `None` when the filter was destroyed:
    /// either nothing but defaults remained, or another filter of the same
    /// creator already has the remaining params.
    pub async fn remove_resource_reference(
        &self,
        filter: Filter,
        kind: ResourceKind,
        resource_id: &str,
    ) -> AppResult<Option<Filter>> {
        let params = match filter.remove_resource_reference(kind, resource_id) {
            ReferenceRemoval::Destroy => {
                self.store.delete(filter.id()).await?;
                tracing::info!(filter_id = %filter.id(), ?kind, "Destroyed emptied filter");
                return Ok(None);
            }
            ReferenceRemoval::Update(params) => params,
        };

        match self
            .store
            .remove_reference(filter.id(), kind, resource_id, &params)
            .await
        {
            Ok(updated) => {
                tracing::debug!(filter_id = %filter.id(), ?kind, resource_id, "Removed filter reference");
                Ok(updated)
            }
            Err(e) if e.is_uniqueness_race() => {
                self.store.delete(filter.id()).await?;
                tracing::info!(filter_id = %filter.id(), ?kind, "Destroyed filter duplicating another");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop a deleted record from every filter referencing it.
    ///
    /// Returns the number of filters changed or destroyed.
    pub async fn resource_removed(&self, kind: ResourceKind, resource_id: &str) -> AppResult<usize> {
        let filter_ids = self.store.find_referencing(kind, resource_id).await?;

        let mut changed = 0;
        for filter_id in filter_ids {
            let Some(filter) = self.store.find_by_id(&filter_id).await? else {
                continue;
            };
            self.remove_resource_reference(filter, kind, resource_id)
                .await?;
            changed += 1;
        }

        tracing::info!(?kind, resource_id, changed, "Purged record from filters");
        Ok(changed)
    }

    /// Cache key for a filter's results, `None` when they are not cacheable.
    pub async fn cache_key(&self, filter: &Filter) -> AppResult<Option<String>> {
        if !filter.cacheable() {
            return Ok(None);
        }
        let buckets = self
            .store
            .bucket_versions(&filter.relations().bucket_ids)
            .await?;
        Ok(filter.cache_key(&buckets))
    }

    async fn check_scope(&self, creator_id: &str, params: &FilterParams) -> AppResult<()> {
        for kind in ResourceKind::ALL {
            let ids = params.ids(kind);
            if ids.is_empty() {
                continue;
            }
            let foreign = self.scope.out_of_scope(creator_id, kind, ids).await?;
            if !foreign.is_empty() {
                return Err(AppError::InvalidSpecification(format!(
                    "{} outside the account: {}",
                    kind.ids_key(),
                    foreign.join(", ")
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::filter::{BucketVersion, MemoryFilterStore};
    use async_trait::async_trait;
    use bubbles_db::entities::filter::Assignments;
    use chrono::Utc;
    use serde_json::json;

    fn service() -> (FilterService, Arc<MemoryFilterStore>) {
        let store = Arc::new(MemoryFilterStore::new());
        (FilterService::new(store.clone(), store.clone()), store)
    }

    fn raw(value: serde_json::Value) -> RawFilterParams {
        RawFilterParams::from_json(value).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let (service, store) = service();

        let first = service.resolve(raw(json!({"tag_ids": ["t1"]})), "u1").await.unwrap();
        let second = service.resolve(raw(json!({"tag_ids": ["t1"]})), "u1").await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolve_returns_one_filter() {
        let (service, store) = service();
        let params = raw(json!({"bucket_ids": ["b1"], "indexed_by": "newest"}));

        let (a, b) = tokio::join!(
            service.resolve(params.clone(), "u1"),
            service.resolve(params, "u1")
        );

        assert_eq!(a.unwrap().id(), b.unwrap().id());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_id_order_does_not_matter() {
        let (service, _) = service();

        let a = service.resolve(raw(json!({"bucket_ids": ["2", "1"]})), "u1").await.unwrap();
        let b = service.resolve(raw(json!({"bucket_ids": ["1", "2"]})), "u1").await.unwrap();

        assert_eq!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_creators_get_separate_filters() {
        let (service, _) = service();

        let a = service.resolve(raw(json!({"bucket_ids": ["1"]})), "u1").await.unwrap();
        let b = service.resolve(raw(json!({"bucket_ids": ["1"]})), "u2").await.unwrap();

        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_default_params_are_elided() {
        let (service, _) = service();

        let filter = service
            .resolve(raw(json!({"indexed_by": "most_active"})), "u1")
            .await
            .unwrap();

        assert_eq!(filter.params().to_json().unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_scenario_unassigned_in_bucket() {
        let (service, _) = service();

        let filter = service
            .resolve_json(json!({"bucket_ids": ["10"], "assignments": "unassigned"}), "u1")
            .await
            .unwrap();

        assert_eq!(
            filter.params().to_json().unwrap(),
            json!({"bucket_ids": ["10"], "assignments": "unassigned"})
        );
        assert_eq!(filter.assignments(), Assignments::Unassigned);
        assert_eq!(filter.bubbles().scopes().len(), 4);
    }

    #[tokio::test]
    async fn test_exported_params_resolve_to_same_filter() {
        let (service, _) = service();
        let filter = service
            .resolve(
                raw(json!({"indexed_by": "popped", "tag_ids": ["t2", "t1"]})),
                "u1",
            )
            .await
            .unwrap();

        let again = service
            .resolve(filter.to_params().into(), "u1")
            .await
            .unwrap();

        assert_eq!(again.id(), filter.id());
    }

    #[tokio::test]
    async fn test_exported_json_resolves_to_same_filter() {
        let (service, _) = service();
        let filter = service
            .resolve(raw(json!({"assignee_ids": ["u5"]})), "u1")
            .await
            .unwrap();

        let exported = serde_json::to_value(filter.to_params()).unwrap();
        let again = service.resolve_json(exported, "u1").await.unwrap();

        assert_eq!(again.id(), filter.id());
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected_before_persistence() {
        let (service, store) = service();

        let err = service.resolve_json(json!({"colour": "red"}), "u1").await.unwrap_err();

        assert!(matches!(err, AppError::InvalidSpecification(_)));
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_foreign_ids_are_rejected() {
        let (service, store) = service();
        store.mark_foreign(ResourceKind::Bucket, "b9").unwrap();

        let err = service
            .resolve(raw(json!({"bucket_ids": ["b1", "b9"]})), "u1")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidSpecification(ref m) if m.contains("b9")));
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_removing_last_reference_destroys() {
        let (service, store) = service();
        let filter = service.resolve(raw(json!({"bucket_ids": ["5"]})), "u1").await.unwrap();

        let result = service
            .remove_resource_reference(filter, ResourceKind::Bucket, "5")
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_removing_one_of_several_references_touches() {
        let (service, _) = service();
        let filter = service
            .resolve(raw(json!({"bucket_ids": ["5", "6"]})), "u1")
            .await
            .unwrap();
        let id = filter.id().to_string();
        let before = filter.updated_at();

        let updated = service
            .remove_resource_reference(filter, ResourceKind::Bucket, "5")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.id(), id);
        assert_eq!(updated.relations().bucket_ids, vec!["6"]);
        assert_eq!(updated.params().to_json().unwrap(), json!({"bucket_ids": ["6"]}));
        assert!(updated.updated_at() > before);
    }

    #[tokio::test]
    async fn test_removal_colliding_with_sibling_destroys() {
        let (service, store) = service();
        let narrow = service.resolve(raw(json!({"bucket_ids": ["6"]})), "u1").await.unwrap();
        let wide = service
            .resolve(raw(json!({"bucket_ids": ["5", "6"]})), "u1")
            .await
            .unwrap();

        let result = service
            .remove_resource_reference(wide, ResourceKind::Bucket, "5")
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(service.find(narrow.id()).await.unwrap().id(), narrow.id());
    }

    #[tokio::test]
    async fn test_resource_removed_updates_every_referencing_filter() {
        let (service, store) = service();
        service.resolve(raw(json!({"tag_ids": ["t1"]})), "u1").await.unwrap();
        let kept = service
            .resolve(raw(json!({"tag_ids": ["t1", "t2"]})), "u2")
            .await
            .unwrap();
        service.resolve(raw(json!({"tag_ids": ["t3"]})), "u1").await.unwrap();

        let changed = service.resource_removed(ResourceKind::Tag, "t1").await.unwrap();

        assert_eq!(changed, 2);
        assert_eq!(store.len().unwrap(), 2);
        let kept = service.find(kept.id()).await.unwrap();
        assert_eq!(kept.relations().tag_ids, vec!["t2"]);
    }

    #[tokio::test]
    async fn test_purge_after_delete_destroys_lone_reference() {
        let (service, store) = service();
        service.resolve(raw(json!({"bucket_ids": ["b5"]})), "u1").await.unwrap();
        let other = service.resolve(raw(json!({"bucket_ids": ["b7"]})), "u1").await.unwrap();

        store.delete_resource(ResourceKind::Bucket, "b5").unwrap();
        let changed = service.resource_removed(ResourceKind::Bucket, "b5").await.unwrap();

        assert_eq!(changed, 1);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(service.find(other.id()).await.unwrap().id(), other.id());
    }

    #[tokio::test]
    async fn test_purge_after_delete_shrinks_params() {
        let (service, store) = service();
        let filter = service
            .resolve(raw(json!({"bucket_ids": ["b5", "b6"], "indexed_by": "newest"})), "u1")
            .await
            .unwrap();

        store.delete_resource(ResourceKind::Bucket, "b5").unwrap();
        assert_eq!(service.resource_removed(ResourceKind::Bucket, "b5").await.unwrap(), 1);

        let shrunk = service.find(filter.id()).await.unwrap();
        assert_eq!(shrunk.params().ids(ResourceKind::Bucket), ["b6".to_string()]);
        assert!(shrunk.updated_at() > filter.updated_at());

        let again = service
            .resolve(raw(json!({"bucket_ids": ["b6"], "indexed_by": "newest"})), "u1")
            .await
            .unwrap();
        assert_eq!(again.id(), filter.id());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_missing_is_not_found() {
        let (service, _) = service();
        assert!(matches!(
            service.find("nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cache_key_tracks_bucket_versions() {
        let (service, store) = service();
        let now = Utc::now().fixed_offset();
        store.add_bucket("b1", now).unwrap();

        let filter = service.resolve(raw(json!({"bucket_ids": ["b1"]})), "u1").await.unwrap();
        let key = service.cache_key(&filter).await.unwrap().unwrap();
        assert!(key.starts_with(&format!("filters/{}-", filter.id())));
        assert!(key.ends_with(&format!("-1-{}", now.format("%Y%m%d%H%M%S%6f"))));

        store.add_bucket("b1", now + chrono::Duration::seconds(1)).unwrap();
        assert_ne!(service.cache_key(&filter).await.unwrap().unwrap(), key);
    }

    #[tokio::test]
    async fn test_cache_key_absent_without_buckets() {
        let (service, _) = service();
        let filter = service.resolve(raw(json!({"tag_ids": ["t1"]})), "u1").await.unwrap();

        assert_eq!(service.cache_key(&filter).await.unwrap(), None);
    }

    /// Store whose insert always loses a race.
    ///
    /// With `rival` set, the competing filter is written first, as if another
    /// request committed it between our normalize and insert; otherwise the
    /// competitor vanishes again before the lookup.
    struct RacingStore {
        inner: MemoryFilterStore,
        rival: bool,
    }

    #[async_trait]
    impl FilterStore for RacingStore {
        async fn insert(&self, filter: NewFilter) -> AppResult<Filter> {
            if self.rival {
                let competitor = NewFilter {
                    id: "rival".to_string(),
                    ..filter.clone()
                };
                self.inner.insert(competitor).await?;
                return self.inner.insert(filter).await;
            }
            Err(AppError::UniquenessRace("idx_filter_creator_params".to_string()))
        }

        async fn find_by_id(&self, id: &str) -> AppResult<Option<Filter>> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_params(
            &self,
            creator_id: &str,
            params: &FilterParams,
        ) -> AppResult<Option<Filter>> {
            self.inner.find_by_params(creator_id, params).await
        }

        async fn find_referencing(
            &self,
            kind: ResourceKind,
            resource_id: &str,
        ) -> AppResult<Vec<String>> {
            self.inner.find_referencing(kind, resource_id).await
        }

        async fn remove_reference(
            &self,
            filter_id: &str,
            kind: ResourceKind,
            resource_id: &str,
            params: &FilterParams,
        ) -> AppResult<Option<Filter>> {
            self.inner
                .remove_reference(filter_id, kind, resource_id, params)
                .await
        }

        async fn delete(&self, id: &str) -> AppResult<bool> {
            self.inner.delete(id).await
        }

        async fn bucket_versions(&self, bucket_ids: &[String]) -> AppResult<Vec<BucketVersion>> {
            self.inner.bucket_versions(bucket_ids).await
        }
    }

    #[tokio::test]
    async fn test_lost_race_returns_winning_filter() {
        let store = Arc::new(RacingStore {
            inner: MemoryFilterStore::new(),
            rival: true,
        });
        let service = FilterService::new(store.clone(), Arc::new(MemoryFilterStore::new()));

        let filter = service.resolve(raw(json!({"bucket_ids": ["b1"]})), "u1").await.unwrap();

        assert_eq!(filter.id(), "rival");
        assert_eq!(store.inner.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_race_without_survivor_is_not_found() {
        let store = Arc::new(RacingStore {
            inner: MemoryFilterStore::new(),
            rival: false,
        });
        let service = FilterService::new(store, Arc::new(MemoryFilterStore::new()));

        let err = service
            .resolve(raw(json!({"bucket_ids": ["b1"]})), "u1")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }
}
