//! In-memory filter storage for tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bubbles_common::{AppError, AppResult};
use bubbles_db::entities::filter::ResourceKind;
use chrono::{DateTime, Duration, FixedOffset, Utc};

use super::entity::{BucketVersion, Filter, FilterRelations, NewFilter};
use super::params::FilterParams;
use super::store::{FilterStore, ResourceScope};

#[derive(Debug, Clone)]
struct StoredFilter {
    creator_id: String,
    params: FilterParams,
    relations: FilterRelations,
    created_at: DateTime<FixedOffset>,
    updated_at: DateTime<FixedOffset>,
}

#[derive(Debug, Default)]
struct State {
    filters: BTreeMap<String, StoredFilter>,
    buckets: HashMap<String, DateTime<FixedOffset>>,
    foreign: HashSet<(ResourceKind, String)>,
    last_write: Option<DateTime<FixedOffset>>,
}

impl State {
    /// Current time, strictly after every earlier write.
    fn tick(&mut self) -> DateTime<FixedOffset> {
        let now = Utc::now().fixed_offset();
        let now = match self.last_write {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_write = Some(now);
        now
    }

    fn conflicting(&self, id: &str, creator_id: &str, params: &FilterParams) -> Option<&str> {
        self.filters
            .iter()
            .find(|(other, stored)| {
                other.as_str() != id && stored.creator_id == creator_id && stored.params == *params
            })
            .map(|(other, _)| other.as_str())
    }
}

fn to_filter(id: &str, stored: &StoredFilter) -> Filter {
    Filter::new(
        id.to_string(),
        stored.creator_id.clone(),
        stored.params.clone(),
        stored.relations.clone(),
        stored.created_at,
        stored.updated_at,
    )
}

/// [`FilterStore`] and [`ResourceScope`] kept in process memory.
///
/// Enforces the `(creator_id, params)` uniqueness rule like the database
/// does. Every record id is in scope unless marked with
/// [`mark_foreign`](Self::mark_foreign).
#[derive(Debug, Default)]
pub struct MemoryFilterStore {
    state: Mutex<State>,
}

impl MemoryFilterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> AppResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("Filter store lock poisoned".to_string()))
    }

    /// Register a bucket with its last-modified time.
    pub fn add_bucket(&self, id: &str, updated_at: DateTime<FixedOffset>) -> AppResult<()> {
        self.state()?.buckets.insert(id.to_string(), updated_at);
        Ok(())
    }

    /// Treat a record as belonging to another account.
    pub fn mark_foreign(&self, kind: ResourceKind, id: &str) -> AppResult<()> {
        self.state()?.foreign.insert((kind, id.to_string()));
        Ok(())
    }

    /// Delete a record the way the database does: its join rows cascade away
    /// while each filter's params snapshot still lists it.
    pub fn delete_resource(&self, kind: ResourceKind, id: &str) -> AppResult<()> {
        let mut state = self.state()?;
        if kind == ResourceKind::Bucket {
            state.buckets.remove(id);
        }
        for stored in state.filters.values_mut() {
            stored.relations.remove(kind, id);
        }
        Ok(())
    }

    /// Number of stored filters.
    pub fn len(&self) -> AppResult<usize> {
        Ok(self.state()?.filters.len())
    }

    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl FilterStore for MemoryFilterStore {
    async fn insert(&self, filter: NewFilter) -> AppResult<Filter> {
        let mut state = self.state()?;

        if state.filters.contains_key(&filter.id) {
            return Err(AppError::Internal(format!("Duplicate filter id {}", filter.id)));
        }
        if let Some(existing) = state.conflicting(&filter.id, &filter.creator_id, &filter.params) {
            return Err(AppError::UniquenessRace(format!(
                "filter {existing} already has these params"
            )));
        }

        let now = state.tick();
        let stored = StoredFilter {
            creator_id: filter.creator_id,
            params: filter.params,
            relations: filter.relations,
            created_at: now,
            updated_at: now,
        };
        let created = to_filter(&filter.id, &stored);
        state.filters.insert(filter.id, stored);
        Ok(created)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Filter>> {
        Ok(self.state()?.filters.get(id).map(|stored| to_filter(id, stored)))
    }

    async fn find_by_params(
        &self,
        creator_id: &str,
        params: &FilterParams,
    ) -> AppResult<Option<Filter>> {
        let state = self.state()?;
        Ok(state
            .filters
            .iter()
            .find(|(_, stored)| stored.creator_id == creator_id && stored.params == *params)
            .map(|(id, stored)| to_filter(id, stored)))
    }

    async fn find_referencing(
        &self,
        kind: ResourceKind,
        resource_id: &str,
    ) -> AppResult<Vec<String>> {
        let state = self.state()?;
        Ok(state
            .filters
            .iter()
            .filter(|(_, stored)| stored.params.ids(kind).iter().any(|id| id == resource_id))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn remove_reference(
        &self,
        filter_id: &str,
        kind: ResourceKind,
        resource_id: &str,
        params: &FilterParams,
    ) -> AppResult<Option<Filter>> {
        let mut state = self.state()?;

        let Some(creator_id) = state.filters.get(filter_id).map(|s| s.creator_id.clone()) else {
            return Ok(None);
        };
        if let Some(existing) = state.conflicting(filter_id, &creator_id, params) {
            return Err(AppError::UniquenessRace(format!(
                "filter {existing} already has these params"
            )));
        }

        let now = state.tick();
        let Some(stored) = state.filters.get_mut(filter_id) else {
            return Ok(None);
        };
        stored.relations.remove(kind, resource_id);
        stored.params = params.clone();
        stored.updated_at = now;

        Ok(Some(to_filter(filter_id, stored)))
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        Ok(self.state()?.filters.remove(id).is_some())
    }

    async fn bucket_versions(&self, bucket_ids: &[String]) -> AppResult<Vec<BucketVersion>> {
        let state = self.state()?;
        let mut versions: Vec<BucketVersion> = bucket_ids
            .iter()
            .filter_map(|id| {
                state.buckets.get(id).map(|updated_at| BucketVersion {
                    id: id.clone(),
                    updated_at: *updated_at,
                })
            })
            .collect();
        versions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(versions)
    }
}

#[async_trait]
impl ResourceScope for MemoryFilterStore {
    async fn out_of_scope(
        &self,
        _creator_id: &str,
        kind: ResourceKind,
        ids: &[String],
    ) -> AppResult<Vec<String>> {
        let state = self.state()?;
        Ok(ids
            .iter()
            .filter(|id| state.foreign.contains(&(kind, (*id).clone())))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_filter(id: &str, creator_id: &str, bucket_ids: &[&str]) -> NewFilter {
        let params = FilterParams::default().with_ids(
            ResourceKind::Bucket,
            bucket_ids.iter().map(ToString::to_string).collect(),
        );
        NewFilter::new(id.into(), creator_id.into(), params)
    }

    #[tokio::test]
    async fn test_insert_rejects_equal_params_per_creator() {
        let store = MemoryFilterStore::new();
        store.insert(new_filter("f1", "u1", &["b1"])).await.unwrap();

        let err = store.insert(new_filter("f2", "u1", &["b1"])).await.unwrap_err();
        assert!(err.is_uniqueness_race());

        store.insert(new_filter("f3", "u2", &["b1"])).await.unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_remove_reference_touches_strictly() {
        let store = MemoryFilterStore::new();
        let created = store.insert(new_filter("f1", "u1", &["b1", "b2"])).await.unwrap();
        let params = created.params().clone().without_id(ResourceKind::Bucket, "b1");

        let updated = store
            .remove_reference("f1", ResourceKind::Bucket, "b1", &params)
            .await
            .unwrap()
            .unwrap();

        assert!(updated.updated_at() > created.updated_at());
        assert_eq!(updated.relations().bucket_ids, vec!["b2"]);
        assert!(
            store
                .find_referencing(ResourceKind::Bucket, "b1")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_remove_reference_collision_leaves_filter_unchanged() {
        let store = MemoryFilterStore::new();
        store.insert(new_filter("f1", "u1", &["b2"])).await.unwrap();
        let wide = store.insert(new_filter("f2", "u1", &["b1", "b2"])).await.unwrap();
        let params = wide.params().clone().without_id(ResourceKind::Bucket, "b1");

        let err = store
            .remove_reference("f2", ResourceKind::Bucket, "b1", &params)
            .await
            .unwrap_err();

        assert!(err.is_uniqueness_race());
        let unchanged = store.find_by_id("f2").await.unwrap().unwrap();
        assert_eq!(unchanged.relations().bucket_ids, vec!["b1", "b2"]);
    }

    #[tokio::test]
    async fn test_deleted_resource_is_still_found_through_params() {
        let store = MemoryFilterStore::new();
        store.insert(new_filter("f1", "u1", &["b5", "b6"])).await.unwrap();

        store.delete_resource(ResourceKind::Bucket, "b5").unwrap();

        let unlinked = store.find_by_id("f1").await.unwrap().unwrap();
        assert_eq!(unlinked.relations().bucket_ids, vec!["b6"]);
        assert_eq!(
            store.find_referencing(ResourceKind::Bucket, "b5").await.unwrap(),
            vec!["f1"]
        );
    }

    #[tokio::test]
    async fn test_out_of_scope_reports_marked_ids() {
        let store = MemoryFilterStore::new();
        store.mark_foreign(ResourceKind::Tag, "t9").unwrap();

        let foreign = store
            .out_of_scope("u1", ResourceKind::Tag, &["t1".to_string(), "t9".to_string()])
            .await
            .unwrap();

        assert_eq!(foreign, vec!["t9"]);
    }
}
