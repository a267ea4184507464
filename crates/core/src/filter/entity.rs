//! The filter domain object.

use std::cell::OnceCell;

use bubbles_common::AppResult;
use bubbles_db::entities::filter::{self as filter_entity, Assignments, IndexedBy, ResourceKind};
use bubbles_db::repositories::FilterRelationIds;
use chrono::{DateTime, FixedOffset};
use sha2::{Digest, Sha256};

use super::bubbles::BubblePipeline;
use super::params::{FilterParams, FilterParamsOut};

/// Format of versions embedded in cache keys.
const VERSION_FORMAT: &str = "%Y%m%d%H%M%S%6f";

/// Hex characters of the bucket-set digest kept in cache keys.
const DIGEST_PREFIX_LEN: usize = 16;

/// Live relation ids of a filter, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRelations {
    pub bucket_ids: Vec<String>,
    pub tag_ids: Vec<String>,
    pub assignee_ids: Vec<String>,
}

impl FilterRelations {
    /// Relation sets named by normalized params.
    #[must_use]
    pub fn from_params(params: &FilterParams) -> Self {
        Self {
            bucket_ids: params.ids(ResourceKind::Bucket).to_vec(),
            tag_ids: params.ids(ResourceKind::Tag).to_vec(),
            assignee_ids: params.ids(ResourceKind::Assignee).to_vec(),
        }
    }

    #[must_use]
    pub fn ids(&self, kind: ResourceKind) -> &[String] {
        match kind {
            ResourceKind::Bucket => &self.bucket_ids,
            ResourceKind::Tag => &self.tag_ids,
            ResourceKind::Assignee => &self.assignee_ids,
        }
    }

    /// Drop one id from the list of the given kind.
    pub fn remove(&mut self, kind: ResourceKind, id: &str) {
        let ids = match kind {
            ResourceKind::Bucket => &mut self.bucket_ids,
            ResourceKind::Tag => &mut self.tag_ids,
            ResourceKind::Assignee => &mut self.assignee_ids,
        };
        ids.retain(|existing| existing != id);
    }
}

impl From<FilterRelationIds> for FilterRelations {
    fn from(ids: FilterRelationIds) -> Self {
        Self {
            bucket_ids: ids.bucket_ids,
            tag_ids: ids.tag_ids,
            assignee_ids: ids.assignee_ids,
        }
    }
}

/// A filter about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFilter {
    pub id: String,
    pub creator_id: String,
    pub params: FilterParams,
    pub relations: FilterRelations,
}

impl NewFilter {
    /// Build an unsaved filter whose relation sets are the ids named in `params`.
    #[must_use]
    pub fn new(id: String, creator_id: String, params: FilterParams) -> Self {
        let relations = FilterRelations::from_params(&params);
        Self {
            id,
            creator_id,
            params,
            relations,
        }
        .denormalize()
    }

    /// Copy the relation ids into the params snapshot.
    ///
    /// Runs before insert so the unique `(creator_id, params)` index sees the
    /// same lists the join tables will hold.
    #[must_use]
    pub fn denormalize(self) -> Self {
        let params = ResourceKind::ALL.iter().fold(self.params, |params, kind| {
            params.with_ids(*kind, self.relations.ids(*kind).to_vec())
        });
        Self { params, ..self }
    }
}

/// Last-modified stamp of a bucket, used to version cached filter results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketVersion {
    pub id: String,
    pub updated_at: DateTime<FixedOffset>,
}

/// What removing a referenced record does to a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceRemoval {
    /// Nothing distinguishes the filter from the defaults any more.
    Destroy,
    /// The filter survives with these params.
    Update(FilterParams),
}

/// A persisted filter.
///
/// The bubble pipeline is memoized in a [`OnceCell`], so a `Filter` is `Send`
/// but not `Sync`: move it between tasks, but sharing one instance across
/// threads (e.g. behind an `Arc`) is unsupported. Clone it instead.
#[derive(Debug, Clone)]
pub struct Filter {
    id: String,
    creator_id: String,
    params: FilterParams,
    relations: FilterRelations,
    created_at: DateTime<FixedOffset>,
    updated_at: DateTime<FixedOffset>,
    bubbles: OnceCell<BubblePipeline>,
}

impl Filter {
    #[must_use]
    pub const fn new(
        id: String,
        creator_id: String,
        params: FilterParams,
        relations: FilterRelations,
        created_at: DateTime<FixedOffset>,
        updated_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id,
            creator_id,
            params,
            relations,
            created_at,
            updated_at,
            bubbles: OnceCell::new(),
        }
    }

    /// Build from a stored row and its join-table ids.
    pub fn from_model(
        model: filter_entity::Model,
        relations: impl Into<FilterRelations>,
    ) -> AppResult<Self> {
        Ok(Self::new(
            model.id,
            model.creator_id,
            FilterParams::from_json(model.params)?,
            relations.into(),
            model.created_at,
            model.updated_at,
        ))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn creator_id(&self) -> &str {
        &self.creator_id
    }

    /// The stored (normalized, denormalized) params.
    #[must_use]
    pub const fn params(&self) -> &FilterParams {
        &self.params
    }

    #[must_use]
    pub const fn relations(&self) -> &FilterRelations {
        &self.relations
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<FixedOffset> {
        self.updated_at
    }

    #[must_use]
    pub fn indexed_by(&self) -> IndexedBy {
        self.params.indexed_by()
    }

    #[must_use]
    pub fn assignments(&self) -> Assignments {
        self.params.assignments()
    }

    /// Whether results can be cached: only filters scoped to buckets are.
    #[must_use]
    pub fn cacheable(&self) -> bool {
        !self.relations.bucket_ids.is_empty()
    }

    /// Whether the filter is worth saving on its own.
    ///
    /// A filter whose only non-default criterion is a single live bucket is
    /// that bucket's default view, and is not.
    #[must_use]
    pub fn savable(&self) -> bool {
        !(self.params.non_default_keys() == [ResourceKind::Bucket.ids_key()]
            && self.relations.bucket_ids.len() == 1)
    }

    /// Effective params, with live relation ids and the filter id.
    #[must_use]
    pub fn to_params(&self) -> FilterParamsOut {
        FilterParamsOut {
            indexed_by: self.params.indexed_by,
            assignments: self.params.assignments,
            bucket_ids: self.relations.bucket_ids.clone(),
            assignee_ids: self.relations.assignee_ids.clone(),
            tag_ids: self.relations.tag_ids.clone(),
            filter_id: Some(self.id.clone()),
        }
    }

    /// The bubble query pipeline, built on first use.
    ///
    /// Only the list of steps is memoized. [`BubblePipeline::compose`] builds a
    /// fresh query against its source on every call.
    pub fn bubbles(&self) -> &BubblePipeline {
        self.bubbles.get_or_init(|| {
            BubblePipeline::new(self.creator_id.clone(), &self.params, &self.relations)
        })
    }

    /// Effect of removing a referenced record of the given kind.
    #[must_use]
    pub fn remove_resource_reference(&self, kind: ResourceKind, id: &str) -> ReferenceRemoval {
        let params = self.params.clone().without_id(kind, id);
        if params.is_blank() {
            ReferenceRemoval::Destroy
        } else {
            ReferenceRemoval::Update(params)
        }
    }

    /// Cache key for the filter's results, given the versions of its buckets.
    ///
    /// `None` when the filter is not [`cacheable`](Self::cacheable).
    #[must_use]
    pub fn cache_key(&self, buckets: &[BucketVersion]) -> Option<String> {
        if !self.cacheable() {
            return None;
        }

        let mut ids: Vec<&str> = buckets.iter().map(|b| b.id.as_str()).collect();
        ids.sort_unstable();
        let digest = hex::encode(Sha256::digest(ids.join(",").as_bytes()));
        let newest = buckets
            .iter()
            .map(|b| b.updated_at.format(VERSION_FORMAT).to_string())
            .max()
            .unwrap_or_default();

        Some(format!(
            "filters/{}-{}/buckets/query-{}-{}-{}",
            self.id,
            self.updated_at.format(VERSION_FORMAT),
            &digest[..DIGEST_PREFIX_LEN],
            buckets.len(),
            newest,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn filter_with(params: FilterParams) -> Filter {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap().fixed_offset();
        let relations = FilterRelations::from_params(&params);
        Filter::new("f1".into(), "u1".into(), params, relations, now, now)
    }

    fn bucket_only(bucket_ids: &[&str]) -> Filter {
        filter_with(FilterParams {
            bucket_ids: Some(ids(bucket_ids)),
            ..Default::default()
        })
    }

    #[test]
    fn test_denormalize_copies_relation_ids() {
        let new = NewFilter {
            id: "f1".into(),
            creator_id: "u1".into(),
            params: FilterParams::default(),
            relations: FilterRelations {
                bucket_ids: ids(&["b2", "b1"]),
                ..Default::default()
            },
        }
        .denormalize();

        assert_eq!(new.params.bucket_ids, Some(ids(&["b1", "b2"])));
        assert_eq!(new.params.tag_ids, None);
    }

    #[test]
    fn test_savable_is_false_for_lone_bucket_view() {
        assert!(!bucket_only(&["b1"]).savable());
        assert!(bucket_only(&["b1", "b2"]).savable());
        assert!(filter_with(FilterParams::default()).savable());
        assert!(
            filter_with(FilterParams {
                bucket_ids: Some(ids(&["b1"])),
                indexed_by: Some(IndexedBy::Newest),
                ..Default::default()
            })
            .savable()
        );
    }

    #[test]
    fn test_savable_counts_live_buckets() {
        let mut filter = bucket_only(&["b1", "b2"]);
        assert!(filter.savable());

        filter.relations.remove(ResourceKind::Bucket, "b2");

        assert_eq!(filter.params.ids(ResourceKind::Bucket).len(), 2);
        assert!(!filter.savable());
    }

    #[test]
    fn test_cacheable_requires_a_bucket() {
        assert!(bucket_only(&["b1"]).cacheable());
        assert!(
            !filter_with(FilterParams {
                tag_ids: Some(ids(&["t1"])),
                ..Default::default()
            })
            .cacheable()
        );
    }

    #[test]
    fn test_remove_last_reference_destroys() {
        let filter = bucket_only(&["5"]);
        assert_eq!(
            filter.remove_resource_reference(ResourceKind::Bucket, "5"),
            ReferenceRemoval::Destroy
        );
    }

    #[test]
    fn test_remove_reference_keeps_remaining_ids() {
        let filter = bucket_only(&["5", "6"]);
        assert_eq!(
            filter.remove_resource_reference(ResourceKind::Bucket, "5"),
            ReferenceRemoval::Update(FilterParams {
                bucket_ids: Some(ids(&["6"])),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_remove_reference_with_other_criteria_survives() {
        let filter = filter_with(FilterParams {
            bucket_ids: Some(ids(&["5"])),
            assignments: Some(Assignments::Unassigned),
            ..Default::default()
        });

        assert_eq!(
            filter.remove_resource_reference(ResourceKind::Bucket, "5"),
            ReferenceRemoval::Update(FilterParams {
                assignments: Some(Assignments::Unassigned),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_to_params_uses_live_relations() {
        let mut filter = bucket_only(&["b1", "b2"]);
        filter.relations.remove(ResourceKind::Bucket, "b2");

        let exported = serde_json::to_value(filter.to_params()).unwrap();
        assert_eq!(
            exported,
            json!({
                "bucket_ids": ["b1"],
                "assignee_ids": [],
                "tag_ids": [],
                "filter_id": "f1",
            })
        );
    }

    #[test]
    fn test_cache_key_format() {
        let filter = bucket_only(&["b1", "b2"]);
        let older = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap().fixed_offset();
        let newer = older + Duration::days(1);
        let buckets = vec![
            BucketVersion {
                id: "b2".into(),
                updated_at: newer,
            },
            BucketVersion {
                id: "b1".into(),
                updated_at: older,
            },
        ];

        let key = filter.cache_key(&buckets).unwrap();
        let digest = hex::encode(Sha256::digest(b"b1,b2"));

        assert_eq!(
            key,
            format!(
                "filters/f1-20250301120000000000/buckets/query-{}-2-20250102000000000000",
                &digest[..DIGEST_PREFIX_LEN]
            )
        );
    }

    #[test]
    fn test_cache_key_changes_when_touched() {
        let mut filter = bucket_only(&["b1"]);
        let buckets = vec![BucketVersion {
            id: "b1".into(),
            updated_at: filter.updated_at,
        }];
        let before = filter.cache_key(&buckets);

        filter.updated_at += Duration::microseconds(1);

        assert_ne!(filter.cache_key(&buckets), before);
    }

    #[test]
    fn test_cache_key_absent_without_buckets() {
        assert_eq!(filter_with(FilterParams::default()).cache_key(&[]), None);
    }

    #[test]
    fn test_bubbles_is_memoized() {
        let filter = bucket_only(&["b1"]);
        let first: *const BubblePipeline = filter.bubbles();
        let second: *const BubblePipeline = filter.bubbles();
        assert_eq!(first, second);
    }

    #[test]
    fn test_filter_moves_across_tasks() {
        fn assert_send<T: Send>() {}
        assert_send::<Filter>();

        let filter = bucket_only(&["b1"]);
        filter.bubbles();
        let handle = std::thread::spawn(move || filter.bubbles().scopes().len());
        assert!(handle.join().unwrap() > 0);
    }
}
