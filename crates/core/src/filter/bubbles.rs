//! Composition of a filter's criteria onto a bubble query.
//!
//! The pipeline is a list of [`BubbleScope`]s derived from a filter. Nothing
//! is loaded here: [`BubblePipeline::compose`] chains the scopes onto whatever
//! query the [`BubbleSource`] hands out, and the caller decides when to run it.

use bubbles_db::entities::filter::IndexedBy;
use bubbles_db::repositories::{BubbleRepository, BubbleSelect};

use super::entity::FilterRelations;
use super::params::FilterParams;

/// A chainable bubble query.
pub trait BubbleQuery: Sized {
    /// Order by (and for `popped`, restrict to) the given index.
    fn indexed_by(self, index: IndexedBy) -> Self;
    /// Bubbles that have not been popped.
    fn active(self) -> Self;
    /// Bubbles without assignees.
    fn unassigned(self) -> Self;
    fn in_bucket(self, bucket_ids: &[String]) -> Self;
    fn tagged_with(self, tag_ids: &[String]) -> Self;
    fn assigned_to(self, assignee_ids: &[String]) -> Self;
}

/// Hands out the bubbles a user may see, as the starting query.
pub trait BubbleSource {
    type Query: BubbleQuery;

    fn accessible_bubbles(&self, user_id: &str) -> Self::Query;
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BubbleScope {
    IndexedBy(IndexedBy),
    Active,
    Unassigned,
    InBucket(Vec<String>),
    TaggedWith(Vec<String>),
    AssignedTo(Vec<String>),
}

impl BubbleScope {
    fn apply<Q: BubbleQuery>(&self, query: Q) -> Q {
        match self {
            Self::IndexedBy(index) => query.indexed_by(*index),
            Self::Active => query.active(),
            Self::Unassigned => query.unassigned(),
            Self::InBucket(ids) => query.in_bucket(ids),
            Self::TaggedWith(ids) => query.tagged_with(ids),
            Self::AssignedTo(ids) => query.assigned_to(ids),
        }
    }
}

/// The scopes a filter applies, in order, starting from its creator's bubbles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BubblePipeline {
    creator_id: String,
    scopes: Vec<BubbleScope>,
}

impl BubblePipeline {
    /// Build the pipeline for a filter's params and live relations.
    ///
    /// Steps whose criterion is empty are left out.
    #[must_use]
    pub fn new(creator_id: String, params: &FilterParams, relations: &FilterRelations) -> Self {
        let index = params.indexed_by();
        let mut scopes = vec![BubbleScope::IndexedBy(index)];

        if !index.is_popped() {
            scopes.push(BubbleScope::Active);
        }
        if params.assignments().is_unassigned() {
            scopes.push(BubbleScope::Unassigned);
        }
        if !relations.bucket_ids.is_empty() {
            scopes.push(BubbleScope::InBucket(relations.bucket_ids.clone()));
        }
        if !relations.tag_ids.is_empty() {
            scopes.push(BubbleScope::TaggedWith(relations.tag_ids.clone()));
        }
        if !relations.assignee_ids.is_empty() {
            scopes.push(BubbleScope::AssignedTo(relations.assignee_ids.clone()));
        }

        Self { creator_id, scopes }
    }

    #[must_use]
    pub fn creator_id(&self) -> &str {
        &self.creator_id
    }

    #[must_use]
    pub fn scopes(&self) -> &[BubbleScope] {
        &self.scopes
    }

    /// Chain every scope onto the creator's accessible bubbles.
    ///
    /// Builds a new query on every call; only the scope list is kept.
    pub fn compose<S: BubbleSource>(&self, source: &S) -> S::Query {
        self.scopes
            .iter()
            .fold(source.accessible_bubbles(&self.creator_id), |query, scope| {
                scope.apply(query)
            })
    }
}

impl BubbleSource for BubbleRepository {
    type Query = BubbleSelect;

    fn accessible_bubbles(&self, user_id: &str) -> BubbleSelect {
        Self::accessible_bubbles(self, user_id)
    }
}

impl BubbleQuery for BubbleSelect {
    fn indexed_by(self, index: IndexedBy) -> Self {
        Self::indexed_by(self, index)
    }

    fn active(self) -> Self {
        Self::active(self)
    }

    fn unassigned(self) -> Self {
        Self::unassigned(self)
    }

    fn in_bucket(self, bucket_ids: &[String]) -> Self {
        Self::in_bucket(self, bucket_ids)
    }

    fn tagged_with(self, tag_ids: &[String]) -> Self {
        Self::tagged_with(self, tag_ids)
    }

    fn assigned_to(self, assignee_ids: &[String]) -> Self {
        Self::assigned_to(self, assignee_ids)
    }
}
