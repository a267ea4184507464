//! Filter params: the raw input accepted from callers and its normalized form.
//!
//! Normalization is what makes filter deduplication work. Two specifications
//! that select the same bubbles must serialize to the same JSON object, so
//! defaults are elided and id lists are sorted and deduplicated before the
//! params reach the unique `(creator_id, params)` index.

use bubbles_common::{AppError, AppResult};
use bubbles_db::entities::filter::{Assignments, IndexedBy, ResourceKind};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Maximum number of ids accepted per list.
pub const MAX_IDS_PER_LIST: u64 = 100;

/// Keys a filter specification may carry.
pub const KNOWN_PARAMS: [&str; 5] = [
    "indexed_by",
    "assignments",
    "bucket_ids",
    "assignee_ids",
    "tag_ids",
];

/// Filter specification as submitted by a caller.
///
/// Unknown keys are rejected. `filter_id` is accepted and ignored so that
/// params produced by [`FilterParamsOut`] can be submitted again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RawFilterParams {
    #[serde(default)]
    pub indexed_by: Option<IndexedBy>,

    #[serde(default)]
    pub assignments: Option<Assignments>,

    #[serde(default)]
    #[validate(length(max = MAX_IDS_PER_LIST))]
    pub bucket_ids: Option<Vec<String>>,

    #[serde(default)]
    #[validate(length(max = MAX_IDS_PER_LIST))]
    pub tag_ids: Option<Vec<String>>,

    #[serde(default)]
    #[validate(length(max = MAX_IDS_PER_LIST))]
    pub assignee_ids: Option<Vec<String>>,

    #[serde(default)]
    pub filter_id: Option<String>,
}

impl RawFilterParams {
    /// Parse a JSON object of params.
    pub fn from_json(value: serde_json::Value) -> AppResult<Self> {
        serde_json::from_value(value).map_err(|e| AppError::InvalidSpecification(e.to_string()))
    }

    /// Validate and canonicalize into [`FilterParams`].
    pub fn normalize(self) -> AppResult<FilterParams> {
        self.validate()?;

        Ok(FilterParams {
            indexed_by: self.indexed_by,
            assignments: self.assignments,
            bucket_ids: self.bucket_ids,
            tag_ids: self.tag_ids,
            assignee_ids: self.assignee_ids,
        }
        .without_defaults())
    }
}

/// Normalized filter specification, as stored in `filter.params`.
///
/// A `None` field means "default". [`FilterParams::without_defaults`] keeps
/// the invariant that no field ever holds its default value explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_by: Option<IndexedBy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignments: Option<Assignments>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_ids: Option<Vec<String>>,
}

impl FilterParams {
    /// Drop default values and canonicalize id lists.
    #[must_use]
    pub fn without_defaults(self) -> Self {
        Self {
            indexed_by: self.indexed_by.filter(|i| *i != IndexedBy::default()),
            assignments: self.assignments.filter(|a| *a != Assignments::default()),
            bucket_ids: canonical_ids(self.bucket_ids),
            tag_ids: canonical_ids(self.tag_ids),
            assignee_ids: canonical_ids(self.assignee_ids),
        }
    }

    /// Keys holding a non-default value, in [`KNOWN_PARAMS`] order.
    #[must_use]
    pub fn non_default_keys(&self) -> Vec<&'static str> {
        let present = [
            self.indexed_by.is_some(),
            self.assignments.is_some(),
            self.bucket_ids.is_some(),
            self.assignee_ids.is_some(),
            self.tag_ids.is_some(),
        ];
        KNOWN_PARAMS
            .iter()
            .zip(present)
            .filter_map(|(key, present)| present.then_some(*key))
            .collect()
    }

    /// Whether nothing distinguishes these params from the defaults.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.non_default_keys().is_empty()
    }

    #[must_use]
    pub fn indexed_by(&self) -> IndexedBy {
        self.indexed_by.unwrap_or_default()
    }

    #[must_use]
    pub fn assignments(&self) -> Assignments {
        self.assignments.unwrap_or_default()
    }

    /// Id list of the given kind, empty when absent.
    #[must_use]
    pub fn ids(&self, kind: ResourceKind) -> &[String] {
        let ids = match kind {
            ResourceKind::Bucket => &self.bucket_ids,
            ResourceKind::Tag => &self.tag_ids,
            ResourceKind::Assignee => &self.assignee_ids,
        };
        ids.as_deref().unwrap_or_default()
    }

    /// Replace the id list of the given kind, canonicalizing it.
    #[must_use]
    pub fn with_ids(mut self, kind: ResourceKind, ids: Vec<String>) -> Self {
        let ids = canonical_ids(Some(ids));
        match kind {
            ResourceKind::Bucket => self.bucket_ids = ids,
            ResourceKind::Tag => self.tag_ids = ids,
            ResourceKind::Assignee => self.assignee_ids = ids,
        }
        self
    }

    /// Remove one id from the list of the given kind. An emptied list becomes absent.
    #[must_use]
    pub fn without_id(self, kind: ResourceKind, id: &str) -> Self {
        let remaining = self
            .ids(kind)
            .iter()
            .filter(|existing| existing.as_str() != id)
            .cloned()
            .collect();
        self.with_ids(kind, remaining)
    }

    /// JSON object stored in the `params` column.
    pub fn to_json(&self) -> AppResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| AppError::Internal(e.to_string()))
    }

    /// Read params back from the `params` column.
    pub fn from_json(value: serde_json::Value) -> AppResult<Self> {
        serde_json::from_value::<Self>(value)
            .map(Self::without_defaults)
            .map_err(|e| AppError::Internal(format!("Malformed filter params: {e}")))
    }
}

/// Params exported from a filter for links and forms.
///
/// Id lists come from the live relations. Submitting these params again
/// resolves to the same filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterParamsOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_by: Option<IndexedBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignments: Option<Assignments>,
    pub bucket_ids: Vec<String>,
    pub assignee_ids: Vec<String>,
    pub tag_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_id: Option<String>,
}

impl From<FilterParamsOut> for RawFilterParams {
    fn from(params: FilterParamsOut) -> Self {
        Self {
            indexed_by: params.indexed_by,
            assignments: params.assignments,
            bucket_ids: Some(params.bucket_ids),
            tag_ids: Some(params.tag_ids),
            assignee_ids: Some(params.assignee_ids),
            filter_id: params.filter_id,
        }
    }
}

fn canonical_ids(ids: Option<Vec<String>>) -> Option<Vec<String>> {
    let mut ids: Vec<String> = ids?
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    (!ids.is_empty()).then_some(ids)
}
