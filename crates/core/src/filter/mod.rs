//! Filters: saved, deduplicated bubble queries.

mod bubbles;
mod entity;
#[cfg(any(test, feature = "test-utils"))]
mod memory;
mod params;
mod store;

pub use bubbles::{BubblePipeline, BubbleQuery, BubbleScope, BubbleSource};
pub use entity::{BucketVersion, Filter, FilterRelations, NewFilter, ReferenceRemoval};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryFilterStore;
pub use params::{FilterParams, FilterParamsOut, KNOWN_PARAMS, MAX_IDS_PER_LIST, RawFilterParams};
pub use store::{FilterStore, ResourceScope};
