//! Database entities.
//!
//! The `filter*` entities hold saved bubble filters; the rest are the records
//! a filter references and selects from.

pub mod assignment;
pub mod bubble;
pub mod bucket;
pub mod bucket_access;
pub mod filter;
pub mod filter_assignee;
pub mod filter_bucket;
pub mod filter_tag;
pub mod tag;
pub mod tagging;
pub mod user;

pub use assignment::Entity as Assignment;
pub use bubble::Entity as Bubble;
pub use bucket::Entity as Bucket;
pub use bucket_access::Entity as BucketAccess;
pub use filter::Entity as Filter;
pub use filter_assignee::Entity as FilterAssignee;
pub use filter_bucket::Entity as FilterBucket;
pub use filter_tag::Entity as FilterTag;
pub use tag::Entity as Tag;
pub use tagging::Entity as Tagging;
pub use user::Entity as User;
