//! Database repositories.

pub mod bubble;
pub mod filter;
pub mod resource;

pub use bubble::{BubbleRepository, BubbleSelect};
pub use filter::{CreateFilterInput, FilterRelationIds, FilterRepository};
pub use resource::ResourceRepository;
