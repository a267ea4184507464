//! Core business logic for bubbles: filters over bubble queries.

pub mod filter;
pub mod services;

pub use filter::{Filter, FilterParams, RawFilterParams};
pub use services::FilterService;
