//! Business logic services.

pub mod filter;

pub use filter::FilterService;
