//! Concurrency helpers used by recipe code.

pub mod map;
pub mod select;

pub use map::{map_async, map_async_with_progress, Progress};
pub use select::{estimated_comparisons, nsmallest_async};
