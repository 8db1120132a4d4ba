//! Protection for remote calls: admission control, retry, and memoization.

pub mod cached;
pub mod fingerprint;
pub mod rate_limit;
pub mod retry;

pub use cached::ResilientCache;
pub use fingerprint::{fingerprint, CallArgs};
pub use rate_limit::{RateLimiter, TokenBucket};
pub use retry::RetryPolicy;
