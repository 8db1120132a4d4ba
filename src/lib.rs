#![forbid(unsafe_code)]

//! Recipe orchestration with rate-limited, cached model calls and a
//! human-in-the-loop job bridge served over HTTP polling.

pub mod agents;
pub mod apis;
pub mod bridge;
pub mod concurrency;
pub mod config;
pub mod environment;
pub mod errors;
pub mod mode;
pub mod models;
pub mod persistence;
pub mod recipes;
pub mod resilience;
pub mod web;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
