//! Human-in-the-loop job bridge.
//!
//! Suspended recipe code and a remote, independently polling client meet
//! here. Jobs are answered strictly in the order they were asked.

pub mod queue;
pub mod registry;
pub mod session;

pub use queue::{OrderedQueue, PendingJob};
pub use registry::{LaunchFuture, SessionLauncher, SessionRegistry};
pub use session::{JobTicket, Session};
