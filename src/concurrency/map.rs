//! Order-preserving map with a bound on in-flight calls.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::stream::{self, StreamExt, TryStreamExt};

use crate::Result;

/// Completion count reported after each unit finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Units finished so far.
    pub completed: usize,
    /// Units in the whole run.
    pub total: usize,
}

/// Apply `op` to every input with at most `limit` calls in flight.
///
/// Outputs are in input order whatever the completion order. A `limit` of
/// zero is treated as one.
///
/// # Errors
///
/// Returns the first error in input order; no new inputs are started
/// once it has been observed.
pub async fn map_async<I, T, U, F, Fut>(inputs: I, limit: usize, op: F) -> Result<Vec<U>>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<U>>,
{
    stream::iter(inputs)
        .map(op)
        .buffered(limit.max(1))
        .try_collect()
        .await
}

/// [`map_async`] that calls `on_progress` whenever a unit completes.
///
/// Progress is reported in completion order, not input order.
///
/// # Errors
///
/// Same as [`map_async`].
pub async fn map_async_with_progress<T, U, F, Fut, P>(
    inputs: Vec<T>,
    limit: usize,
    mut op: F,
    on_progress: P,
) -> Result<Vec<U>>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<U>>,
    P: Fn(Progress),
{
    let total = inputs.len();
    let completed = AtomicUsize::new(0);
    let completed = &completed;
    let on_progress = &on_progress;

    map_async(inputs, limit, |input| {
        let call = op(input);
        async move {
            let output = call.await;
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            on_progress(Progress {
                completed: done,
                total,
            });
            output
        }
    })
    .await
}
