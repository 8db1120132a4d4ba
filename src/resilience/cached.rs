//! Single-flight, disk-persisted memoization with retry.
//!
//! [`ResilientCache::call`] looks the call's fingerprint up in the
//! durable store, and on a miss runs the operation under the retry
//! policy and stores the result. Concurrent callers with the same
//! fingerprint share one execution and observe the same outcome.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::fingerprint::{fingerprint, CallArgs};
use super::retry::RetryPolicy;
use crate::persistence::CacheStore;
use crate::{AppError, Result};

type InFlight = Shared<BoxFuture<'static, Result<Value>>>;

/// Memoizing wrapper shared by every cached remote operation.
#[derive(Clone)]
pub struct ResilientCache {
    store: CacheStore,
    retry: RetryPolicy,
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
}

impl ResilientCache {
    /// Wrap calls with `store` for durability and `retry` for transient
    /// failures.
    #[must_use]
    pub fn new(store: CacheStore, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Durable store backing this cache.
    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Retry policy applied on cache misses.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of fingerprints currently executing.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight().len()
    }

    /// Return the stored result for (`operation`, `args`), or run `call`
    /// (retrying transient failures) and store what it returns.
    ///
    /// `call` is only invoked when no stored result exists and no other
    /// caller is already executing the same fingerprint.
    ///
    /// # Errors
    ///
    /// Returns the operation's error (shared with every concurrent waiter),
    /// `AppError::Db` if the store lookup fails, or `AppError::BadRequest`
    /// if the stored value does not decode as `T`.
    pub async fn call<T, F, Fut>(&self, operation: &str, args: &CallArgs, call: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let key = fingerprint(operation, args);

        let flight = {
            let mut in_flight = self.in_flight();
            if let Some(existing) = in_flight.get(&key) {
                debug!(operation, fingerprint = %key, "joining in-flight call");
                existing.clone()
            } else {
                let flight = self.execute(operation.to_owned(), key.clone(), call);
                in_flight.insert(key.clone(), flight.clone());
                flight
            }
        };

        let outcome = flight.clone().await;

        {
            let mut in_flight = self.in_flight();
            if in_flight
                .get(&key)
                .is_some_and(|current| current.ptr_eq(&flight))
            {
                in_flight.remove(&key);
            }
        }

        let value = outcome?;
        serde_json::from_value(value).map_err(|err| {
            AppError::BadRequest(format!("cached value for {operation} has wrong shape: {err}"))
        })
    }

    fn execute<T, F, Fut>(&self, operation: String, key: String, call: F) -> InFlight
    where
        T: Serialize + Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let store = self.store.clone();
        let retry = self.retry;

        async move {
            if let Some(entry) = store.get(&key).await? {
                debug!(operation = %operation, fingerprint = %key, "cache hit");
                return Ok(entry.value);
            }
            debug!(operation = %operation, fingerprint = %key, "cache miss");

            let result = retry.retry(&operation, call).await?;
            let value = serde_json::to_value(result)?;
            if let Err(err) = store.put(&key, &operation, &value).await {
                warn!(operation = %operation, %err, "failed to persist cached result");
            }
            Ok(value)
        }
        .boxed()
        .shared()
    }
}
