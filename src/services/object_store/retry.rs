//! Timeout + bounded retry decorator for any [`ObjectStore`].

use super::{ObjectStore, ObjectStoreError, ObjectStoreResult};
use async_trait::async_trait;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_backoff: Duration,
    /// Upper bound for a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(200),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, retry: u32) -> Duration {
        self.base_backoff.saturating_mul(1u32 << retry.min(16))
    }
}

pub struct RetryingObjectStore {
    inner: Arc<dyn ObjectStore>,
    policy: RetryPolicy,
}

impl RetryingObjectStore {
    pub fn new(inner: Arc<dyn ObjectStore>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn run<T, F, Fut>(&self, op: &'static str, name: &str, mut attempt: F) -> ObjectStoreResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = ObjectStoreResult<T>> + Send,
        T: Send,
    {
        let mut retry = 0;
        loop {
            let result = match tokio::time::timeout(self.policy.attempt_timeout, attempt()).await {
                Ok(result) => result,
                Err(_) => Err(ObjectStoreError::Timeout(self.policy.attempt_timeout)),
            };

            match result {
                Err(err) if err.is_transient() && retry < self.policy.max_retries => {
                    let delay = self.policy.backoff(retry);
                    warn!(
                        op,
                        object = name,
                        attempt = retry + 1,
                        ?delay,
                        error = %err,
                        "object store call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl ObjectStore for RetryingObjectStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> ObjectStoreResult<()> {
        self.run("put", name, || self.inner.put(name, bytes)).await
    }

    async fn get(&self, name: &str) -> ObjectStoreResult<Vec<u8>> {
        self.run("get", name, || self.inner.get(name)).await
    }

    async fn delete(&self, name: &str) -> ObjectStoreResult<()> {
        self.run("delete", name, || self.inner.delete(name)).await
    }

    async fn check(&self) -> ObjectStoreResult<()> {
        self.run("check", "", || self.inner.check()).await
    }
}
