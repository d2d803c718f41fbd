//! The rate-limited operation the queue serializes

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// One slow, possibly failing unit of external work
///
/// The worker calls `process` for exactly one job at a time. Any retries or
/// credential refresh happen inside the implementation before it returns.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    type Payload: Clone + Send + Sync + 'static;
    type Output: Clone + Send + Sync + 'static;

    async fn process(&self, payload: Self::Payload) -> Result<Self::Output>;
}

/// Puts an upper bound on each call to the inner processor
///
/// A call that runs past the deadline counts as an ordinary job failure.
pub struct Deadline<P> {
    inner: P,
    limit: Duration,
}

impl<P: Processor> Deadline<P> {
    pub fn new(inner: P, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<P: Processor> Processor for Deadline<P> {
    type Payload = P::Payload;
    type Output = P::Output;

    async fn process(&self, payload: Self::Payload) -> Result<Self::Output> {
        match tokio::time::timeout(self.limit, self.inner.process(payload)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Processor exceeded deadline of {:?}", self.limit);
                Err(anyhow!("processing timed out after {:?}", self.limit))
            }
        }
    }
}
