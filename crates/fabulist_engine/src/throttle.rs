//! Provider wrapper enforcing request-rate and concurrency limits.
//!
//! Requests per minute go through a GCRA limiter from `governor`; calls in
//! flight are capped with a Tokio `Semaphore`.

use crate::ProviderLimits;
use async_trait::async_trait;
use fabulist_error::{FabulistResult, ProviderError, ProviderErrorKind};
use fabulist_interface::{GenerationProvider, GenerationRequest};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// A [`GenerationProvider`] that waits for quota before every call.
///
/// # Example
///
/// ```rust,ignore
/// use fabulist_engine::{ProviderLimits, ThrottledProvider};
///
/// let limits = ProviderLimits { requests_per_minute: Some(30), max_concurrent: Some(2) };
/// let provider = ThrottledProvider::new(my_provider, limits);
/// ```
#[derive(Clone)]
pub struct ThrottledProvider<P> {
    inner: P,
    rpm_limiter: Option<Arc<DirectRateLimiter>>,
    concurrent: Option<Arc<Semaphore>>,
}

impl<P: GenerationProvider> ThrottledProvider<P> {
    /// Wrap `inner` with the given limits. Unset limits are not enforced.
    pub fn new(inner: P, limits: ProviderLimits) -> Self {
        let rpm_limiter = limits.requests_per_minute.and_then(|rpm| {
            NonZeroU32::new(rpm).map(|n| Arc::new(RateLimiter::direct(Quota::per_minute(n))))
        });
        let concurrent = limits
            .max_concurrent
            .map(|n| Arc::new(Semaphore::new(n.max(1) as usize)));

        tracing::debug!(
            provider = inner.provider_name(),
            requests_per_minute = ?limits.requests_per_minute,
            max_concurrent = ?limits.max_concurrent,
            "Throttling provider"
        );

        Self {
            inner,
            rpm_limiter,
            concurrent,
        }
    }

    /// Get a reference to the wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    async fn acquire(&self) -> FabulistResult<Option<OwnedSemaphorePermit>> {
        if let Some(limiter) = &self.rpm_limiter {
            limiter.until_ready().await;
        }
        match &self.concurrent {
            Some(semaphore) => {
                let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
                    ProviderError::new(ProviderErrorKind::Request(format!(
                        "Throttle closed: {}",
                        e
                    )))
                })?;
                Ok(Some(permit))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<P: GenerationProvider> GenerationProvider for ThrottledProvider<P> {
    async fn generate_text(&self, request: &GenerationRequest) -> FabulistResult<String> {
        let _permit = self.acquire().await?;
        self.inner.generate_text(request).await
    }

    async fn generate_images(&self, request: &GenerationRequest) -> FabulistResult<Vec<String>> {
        let _permit = self.acquire().await?;
        self.inner.generate_images(request).await
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
