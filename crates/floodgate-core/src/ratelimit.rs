//! Byte-throughput limiting for blob sinks.
//!
//! `with_rate_limit` decorates a [`BlobSink`] so that every writer it creates
//! is throttled to a fixed number of bytes per second. Writes go to the inner
//! sink first; the caller is then held until the token bucket has paid for
//! the accepted bytes.
//!
//! Each writer gets its own bucket, pre-charged with its full burst so the
//! first byte is already throttled.

use async_trait::async_trait;
use std::num::NonZeroU64;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::emit;
use crate::error::StorageError;
use crate::metrics::events::{RateLimitWait, RateLimitWaitCancelled};
use crate::storage::{BlobSink, BlobWriter};

/// Bucket capacity in tokens (bytes).
///
/// Only bounds timer granularity; writers start with an empty bucket.
pub const BURST_LIMIT: u64 = 1_000_000_000;

/// Token bucket refilled continuously at `rate` tokens per second.
///
/// The balance may go negative through [`TokenBucket::reserve_n`]; the debt is
/// the time the caller has to wait.
#[derive(Debug)]
pub struct TokenBucket {
    /// Tokens added per second.
    rate: f64,
    /// Maximum tokens the bucket can hold.
    burst: f64,
    /// Current balance.
    tokens: f64,
    /// Last time the balance was brought up to date.
    last: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(rate: NonZeroU64, burst: u64) -> Self {
        Self {
            rate: rate.get() as f64,
            burst: burst as f64,
            tokens: burst as f64,
            last: Instant::now(),
        }
    }

    /// Balance at `now`, without updating state.
    ///
    /// A `now` earlier than the last update counts as no elapsed time.
    pub fn tokens_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        (self.tokens + elapsed * self.rate).min(self.burst)
    }

    fn advance(&mut self, now: Instant) -> f64 {
        let tokens = self.tokens_at(now);
        self.last = self.last.max(now);
        tokens
    }

    /// Consume `n` tokens if they are available at `now`.
    pub fn allow_n(&mut self, now: Instant, n: u64) -> bool {
        let tokens = self.advance(now);
        if tokens >= n as f64 {
            self.tokens = tokens - n as f64;
            true
        } else {
            self.tokens = tokens;
            false
        }
    }

    /// Consume `n` tokens unconditionally and return the delay until the
    /// balance is non-negative again.
    pub fn reserve_n(&mut self, now: Instant, n: u64) -> Duration {
        self.tokens = self.advance(now) - n as f64;
        if self.tokens >= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(-self.tokens / self.rate).unwrap_or(Duration::MAX)
    }

    /// Reserve `n` tokens and sleep until they are paid for.
    ///
    /// Returns the time waited. A cancelled wait keeps the reservation: the
    /// bytes it accounts for were already sent.
    pub async fn wait_n(
        &mut self,
        n: u64,
        cancel: &CancellationToken,
    ) -> Result<Duration, WaitCancelled> {
        let delay = self.reserve_n(Instant::now(), n);
        if delay.is_zero() {
            return Ok(delay);
        }

        match cancel
            .run_until_cancelled(tokio::time::sleep(delay))
            .await
        {
            Some(()) => Ok(delay),
            None => Err(WaitCancelled),
        }
    }
}

/// Marker returned when a [`TokenBucket::wait_n`] is interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitCancelled;

/// Wrap `inner` so every created writer is limited to `bytes_per_sec`.
///
/// A limit of zero disables throttling and hands back `inner` itself.
pub fn with_rate_limit(inner: Box<dyn BlobSink>, bytes_per_sec: u64) -> Box<dyn BlobSink> {
    match NonZeroU64::new(bytes_per_sec) {
        Some(rate) => Box::new(RateLimitedSink { inner, rate }),
        None => inner,
    }
}

/// Sink decorator creating [`RateLimitedWriter`]s.
pub struct RateLimitedSink {
    inner: Box<dyn BlobSink>,
    rate: NonZeroU64,
}

#[async_trait]
impl BlobSink for RateLimitedSink {
    async fn create(&self, name: &str) -> Result<Box<dyn BlobWriter>, StorageError> {
        let inner = self.inner.create(name).await?;
        Ok(Box::new(RateLimitedWriter::new(name, inner, self.rate)))
    }
}

/// Writer that charges every accepted byte against a token bucket.
pub struct RateLimitedWriter {
    name: String,
    inner: Box<dyn BlobWriter>,
    limiter: TokenBucket,
}

impl RateLimitedWriter {
    /// Wrap `inner`, draining the new bucket's burst up front.
    pub fn new(name: &str, inner: Box<dyn BlobWriter>, rate: NonZeroU64) -> Self {
        let mut limiter = TokenBucket::new(rate, BURST_LIMIT);
        limiter.allow_n(Instant::now(), BURST_LIMIT);

        debug!(blob = %name, bytes_per_sec = rate.get(), "Rate limiting blob writer");
        Self {
            name: name.to_string(),
            inner,
            limiter,
        }
    }
}

#[async_trait]
impl BlobWriter for RateLimitedWriter {
    async fn write(
        &mut self,
        cancel: &CancellationToken,
        buf: &[u8],
    ) -> Result<usize, StorageError> {
        let written = self.inner.write(cancel, buf).await?;

        match self.limiter.wait_n(written as u64, cancel).await {
            Ok(waited) => {
                if !waited.is_zero() {
                    emit!(RateLimitWait { duration: waited });
                }
                Ok(written)
            }
            Err(WaitCancelled) => {
                emit!(RateLimitWaitCancelled);
                Err(StorageError::WaitCancelled {
                    name: self.name.clone(),
                    written,
                })
            }
        }
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        self.inner.close().await
    }

    async fn abort(&mut self) -> Result<(), StorageError> {
        self.inner.abort().await
    }
}
