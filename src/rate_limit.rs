//! Token-bucket admission control shared by every connection of a server.
//!
//! The bucket is a [`leaky_bucket::RateLimiter`] that starts full, holds at
//! most `capacity` tokens and regains one token every `1 / rate` seconds.
//! Refill and withdrawal happen inside the limiter's own critical section,
//! so concurrent connection loops never observe a refilled-but-not-yet-
//! decremented bucket.
//!
//! An unconfigured [`RateLimit`] admits everything.

use std::{fmt, time::Duration};

use leaky_bucket::RateLimiter;
use thiserror::Error;

use crate::config::ConfigError;

/// Rejection raised when the bucket has no token left.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("rate limit exceeded")]
pub struct RateLimitExceeded;

/// Optional token bucket guarding dispatch.
///
/// # Examples
///
/// ```
/// use framerpc::rate_limit::RateLimit;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limit = RateLimit::new(1.0, 2).expect("valid limit");
/// assert!(limit.try_acquire().is_ok());
/// assert!(limit.try_acquire().is_ok());
/// assert!(limit.try_acquire().is_err());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RateLimit {
    bucket: Option<Bucket>,
}

struct Bucket {
    limiter: RateLimiter,
    rate: f64,
    capacity: usize,
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("rate", &self.rate)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl RateLimit {
    /// A limit that admits every request.
    #[must_use]
    pub fn disabled() -> Self { Self::default() }

    /// Build a bucket refilling `rate` tokens per second up to `capacity`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRate`] unless `rate` is finite and
    /// positive, and [`ConfigError::ZeroCapacity`] for a zero capacity.
    pub fn new(rate: f64, capacity: usize) -> Result<Self, ConfigError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::InvalidRate(rate));
        }
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        let interval = Duration::from_secs_f64(1.0 / rate).max(Duration::from_nanos(1));
        let limiter = RateLimiter::builder()
            .initial(capacity)
            .max(capacity)
            .refill(1)
            .interval(interval)
            .build();
        Ok(Self {
            bucket: Some(Bucket {
                limiter,
                rate,
                capacity,
            }),
        })
    }

    /// Whether a bucket is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool { self.bucket.is_some() }

    /// Configured `(rate, capacity)`, if any.
    #[must_use]
    pub fn settings(&self) -> Option<(f64, usize)> {
        self.bucket
            .as_ref()
            .map(|bucket| (bucket.rate, bucket.capacity))
    }

    /// Take one token without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitExceeded`] when the bucket is empty.
    pub fn try_acquire(&self) -> Result<(), RateLimitExceeded> {
        match &self.bucket {
            None => Ok(()),
            Some(bucket) if bucket.limiter.try_acquire(1) => Ok(()),
            Some(_) => Err(RateLimitExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use rstest::rstest;
    use tokio::time::{self, Duration};

    use super::*;

    #[test]
    fn disabled_limit_always_admits() {
        let limit = RateLimit::disabled();
        assert!(!limit.is_enabled());
        assert_eq!(limit.settings(), None);
        assert!((0..10_000).all(|_| limit.try_acquire().is_ok()));
    }

    #[rstest]
    #[case(0.0, 1, ConfigError::InvalidRate(0.0))]
    #[case(-1.0, 1, ConfigError::InvalidRate(-1.0))]
    #[case(1.0, 0, ConfigError::ZeroCapacity)]
    fn invalid_settings_are_rejected(
        #[case] rate: f64,
        #[case] capacity: usize,
        #[case] expected: ConfigError,
    ) {
        let err = RateLimit::new(rate, capacity).expect_err("settings must be rejected");
        assert_eq!(err, expected);
    }

    #[test]
    fn non_finite_rate_is_rejected() {
        assert!(matches!(
            RateLimit::new(f64::NAN, 1),
            Err(ConfigError::InvalidRate(_))
        ));
    }

    #[rstest]
    #[case(2.0, 3)]
    #[case(10.0, 5)]
    #[tokio::test(start_paused = true)]
    async fn burst_is_capped_and_refills_one_token_per_interval(
        #[case] rate: f64,
        #[case] capacity: usize,
    ) {
        let limit = RateLimit::new(rate, capacity).expect("valid limit");
        assert_eq!(limit.settings(), Some((rate, capacity)));
        for _ in 0..capacity {
            limit.try_acquire().expect("burst within capacity");
        }
        assert_eq!(limit.try_acquire(), Err(RateLimitExceeded));

        time::advance(Duration::from_secs_f64(1.0 / rate) + Duration::from_millis(1)).await;
        assert!(limit.try_acquire().is_ok(), "one token after one interval");
        assert_eq!(limit.try_acquire(), Err(RateLimitExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn refill_never_exceeds_capacity() {
        let limit = RateLimit::new(100.0, 2).expect("valid limit");
        time::advance(Duration::from_secs(5)).await;
        assert!(limit.try_acquire().is_ok());
        assert!(limit.try_acquire().is_ok());
        assert!(limit.try_acquire().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acquisitions_never_overdraw() {
        let limit = Arc::new(RateLimit::new(0.001, 50).expect("valid limit"));
        let admitted = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let limit = Arc::clone(&limit);
            let admitted = Arc::clone(&admitted);
            tasks.push(tokio::spawn(async move {
                for _ in 0..25 {
                    if limit.try_acquire().is_ok() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.expect("task panicked");
        }
        assert_eq!(admitted.load(Ordering::SeqCst), 50);
    }
}
