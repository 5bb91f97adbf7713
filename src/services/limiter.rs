// src/services/limiter.rs

//! Global pacing for provider calls.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Fixed-interval gate shared by every caller of one provider client.
///
/// At most one call holds a [`Permit`] at a time, and a new permit is only
/// handed out once `interval` has passed since the previous permit was
/// released. The quota is therefore global to the client, not per tile or
/// per task.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

/// Exclusive right to issue one provider call.
///
/// Dropping the permit marks the end of the call.
#[derive(Debug)]
pub struct Permit<'a> {
    last_release: MutexGuard<'a, Option<Instant>>,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        *self.last_release = Some(Instant::now());
    }
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_release: Mutex::new(None),
        }
    }

    /// Wait until the next call may start.
    pub async fn acquire(&self) -> Permit<'_> {
        let last_release = self.last_release.lock().await;
        if let Some(released) = *last_release {
            tokio::time::sleep_until(released + self.interval).await;
        }
        Permit { last_release }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        let start = Instant::now();
        drop(limiter.acquire().await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        let start = Instant::now();
        for _ in 0..3 {
            drop(limiter.acquire().await);
        }
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_counts_from_end_of_call() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        let start = Instant::now();
        {
            let _permit = limiter.acquire().await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        drop(limiter.acquire().await);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_across_tasks() {
        let limiter = std::sync::Arc::new(RateLimiter::new(Duration::from_secs(2)));
        let start = Instant::now();
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let limiter = std::sync::Arc::clone(&limiter);
                tokio::spawn(async move { drop(limiter.acquire().await) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_secs(6));
    }
}
