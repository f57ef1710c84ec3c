//! Bounded concurrent request batches.
//!
//! Every aggregation step issues a group of independent upstream requests
//! and merges whatever comes back. A batch runs at most `limit` requests at
//! once under one deadline; members that fail or miss the deadline are
//! reported, never propagated.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult, FetchFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    limit: usize,
    timeout: Duration,
}

/// What a batch produced: values in input order, plus the members that failed.
#[derive(Debug)]
pub struct Batch<T> {
    pub items: Vec<T>,
    pub failures: Vec<FetchFailure>,
    pub attempted: usize,
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self { items: Vec::new(), failures: Vec::new(), attempted: 0 }
    }
}

impl<T> Batch<T> {
    /// At least one member ran and none succeeded.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failures.len() == self.attempted
    }
}

impl FanOut {
    pub fn new(limit: usize, timeout: Duration) -> Self {
        Self { limit: limit.max(1), timeout }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run<I, T, F, Fut>(&self, label: &str, inputs: I, mut f: F) -> Batch<T>
    where
        I: IntoIterator,
        I::Item: Debug,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = CatalogResult<T>>,
    {
        let deadline = Instant::now() + self.timeout;
        let results: Vec<(String, CatalogResult<T>)> = stream::iter(inputs)
            .map(|input| {
                let member = format!("{input:?}");
                let fut = f(input);
                async move {
                    let res = match timeout_at(deadline, fut).await {
                        Ok(res) => res,
                        Err(_) => Err(CatalogError::Timeout),
                    };
                    (member, res)
                }
            })
            .buffered(self.limit)
            .collect()
            .await;

        let mut batch = Batch { attempted: results.len(), ..Batch::default() };
        for (member, res) in results {
            match res {
                Ok(v) => batch.items.push(v),
                Err(error) => {
                    warn!(batch = label, member = %member, error = %error, "request failed");
                    batch.failures.push(FetchFailure { batch: label.to_string(), member, error });
                }
            }
        }
        if batch.all_failed() {
            warn!(batch = label, attempted = batch.attempted, "every request in batch failed");
        } else {
            debug!(batch = label, ok = batch.items.len(), failed = batch.failures.len(), "batch finished");
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn failures_do_not_abort_the_batch() {
        let fan = FanOut::new(4, Duration::from_secs(5));
        let batch = fan
            .run("ids", [1u64, 2, 3], |id| async move {
                if id == 2 {
                    Err(CatalogError::NotFound(format!("movie/{id}")))
                } else {
                    Ok(id * 10)
                }
            })
            .await;
        assert_eq!(batch.items, vec![10, 30]);
        assert_eq!(batch.attempted, 3);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].member, "2");
        assert!(batch.failures[0].error.is_not_found());
        assert!(!batch.all_failed());
    }

    #[tokio::test]
    async fn keeps_input_order() {
        let fan = FanOut::new(3, Duration::from_secs(5));
        let batch = fan
            .run("order", [30u64, 10, 20], |ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(ms)
            })
            .await;
        assert_eq!(batch.items, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn never_exceeds_the_limit() {
        let fan = FanOut::new(2, Duration::from_secs(5));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let batch = fan
            .run("limit", 0..8u32, |_| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        assert_eq!(batch.items.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn slow_members_time_out() {
        let fan = FanOut::new(4, Duration::from_millis(50));
        let batch = fan
            .run("slow", [0u64, 10_000], |ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(ms)
            })
            .await;
        assert_eq!(batch.items, vec![0]);
        assert!(matches!(batch.failures[0].error, CatalogError::Timeout));
    }

    #[tokio::test]
    async fn all_failed_needs_an_attempt() {
        let fan = FanOut::new(1, Duration::from_secs(1));
        let empty: Batch<()> = fan.run("none", Vec::<u8>::new(), |_| async { Ok(()) }).await;
        assert!(!empty.all_failed());
        let failed: Batch<()> = fan
            .run("bad", [1u8], |_| async { Err(CatalogError::Transport("reset".into())) })
            .await;
        assert!(failed.all_failed());
    }
}
