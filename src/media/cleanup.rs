//! Background deletion of media that is no longer referenced.
//!
//! `schedule` only enqueues; a worker task retries each delete with
//! exponential backoff and counts the ones that never succeed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::MediaRelay;

const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct CleanupQueue {
    tx: mpsc::UnboundedSender<String>,
    failures: Arc<AtomicU64>,
}

impl CleanupQueue {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn start(relay: Arc<dyn MediaRelay>, max_attempts: u32) -> Self {
        Self::with_backoff(relay, max_attempts, DEFAULT_BACKOFF)
    }

    pub fn with_backoff(relay: Arc<dyn MediaRelay>, max_attempts: u32, base: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let failures = Arc::new(AtomicU64::new(0));
        let max_attempts = max_attempts.max(1);

        let counter = failures.clone();
        tokio::spawn(async move {
            while let Some(url) = rx.recv().await {
                let relay = relay.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    if !delete_with_retry(relay.as_ref(), &url, max_attempts, base).await {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
            tracing::debug!("Media cleanup queue closed");
        });

        Self { tx, failures }
    }

    /// Queue a URL for deletion. Empty URLs are ignored.
    pub fn schedule(&self, url: impl Into<String>) {
        let url = url.into();
        if url.is_empty() {
            return;
        }
        if self.tx.send(url.clone()).is_err() {
            tracing::warn!("Media cleanup worker stopped; dropping {}", url);
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn schedule_all<I>(&self, urls: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for url in urls {
            self.schedule(url);
        }
    }

    /// Deletes that were given up on since startup.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        .min(MAX_BACKOFF)
}

async fn delete_with_retry(
    relay: &dyn MediaRelay,
    url: &str,
    max_attempts: u32,
    base: Duration,
) -> bool {
    let Some(path) = relay.path_from_url(url) else {
        tracing::debug!("Skipping cleanup of foreign media URL {}", url);
        return true;
    };

    for attempt in 1..=max_attempts {
        match relay.remove(&path).await {
            Ok(()) => {
                tracing::info!("Media deleted: {}", path);
                return true;
            }
            Err(e) => {
                tracing::warn!(
                    "Media delete failed for {} (attempt {}/{}): {}",
                    path,
                    attempt,
                    max_attempts,
                    e
                );
                if attempt < max_attempts {
                    tokio::time::sleep(backoff(base, attempt)).await;
                }
            }
        }
    }

    tracing::error!(
        "Giving up on deleting {} after {} attempts",
        path,
        max_attempts
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::memory::MemoryRelay;
    use bytes::Bytes;

    async fn wait_for(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff(base, 1), Duration::from_millis(100));
        assert_eq!(backoff(base, 3), Duration::from_millis(400));
        assert_eq!(backoff(base, 40), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_scheduled_url_is_deleted() {
        let relay = Arc::new(MemoryRelay::new());
        let url = relay
            .put("blog_images/a.png", "image/png", Bytes::from_static(b"x"))
            .await
            .unwrap();
        let queue = CleanupQueue::with_backoff(relay.clone(), 3, Duration::from_millis(1));

        queue.schedule(url);
        wait_for(|| relay.len() == 0).await;
        assert_eq!(relay.len(), 0);
        assert_eq!(queue.failures(), 0);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_counted() {
        let relay = Arc::new(MemoryRelay::new());
        let url = relay
            .put("blog_images/a.png", "image/png", Bytes::from_static(b"x"))
            .await
            .unwrap();
        relay.set_fail_removes(true);
        let queue = CleanupQueue::with_backoff(relay.clone(), 2, Duration::from_millis(1));

        queue.schedule(url);
        wait_for(|| queue.failures() == 1).await;
        assert_eq!(queue.failures(), 1);
        assert_eq!(relay.len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_urls_are_ignored() {
        let relay = Arc::new(MemoryRelay::new());
        let queue = CleanupQueue::with_backoff(relay, 1, Duration::from_millis(1));
        queue.schedule("https://elsewhere.test/x.png");
        queue.schedule("");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.failures(), 0);
    }
}
