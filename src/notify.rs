//! Change notification.
//!
//! [`ChangeNotifier`] wakes every task currently waiting on it, once per
//! raise. Nothing is stored for tasks that start waiting afterwards. Each
//! raise also bumps a version counter, so a consumer that remembers the
//! last version it handled can wait for "anything newer" and never miss a
//! change that happened while it was busy.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;

/// Edge-triggered broadcast wake signal with a version counter.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    notify: Notify,
    version: AtomicU64,
}

impl ChangeNotifier {
    /// Create a notifier at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump the version and wake all current waiters.
    pub fn raise(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Wait for the next raise.
    ///
    /// Raises that happened before the call are not seen.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Wait until the version differs from `seen` and return the new version.
    ///
    /// Returns immediately if it already differs. Cancel-safe: dropping the
    /// future leaves no registration behind.
    pub async fn changed_since(&self, seen: u64) -> u64 {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before reading the version so a raise in between is not lost
            notified.as_mut().enable();

            let current = self.version();
            if current != seen {
                return current;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_wakes_every_waiter() {
        let notifier = Arc::new(ChangeNotifier::new());
        let mut waiters = Vec::new();
        for _ in 0..3 {
            let notifier = notifier.clone();
            waiters.push(tokio::spawn(async move { notifier.wait().await }));
        }
        // Let the waiters register
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        notifier.raise();
        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter was not woken")
                .unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_raise_is_not_stored() {
        let notifier = ChangeNotifier::new();
        notifier.raise();
        let late = tokio::time::timeout(Duration::from_secs(1), notifier.wait()).await;
        assert!(late.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_since() {
        let notifier = Arc::new(ChangeNotifier::new());
        assert_eq!(notifier.version(), 0);

        // Already newer: returns at once
        notifier.raise();
        assert_eq!(notifier.changed_since(0).await, 1);

        // Up to date: waits for the next raise
        let pending = tokio::time::timeout(Duration::from_secs(1), notifier.changed_since(1)).await;
        assert!(pending.is_err());

        let waiter = {
            let notifier = notifier.clone();
            tokio::spawn(async move { notifier.changed_since(1).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        notifier.raise();
        assert_eq!(waiter.await.unwrap(), 2);
    }
}
