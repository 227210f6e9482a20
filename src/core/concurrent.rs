//! core::concurrent
//!
//! Single-flight coordination for async actions.
//!
//! # Overview
//!
//! Several logical callers (views, CLI tasks) may notice an expired access
//! token at the same moment and each ask for a refresh. Refresh tokens and
//! agent cookies rotate on every use, so only one refresh may be sent.
//! [`ConcurrentActionHandler`] runs the action for the first caller of a
//! round and hands the same outcome to everyone who joined that round.
//!
//! # Rounds
//!
//! - The first registration of a round (pending count 0 -> 1) runs its action.
//! - Callers arriving while it runs only wait; their actions are never run.
//! - When the action settles, every waiter receives a clone of the outcome in
//!   registration order and the round is cleared.
//! - The next call after that starts a fresh round.
//!
//! If the leading future is dropped before its action settles, the round is
//! abandoned. Waiters see their slot close and start a new round with their
//! own action, so nobody waits on a result that will never arrive.
//!
//! # Example
//!
//! ```
//! use oauth_agent_client::core::concurrent::ConcurrentActionHandler;
//!
//! # tokio_test::block_on(async {
//! let handler: ConcurrentActionHandler<String> = ConcurrentActionHandler::new();
//! let result = handler.execute(|| async { Ok(()) }).await;
//! assert!(result.is_ok());
//! # });
//! ```

use std::future::Future;
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

/// A completion slot for one caller of the current round.
type Waiter<E> = oneshot::Sender<Result<(), E>>;

/// Runs an async action once per round of concurrent callers.
///
/// The error type must be `Clone` so that every caller in a round can be
/// handed the same failure.
pub struct ConcurrentActionHandler<E> {
    waiters: Mutex<Vec<Waiter<E>>>,
}

impl<E: Clone> ConcurrentActionHandler<E> {
    /// Create a handler with no round in progress.
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(Vec::new()),
        }
    }

    /// Run `action` unless a round is already in flight, then return the
    /// round's shared outcome.
    ///
    /// # Errors
    ///
    /// Returns the error produced by whichever action ran for this round.
    pub async fn execute<F, Fut>(&self, action: F) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut action = Some(action);

        loop {
            let (sender, receiver) = oneshot::channel();
            let leads = self.register(sender);

            match (leads, action.take()) {
                (true, Some(action)) => return self.lead(action).await,
                (_, pending) => action = pending,
            }

            match receiver.await {
                Ok(outcome) => return outcome,
                Err(_) => {
                    tracing::debug!("single-flight round abandoned, starting a new one");
                }
            }
        }
    }

    /// Number of callers waiting on the current round.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Add a waiter; returns true if it is the first one of the round.
    fn register(&self, waiter: Waiter<E>) -> bool {
        let mut waiters = self.lock();
        waiters.push(waiter);
        waiters.len() == 1
    }

    async fn lead<F, Fut>(&self, action: F) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut round = Round {
            waiters: &self.waiters,
            settled: false,
        };

        let outcome = action().await;
        round.settle(&outcome);
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Waiter<E>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Clone> Default for ConcurrentActionHandler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for ConcurrentActionHandler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self
            .waiters
            .lock()
            .map(|w| w.len())
            .unwrap_or_else(|e| e.into_inner().len());
        f.debug_struct("ConcurrentActionHandler")
            .field("pending", &pending)
            .finish()
    }
}

/// The leader's view of a round. Dropping it unsettled abandons the round.
struct Round<'a, E> {
    waiters: &'a Mutex<Vec<Waiter<E>>>,
    settled: bool,
}

impl<E: Clone> Round<'_, E> {
    fn settle(&mut self, outcome: &Result<(), E>) {
        let waiters = self.take_waiters();
        self.settled = true;

        for waiter in waiters {
            // The leader's own slot has no receiver any more.
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl<E> Round<'_, E> {
    fn take_waiters(&self) -> Vec<Waiter<E>> {
        let mut waiters = self.waiters.lock().unwrap_or_else(PoisonError::into_inner);
        mem::take(&mut *waiters)
    }
}

impl<E> Drop for Round<'_, E> {
    fn drop(&mut self) {
        if !self.settled {
            // Closing the slots wakes the waiters so they can retry.
            drop(self.take_waiters());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq)]
    struct TestError(String);

    #[tokio::test]
    async fn single_caller_runs_action() {
        let handler: ConcurrentActionHandler<TestError> = ConcurrentActionHandler::new();
        let calls = AtomicUsize::new(0);

        handler
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(handler.pending(), 0);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_invocation() {
        let handler = Arc::new(ConcurrentActionHandler::<TestError>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let handler = Arc::clone(&handler);
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            tasks.push(tokio::spawn(async move {
                handler
                    .execute(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok(())
                    })
                    .await
            }));
        }

        // Wait until every caller has joined the round.
        while handler.pending() < 5 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        gate.notify_one();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter() {
        let handler = Arc::new(ConcurrentActionHandler::<TestError>::new());
        let gate = Arc::new(Notify::new());

        let mut tasks = Vec::new();
        for i in 0..3 {
            let handler = Arc::clone(&handler);
            let gate = Arc::clone(&gate);
            tasks.push(tokio::spawn(async move {
                handler
                    .execute(|| async move {
                        gate.notified().await;
                        Err(TestError(format!("refresh failed in caller {}", i)))
                    })
                    .await
            }));
        }

        while handler.pending() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        gate.notify_one();

        let mut errors = Vec::new();
        for task in tasks {
            errors.push(task.await.unwrap().unwrap_err());
        }

        // Everyone sees the leader's error, whichever caller led.
        assert!(errors.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn new_round_after_completion() {
        let handler: ConcurrentActionHandler<TestError> = ConcurrentActionHandler::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            handler
                .execute(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn new_round_after_failure() {
        let handler: ConcurrentActionHandler<TestError> = ConcurrentActionHandler::new();

        let first = handler
            .execute(|| async { Err(TestError("boom".into())) })
            .await;
        assert_eq!(first, Err(TestError("boom".into())));

        let second = handler.execute(|| async { Ok(()) }).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn abandoned_round_is_taken_over_by_waiter() {
        let handler = Arc::new(ConcurrentActionHandler::<TestError>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                handler
                    .execute(|| std::future::pending::<Result<(), TestError>>())
                    .await
            })
        };

        while handler.pending() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let waiter = {
            let handler = Arc::clone(&handler);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                handler
                    .execute(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            })
        };

        while handler.pending() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        leader.abort();

        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_shows_pending_count() {
        let handler: ConcurrentActionHandler<TestError> = ConcurrentActionHandler::default();
        assert!(format!("{:?}", handler).contains("pending: 0"));
    }
}
