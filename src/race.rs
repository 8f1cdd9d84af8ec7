//! First-success race over concurrent operations
//!
//! Every operation is spawned onto the runtime at once and reports back over
//! a channel. The first success wins. Losers keep running to natural
//! completion, bounded by their own timeouts; their results are dropped
//! along with the channel.

use crate::error::RaceError;
use std::future::Future;
use tokio::sync::mpsc;

/// Resolve with the first operation that succeeds.
///
/// Fails with [`RaceError::Aggregate`] holding every error (in completion
/// order) when all operations fail, or with [`RaceError::NoOperations`]
/// immediately when given nothing to race. When several operations succeed at
/// nearly the same time, which one wins is unspecified.
pub async fn race_all<I, F, T, E>(operations: I) -> Result<T, RaceError<E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let operations: Vec<F> = operations.into_iter().collect();
    if operations.is_empty() {
        return Err(RaceError::NoOperations);
    }

    let total = operations.len();
    let (tx, mut rx) = mpsc::channel(total);
    for operation in operations {
        let tx = tx.clone();
        tokio::spawn(async move {
            // Receiver is gone once a winner has been returned
            let _ = tx.send(operation.await).await;
        });
    }
    drop(tx);

    let mut errors = Vec::with_capacity(total);
    while let Some(result) = rx.recv().await {
        match result {
            Ok(value) => return Ok(value),
            Err(e) => errors.push(e),
        }
    }

    if errors.len() < total {
        tracing::warn!(
            "{} of {} race operations ended without reporting",
            total - errors.len(),
            total
        );
    }
    Err(RaceError::Aggregate(errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::time::sleep;

    type Op = BoxFuture<'static, Result<u32, String>>;

    async fn after(ms: u64, result: Result<u32, String>) -> Result<u32, String> {
        sleep(Duration::from_millis(ms)).await;
        result
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let ops = vec![
            after(200, Ok(1)).boxed(),
            after(10, Ok(2)).boxed(),
            after(5, Err("boom".to_string())).boxed(),
        ];
        assert_eq!(race_all(ops).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failures_before_success_are_skipped() {
        let ops = vec![
            after(1, Err("a".to_string())).boxed(),
            after(2, Err("b".to_string())).boxed(),
            after(30, Ok(3)).boxed(),
        ];
        assert_eq!(race_all(ops).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_all_failures_are_aggregated() {
        let ops = (0..4u64).map(|i| after(i * 5, Err(format!("err{}", i))));
        match race_all(ops).await {
            Err(RaceError::Aggregate(errors)) => {
                assert_eq!(errors.len(), 4);
                for i in 0..4 {
                    assert!(errors.contains(&format!("err{}", i)));
                }
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_race_fails_immediately() {
        let ops: Vec<std::future::Ready<Result<u32, String>>> = Vec::new();
        assert!(matches!(race_all(ops).await, Err(RaceError::NoOperations)));
    }

    #[tokio::test]
    async fn test_simultaneous_winner_is_a_success() {
        let ops = (0..8u32).map(|i| async move {
            if i % 2 == 0 {
                Ok(i)
            } else {
                Err(format!("odd {}", i))
            }
        });
        let winner = race_all(ops).await.unwrap();
        assert_eq!(winner % 2, 0);
    }

    #[tokio::test]
    async fn test_operations_start_concurrently() {
        let start = Instant::now();
        let ops = (0..5).map(|_| after(100, Err::<u32, _>("slow".to_string())));
        let _ = race_all(ops).await;
        // Sequential execution would take ~500ms
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_losers_run_to_completion() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let slow = async move {
            sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            Ok::<u32, String>(0)
        };
        let ops: Vec<Op> = vec![after(1, Ok(1)).boxed(), slow.boxed()];

        assert_eq!(race_all(ops).await.unwrap(), 1);
        assert!(!finished.load(Ordering::SeqCst));

        sleep(Duration::from_millis(150)).await;
        assert!(finished.load(Ordering::SeqCst), "loser should not be cancelled");
    }
}
