//! Bounded parallel map.

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};

/// Default number of in-flight invocations.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Runs `f` over `items` with at most `max_concurrency` futures in flight.
///
/// Output order matches input order. The first error fails the whole call
/// and any results already produced are dropped. Futures still in flight when
/// the error surfaces are dropped with the stream.
pub async fn parallel_map<T, U, E, F, Fut>(
    items: impl IntoIterator<Item = T>,
    f: F,
    max_concurrency: usize,
) -> Result<Vec<U>, E>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<U, E>>,
{
    stream::iter(items)
        .map(f)
        .buffered(max_concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_preserves_order_and_bounds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let result: Result<Vec<u32>, ()> = parallel_map(
            [1u32, 2, 3, 4, 5],
            |n| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    // Later items finish first.
                    tokio::time::sleep(Duration::from_millis(u64::from(6 - n) * 10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(n * 2)
                }
            },
            2,
        )
        .await;

        assert_eq!(result, Ok(vec![2, 4, 6, 8, 10]));
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_error_fails_call() {
        let result: Result<Vec<u32>, String> = parallel_map(
            0u32..10,
            |n| async move {
                if n == 3 {
                    Err(format!("item {n} failed"))
                } else {
                    Ok(n)
                }
            },
            DEFAULT_CONCURRENCY,
        )
        .await;

        assert_eq!(result, Err("item 3 failed".to_string()));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let result: Result<Vec<u32>, ()> =
            parallel_map(Vec::<u32>::new(), |n| async move { Ok(n) }, 4).await;
        assert_eq!(result, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_runs() {
        let result: Result<Vec<u32>, ()> =
            parallel_map([1u32, 2], |n| async move { Ok(n + 1) }, 0).await;
        assert_eq!(result, Ok(vec![2, 3]));
    }
}
