use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// 以最大并发数limit执行一组future，结果按输入顺序返回。
/// 所有future都在当前任务内被驱动，丢弃返回的future即取消尚未完成的调用。
pub async fn do_parallel_with_limit<F, T>(futures: Vec<F>, limit: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));

    let guarded = futures.into_iter().map(|future| {
        let semaphore = semaphore.clone();
        async move {
            // 信号量不会被关闭，acquire失败时直接执行
            let _permit = semaphore.acquire().await.ok();
            future.await
        }
    });

    join_all(guarded).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_parallel_limit_is_respected() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let futures: Vec<_> = (0..8)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    i * 2
                }
            })
            .collect();

        let results = do_parallel_with_limit(futures, 3).await;

        assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14]);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_zero_limit_still_runs() {
        let futures: Vec<std::pin::Pin<Box<dyn Future<Output = i32>>>> =
            vec![Box::pin(async { 1 }), Box::pin(async { 2 })];
        assert_eq!(do_parallel_with_limit(futures, 0).await, vec![1, 2]);
    }
}
