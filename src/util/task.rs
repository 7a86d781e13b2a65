use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Run `future` and turn a panic into `Err(message)`.
///
/// Spawned mutation and page-load tasks wrap their work in this so a panic
/// still produces a settlement event instead of a silently vanished task.
pub async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| {
        if let Some(s) = panic.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked with a non-string payload".to_string()
        }
    })
}
