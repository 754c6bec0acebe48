use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A scheduled action that can be cancelled before it fires.
///
/// Dropping the handle cancels the action too, so a timer can never outlive
/// the state that scheduled it.
#[derive(Debug)]
pub struct DelayHandle {
    task: JoinHandle<()>,
}

impl DelayHandle {
    /// Run `action` after `delay` on the current runtime.
    pub fn schedule<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action().await;
        });
        Self { task }
    }

    pub fn cancel(self) {
        // Drop aborts.
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for DelayHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
