use futures::future::BoxFuture;
use tokio::runtime::Handle;

/// Drives agenda deliveries.
///
/// The dispatcher hands the scheduler one long-lived delivery task per sink,
/// started the first time an agenda is published to that sink.
/// Implementations must run every task to completion eventually and must
/// never run them on the caller's stack, since `dispatch` is expected to
/// return without blocking.
pub trait Scheduler: Send + Sync + 'static {
    /// Run `task` as soon as possible.
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// The default scheduler: spawns every task on a tokio runtime.
///
/// Without an explicit handle the runtime the dispatcher is used from is
/// picked up at spawn time.
///
/// # Panics
///
/// Spawning panics when no handle was given and the caller is not running
/// inside a tokio runtime, exactly like [`tokio::spawn`].
///
/// # Examples
///
/// ```
/// use agendum::{Dispatcher, TokioScheduler};
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let dispatcher: Dispatcher<serde_json::Value> = Dispatcher::builder()
///     .scheduler(TokioScheduler::with_handle(runtime.handle().clone()))
///     .build();
/// # drop(dispatcher);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    handle: Option<Handle>,
}

impl TokioScheduler {
    /// Spawn on whichever runtime is current when a task is scheduled.
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Spawn on the runtime behind `handle`.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        match &self.handle {
            Some(handle) => {
                handle.spawn(task);
            }
            None => {
                tokio::spawn(task);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn ambient_runtime_runs_task() {
        let (tx, rx) = oneshot::channel();
        TokioScheduler::new().spawn(
            async move {
                let _ = tx.send(7);
            }
            .boxed(),
        );
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[test]
    fn explicit_handle_runs_outside_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let scheduler = TokioScheduler::with_handle(runtime.handle().clone());
        let (tx, rx) = oneshot::channel();
        scheduler.spawn(
            async move {
                let _ = tx.send("done");
            }
            .boxed(),
        );
        assert_eq!(runtime.block_on(rx).unwrap(), "done");
    }
}
