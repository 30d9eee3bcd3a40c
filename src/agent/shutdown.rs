//! Cooperative shutdown for sync agents.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

/// Owner side of the shutdown signal. Held by whoever decides when agents stop.
#[derive(Debug)]
pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self { sender }
    }

    /// A new handle observing this controller.
    pub fn signal(&self) -> Shutdown {
        Shutdown {
            receiver: self.sender.subscribe(),
        }
    }

    /// Ask every agent holding a handle to stop.
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of the shutdown signal.
///
/// If the controller is dropped without signalling, the handle never reports
/// shutdown.
#[derive(Debug, Clone)]
pub struct Shutdown {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    /// A handle that is never signalled.
    pub fn never() -> Self {
        let (_sender, receiver) = watch::channel(false);
        Self { receiver }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once shutdown has been signalled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        let signalled = receiver.wait_for(|stop| *stop).await.map(|_| ());
        if signalled.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Run `future` unless shutdown arrives first, in which case it is dropped
    /// and `None` is returned.
    pub async fn guard<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = future => Some(output),
        }
    }

    /// Sleep for `duration`. Returns false if shutdown cut the sleep short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        self.guard(tokio::time::sleep(duration)).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_runs_future_until_shutdown() {
        let controller = ShutdownController::new();
        let shutdown = controller.signal();

        assert_eq!(shutdown.guard(async { 7 }).await, Some(7));
        assert!(!shutdown.is_shutdown());

        controller.shutdown();
        assert!(shutdown.is_shutdown());
        assert_eq!(shutdown.guard(async { 7 }).await, None);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep() {
        let controller = ShutdownController::new();
        let shutdown = controller.signal();

        let sleeper = tokio::spawn(async move { shutdown.sleep(Duration::from_secs(3600)).await });
        controller.shutdown();

        assert!(!sleeper.await.unwrap());
    }

    #[tokio::test]
    async fn test_handles_created_after_shutdown_see_it() {
        let controller = ShutdownController::new();
        controller.shutdown();
        assert!(controller.is_shutdown());
        assert!(controller.signal().is_shutdown());
    }

    #[tokio::test]
    async fn test_never_sleeps_to_completion() {
        let shutdown = Shutdown::never();
        assert!(shutdown.sleep(Duration::from_millis(1)).await);
        assert!(!shutdown.is_shutdown());
    }
}
