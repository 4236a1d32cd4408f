// Shutdown Token

use tokio::sync::watch;

/// Shutdown signal for graceful termination
///
/// Waiting on a token is how backoff sleeps and drain loops are aborted.
/// A token whose sender was dropped without signalling never fires.
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Token that is never signalled (plain `process()` calls use it)
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for shutdown signal
    ///
    /// Returns immediately if shutdown was already requested.
    pub async fn wait(&mut self) {
        if self.is_shutdown() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow_and_update() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to every token
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Hand out another token bound to this sender
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_after_shutdown() {
        let (tx, mut token) = shutdown_channel();
        assert!(!token.is_shutdown());

        let waiter = tokio::spawn(async move {
            token.wait().await;
        });
        tx.shutdown();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .expect("waiter should not panic");
    }

    #[tokio::test]
    async fn test_late_token_sees_shutdown() {
        let (tx, _token) = shutdown_channel();
        tx.shutdown();

        let mut late = tx.token();
        assert!(late.is_shutdown());
        late.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_token_does_not_fire() {
        let mut token = ShutdownToken::never();
        let fired = tokio::time::timeout(Duration::from_secs(60), token.wait()).await;
        assert!(fired.is_err(), "never() token must not fire");
        assert!(!token.is_shutdown());
    }
}
