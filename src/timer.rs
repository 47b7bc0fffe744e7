use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Threshold events emitted by the session timer. Each fires at most
/// once per started timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// The session is approaching its limit (default 25 minutes).
    Warning,
    /// The hard limit was reached (default 30 minutes). Triggers the
    /// same completion path as an explicit finish.
    HardLimit,
}

/// Wall-clock threshold timer with a single owned task handle.
///
/// Holding the handle in an `Option` makes the "two timers running"
/// bug class unrepresentable: starting replaces (and aborts) any
/// previous task.
pub struct SessionTimer {
    handle: Option<JoinHandle<()>>,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Start counting from `offset` (non-zero when resuming a draft).
    pub fn start(
        &mut self,
        offset: Duration,
        warning_after: Duration,
        hard_limit: Duration,
        tx: mpsc::Sender<TimerEvent>,
    ) {
        if let Some(old) = self.handle.take() {
            warn!("Timer started while one was running; replacing it");
            old.abort();
        }

        info!(
            "Session timer started: offset {:?}, warning at {:?}, hard limit at {:?}",
            offset, warning_after, hard_limit
        );

        let handle = tokio::spawn(async move {
            if offset < hard_limit {
                let to_warning = warning_after.saturating_sub(offset);
                if !to_warning.is_zero() {
                    tokio::time::sleep(to_warning).await;
                }
                if tx.send(TimerEvent::Warning).await.is_err() {
                    return;
                }

                let to_limit = hard_limit
                    .saturating_sub(warning_after.max(offset));
                tokio::time::sleep(to_limit).await;
            }
            let _ = tx.send(TimerEvent::HardLimit).await;
        });

        self.handle = Some(handle);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Session timer stopped");
        }
    }
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn emits_warning_then_hard_limit_once() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = SessionTimer::new();
        timer.start(
            Duration::ZERO,
            Duration::from_secs(1500),
            Duration::from_secs(1800),
            tx,
        );

        tokio::time::advance(Duration::from_secs(1500)).await;
        assert_eq!(rx.recv().await, Some(TimerEvent::Warning));

        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(rx.recv().await, Some(TimerEvent::HardLimit));

        // Task finished; nothing further arrives.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_offset_shifts_thresholds() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = SessionTimer::new();
        // Resumed with 20 minutes already elapsed.
        timer.start(
            Duration::from_secs(1200),
            Duration::from_secs(1500),
            Duration::from_secs(1800),
            tx,
        );

        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(rx.recv().await, Some(TimerEvent::Warning));

        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(rx.recv().await, Some(TimerEvent::HardLimit));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_task() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = SessionTimer::new();
        timer.start(
            Duration::ZERO,
            Duration::from_secs(10),
            Duration::from_secs(20),
            tx.clone(),
        );
        timer.start(
            Duration::ZERO,
            Duration::from_secs(100),
            Duration::from_secs(200),
            tx,
        );

        // The first timer's thresholds pass without an event.
        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(rx.recv().await, Some(TimerEvent::Warning));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_leaves_no_running_task() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = SessionTimer::new();
        timer.start(
            Duration::ZERO,
            Duration::from_secs(10),
            Duration::from_secs(20),
            tx,
        );

        timer.stop();
        assert!(!timer.is_running());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(rx.recv().await, None);
    }
}
