use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::error::{MonitorError, Result};

/// Human notification capability. Delivery is best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Writes notifications to the operator log stream
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        warn!("[notify] {}: {}", title, message);
        Ok(())
    }
}

/// Sends every notification to each inner notifier
pub struct FanoutNotifier {
    targets: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(targets: Vec<Arc<dyn Notifier>>) -> Self {
        Self { targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    fn name(&self) -> &str {
        "fanout"
    }

    /// Tries every target; fails if any of them failed
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        let mut failures = Vec::new();

        for target in &self.targets {
            if let Err(e) = target.notify(title, message).await {
                warn!("Notifier {} failed: {}", target.name(), e);
                failures.push(format!("{}: {}", target.name(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MonitorError::Notification(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn notify(&self, _title: &str, _message: &str) -> Result<()> {
            Err(MonitorError::Notification("unreachable".to_string()))
        }
    }

    #[derive(Default)]
    struct Counting {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Notifier for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn notify(&self, _title: &str, _message: &str) -> Result<()> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fanout_reports_partial_failure() {
        let counting = Arc::new(Counting::default());
        let fanout = FanoutNotifier::new(vec![
            Arc::new(LogNotifier),
            Arc::new(Failing),
            counting.clone(),
        ]);
        let err = fanout.notify("Alert", "svc-1 down").await.unwrap_err();
        assert!(err.to_string().contains("failing"));
        // Targets after the failing one are still tried
        assert_eq!(counting.calls.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_fanout_succeeds_when_all_deliver() {
        let fanout = FanoutNotifier::new(vec![Arc::new(LogNotifier), Arc::new(LogNotifier)]);
        assert!(fanout.notify("Alert", "svc-1 down").await.is_ok());
    }

    #[tokio::test]
    async fn test_fanout_fails_when_all_fail() {
        let fanout = FanoutNotifier::new(vec![Arc::new(Failing), Arc::new(Failing)]);
        let err = fanout.notify("Alert", "svc-1 down").await.unwrap_err();
        assert!(matches!(err, MonitorError::Notification(_)));
    }
}
