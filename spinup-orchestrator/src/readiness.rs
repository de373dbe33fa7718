use spinup_common::OrchestratorError;
use spinup_providers::CloudProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::logger;

/// Polls the provider until an instance is running with a public address.
#[derive(Clone)]
pub struct ReadinessWaiter {
    provider: Arc<dyn CloudProvider>,
    poll_interval: Duration,
}

impl ReadinessWaiter {
    pub fn new(provider: Arc<dyn CloudProvider>, poll_interval: Duration) -> Self {
        Self {
            provider,
            poll_interval,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Returns the public address. No poll is started after `timeout` has
    /// elapsed, and an in-flight poll is cut off at the deadline. The
    /// instance is left alone on every failure.
    pub async fn await_reachable(
        &self,
        instance_id: &str,
        timeout: Duration,
    ) -> Result<String, OrchestratorError> {
        let started = std::time::Instant::now();
        let deadline = Instant::now() + timeout;
        let log_id = logger::log_event_with_metadata(
            "AWAIT_REACHABLE",
            "in_progress",
            Some(instance_id),
            Some(serde_json::json!({"timeout_s": timeout.as_secs()})),
        );
        let timed_out = || OrchestratorError::ReadinessTimeout {
            instance_id: instance_id.to_string(),
            waited: timeout,
        };
        let mut polls: u32 = 0;

        let result = loop {
            if Instant::now() >= deadline {
                break Err(timed_out());
            }

            let poll = tokio::time::timeout_at(deadline, self.provider.describe_instance(instance_id)).await;
            let snapshot = match poll {
                Err(_) => break Err(timed_out()),
                Ok(Err(e)) => break Err(OrchestratorError::provider(e)),
                Ok(Ok(snapshot)) => snapshot,
            };
            polls += 1;

            match snapshot {
                Some(instance) if instance.is_gone() => {
                    break Err(OrchestratorError::provider(anyhow::anyhow!(
                        "instance {} went {} before becoming reachable",
                        instance_id,
                        instance.state
                    )));
                }
                Some(instance) if instance.is_running() => {
                    if let Some(ip) = instance.public_ip.filter(|ip| !ip.is_empty()) {
                        break Ok(ip);
                    }
                    tracing::debug!(instance_id, "running but no public address yet");
                }
                Some(instance) => {
                    tracing::debug!(instance_id, state = %instance.state, "waiting for instance");
                }
                None => tracing::debug!(instance_id, "instance not visible yet"),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break Err(timed_out());
            }
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        };

        let elapsed = started.elapsed().as_millis();
        match &result {
            Ok(ip) => {
                tracing::info!(instance_id, ip = %ip, polls, "instance reachable");
                logger::log_event_complete(log_id, "AWAIT_REACHABLE", "success", elapsed, None);
            }
            Err(e) => logger::log_event_complete(
                log_id,
                "AWAIT_REACHABLE",
                "failed",
                elapsed,
                Some(&e.to_string()),
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::template;
    use crate::launcher::InstanceLauncher;
    use spinup_providers::mock::{BootBehavior, MockCall, MockProvider};

    async fn launched(provider: &Arc<MockProvider>) -> String {
        InstanceLauncher::new(provider.clone())
            .launch(&template(&[34197], &[]), "sg-1", None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn returns_address_once_running() {
        let provider = Arc::new(
            MockProvider::new()
                .with_boot(BootBehavior::AfterPolls(2))
                .with_public_ip("203.0.113.5"),
        );
        let id = launched(&provider).await;
        let waiter = ReadinessWaiter::new(provider.clone(), Duration::from_millis(5));

        let ip = waiter.await_reachable(&id, Duration::from_secs(5)).await.unwrap();
        assert_eq!(ip, "203.0.113.5");
        assert_eq!(provider.calls(MockCall::DescribeInstance).await, 3);
    }

    #[tokio::test]
    async fn times_out_and_stops_polling() {
        let provider = Arc::new(MockProvider::new().with_boot(BootBehavior::Never));
        let id = launched(&provider).await;
        let waiter = ReadinessWaiter::new(provider.clone(), Duration::from_millis(20));

        let started = std::time::Instant::now();
        let err = waiter
            .await_reachable(&id, Duration::from_millis(150))
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(2));
        match err {
            OrchestratorError::ReadinessTimeout { instance_id, waited } => {
                assert_eq!(instance_id, id);
                assert_eq!(waited, Duration::from_millis(150));
            }
            other => panic!("unexpected error: {other}"),
        }

        let polls = provider.calls(MockCall::DescribeInstance).await;
        assert!(polls >= 1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(provider.calls(MockCall::DescribeInstance).await, polls);
        assert!(provider.terminations().await.is_empty());
    }

    #[tokio::test]
    async fn provider_error_fails_fast() {
        let provider = Arc::new(MockProvider::new().with_boot(BootBehavior::Never));
        let id = launched(&provider).await;
        provider.fail_on(MockCall::DescribeInstance, "Unavailable").await;
        let waiter = ReadinessWaiter::new(provider.clone(), Duration::from_millis(5));

        let err = waiter.await_reachable(&id, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Provider(_)));
        assert_eq!(provider.calls(MockCall::DescribeInstance).await, 1);
    }

    #[tokio::test]
    async fn terminated_instance_fails_fast() {
        let provider = Arc::new(MockProvider::new().with_boot(BootBehavior::Never));
        let id = launched(&provider).await;
        InstanceLauncher::new(provider.clone()).terminate(&id).await.unwrap();
        let waiter = ReadinessWaiter::new(provider, Duration::from_millis(5));

        let err = waiter.await_reachable(&id, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Provider(_)));
        assert!(err.to_string().contains("terminated"));
    }

    #[tokio::test]
    async fn zero_timeout_never_polls() {
        let provider = Arc::new(MockProvider::new());
        let id = launched(&provider).await;
        let waiter = ReadinessWaiter::new(provider.clone(), Duration::from_millis(5));

        let err = waiter.await_reachable(&id, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::ReadinessTimeout { .. }));
        assert_eq!(provider.calls(MockCall::DescribeInstance).await, 0);
    }
}
