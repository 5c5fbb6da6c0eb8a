//! Resilience wrapper around a remote transport.

use async_trait::async_trait;
use tracing::{debug, warn};

use datagate_core::{
    CircuitState, RemoteError, RemoteInvoker, RemoteResult, ResilienceConfig, SourceId,
    SpecificDataRequest, SpecificDataResponse,
};

use super::circuit::CircuitBreaker;
use super::retry::Backoff;
use super::RemoteTransport;
use crate::metrics::EngineMetrics;

/// Reason carried by `RemoteError::Unknown` when the breaker rejects a call.
pub const CIRCUIT_OPEN_REASON: &str = "circuit open";

/// [`RemoteInvoker`] that applies breaker admission, per-attempt timeout and
/// bounded retry around a transport.
///
/// Client errors are returned on first sight and do not count against the
/// breaker. A breaker rejection is classified `Unknown` and ends the call.
pub struct ResilientInvoker<T> {
    transport: T,
    breaker: CircuitBreaker,
    config: ResilienceConfig,
    metrics: Option<EngineMetrics>,
}

impl<T: RemoteTransport> ResilientInvoker<T> {
    pub fn new(transport: T, config: ResilienceConfig) -> Self {
        Self {
            transport,
            breaker: CircuitBreaker::new(config.circuit.clone()),
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn attempt(
        &self,
        request: &SpecificDataRequest,
        source_id: &SourceId,
        operation: &str,
    ) -> RemoteResult<SpecificDataResponse> {
        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, self.transport.send(request, source_id, operation))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout { after: timeout }),
        }
    }

    fn observe(&self, operation: &str, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_remote_call(operation, result);
            metrics.set_circuit_state(operation, self.breaker.state());
        }
    }
}

#[async_trait]
impl<T: RemoteTransport> RemoteInvoker for ResilientInvoker<T> {
    async fn invoke(
        &self,
        request: &SpecificDataRequest,
        source_id: &SourceId,
        operation: &str,
    ) -> RemoteResult<SpecificDataResponse> {
        let mut backoff = Backoff::new(&self.config.retry);

        loop {
            let Some(permit) = self.breaker.try_acquire() else {
                self.observe(operation, "circuit_open");
                debug!(operation, source_id = %source_id, "Remote call rejected by open circuit");
                return Err(RemoteError::Unknown {
                    reason: CIRCUIT_OPEN_REASON.to_string(),
                });
            };

            let err = match self.attempt(request, source_id, operation).await {
                Ok(response) => {
                    permit.succeed();
                    self.observe(operation, "success");
                    return Ok(response);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                // Says nothing about upstream health; the permit is released unsettled.
                drop(permit);
                self.observe(operation, err.kind().as_str());
                return Err(err);
            }
            permit.fail();
            self.observe(operation, err.kind().as_str());

            match backoff.next() {
                Some(delay) => {
                    warn!(
                        operation,
                        source_id = %source_id,
                        retry = backoff.retries(),
                        delay = ?delay,
                        error = %err,
                        "Remote call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return Err(err),
            }
        }
    }

    fn circuit_state(&self) -> Option<CircuitState> {
        Some(self.breaker.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagate_core::{CircuitBreakerConfig, RetryConfig};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Transport that replays a script, then succeeds.
    struct Script {
        steps: Mutex<VecDeque<RemoteResult<SpecificDataResponse>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl Script {
        fn new(steps: Vec<RemoteResult<SpecificDataResponse>>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(vec![])
            }
        }
    }

    #[async_trait]
    impl RemoteTransport for Script {
        async fn send(
            &self,
            _request: &SpecificDataRequest,
            _source_id: &SourceId,
            _operation: &str,
        ) -> RemoteResult<SpecificDataResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(SpecificDataResponse::new(json!("ok"))))
        }
    }

    fn config(max_retries: u32) -> ResilienceConfig {
        ResilienceConfig {
            timeout_ms: 50,
            retry: RetryConfig {
                max_retries,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
                backoff_multiplier: 2.0,
            },
            circuit: CircuitBreakerConfig {
                failure_threshold: 3,
                success_threshold: 1,
                open_secs: 60,
            },
        }
    }

    async fn call<T: RemoteTransport>(inv: &ResilientInvoker<T>) -> RemoteResult<SpecificDataResponse> {
        inv.invoke(
            &SpecificDataRequest::new("quote"),
            &SourceId::new("billing"),
            "specific-data",
        )
        .await
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let inv = ResilientInvoker::new(
            Script::new(vec![Err(RemoteError::Server { status: 503 })]),
            config(2),
        );
        let result = call(&inv).await.unwrap();
        assert_eq!(result.data, json!("ok"));
        assert_eq!(inv.transport().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let inv = ResilientInvoker::new(
            Script::new(vec![Err(RemoteError::Client { status: 404 })]),
            config(5),
        );
        assert_eq!(call(&inv).await, Err(RemoteError::Client { status: 404 }));
        assert_eq!(inv.transport().calls.load(Ordering::SeqCst), 1);
        assert_eq!(inv.circuit_state(), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_retries_exhausted_returns_last_error() {
        let inv = ResilientInvoker::new(
            Script::new(vec![
                Err(RemoteError::Server { status: 500 }),
                Err(RemoteError::Server { status: 502 }),
            ]),
            config(1),
        );
        assert_eq!(call(&inv).await, Err(RemoteError::Server { status: 502 }));
        assert_eq!(inv.transport().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_classified() {
        let inv = ResilientInvoker::new(Script::slow(Duration::from_millis(500)), config(0));
        assert_eq!(
            call(&inv).await,
            Err(RemoteError::Timeout {
                after: Duration::from_millis(50)
            })
        );
    }

    #[tokio::test]
    async fn test_open_circuit_rejects_as_unknown() {
        let failures = (0..3)
            .map(|_| Err(RemoteError::Server { status: 503 }))
            .collect();
        let metrics = EngineMetrics::new().unwrap();
        let inv = ResilientInvoker::new(Script::new(failures), config(2)).with_metrics(metrics.clone());

        // Three failed attempts trip the breaker.
        assert_eq!(call(&inv).await, Err(RemoteError::Server { status: 503 }));
        assert_eq!(inv.circuit_state(), Some(CircuitState::Open));

        let err = call(&inv).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Unknown {
                reason: CIRCUIT_OPEN_REASON.to_string()
            }
        );
        assert_eq!(inv.transport().calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            metrics
                .remote_calls_total
                .with_label_values(&["specific-data", "circuit_open"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .circuit_state
                .with_label_values(&["specific-data"])
                .get(),
            CircuitState::Open as i64
        );
    }

    #[tokio::test]
    async fn test_client_error_during_half_open_frees_slot() {
        let mut cfg = config(0);
        cfg.circuit.open_secs = 0;
        let inv = ResilientInvoker::new(
            Script::new(vec![
                Err(RemoteError::Server { status: 503 }),
                Err(RemoteError::Server { status: 503 }),
                Err(RemoteError::Server { status: 503 }),
                Err(RemoteError::Client { status: 404 }),
            ]),
            cfg,
        );
        for _ in 0..3 {
            assert!(call(&inv).await.is_err());
        }
        assert_eq!(inv.circuit_state(), Some(CircuitState::Open));

        // The trial call gets a 404: no verdict, circuit stays half-open.
        assert_eq!(call(&inv).await, Err(RemoteError::Client { status: 404 }));
        assert_eq!(inv.circuit_state(), Some(CircuitState::HalfOpen));

        // Slot was released, so the next trial call runs and closes the circuit.
        assert!(call(&inv).await.is_ok());
        assert_eq!(inv.circuit_state(), Some(CircuitState::Closed));
        assert_eq!(inv.transport().calls.load(Ordering::SeqCst), 5);
    }
}
