//! Shared utilities for dispatcher scenario tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use task_dispatcher::destination::{CallAdapter, CallResult};
use task_dispatcher::error::CallError;
use task_dispatcher::DispatcherConfig;

/// Honor RUST_LOG in test output. Safe to call from every test.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Adapter whose behavior is scripted per call number (0-based), with a
/// call counter the test can inspect.
pub struct ScriptedAdapter {
    calls: AtomicU32,
    script: Box<dyn Fn(u32) -> Result<CallResult, CallError> + Send + Sync>,
}

#[allow(dead_code)]
impl ScriptedAdapter {
    pub fn new(
        script: impl Fn(u32) -> Result<CallResult, CallError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            script: Box::new(script),
        })
    }

    /// Always succeeds, tagging the output with `tag`.
    pub fn ok(tag: &'static str) -> Arc<Self> {
        Self::new(move |_| Ok(CallResult::new(serde_json::json!({ "from": tag }))))
    }

    /// Always fails with a network error.
    pub fn down() -> Arc<Self> {
        Self::new(|_| Err(CallError::network("connection refused")))
    }

    /// Fails the first `n` calls, then succeeds.
    pub fn fail_first(n: u32, tag: &'static str) -> Arc<Self> {
        Self::new(move |call| {
            if call < n {
                Err(CallError::network("connection refused"))
            } else {
                Ok(CallResult::new(serde_json::json!({ "from": tag })))
            }
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CallAdapter for ScriptedAdapter {
    fn call(
        &self,
        _payload: serde_json::Value,
        _timeout: Duration,
    ) -> BoxFuture<'_, Result<CallResult, CallError>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.script)(n);
        Box::pin(async move { result })
    }
}

/// Dispatcher config with millisecond backoff so paused-clock tests stay
/// fast. Circuit breaker thresholds keep their production defaults.
#[allow(dead_code)]
pub fn fast_config() -> DispatcherConfig {
    let mut config = DispatcherConfig::default();
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 1_000;
    config
}
