// Built-in job handlers for the daemon
//
// echo   - returns its payload
// delay  - sleeps `ms`, then returns its payload
// fail   - fails with the described OperationError (exercises classification)
// lookup - `delay` memoized by the payload's `cache_key`

use backstop_core::application::HandlerRegistry;
use backstop_core::domain::{JobPayload, OperationError};
use backstop_core::port::{handler_fn, JobHandler};
use backstop_infra_memory::TtlCache;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct DelaySpec {
    #[serde(default)]
    ms: u64,
}

#[derive(Debug, Deserialize)]
struct FailSpec {
    #[serde(default = "default_fail_message")]
    message: String,
    code: Option<String>,
    status: Option<u16>,
    data: Option<Value>,
}

fn default_fail_message() -> String {
    "requested failure".to_string()
}

/// Registry with every built-in handler
pub fn default_registry(cache: Arc<TtlCache<Value>>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register("echo", echo());
    registry.register("delay", delay());
    registry.register("fail", fail());
    registry.register("lookup", memoized(delay(), cache));
    registry
}

pub fn echo() -> Arc<dyn JobHandler> {
    handler_fn(|payload: JobPayload| async move { Ok(payload.as_value().clone()) })
}

pub fn delay() -> Arc<dyn JobHandler> {
    handler_fn(|payload: JobPayload| async move {
        let spec: DelaySpec = payload.decode().map_err(invalid_payload)?;
        tokio::time::sleep(Duration::from_millis(spec.ms)).await;
        Ok(payload.as_value().clone())
    })
}

pub fn fail() -> Arc<dyn JobHandler> {
    handler_fn(|payload: JobPayload| async move {
        let spec: FailSpec = payload.decode().map_err(invalid_payload)?;
        let mut error = OperationError::new(spec.message);
        if let Some(code) = spec.code {
            error = error.with_code(code);
        }
        if let Some(status) = spec.status {
            error = error.with_status(status);
        }
        if let Some(data) = spec.data {
            error = error.with_data(data);
        }
        Err(error)
    })
}

/// Memoize `inner` by the payload's `cache_key` string. Payloads without
/// one always reach `inner`; failures are never cached.
pub fn memoized(inner: Arc<dyn JobHandler>, cache: Arc<TtlCache<Value>>) -> Arc<dyn JobHandler> {
    handler_fn(move |payload: JobPayload| {
        let inner = Arc::clone(&inner);
        let cache = Arc::clone(&cache);
        async move {
            let key = payload
                .as_value()
                .get("cache_key")
                .and_then(Value::as_str)
                .map(str::to_owned);
            match key {
                Some(key) => {
                    cache
                        .wrap(&key, || async { inner.execute(&payload).await }, None)
                        .await
                }
                None => inner.execute(&payload).await,
            }
        }
    })
}

// Malformed payloads will not get better on retry
fn invalid_payload(e: serde_json::Error) -> OperationError {
    OperationError::new(format!("invalid payload: {}", e)).with_status(400)
}
