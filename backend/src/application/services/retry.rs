/// Bounded retry with exponential backoff for generation-path provider
/// calls.
///
/// Each attempt runs under the per-call timeout; only transient failures
/// (timeouts, connectivity, 5xx) are retried. The query path deliberately
/// never goes through here - user-facing latency is bounded by failing fast.
use std::future::Future;
use tracing::warn;

use crate::application::providers::{ProviderError, ProviderResult};
use crate::config::GenerationConfig;

pub async fn call_with_retry<T, F, Fut>(
    operation: &str,
    config: &GenerationConfig,
    mut call: F,
) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut backoff = config.initial_backoff;
    let mut attempt: u32 = 0;

    loop {
        let result = match tokio::time::timeout(config.call_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(config.call_timeout)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < config.max_retries => {
                attempt += 1;
                warn!(
                    operation,
                    attempt,
                    max_retries = config.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    %error,
                    "Transient provider failure, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(error) => return Err(error),
        }
    }
}
