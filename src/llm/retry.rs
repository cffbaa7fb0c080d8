//! Retry with jittered exponential backoff for narrative calls.
//!
//! Retries live here, inside the collaborator — the pipeline above treats
//! a call that exhausts its attempts as a single stage failure.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::LlmError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 500;
const MAX_JITTER_MS: u64 = 250;

/// Whether an error is worth another attempt.
fn retryable(error: &LlmError) -> bool {
    matches!(
        error,
        LlmError::RateLimited { .. } | LlmError::RequestFailed { .. }
    )
}

/// Run `operation` up to [`MAX_ATTEMPTS`] times with exponential backoff
/// plus jitter. Rate-limit hints from the provider override the computed
/// delay.
pub(crate) async fn with_retry<T, F, Fut>(provider: &str, operation: F) -> Result<T, LlmError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if retryable(&e) && attempt < MAX_ATTEMPTS => {
                let delay = match &e {
                    LlmError::RateLimited {
                        retry_after: Some(hint),
                        ..
                    } => *hint,
                    _ => {
                        let backoff = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                        let jitter = rand::thread_rng().gen_range(0..MAX_JITTER_MS);
                        Duration::from_millis(backoff + jitter)
                    }
                };
                warn!(
                    provider,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "narrative call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
