//! Bounded retry and exponential backoff helpers.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Delay step between attempts of [`retry_up_to`]. The n-th failed attempt waits n steps.
pub const RETRY_STEP: Duration = Duration::from_millis(10);

/// Returned by [`retry_up_to`] once every attempt has failed. Holds the last error.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub error: E,
}

/// Runs `block` until it succeeds, at most `retries` times.
///
/// `block` receives the 1-based attempt number. A `retries` of zero still makes one attempt.
pub async fn retry_up_to<T, E, F, Fut>(retries: u32, mut block: F) -> Result<T, Exhausted<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failed_attempts = 0;
    loop {
        match block(failed_attempts + 1).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                failed_attempts += 1;
                if failed_attempts >= retries {
                    return Err(Exhausted {
                        attempts: failed_attempts,
                        error,
                    });
                }
                tracing::warn!("attempt {failed_attempts} of {retries} failed, retrying. {error}");
                tokio::time::sleep(RETRY_STEP * failed_attempts).await;
            }
        }
    }
}

/// Delay before the retry that follows the `sequence`-th consecutive failure (0-based).
///
/// `initial * 2^sequence`, capped at `max`.
pub fn backoff_delay(sequence: u32, initial: Duration, max: Duration) -> Duration {
    2u32.checked_pow(sequence)
        .and_then(|factor| initial.checked_mul(factor))
        .map_or(max, |delay| delay.min(max))
}

/// Runs `block` until it returns `Ok`, backing off exponentially after each error.
///
/// `on_error` sees every error and returns false to give up, in which case that error is
/// returned. `wait` performs the backoff so callers can make it interruptible.
pub async fn retry_with_backoff<T, E, F, Fut, L, W, WFut>(
    mut on_error: L,
    initial: Duration,
    max: Duration,
    mut block: F,
    mut wait: W,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    L: FnMut(&E) -> bool,
    W: FnMut(Duration) -> WFut,
    WFut: Future,
{
    let mut sequence = 0;
    loop {
        match block().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !on_error(&error) {
                    return Err(error);
                }
                let delay = backoff_delay(sequence, initial, max);
                tracing::debug!("backing off for {delay:?} after failure {}", sequence + 1);
                wait(delay).await;
                sequence = sequence.saturating_add(1);
            }
        }
    }
}
