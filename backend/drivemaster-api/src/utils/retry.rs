use std::future::Future;
use std::time::Duration;

/// Backoff schedule for store writes that may fail transiently.
///
/// The wait before retry `n` is `base_backoff * 2^(n-1)`, capped at
/// `max_backoff`, plus a random extra of up to `jitter_max`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total calls, the first one included. Zero behaves like one.
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// Journey attempts are the player's history; losing one is worse than
    /// a slow end-of-journey response.
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 7,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }

    /// One call and no waiting. Tests use it to surface injected failures.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter_max: None,
        }
    }

    fn jitter(&self) -> Duration {
        match self.jitter_max.map(|max| max.as_millis() as u64) {
            Some(max_ms) if max_ms > 0 => Duration::from_millis(rand::random_range(0..=max_ms)),
            _ => Duration::ZERO,
        }
    }
}

/// Calls `operation` until it succeeds or the attempt budget is spent, and
/// returns the last error in the latter case.
pub async fn retry_async_with_config<F, Fut, T, E>(
    config: RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = config.base_backoff;
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= config.max_attempts {
            return Err(err);
        }
        attempt += 1;

        tokio::time::sleep(backoff + config.jitter()).await;
        backoff = (backoff * 2).min(config.max_backoff);
    }
}
