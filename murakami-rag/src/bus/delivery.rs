use std::time::Duration;
use tokio::time::sleep;

use super::Transport;
use crate::error::DeliveryError;
use crate::protocol::Envelope;

/// Bounded retry for envelope delivery.
///
/// The wait after failed attempt `n` is `base_delay * n`, so with the
/// defaults the sender sleeps 2s, 4s, 6s, 8s between its five attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// How long to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_BASE_DELAY)
    }
}

/// Deliver `envelope`, retrying transient failures per `policy`.
///
/// Returns the attempt number that succeeded. After the last attempt fails
/// the error is logged and returned; nothing else is tried.
pub async fn deliver_with_retry(
    transport: &dyn Transport,
    envelope: Envelope,
    policy: RetryPolicy,
) -> Result<u32, DeliveryError> {
    let max_attempts = policy.max_attempts.max(1);
    let kind = envelope.payload.kind();
    let request_id = envelope.payload.request_id();
    let recipient = envelope.recipient.clone();

    let mut attempt = 1;
    loop {
        match transport.deliver(envelope.clone()).await {
            Ok(()) => {
                tracing::debug!(%request_id, %recipient, attempt, "Delivered {}", kind);
                return Ok(attempt);
            }
            Err(e) => {
                tracing::warn!(
                    %request_id,
                    %recipient,
                    "Failed to send {} (attempt {}/{}): {}",
                    kind,
                    attempt,
                    max_attempts,
                    e
                );
                if attempt >= max_attempts {
                    tracing::error!(
                        %request_id,
                        %recipient,
                        "Could not deliver {} after {} attempts",
                        kind,
                        max_attempts
                    );
                    return Err(e);
                }
                let wait = policy.delay_after(attempt);
                tracing::info!(%request_id, "Retrying in {:?}...", wait);
                sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
