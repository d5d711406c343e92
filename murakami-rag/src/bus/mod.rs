//! Addressed message bus shared by the agents.
//!
//! This module provides:
//! - `Transport`: the single seam every agent sends through
//! - `LocalBus`: in-process mailboxes (one `mpsc` channel per address)
//! - `HttpTransport`: forwards envelopes to agents living in other processes
//! - `deliver_with_retry`: bounded retry with linearly growing backoff

mod delivery;
mod http;
mod local;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::protocol::Envelope;

pub use delivery::{deliver_with_retry, RetryPolicy};
pub use http::{inbound_router, serve_inbound, HttpTransport};
pub use local::LocalBus;

/// Hands an envelope to the agent named in `envelope.recipient`.
///
/// A returned error means this attempt failed; callers decide whether to retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, envelope: Envelope) -> Result<(), DeliveryError>;
}
