//! Error types for the three agents and the bus that connects them.
//!
//! Every variant that can reach an operator is rendered through `Display`,
//! so the text produced here is what ends up inside error answers.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::{AgentAddress, RequestId};

/// The document could not be turned into page records.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("document not found: {path}")]
    NotFound { path: String },

    #[error("cannot read '{path}': {reason}")]
    Unreadable { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model error: {0}")]
    Model(String),

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation service returned an empty response")]
    EmptyResponse,
}

/// A single attempt to hand an envelope to its recipient failed.
///
/// All variants are treated as transient by the retry policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("no route to {0}")]
    UnknownRecipient(AgentAddress),

    #[error("mailbox of {0} is full")]
    MailboxFull(AgentAddress),

    #[error("mailbox of {0} is closed")]
    MailboxClosed(AgentAddress),

    #[error("network error sending to {recipient}: {reason}")]
    Network { recipient: AgentAddress, reason: String },

    #[error("{recipient} rejected the envelope with status {status}")]
    Rejected { recipient: AgentAddress, status: u16 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("request {0} is already in progress")]
    AlreadyInProgress(RequestId),
}

/// Why the front end did not get an answer.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("the user agent has stopped")]
    AgentStopped,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
