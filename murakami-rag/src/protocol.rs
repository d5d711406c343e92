use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::DeliveryError;

// ============ Identities ============

/// Stable identity of an agent on the bus. Peers learn each other's
/// addresses from static configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentAddress(String);

impl AgentAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlates a question with its answer across both hops.
///
/// Generated by the front end when a question is submitted and copied into
/// every downstream message for that question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============ Documents ============

/// One page (or page chunk) of extracted text with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl PageRecord {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

// ============ Bus Messages ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub request_id: RequestId,
    pub document_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    pub request_id: RequestId,
    pub pages: Vec<PageRecord>,
    /// Set when the document could not be extracted; `pages` is then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub request_id: RequestId,
    pub document_path: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub request_id: RequestId,
    pub answer_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    ExtractionRequest(ExtractionRequest),
    ExtractionResponse(ExtractionResponse),
    QuestionRequest(QuestionRequest),
    AnswerResponse(AnswerResponse),
}

impl Payload {
    pub fn request_id(&self) -> RequestId {
        match self {
            Payload::ExtractionRequest(m) => m.request_id,
            Payload::ExtractionResponse(m) => m.request_id,
            Payload::QuestionRequest(m) => m.request_id,
            Payload::AnswerResponse(m) => m.request_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::ExtractionRequest(_) => "extraction_request",
            Payload::ExtractionResponse(_) => "extraction_response",
            Payload::QuestionRequest(_) => "question_request",
            Payload::AnswerResponse(_) => "answer_response",
        }
    }
}

/// Addressed frame carried by the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_id: Uuid,
    pub sender: AgentAddress,
    pub recipient: AgentAddress,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(sender: AgentAddress, recipient: AgentAddress, payload: Payload) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            sender,
            recipient,
            payload,
        }
    }
}

// ============ Local Actor Commands ============

/// Commands the console sends to the user agent inside its own process.
pub enum UserMsg {
    /// Submit a question; the answer text arrives on `respond_to`.
    Ask {
        document_path: String,
        question: String,
        respond_to: oneshot::Sender<Result<String, DeliveryError>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_is_tagged_on_the_wire() {
        let request_id = RequestId::new();
        let envelope = Envelope::new(
            AgentAddress::new("agent://user"),
            AgentAddress::new("agent://rag"),
            Payload::QuestionRequest(QuestionRequest {
                request_id,
                document_path: "./norwegian.pdf".to_string(),
                question: "What happens at the well?".to_string(),
            }),
        );

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["payload"]["type"], "question_request");
        assert_eq!(json["sender"], "agent://user");
        assert_eq!(json["payload"]["request_id"], request_id.to_string());
    }

    #[test]
    fn test_extraction_response_error_is_optional() {
        let json = format!(
            r#"{{"type": "extraction_response", "request_id": "{}", "pages": [{{"content": "page one"}}]}}"#,
            RequestId::new()
        );
        let payload: Payload = serde_json::from_str(&json).unwrap();
        match payload {
            Payload::ExtractionResponse(response) => {
                assert!(response.error.is_none());
                assert_eq!(response.pages[0].content, "page one");
                assert!(response.pages[0].metadata.is_empty());
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
