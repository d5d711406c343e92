//! Cross-process delivery: envelopes travel as JSON over `POST /submit`.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::{LocalBus, Transport};
use crate::error::DeliveryError;
use crate::protocol::{AgentAddress, Envelope};

/// Sends to local mailboxes directly and to everything else over HTTP.
pub struct HttpTransport {
    client: reqwest::Client,
    local: Arc<LocalBus>,
    /// Statically configured `address -> http://host:port/submit` routes.
    routes: HashMap<AgentAddress, String>,
}

impl HttpTransport {
    pub fn new(
        local: Arc<LocalBus>,
        routes: HashMap<AgentAddress, String>,
        request_timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, local, routes })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, envelope: Envelope) -> Result<(), DeliveryError> {
        if self.local.is_local(&envelope.recipient) {
            return self.local.deliver(envelope).await;
        }

        let recipient = envelope.recipient.clone();
        let endpoint = self
            .routes
            .get(&recipient)
            .ok_or_else(|| DeliveryError::UnknownRecipient(recipient.clone()))?;

        let response = self
            .client
            .post(endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| DeliveryError::Network {
                recipient: recipient.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                recipient,
                status: status.as_u16(),
            })
        }
    }
}

/// Router that accepts envelopes for the agents registered on `local`.
pub fn inbound_router(local: Arc<LocalBus>) -> Router {
    Router::new()
        .route("/submit", post(submit_envelope))
        .with_state(local)
}

async fn submit_envelope(
    State(local): State<Arc<LocalBus>>,
    Json(envelope): Json<Envelope>,
) -> StatusCode {
    tracing::debug!(
        sender = %envelope.sender,
        recipient = %envelope.recipient,
        "Inbound {}",
        envelope.payload.kind()
    );
    match local.deliver(envelope).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(DeliveryError::UnknownRecipient(_)) => StatusCode::NOT_FOUND,
        Err(e) => {
            tracing::warn!("Inbound envelope refused: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Serve the inbound endpoint until the process exits.
pub async fn serve_inbound(local: Arc<LocalBus>, bind: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Listening for envelopes on http://{}/submit", listener.local_addr()?);
    axum::serve(listener, inbound_router(local)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ExtractionRequest, Payload, RequestId};

    async fn spawn_inbound(local: Arc<LocalBus>) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, inbound_router(local)).await.unwrap();
        });
        addr
    }

    fn extraction_request(recipient: &str) -> Envelope {
        Envelope::new(
            AgentAddress::new("agent://rag"),
            AgentAddress::new(recipient),
            Payload::ExtractionRequest(ExtractionRequest {
                request_id: RequestId::new(),
                document_path: "./norwegian.pdf".to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn test_envelope_crosses_http_boundary() {
        let remote_bus = Arc::new(LocalBus::new(4));
        let mut pdf_inbox = remote_bus.register(AgentAddress::new("agent://pdf"));
        let addr = spawn_inbound(remote_bus).await;

        let routes = HashMap::from([(
            AgentAddress::new("agent://pdf"),
            format!("http://{}/submit", addr),
        )]);
        let transport =
            HttpTransport::new(Arc::new(LocalBus::new(4)), routes, Duration::from_secs(5)).unwrap();

        let envelope = extraction_request("agent://pdf");
        transport.deliver(envelope.clone()).await.unwrap();

        assert_eq!(pdf_inbox.recv().await.unwrap(), envelope);
    }

    #[tokio::test]
    async fn test_remote_without_mailbox_is_rejected() {
        let addr = spawn_inbound(Arc::new(LocalBus::new(4))).await;
        let routes = HashMap::from([(
            AgentAddress::new("agent://pdf"),
            format!("http://{}/submit", addr),
        )]);
        let transport =
            HttpTransport::new(Arc::new(LocalBus::new(4)), routes, Duration::from_secs(5)).unwrap();

        let err = transport.deliver(extraction_request("agent://pdf")).await.unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Rejected {
                recipient: AgentAddress::new("agent://pdf"),
                status: 404,
            }
        );
    }

    #[tokio::test]
    async fn test_unrouted_address() {
        let transport =
            HttpTransport::new(Arc::new(LocalBus::new(4)), HashMap::new(), Duration::from_secs(5))
                .unwrap();
        let err = transport.deliver(extraction_request("agent://pdf")).await.unwrap_err();
        assert!(matches!(err, DeliveryError::UnknownRecipient(_)));
    }

    #[tokio::test]
    async fn test_local_recipient_skips_http() {
        let local = Arc::new(LocalBus::new(4));
        let mut inbox = local.register(AgentAddress::new("agent://pdf"));
        let transport = HttpTransport::new(local, HashMap::new(), Duration::from_secs(5)).unwrap();

        transport.deliver(extraction_request("agent://pdf")).await.unwrap();
        assert!(inbox.recv().await.is_some());
    }
}
