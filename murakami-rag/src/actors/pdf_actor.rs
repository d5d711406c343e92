use std::sync::Arc;
use tokio::sync::mpsc;

use super::rag::DocumentExtractor;
use crate::bus::{deliver_with_retry, RetryPolicy, Transport};
use crate::protocol::{AgentAddress, Envelope, ExtractionRequest, ExtractionResponse, Payload};

/// Leaf agent: answers every `ExtractionRequest` with the document's pages.
pub struct PdfActor {
    address: AgentAddress,
    inbox: mpsc::Receiver<Envelope>,
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn DocumentExtractor>,
    retry: RetryPolicy,
}

impl PdfActor {
    pub fn new(
        address: AgentAddress,
        inbox: mpsc::Receiver<Envelope>,
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn DocumentExtractor>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            address,
            inbox,
            transport,
            extractor,
            retry,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(agent = %self.address, "PdfActor: ready");
        while let Some(Envelope { sender, payload, .. }) = self.inbox.recv().await {
            match payload {
                Payload::ExtractionRequest(request) => {
                    // One task per request so a slow document never blocks the mailbox
                    let transport = Arc::clone(&self.transport);
                    let extractor = Arc::clone(&self.extractor);
                    let address = self.address.clone();
                    let retry = self.retry;
                    tokio::spawn(async move {
                        handle_extraction(
                            transport.as_ref(),
                            extractor.as_ref(),
                            address,
                            sender,
                            request,
                            retry,
                        )
                        .await;
                    });
                }
                other => {
                    tracing::warn!(
                        %sender,
                        "PdfActor: ignoring unexpected {}",
                        other.kind()
                    );
                }
            }
        }
        tracing::info!("PdfActor: mailbox closed, stopping");
    }
}

async fn handle_extraction(
    transport: &dyn Transport,
    extractor: &dyn DocumentExtractor,
    address: AgentAddress,
    reply_to: AgentAddress,
    request: ExtractionRequest,
    retry: RetryPolicy,
) {
    let request_id = request.request_id;
    tracing::info!(%request_id, "PdfActor: extracting {}", request.document_path);

    let response = match extractor.extract(&request.document_path).await {
        Ok(pages) => {
            tracing::info!(%request_id, "PdfActor: extracted {} page records", pages.len());
            ExtractionResponse {
                request_id,
                pages,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(%request_id, "PdfActor: extraction failed: {}", e);
            ExtractionResponse {
                request_id,
                pages: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    };

    let envelope = Envelope::new(address, reply_to, Payload::ExtractionResponse(response));
    // Failures are logged inside; the RAG side's session TTL cleans up.
    let _ = deliver_with_retry(transport, envelope, retry).await;
}
