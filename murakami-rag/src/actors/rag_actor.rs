use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::generation::{
    build_murakami_prompt, error_answer, join_passages, Generator, NO_RELEVANT_CONTENT_ANSWER,
};
use super::rag::{Embedder, Session, SessionStore, VectorIndex};
use crate::bus::{deliver_with_retry, RetryPolicy, Transport};
use crate::error::{DeliveryError, EmbeddingError};
use crate::protocol::{
    AgentAddress, AnswerResponse, Envelope, ExtractionRequest, ExtractionResponse, PageRecord,
    Payload, QuestionRequest, RequestId,
};

/// Number of passages handed to the generator.
pub const DEFAULT_TOP_K: usize = 4;

/// Sessions older than this are dropped the next time the actor wakes up.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(600);

// ============================================================================
// ANSWER PIPELINE
// ============================================================================

/// Pages + question in, answer text out. Never fails: every failure becomes
/// an error-text answer.
pub struct AnswerPipeline {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl AnswerPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>, top_k: usize) -> Self {
        Self {
            embedder,
            generator,
            top_k,
        }
    }

    pub async fn answer(&self, request_id: RequestId, question: &str, response: ExtractionResponse) -> String {
        if let Some(error) = response.error {
            tracing::warn!(%request_id, "RagActor: PDF agent could not extract the document: {}", error);
            return error_answer(error);
        }

        let passages = match self.retrieve(question, response.pages).await {
            Ok(passages) => passages,
            Err(e) => {
                tracing::error!(%request_id, "RagActor: retrieval failed: {}", e);
                return error_answer(e);
            }
        };

        if passages.is_empty() {
            tracing::info!(%request_id, "RagActor: no passages found, sending the no-content answer");
            return NO_RELEVANT_CONTENT_ANSWER.to_string();
        }

        tracing::info!(%request_id, "RagActor: generating from {} passages", passages.len());
        let prompt = build_murakami_prompt(&join_passages(&passages), question);
        match self.generator.generate(&prompt).await {
            Ok(text) => {
                tracing::info!(%request_id, "RagActor: generated Murakami-style response ({} chars)", text.len());
                text
            }
            Err(e) => {
                tracing::error!(%request_id, "RagActor: error generating response: {}", e);
                error_answer(e)
            }
        }
    }

    /// Embed the pages into a fresh index and return the `top_k` closest page texts.
    async fn retrieve(&self, question: &str, pages: Vec<PageRecord>) -> Result<Vec<String>, EmbeddingError> {
        if pages.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = pages.into_iter().map(|p| p.content).collect();
        let vectors = self.embedder.embed(texts.clone()).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Malformed(format!(
                "expected {} page vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        let index = VectorIndex::build(vectors)?;
        tracing::debug!("RagActor: indexed {} passages", index.len());

        let query = self
            .embedder
            .embed(vec![question.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::Malformed("no vector for the question".to_string()))?;

        let hits = index.search(&query, self.top_k)?;
        Ok(hits.into_iter().map(|hit| texts[hit.position].clone()).collect())
    }
}

// ============================================================================
// ACTOR
// ============================================================================

/// Outcomes of spawned work that must come back to the loop that owns the sessions.
#[derive(Debug)]
enum RagEvent {
    ExtractionUndeliverable {
        request_id: RequestId,
        error: DeliveryError,
    },
}

pub struct RagActor {
    address: AgentAddress,
    pdf_agent: AgentAddress,
    inbox: mpsc::Receiver<Envelope>,
    transport: Arc<dyn Transport>,
    pipeline: Arc<AnswerPipeline>,
    sessions: SessionStore,
    session_ttl: Duration,
    retry: RetryPolicy,
    events_tx: mpsc::UnboundedSender<RagEvent>,
    events_rx: mpsc::UnboundedReceiver<RagEvent>,
}

impl RagActor {
    pub fn new(
        address: AgentAddress,
        pdf_agent: AgentAddress,
        inbox: mpsc::Receiver<Envelope>,
        transport: Arc<dyn Transport>,
        pipeline: AnswerPipeline,
        retry: RetryPolicy,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            address,
            pdf_agent,
            inbox,
            transport,
            pipeline: Arc::new(pipeline),
            sessions: SessionStore::new(),
            session_ttl: DEFAULT_SESSION_TTL,
            retry,
            events_tx,
            events_rx,
        }
    }

    pub fn with_session_ttl(mut self, session_ttl: Duration) -> Self {
        self.session_ttl = session_ttl;
        self
    }

    pub async fn run(mut self) {
        tracing::info!(agent = %self.address, "RagActor: ready, extraction goes to {}", self.pdf_agent);
        loop {
            tokio::select! {
                maybe_envelope = self.inbox.recv() => {
                    let Some(envelope) = maybe_envelope else { break };
                    self.prune_expired_sessions();
                    self.handle_envelope(envelope);
                }
                // events_tx lives in self, so this never yields None
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                }
            }
        }
        tracing::info!("RagActor: mailbox closed, stopping");
    }

    fn handle_envelope(&mut self, envelope: Envelope) {
        let Envelope { sender, payload, .. } = envelope;
        match payload {
            Payload::QuestionRequest(request) => self.on_question(sender, request),
            Payload::ExtractionResponse(response) => self.on_pages(response),
            other => {
                tracing::warn!(%sender, "RagActor: ignoring unexpected {}", other.kind());
            }
        }
    }

    fn on_question(&mut self, requester: AgentAddress, request: QuestionRequest) {
        let request_id = request.request_id;
        tracing::info!(%request_id, %requester, "RagActor: received question: {}", request.question);

        let session = Session {
            question: request.question,
            requester: requester.clone(),
            document_path: request.document_path.clone(),
            opened_at: Instant::now(),
        };
        if let Err(e) = self.sessions.open(request_id, session) {
            tracing::warn!(%request_id, "RagActor: rejecting question: {}", e);
            self.spawn_answer(request_id, requester, error_answer(e));
            return;
        }

        let envelope = Envelope::new(
            self.address.clone(),
            self.pdf_agent.clone(),
            Payload::ExtractionRequest(ExtractionRequest {
                request_id,
                document_path: request.document_path,
            }),
        );
        let transport = Arc::clone(&self.transport);
        let events_tx = self.events_tx.clone();
        let retry = self.retry;
        tokio::spawn(async move {
            if let Err(error) = deliver_with_retry(transport.as_ref(), envelope, retry).await {
                let _ = events_tx.send(RagEvent::ExtractionUndeliverable { request_id, error });
            }
        });
    }

    fn on_pages(&mut self, response: ExtractionResponse) {
        let request_id = response.request_id;
        let Some(session) = self.sessions.take(&request_id) else {
            tracing::warn!(%request_id, "RagActor: pages for unknown or finished request, dropping");
            return;
        };
        tracing::info!(
            %request_id,
            "RagActor: received {} page records from {}, will answer {}",
            response.pages.len(),
            session.document_path,
            session.requester
        );

        let pipeline = Arc::clone(&self.pipeline);
        let transport = Arc::clone(&self.transport);
        let address = self.address.clone();
        let retry = self.retry;
        tokio::spawn(async move {
            let answer_text = pipeline.answer(request_id, &session.question, response).await;
            send_answer(transport.as_ref(), address, session.requester, request_id, answer_text, retry).await;
        });
    }

    fn handle_event(&mut self, event: RagEvent) {
        match event {
            RagEvent::ExtractionUndeliverable { request_id, error } => {
                let Some(session) = self.sessions.take(&request_id) else {
                    return;
                };
                tracing::error!(%request_id, "RagActor: PDF agent unreachable: {}", error);
                self.spawn_answer(request_id, session.requester, error_answer(error));
            }
        }
    }

    fn spawn_answer(&self, request_id: RequestId, requester: AgentAddress, answer_text: String) {
        let transport = Arc::clone(&self.transport);
        let address = self.address.clone();
        let retry = self.retry;
        tokio::spawn(async move {
            send_answer(transport.as_ref(), address, requester, request_id, answer_text, retry).await;
        });
    }

    fn prune_expired_sessions(&mut self) {
        for (request_id, session) in self.sessions.prune_expired(Instant::now(), self.session_ttl) {
            tracing::warn!(
                %request_id,
                requester = %session.requester,
                "RagActor: session expired before pages of {} arrived",
                session.document_path
            );
        }
    }
}

async fn send_answer(
    transport: &dyn Transport,
    address: AgentAddress,
    requester: AgentAddress,
    request_id: RequestId,
    answer_text: String,
    retry: RetryPolicy,
) {
    tracing::info!(%request_id, "RagActor: attempting to send response to {}", requester);
    let envelope = Envelope::new(
        address,
        requester,
        Payload::AnswerResponse(AnswerResponse {
            request_id,
            answer_text,
        }),
    );
    // Exhaustion is logged inside; the requester falls back on its own timeout.
    let _ = deliver_with_retry(transport, envelope, retry).await;
}
