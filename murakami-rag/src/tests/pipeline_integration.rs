//! End-to-end question flow through all three agents on the in-process bus.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::fakes::{numbered_pages, FakeEmbedder, FakeExtractor, FakeGenerator};
use crate::actors::generation::NO_RELEVANT_CONTENT_ANSWER;
use crate::actors::{AnswerPipeline, RagActor, UserAgentHandle};
use crate::bus::{LocalBus, RetryPolicy, Transport};
use crate::error::DeliveryError;
use crate::cli::Role;
use crate::protocol::{
    AgentAddress, Envelope, ExtractionResponse, Payload, QuestionRequest, RequestId,
};
use crate::runtime::{spawn_agents, Components};
use crate::settings::AppSettings;

fn start_system(extractor: FakeExtractor, generator: Arc<FakeGenerator>) -> UserAgentHandle {
    start_system_with(extractor, FakeEmbedder::new(), generator)
}

fn start_system_with(
    extractor: FakeExtractor,
    embedder: FakeEmbedder,
    generator: Arc<FakeGenerator>,
) -> UserAgentHandle {
    let settings = AppSettings::default();
    let bus = Arc::new(LocalBus::new(settings.mailbox_capacity));
    let components = Components {
        extractor: Arc::new(extractor),
        embedder: Arc::new(embedder),
        generator,
    };
    spawn_agents(Role::All, &settings, &bus, bus.clone(), components)
        .expect("role all runs the user agent")
}

#[tokio::test]
async fn test_ten_pages_one_generation_one_answer() {
    let generator = Arc::new(FakeGenerator::replying("The well had no bottom, like a song without an ending."));
    let handle = start_system(
        FakeExtractor::with_pages("./norwegian.pdf", numbered_pages(10)),
        generator.clone(),
    );

    let answer = handle
        .ask("./norwegian.pdf", "What happens at the well?")
        .await
        .unwrap();

    assert_eq!(answer, "The well had no bottom, like a song without an ending.");
    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    let passages = (0..10)
        .filter(|i| prompts[0].contains(&format!("[page {}]", i)))
        .count();
    assert!(passages <= 4 && passages > 0);
    // The page about the well ranks among the retrieved passages
    assert!(prompts[0].contains("[page 7]"));
}

#[tokio::test]
async fn test_missing_document_is_an_error_answer_not_a_timeout() {
    let generator = Arc::new(FakeGenerator::replying("unused"));
    let handle = start_system(FakeExtractor::default(), generator.clone());

    let answer = handle.ask("./missing.pdf", "Anyone?").await.unwrap();

    assert!(answer.starts_with("An error occurred while processing your request: "));
    assert!(answer.contains("./missing.pdf"));
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn test_empty_document_gets_the_no_content_answer() {
    let generator = Arc::new(FakeGenerator::replying("unused"));
    let handle = start_system(
        FakeExtractor::with_pages("./blank.pdf", Vec::new()),
        generator.clone(),
    );

    let answer = handle.ask("./blank.pdf", "Where is the cat?").await.unwrap();

    assert_eq!(answer, NO_RELEVANT_CONTENT_ANSWER);
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn test_generation_failure_keeps_the_system_running() {
    let handle = start_system(
        FakeExtractor::with_pages("./norwegian.pdf", numbered_pages(3)),
        Arc::new(FakeGenerator::failing()),
    );

    for _ in 0..2 {
        let answer = handle.ask("./norwegian.pdf", "Why?").await.unwrap();
        assert_eq!(
            answer,
            "An error occurred while processing your request: generation service returned 500: model overloaded"
        );
    }
}

#[tokio::test]
async fn test_embedding_failure_is_an_error_answer() {
    let generator = Arc::new(FakeGenerator::replying("unused"));
    let handle = start_system_with(
        FakeExtractor::with_pages("./norwegian.pdf", numbered_pages(4)),
        FakeEmbedder::failing(),
        generator.clone(),
    );

    for _ in 0..2 {
        let answer = handle.ask("./norwegian.pdf", "Where is Naoko?").await.unwrap();
        assert_eq!(
            answer,
            "An error occurred while processing your request: embedding model error: onnx session unavailable"
        );
    }
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn test_concurrent_sessions_do_not_mix() {
    let extractor = FakeExtractor::with_pages(
        "./norwegian.pdf",
        vec![crate::protocol::PageRecord::new("Naoko walked in the meadow near the well")],
    )
    .and_pages(
        "./kafka.pdf",
        vec![crate::protocol::PageRecord::new("Nakata talked to the cats by the river")],
    );
    let handle = start_system(extractor, Arc::new(FakeGenerator::echoing()));

    let (norwegian, kafka) = tokio::join!(
        handle.ask("./norwegian.pdf", "Where did Naoko walk?"),
        handle.ask("./kafka.pdf", "Who talks to cats?"),
    );
    let norwegian = norwegian.unwrap();
    let kafka = kafka.unwrap();

    assert!(norwegian.contains("Where did Naoko walk?"));
    assert!(norwegian.contains("meadow"));
    assert!(!norwegian.contains("Nakata"));

    assert!(kafka.contains("Who talks to cats?"));
    assert!(kafka.contains("river"));
    assert!(!kafka.contains("Naoko"));
}

// ============ RAG agent driven directly ============

/// Passes everything to the bus, counting attempts per recipient.
struct CountingTransport {
    bus: Arc<LocalBus>,
    attempts: Mutex<HashMap<AgentAddress, u32>>,
}

impl CountingTransport {
    fn attempts_to(&self, recipient: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(&AgentAddress::new(recipient))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn deliver(&self, envelope: Envelope) -> Result<(), DeliveryError> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(envelope.recipient.clone())
            .or_insert(0) += 1;
        self.bus.deliver(envelope).await
    }
}

struct RagHarness {
    bus: Arc<LocalBus>,
    transport: Arc<CountingTransport>,
    pdf_inbox: mpsc::Receiver<Envelope>,
    generator: Arc<FakeGenerator>,
}

fn start_rag(retry: RetryPolicy) -> RagHarness {
    let bus = Arc::new(LocalBus::new(16));
    let rag_inbox = bus.register(AgentAddress::new("agent://rag"));
    let pdf_inbox = bus.register(AgentAddress::new("agent://pdf"));
    let generator = Arc::new(FakeGenerator::echoing());
    let transport = Arc::new(CountingTransport {
        bus: bus.clone(),
        attempts: Mutex::new(HashMap::new()),
    });

    let actor = RagActor::new(
        AgentAddress::new("agent://rag"),
        AgentAddress::new("agent://pdf"),
        rag_inbox,
        transport.clone(),
        AnswerPipeline::new(Arc::new(FakeEmbedder::new()), generator.clone(), 4),
        retry,
    )
    .with_session_ttl(Duration::from_secs(600));
    tokio::spawn(actor.run());

    RagHarness {
        bus,
        transport,
        pdf_inbox,
        generator,
    }
}

fn question_from(requester: &str, request_id: RequestId, question: &str) -> Envelope {
    Envelope::new(
        AgentAddress::new(requester),
        AgentAddress::new("agent://rag"),
        Payload::QuestionRequest(QuestionRequest {
            request_id,
            document_path: "./norwegian.pdf".to_string(),
            question: question.to_string(),
        }),
    )
}

fn pages_for(request_id: RequestId, text: &str) -> Envelope {
    Envelope::new(
        AgentAddress::new("agent://pdf"),
        AgentAddress::new("agent://rag"),
        Payload::ExtractionResponse(ExtractionResponse {
            request_id,
            pages: vec![crate::protocol::PageRecord::new(text)],
            error: None,
        }),
    )
}

fn answer_text(envelope: Envelope) -> (RequestId, String) {
    match envelope.payload {
        Payload::AnswerResponse(answer) => (answer.request_id, answer.answer_text),
        other => panic!("unexpected payload: {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_request_id_is_rejected_and_original_still_answered() {
    let mut h = start_rag(RetryPolicy::default());
    let mut alice = h.bus.register(AgentAddress::new("agent://alice"));
    let mut mallory = h.bus.register(AgentAddress::new("agent://mallory"));
    let request_id = RequestId::new();

    h.bus.deliver(question_from("agent://alice", request_id, "original question")).await.unwrap();
    assert!(h.pdf_inbox.recv().await.is_some());
    h.bus.deliver(question_from("agent://mallory", request_id, "second question")).await.unwrap();

    let (id, rejection) = answer_text(mallory.recv().await.unwrap());
    assert_eq!(id, request_id);
    assert_eq!(
        rejection,
        format!("An error occurred while processing your request: request {} is already in progress", request_id)
    );

    h.bus.deliver(pages_for(request_id, "the page text")).await.unwrap();
    let (id, answer) = answer_text(alice.recv().await.unwrap());
    assert_eq!(id, request_id);
    assert!(answer.contains("original question"));
    assert!(!answer.contains("second question"));
    assert_eq!(h.generator.prompts().len(), 1);
}

#[tokio::test]
async fn test_pages_are_consumed_once() {
    let mut h = start_rag(RetryPolicy::default());
    let mut user = h.bus.register(AgentAddress::new("agent://user"));
    let request_id = RequestId::new();

    h.bus.deliver(question_from("agent://user", request_id, "Who is Midori?")).await.unwrap();
    assert!(h.pdf_inbox.recv().await.is_some());

    h.bus.deliver(pages_for(request_id, "Midori ran a bookstore")).await.unwrap();
    h.bus.deliver(pages_for(request_id, "duplicate delivery")).await.unwrap();
    h.bus.deliver(pages_for(RequestId::new(), "nobody asked")).await.unwrap();

    let (id, _) = answer_text(user.recv().await.unwrap());
    assert_eq!(id, request_id);

    // Give the actor time to (not) act on the stray responses
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(user.try_recv().is_err());
    assert_eq!(h.generator.prompts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_session_is_pruned() {
    let mut h = start_rag(RetryPolicy::default());
    let mut user = h.bus.register(AgentAddress::new("agent://user"));
    let stale = RequestId::new();

    h.bus.deliver(question_from("agent://user", stale, "stale")).await.unwrap();
    assert!(h.pdf_inbox.recv().await.is_some());

    tokio::time::advance(Duration::from_secs(601)).await;

    // Any message wakes the actor and prunes; the late pages then find nothing
    let fresh = RequestId::new();
    h.bus.deliver(question_from("agent://user", fresh, "fresh")).await.unwrap();
    assert!(h.pdf_inbox.recv().await.is_some());
    h.bus.deliver(pages_for(stale, "late pages")).await.unwrap();
    h.bus.deliver(pages_for(fresh, "fresh pages")).await.unwrap();

    let (id, _) = answer_text(user.recv().await.unwrap());
    assert_eq!(id, fresh);
    assert_eq!(h.generator.prompts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_requester_gets_exactly_five_attempts() {
    let h = start_rag(RetryPolicy::default());
    let mut pdf_inbox = h.pdf_inbox;
    let request_id = RequestId::new();

    // agent://ghost has no mailbox, so every answer delivery fails
    h.bus.deliver(question_from("agent://ghost", request_id, "Is anyone there?")).await.unwrap();
    assert!(pdf_inbox.recv().await.is_some());
    h.bus.deliver(pages_for(request_id, "an empty room")).await.unwrap();

    // 2 + 4 + 6 + 8 seconds of backoff, then silence
    tokio::time::sleep(Duration::from_secs(19)).await;
    assert_eq!(h.transport.attempts_to("agent://ghost"), 4);
    tokio::time::sleep(Duration::from_secs(41)).await;
    assert_eq!(h.transport.attempts_to("agent://ghost"), 5);
    assert_eq!(h.generator.prompts().len(), 1);

    // The actor is still serving
    let mut late = h.bus.register(AgentAddress::new("agent://late"));
    let next = RequestId::new();
    h.bus.deliver(question_from("agent://late", next, "still there?")).await.unwrap();
    assert!(pdf_inbox.recv().await.is_some());
    h.bus.deliver(pages_for(next, "yes")).await.unwrap();
    assert_eq!(answer_text(late.recv().await.unwrap()).0, next);
}
