use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::bus::Transport;
use crate::error::{AskError, DeliveryError};
use crate::protocol::{AgentAddress, Envelope, Payload, QuestionRequest, RequestId, UserMsg};

/// How long the front end waits for an answer before giving up.
pub const DEFAULT_ANSWER_TIMEOUT: Duration = Duration::from_secs(120);

type AnswerSender = oneshot::Sender<Result<String, DeliveryError>>;

/// Front-end agent: turns operator questions into `QuestionRequest`s and
/// routes each `AnswerResponse` back to whoever is waiting on its request id.
pub struct UserActor {
    address: AgentAddress,
    rag_agent: AgentAddress,
    commands: mpsc::Receiver<UserMsg>,
    inbox: mpsc::Receiver<Envelope>,
    transport: Arc<dyn Transport>,
    pending: HashMap<RequestId, AnswerSender>,
}

impl UserActor {
    pub fn new(
        address: AgentAddress,
        rag_agent: AgentAddress,
        commands: mpsc::Receiver<UserMsg>,
        inbox: mpsc::Receiver<Envelope>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            address,
            rag_agent,
            commands,
            inbox,
            transport,
            pending: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        tracing::info!(agent = %self.address, "UserActor: ready, questions go to {}", self.rag_agent);
        loop {
            tokio::select! {
                maybe_cmd = self.commands.recv() => {
                    let Some(cmd) = maybe_cmd else { break };
                    self.handle_command(cmd).await;
                }
                maybe_envelope = self.inbox.recv() => {
                    let Some(envelope) = maybe_envelope else { break };
                    self.handle_envelope(envelope);
                }
            }
        }
        tracing::info!("UserActor: stopping");
    }

    async fn handle_command(&mut self, cmd: UserMsg) {
        match cmd {
            UserMsg::Ask {
                document_path,
                question,
                respond_to,
            } => {
                // Waiters that timed out have dropped their receivers
                self.pending.retain(|_, waiter| !waiter.is_closed());

                let request_id = RequestId::new();
                tracing::info!(%request_id, "UserActor: analyzing document: {}", document_path);
                tracing::info!(%request_id, "UserActor: your question: {}", question);

                let envelope = Envelope::new(
                    self.address.clone(),
                    self.rag_agent.clone(),
                    Payload::QuestionRequest(QuestionRequest {
                        request_id,
                        document_path,
                        question,
                    }),
                );
                match self.transport.deliver(envelope).await {
                    Ok(()) => {
                        self.pending.insert(request_id, respond_to);
                    }
                    Err(e) => {
                        tracing::error!(%request_id, "UserActor: could not send question: {}", e);
                        let _ = respond_to.send(Err(e));
                    }
                }
            }
        }
    }

    fn handle_envelope(&mut self, envelope: Envelope) {
        let Envelope { sender, payload, .. } = envelope;
        match payload {
            Payload::AnswerResponse(answer) => {
                let request_id = answer.request_id;
                tracing::info!(%request_id, "UserActor: received response from {}", sender);
                match self.pending.remove(&request_id) {
                    Some(waiter) => {
                        if waiter.send(Ok(answer.answer_text)).is_err() {
                            tracing::warn!(%request_id, "UserActor: answer arrived after the wait ended");
                        }
                    }
                    None => {
                        tracing::warn!(%request_id, "UserActor: answer for unknown request, dropping");
                    }
                }
            }
            other => {
                tracing::warn!(%sender, "UserActor: ignoring unexpected {}", other.kind());
            }
        }
    }
}

/// Cloneable handle used by the console (or tests) to ask questions.
#[derive(Clone)]
pub struct UserAgentHandle {
    tx: mpsc::Sender<UserMsg>,
    answer_timeout: Duration,
}

impl UserAgentHandle {
    pub fn new(tx: mpsc::Sender<UserMsg>, answer_timeout: Duration) -> Self {
        Self { tx, answer_timeout }
    }

    /// Submit one question and wait for its answer or the timeout.
    /// Nothing is sent downstream when the wait times out.
    pub async fn ask(&self, document_path: &str, question: &str) -> Result<String, AskError> {
        let (respond_to, rx) = oneshot::channel();
        self.tx
            .send(UserMsg::Ask {
                document_path: document_path.to_string(),
                question: question.to_string(),
                respond_to,
            })
            .await
            .map_err(|_| AskError::AgentStopped)?;

        match tokio::time::timeout(self.answer_timeout, rx).await {
            Err(_) => Err(AskError::Timeout(self.answer_timeout)),
            Ok(Err(_)) => Err(AskError::AgentStopped),
            Ok(Ok(result)) => Ok(result?),
        }
    }
}
