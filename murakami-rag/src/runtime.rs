//! Wiring: builds the backends, registers mailboxes and spawns the actors a
//! process is configured to run.

use anyhow::Context;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::actors::generation::{Generator, OpenAiChatClient};
use crate::actors::rag::{
    CachingEmbedder, DocumentExtractor, Embedder, FastEmbedder, OpenAiEmbedder, PdfExtractor,
};
use crate::actors::{AnswerPipeline, PdfActor, RagActor, UserActor, UserAgentHandle};
use crate::bus::{HttpTransport, LocalBus, Transport};
use crate::cli::Role;
use crate::protocol::AgentAddress;
use crate::settings::{AppSettings, EmbeddingBackend};

/// The external collaborators the agents consume.
pub struct Components {
    pub extractor: Arc<dyn DocumentExtractor>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
}

impl Components {
    /// Production backends as configured. Nothing here touches the network;
    /// the local embedding model is loaded on first use.
    pub fn from_settings(settings: &AppSettings, api_key: &str) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.generation.request_timeout_secs);

        let embedder: Arc<dyn Embedder> = match settings.embedding.backend {
            EmbeddingBackend::Local => Arc::new(FastEmbedder::new()),
            EmbeddingBackend::Openai => Arc::new(
                OpenAiEmbedder::new(
                    settings.embedding_api_base(),
                    api_key,
                    settings.embedding.model.clone(),
                    timeout,
                )
                .context("failed to build embedding client")?,
            ),
        };

        let generator = OpenAiChatClient::new(
            settings.generation.api_base.clone(),
            api_key,
            settings.generation.model.clone(),
            timeout,
        )
        .context("failed to build generation client")?
        .with_temperature(settings.generation.temperature)
        .with_max_tokens(settings.generation.max_tokens);

        Ok(Self {
            extractor: Arc::new(PdfExtractor::new(settings.splitter())),
            embedder,
            generator: Arc::new(generator),
        })
    }
}

/// In-process bus only for `--role all`; otherwise peers are reached over HTTP.
pub fn build_transport(
    role: Role,
    settings: &AppSettings,
    bus: Arc<LocalBus>,
) -> anyhow::Result<Arc<dyn Transport>> {
    if role == Role::All {
        return Ok(bus);
    }
    let agents = &settings.agents;
    let routes: HashMap<AgentAddress, String> = [&agents.user, &agents.rag, &agents.pdf]
        .into_iter()
        .map(|a| (AgentAddress::new(a.address.clone()), a.endpoint.clone()))
        .collect();
    let transport = HttpTransport::new(
        bus,
        routes,
        Duration::from_secs(settings.delivery.request_timeout_secs),
    )
    .context("failed to build HTTP transport")?;
    Ok(Arc::new(transport))
}

/// Socket the inbound endpoint binds for a single-agent role.
pub fn inbound_bind(role: Role, settings: &AppSettings) -> anyhow::Result<Option<SocketAddr>> {
    let bind = match role {
        Role::All => return Ok(None),
        Role::User => &settings.agents.user.bind,
        Role::Rag => &settings.agents.rag.bind,
        Role::Pdf => &settings.agents.pdf.bind,
    };
    let addr = bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", bind))?;
    Ok(Some(addr))
}

/// Register mailboxes and spawn the actors `role` asks for.
///
/// Returns the front-end handle when the user agent is part of this process.
pub fn spawn_agents(
    role: Role,
    settings: &AppSettings,
    bus: &LocalBus,
    transport: Arc<dyn Transport>,
    components: Components,
) -> Option<UserAgentHandle> {
    let user = AgentAddress::new(settings.agents.user.address.clone());
    let rag = AgentAddress::new(settings.agents.rag.address.clone());
    let pdf = AgentAddress::new(settings.agents.pdf.address.clone());
    let retry = settings.retry_policy();

    if role.runs_pdf() {
        let actor = PdfActor::new(
            pdf.clone(),
            bus.register(pdf.clone()),
            Arc::clone(&transport),
            components.extractor,
            retry,
        );
        tokio::spawn(actor.run());
    }

    if role.runs_rag() {
        let embedder = Arc::new(CachingEmbedder::new(
            components.embedder,
            settings.retrieval.embedding_cache_capacity,
        ));
        let pipeline = AnswerPipeline::new(embedder, components.generator, settings.retrieval.top_k);
        let actor = RagActor::new(
            rag.clone(),
            pdf,
            bus.register(rag.clone()),
            Arc::clone(&transport),
            pipeline,
            retry,
        )
        .with_session_ttl(settings.session_ttl());
        tokio::spawn(actor.run());
    }

    if !role.runs_user() {
        return None;
    }
    let (tx, rx) = mpsc::channel(settings.mailbox_capacity.max(1));
    let actor = UserActor::new(user.clone(), rag, rx, bus.register(user), transport);
    tokio::spawn(actor.run());
    Some(UserAgentHandle::new(tx, settings.answer_timeout()))
}
