pub mod actors;
pub mod bus;
pub mod cli;
pub mod console;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod runtime;
pub mod settings;

#[cfg(test)]
mod tests;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::io::BufReader;

use crate::bus::{serve_inbound, LocalBus};
use crate::cli::{apply_cli_overrides, CliArgs};
use crate::runtime::{build_transport, inbound_bind, spawn_agents, Components};
use crate::settings::{default_config_path, load_settings, save_settings};

/// Parse the command line, then run the configured agents until stdin closes
/// (front end) or Ctrl-C.
pub fn run() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    logging::init(args.log_level.as_deref());

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?
        .block_on(run_agents(args))
}

async fn run_agents(args: CliArgs) -> anyhow::Result<()> {
    let mut settings = load_settings(args.config.as_deref()).await;
    apply_cli_overrides(&args, &mut settings);

    if args.save_config {
        let path = args.config.clone().unwrap_or_else(default_config_path);
        save_settings(&path, &settings).await?;
        return Ok(());
    }

    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    if api_key.is_empty() && args.role.runs_rag() {
        tracing::warn!("OPENAI_API_KEY is not set; generation requests will be rejected");
    }

    tracing::info!(
        "Starting role {:?} (model {}, embeddings {:?})",
        args.role,
        settings.generation.model,
        settings.embedding.backend
    );

    let bus = Arc::new(LocalBus::new(settings.mailbox_capacity));
    let transport = build_transport(args.role, &settings, bus.clone())?;
    let components = Components::from_settings(&settings, &api_key)?;
    let handle = spawn_agents(args.role, &settings, &bus, transport, components);

    if let Some(bind) = inbound_bind(args.role, &settings)? {
        let inbound = bus.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_inbound(inbound, bind).await {
                tracing::error!("Inbound endpoint on {} exited: {}", bind, e);
            }
        });
    }

    match handle {
        Some(handle) => {
            let console = console::run_console(
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
                handle,
                &settings.front_end.default_document_path,
            );
            tokio::select! {
                result = console => result.context("console I/O failed")?,
                _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            tracing::info!("Interrupted, shutting down");
        }
    }
    Ok(())
}
