use clap::Parser;
use llm_test_server::{serve, DEFAULT_HOST, DEFAULT_PORT};

#[derive(Parser, Debug, Clone)]
#[command(name = "llm-test-server", about = "OpenAI-compatible stub for murakami-rag")]
struct CliArgs {
    /// Host interface to bind
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = CliArgs::parse();
    serve(&args.host, args.port).await
}
