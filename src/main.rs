use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::warn;

use askdoc::gemini::{GeminiClient, GeminiConfig};
use askdoc::rag::RagEngine;
use askdoc::server::{self, AppState};

/// A single-page RAG application: upload one document, ask questions about it
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    // An absent key is reported here but only fails on the first remote call
    let gemini_config = GeminiConfig::from_env();
    if gemini_config.api_key.is_empty() {
        warn!("GOOGLE_API_KEY is not set; embedding and generation calls will fail");
    }

    let gemini = GeminiClient::new(gemini_config);
    let engine = RagEngine::new(gemini);
    let state = AppState::new(engine);

    server::serve(state, &args.host, args.port)
        .await
        .context("Error running server")?;

    Ok(())
}
