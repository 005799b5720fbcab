pub mod agent;
pub mod cli;
pub mod config;
pub mod contact;
pub mod error;
pub mod llm;
pub mod models;
pub mod server;
pub mod transport;
pub mod widget;

use agent::PortfolioAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("(provider default)"));
    info!("Chat API Key Set: {}", !args.chat_api_key.trim().is_empty());
    info!(
        "Persona Path: {}",
        args.persona_path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(built-in)".into())
    );
    info!("Notice Dismiss: {}s", args.notice_dismiss_secs);
    match args.http_port {
        Some(port) => {
            info!("HTTP API Port: {}", port);
            info!("Contact Rate Limit: {}/min", args.contact_rate_per_minute);
        }
        None => info!("HTTP API: disabled"),
    }
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(PortfolioAgent::new(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args.server_api_key.clone(), args.clone());
    server.run().await?;

    Ok(())
}
