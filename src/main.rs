use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info};

use empathy::{chat, constants, web_server, HttpCollaborator};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of the chat backend (EMPATHY_API_URL).
    #[arg(long, global = true, default_value_t = constants::API_URL.clone())]
    api_url: String,

    /// Seconds to wait for a reply before showing the fallback message (EMPATHY_TIMEOUT_SECS).
    #[arg(long, global = true, default_value_t = *constants::TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the chat page to browsers.
    Serve {
        #[arg(long, default_value = "127.0.0.1", help = "Address to listen on.")]
        host: IpAddr,
        #[arg(long, env = "EMPATHY_PORT", default_value_t = constants::DEFAULT_PORT, help = "Port for the web server.")]
        port: u16,
    },
    /// Chat with the AI therapist in the terminal.
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (EMPATHY_API_URL and friends)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g. RUST_LOG=info,empathy=debug).
    // Logs go to stderr so the terminal chat owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("EmpathyAI starting with command: {:?}", cli.command);

    let collaborator = HttpCollaborator::new(&cli.api_url);
    let timeout = Duration::from_secs(cli.timeout_secs);
    info!(endpoint = collaborator.endpoint(), ?timeout, "Using chat backend");

    match cli.command {
        Commands::Serve { host, port } => {
            let addr = SocketAddr::new(host, port);
            let state = web_server::AppState::new(Arc::new(collaborator), timeout)
                .context("Failed to initialize web server state")?;

            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(addr, state).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, shutting down...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat => {
            let stdin = BufReader::new(tokio::io::stdin());
            chat::run_terminal_chat(stdin, tokio::io::stdout(), Arc::new(collaborator), timeout)
                .await
                .context("Chat session failed")?;
        }
    }

    Ok(())
}
