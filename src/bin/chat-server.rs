//! Chat server binary.
//!
//! ```text
//! chat-server [--config <file.toml>]
//! ```
//!
//! Without `--config`, settings come from `CHAT_PROTOCOL_*` environment
//! variables on top of the defaults.

use chat_protocol::config::ChatConfig;
use chat_protocol::error::{ProtocolError, Result};
use chat_protocol::store::memory::{InMemoryChatStore, InMemoryUserStore};
use chat_protocol::transport::{server_dispatcher, ChatServer};
use chat_protocol::utils::logging::init_logging;
use chat_protocol::utils::{Diagnostics, Fanout, Metrics, TracingDiagnostics};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

const DEFAULT_CHATS: [&str; 2] = ["general", "random"];

fn load_config() -> Result<ChatConfig> {
    let args: Vec<String> = std::env::args().collect();
    match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args
                .get(i + 1)
                .ok_or_else(|| ProtocolError::ConfigError("--config needs a file path".into()))?;
            ChatConfig::from_file(path)
        }
        None => ChatConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    config.validate_strict()?;
    init_logging(&config.logging)?;

    let metrics = Arc::new(Metrics::new());
    let diagnostics: Arc<dyn Diagnostics> =
        Arc::new(Fanout::new(vec![
            TracingDiagnostics::shared(),
            metrics.clone() as Arc<dyn Diagnostics>,
        ]));

    let users = Arc::new(InMemoryUserStore::new());
    let chats = Arc::new(InMemoryChatStore::with_chats(DEFAULT_CHATS));
    let dispatcher = server_dispatcher(&config.auth, users, chats, diagnostics.clone())?;

    let server = ChatServer::bind(&config, Arc::new(dispatcher), diagnostics).await?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    server.run(shutdown_rx).await?;
    metrics.log_metrics();
    Ok(())
}
