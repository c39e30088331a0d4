//! `relaychat-server [-h host] [-p port] [-m message] [--max-clients n]`
//!
//! Listens on 0.0.0.0:9999 by default. `-m` enables headless mode: the
//! message is sent to each client on join and after each message it sends.

use std::process::ExitCode;

use clap::{ArgAction, Parser};
use relaychat::prelude::*;
use relaychat::relay::DEFAULT_MAX_MESSAGE_SIZE;

/// Relay every chat message to all other connected clients.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, disable_help_flag = true)]
struct Cli {
    /// Interface to bind.
    #[arg(short = 'h', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 9999)]
    port: u16,

    /// Headless mode: send this to each client on join and after each
    /// message it sends.
    #[arg(short = 'm', long = "message")]
    system_message: Option<String>,

    /// Maximum simultaneous clients.
    #[arg(long)]
    max_clients: Option<usize>,

    /// Largest inbound message in bytes. 0 lifts the cap.
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    fn into_config(self) -> RelayConfig {
        RelayConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            system_message: self.system_message,
            max_clients: self.max_clients,
            max_message_size: (self.max_message_size > 0).then_some(self.max_message_size),
            ..RelayConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Cli::parse().into_config();
    relaychat::init_tracing();

    if let Some(message) = &config.system_message {
        tracing::info!(%message, "headless mode");
    }

    let server = match RelayServer::builder().config(config).build().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start relay");
            return ExitCode::FAILURE;
        }
    };

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to install ctrl-c handler");
                std::future::pending::<()>().await;
            }
        })
        .await;
    ExitCode::SUCCESS
}
