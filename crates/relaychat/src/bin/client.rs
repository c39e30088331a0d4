//! `relaychat-client [--host h] [-p port] [-n name] [-m message] [--structured]`
//!
//! Interactive mode reads lines from stdin and sends them while a
//! separate task listens. With `-m`, sends one message, listens briefly
//! for replies, and exits.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use relaychat::prelude::*;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Listen rounds in one-shot mode.
const ONE_SHOT_ROUNDS: usize = 5;

/// Chat with everyone else on a relay.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Relay host.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Relay port.
    #[arg(short, long, default_value_t = 9999)]
    port: u16,

    /// Display name announced to the relay.
    #[arg(short, long, default_value = "RustUser")]
    name: String,

    /// Send one message, print replies for a few seconds, and exit.
    #[arg(short, long)]
    message: Option<String>,

    /// Send and print structured envelopes instead of raw text.
    #[arg(long)]
    structured: bool,
}

impl Cli {
    fn mode(&self) -> CallbackMode {
        if self.structured {
            CallbackMode::Structured
        } else {
            CallbackMode::Raw
        }
    }
}

fn print_structured(doc: &Value) {
    let name = doc["user"]["name"].as_str().unwrap_or("?");
    match doc["message"]["text"].as_str() {
        Some(text) => println!("{name}: {text}"),
        None => println!("{doc}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    relaychat::init_tracing();

    let one_shot = args.message.is_some();
    let mut config = ClientConfig::default();
    if one_shot {
        config = config.with_listen_timeout(Duration::from_secs(1));
    }
    let client = Arc::new(ClientHandle::with_config(
        ClientIdentity::new(args.host.as_str(), args.port, args.name.as_str()),
        config,
    ));

    match args.mode() {
        CallbackMode::Raw => client.set_callback(
            CallbackMode::Raw,
            raw_handler(|_, text, _, _| println!("{}", text.trim_end())),
        ),
        CallbackMode::Structured => client.set_callback(
            CallbackMode::Structured,
            structured_handler(|_, doc, _| print_structured(doc)),
        ),
    }

    if let Err(e) = client.connect().await {
        tracing::error!(error = %e, url = %client.identity().url(), "failed to connect");
        return ExitCode::FAILURE;
    }

    if let Some(message) = args.message {
        let code = one_shot_session(&client, &message).await;
        client.disconnect().await;
        return code;
    }

    let listener = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            loop {
                match client.listen().await {
                    Ok(_) => {}
                    Err(e) if e.is_terminal() => {
                        tracing::info!(error = %e, "stopped listening");
                        break;
                    }
                    Err(e) => tracing::warn!(error = %e, "dropped message"),
                }
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.is_empty() => {}
                Ok(Some(line)) => {
                    if let Err(e) = client.send(&line).await {
                        tracing::error!(error = %e, "send failed");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "stdin read failed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect().await;
    let _ = listener.await;
    ExitCode::SUCCESS
}

async fn one_shot_session(client: &ClientHandle, message: &str) -> ExitCode {
    if let Err(e) = client.send(message).await {
        tracing::error!(error = %e, "send failed");
        return ExitCode::FAILURE;
    }
    for _ in 0..ONE_SHOT_ROUNDS {
        match client.listen().await {
            Ok(_) => {}
            Err(e) if e.is_terminal() => break,
            Err(e) => tracing::warn!(error = %e, "dropped message"),
        }
    }
    ExitCode::SUCCESS
}
