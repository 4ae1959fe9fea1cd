//! Terminal chat with the practice tutor.
//!
//! Type a line to send it. `/close` ends the live connection, `/reset` starts
//! a new conversation, `/quit` leaves.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tutorchat_cli::{
    config::{ClientConfig, Overrides},
    render::RecordPrinter,
};
use tutorchat_core::identity::SessionIdentity;
use tutorchat_realtime::WsTransport;
use tutorchat_session::{HttpFallback, SessionConfig, SessionError, SessionHandle};

#[derive(Parser, Debug)]
#[command(name = "chat")]
#[command(version, about = "Practice English conversation from the terminal", long_about = None)]
struct Args {
    /// WebSocket URL of the live channel
    #[arg(long)]
    url: Option<String>,
    /// URL of the HTTP fallback endpoint
    #[arg(long)]
    fallback_url: Option<String>,
    /// Your name, as the tutor should call you
    #[arg(short, long)]
    name: Option<String>,
    /// Language for explanations
    #[arg(short, long)]
    language: Option<String>,
}

impl From<Args> for Overrides {
    fn from(args: Args) -> Self {
        Self {
            ws_url: args.url,
            fallback_url: args.fallback_url,
            user_name: args.name,
            language: args.language,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = ClientConfig::load(args.into()).context("Failed to load configuration")?;

    // Logs go to stderr so they do not interleave with the conversation.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let fallback = HttpFallback::new(config.fallback_url.clone())
        .context("Failed to build the fallback client")?;
    info!(ws_url = %config.ws_url, fallback_url = %fallback.endpoint(), "Starting session.");
    let session = SessionHandle::spawn(
        SessionConfig::new(config.ws_url.clone()),
        Arc::new(WsTransport::new()),
        Arc::new(fallback),
        Arc::new(SessionIdentity::new(
            config.user_name.clone(),
            config.language.clone(),
        )),
    );

    let mut view = session.subscribe();
    let printer = tokio::spawn(async move {
        let mut printer = RecordPrinter::new();
        while view.changed().await.is_ok() {
            let (epoch, records) = {
                let view = view.borrow_and_update();
                (view.epoch, view.records.clone())
            };
            for line in printer.take_new(epoch, &records) {
                println!("{}", line);
            }
        }
    });

    println!(
        "Hi {}! Type a message, or /close, /reset, /quit.",
        config.user_name
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) => line,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };

        match line.trim() {
            "/quit" => break,
            "/close" => session.close().await?,
            "/reset" => session.reset().await?,
            text => match session.send(text).await {
                Ok(_) => {}
                Err(SessionError::EmptyMessage) => {}
                Err(e) => {
                    warn!(error = %e, "Session stopped accepting messages.");
                    println!("{}", e.user_message());
                    break;
                }
            },
        }
    }

    let _ = session.close().await;
    session.shutdown().await;
    let _ = printer.await;
    Ok(())
}
