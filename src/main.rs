//! Forwarding daemon.
//!
//! Reads its settings from the environment (a `.env` file in the working directory
//! is loaded first), then runs one cycle every `POLL_SECONDS` until Ctrl-C, which
//! also cuts short a cycle in progress.
//!
//! ```bash
//! export GMAIL_USER="you@gmail.com"
//! export GMAIL_APP_PASSWORD="your-app-password"
//! export TELEGRAM_BOT_TOKEN="123456:bot-token"
//! export TELEGRAM_CHAT_IDS="42,-1001234567890"
//! export BANK_FROM="alerts@bank.example"   # optional
//! export RUST_LOG=otp_forwarder=debug      # optional
//!
//! otp-forwarder
//! ```

use otp_forwarder::{ForwarderConfig, InboxProcessor};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> otp_forwarder::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("otp_forwarder=info")),
        )
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let config = ForwarderConfig::from_env()?;
    let processor = InboxProcessor::from_config(&config)?;

    info!(
        email = %config.imap.email(),
        imap_host = %config.imap.host,
        folder = %config.imap.folder,
        sender_filter = config.sender_filter.as_deref().unwrap_or("<any>"),
        chats = config.telegram.chat_ids.len(),
        poll_secs = config.poll_interval.as_secs(),
        "OTP forwarder started"
    );

    let cycles = processor
        .run_until(config.poll_interval, shutdown_signal())
        .await;

    info!(cycles, "OTP forwarder stopped");
    Ok(())
}

/// Resolves on Ctrl-C. If the signal cannot be watched, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
