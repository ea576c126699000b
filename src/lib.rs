//! # otp-forwarder
//!
//! Watches an IMAP mailbox for one-time passcodes and relays them to Telegram chats.
//!
//! Every polling cycle the forwarder:
//! - Opens a fresh TLS session and selects the configured folder
//! - Searches for unseen mail, optionally from a single sender
//! - Extracts a readable body from each message and looks for a 6-digit passcode
//! - Sends the passcode and the message subject to every configured chat
//! - Marks the message seen only once delivery succeeded
//!
//! ## Quick Start
//!
//! ```no_run
//! use otp_forwarder::{ForwarderConfig, ImapConfig, InboxProcessor, TelegramConfig};
//!
//! # async fn example() -> otp_forwarder::Result<()> {
//! let imap = ImapConfig::builder()
//!     .email("user@gmail.com")
//!     .password("app-password")  // Use app-specific password for Gmail
//!     .build()?;
//!
//! let telegram = TelegramConfig::builder()
//!     .bot_token("123456:bot-token")
//!     .chat_id("42")
//!     .build()?;
//!
//! let config = ForwarderConfig::new(imap, telegram)
//!     .with_sender_filter(Some("alerts@bank.example"));
//!
//! let processor = InboxProcessor::from_config(&config)?;
//! let report = processor.run_one_cycle().await?;
//! println!("forwarded {} of {} unseen", report.forwarded, report.found);
//! # Ok(())
//! # }
//! ```
//!
//! ## Extraction Without a Mailbox
//!
//! ```
//! use otp_forwarder::{extract_body, find_otp, Message};
//!
//! let raw = b"Subject: Login\r\nContent-Type: text/html\r\n\r\n<p>Your code: <b>654321</b></p>";
//! let message = Message::parse(raw).unwrap();
//!
//! let code = find_otp(&extract_body(&message)).unwrap();
//! assert_eq!(code, "654321");
//! ```
//!
//! ## Custom Delivery
//!
//! The processor is generic over [`MailboxConnector`] and [`Notifier`], so delivery
//! can go anywhere:
//!
//! ```
//! use async_trait::async_trait;
//! use otp_forwarder::{NotificationPayload, Notifier, Result};
//!
//! struct Stdout;
//!
//! #[async_trait]
//! impl Notifier for Stdout {
//!     async fn send(&self, payload: &NotificationPayload, destinations: &[String]) -> Result<()> {
//!         for chat in destinations {
//!             println!("{chat}: {payload}");
//!         }
//!         Ok(())
//!     }
//!
//!     fn description(&self) -> &str {
//!         "stdout"
//!     }
//! }
//! ```
//!
//! ## Error Handling
//!
//! All errors implement `std::error::Error` and provide context. Use [`Error::is_retryable`]
//! to tell a transient failure from one that needs attention:
//!
//! ```
//! use otp_forwarder::Error;
//!
//! fn handle_error(error: &Error) {
//!     if error.is_retryable() {
//!         println!("Transient error, next cycle may succeed: {}", error);
//!     } else {
//!         println!("Permanent error ({}): {}", error.category(), error);
//!     }
//! }
//! ```
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. Passcodes and credentials are never
//! recorded in spans or events.
//!
//! ### Span Naming Convention
//!
//! - `InboxProcessor::run_one_cycle` - One polling cycle
//! - `InboxProcessor::process_message` - Handling of one message
//! - `ImapConnector::connect` - Connect, authenticate and select
//! - `session::search_unseen` - Unseen search
//! - `session::fetch` - Message fetch
//! - `session::mark_seen` - Flag update
//! - `TelegramNotifier::send_message` - Delivery to one chat
//!
//! ### Standard Fields
//!
//! - `email` - Mailbox account
//! - `imap_host` - IMAP server hostname
//! - `folder` - Selected folder
//! - `uid` - Message UID
//! - `chat_id` - Telegram destination

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod error;
pub mod html;
pub mod mailbox;
pub mod notify;
pub mod otp;
pub mod parser;
pub mod processor;
pub mod telegram;

// Internal modules
mod client;
mod connection;
mod session;

// Re-exports for ergonomic API
pub use client::{ImapConnector, ImapMailbox};
pub use config::{
    ForwarderConfig, ImapConfig, ImapConfigBuilder, TelegramConfig, TelegramConfigBuilder,
    TimeoutConfig,
};
pub use email_address::EmailAddress;
pub use error::{Error, ErrorCategory, Result};
pub use html::to_plain_text;
pub use mailbox::{Mailbox, MailboxConnector};
pub use notify::{format_notification, NotificationPayload, Notifier};
pub use otp::{find_otp, OtpCode};
pub use parser::{extract_body, Message, Part};
pub use processor::{run_one_cycle, CycleReport, InboxProcessor};
pub use telegram::TelegramNotifier;
