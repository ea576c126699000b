//! One polling cycle: search, extract, notify, mark seen.
//!
//! # Example
//!
//! ```no_run
//! use otp_forwarder::{ForwarderConfig, InboxProcessor};
//!
//! # async fn example() -> otp_forwarder::Result<()> {
//! let config = ForwarderConfig::from_env()?;
//! let processor = InboxProcessor::from_config(&config)?;
//!
//! let report = processor.run_one_cycle().await?;
//! println!("forwarded {} code(s)", report.forwarded);
//! # Ok(())
//! # }
//! ```

use crate::client::ImapConnector;
use crate::config::ForwarderConfig;
use crate::error::Result;
use crate::mailbox::{Mailbox, MailboxConnector};
use crate::notify::{format_notification, Notifier};
use crate::otp::find_otp;
use crate::parser::{extract_body, Message};
use crate::telegram::TelegramNotifier;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Unseen messages returned by the search.
    pub found: usize,
    /// Messages whose code was delivered and that were marked seen.
    pub forwarded: usize,
    /// Messages without a passcode, left unseen.
    pub without_code: usize,
    /// Messages that could not be fetched, left unseen.
    pub fetch_failed: usize,
    /// Messages that could not be parsed, left unseen.
    pub unparsable: usize,
}

/// Outcome for a single message that did not end the cycle.
enum Handled {
    Forwarded,
    NoCode,
    FetchFailed,
    Unparsable,
}

/// Relays passcodes from unseen mail to a [`Notifier`].
///
/// Each call to [`run_one_cycle`](Self::run_one_cycle) opens its own mailbox session
/// and closes it before returning; nothing is remembered between cycles.
#[derive(Debug)]
pub struct InboxProcessor<C, N> {
    connector: C,
    notifier: N,
    destinations: Vec<String>,
    sender_filter: Option<String>,
}

impl InboxProcessor<ImapConnector, TelegramNotifier> {
    /// Builds the IMAP and Telegram collaborators described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &ForwarderConfig) -> Result<Self> {
        let notifier = TelegramNotifier::new(config.telegram.clone())?;
        Ok(
            Self::new(
                ImapConnector::new(config.imap.clone()),
                notifier,
                config.telegram.chat_ids.clone(),
            )
            .with_sender_filter(config.sender_filter.clone()),
        )
    }
}

impl<C, N> InboxProcessor<C, N>
where
    C: MailboxConnector,
    N: Notifier,
{
    /// Creates a processor delivering to `destinations` through `notifier`.
    #[must_use]
    pub fn new(connector: C, notifier: N, destinations: Vec<String>) -> Self {
        Self {
            connector,
            notifier,
            destinations,
            sender_filter: None,
        }
    }

    /// Only consider unseen mail from `sender`.
    #[must_use]
    pub fn with_sender_filter(mut self, sender: Option<String>) -> Self {
        self.sender_filter = sender;
        self
    }

    /// Runs one full cycle over the unseen mail.
    ///
    /// Messages are handled in UID order. A message that cannot be fetched or parsed,
    /// or that carries no passcode, is skipped and stays unseen. A message is marked
    /// seen only after its passcode was delivered. The session is logged out on every
    /// path once it was opened.
    ///
    /// # Errors
    ///
    /// Returns the first error from connecting, searching, delivering or marking a
    /// message seen. The message being delivered at that point stays unseen.
    #[instrument(
        name = "InboxProcessor::run_one_cycle",
        skip(self),
        fields(
            notifier = %self.notifier.description(),
            sender_filter = self.sender_filter.as_deref().unwrap_or("")
        )
    )]
    pub async fn run_one_cycle(&self) -> Result<CycleReport> {
        let mut mailbox = self.connector.connect().await?;
        debug!("Mailbox session opened");

        let outcome = self.process_unseen(&mut mailbox).await;

        if let Err(e) = mailbox.logout().await {
            warn!(error = %e, "Logout failed, dropping session");
        }

        outcome
    }

    /// Runs a cycle every `poll_interval` until `shutdown` resolves.
    ///
    /// Each cycle's report or error is logged. `shutdown` is watched during the cycles
    /// as well as the pauses, so a cycle in flight is abandoned when it fires; its
    /// session is dropped without a logout and its current message stays unseen.
    /// Returns the number of cycles started.
    pub async fn run_until<F>(&self, poll_interval: Duration, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut cycles = 0;

        loop {
            cycles += 1;
            tokio::select! {
                outcome = self.run_one_cycle() => log_outcome(&outcome),
                () = &mut shutdown => {
                    info!("Shutdown requested, abandoning cycle");
                    return cycles;
                }
            }

            tokio::select! {
                () = tokio::time::sleep(poll_interval) => {}
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    return cycles;
                }
            }
        }
    }

    async fn process_unseen(&self, mailbox: &mut C::Mailbox) -> Result<CycleReport> {
        let uids = mailbox.search_unseen(self.sender_filter.as_deref()).await?;
        let mut report = CycleReport {
            found: uids.len(),
            ..CycleReport::default()
        };

        for uid in uids {
            match self.process_message(mailbox, uid).await? {
                Handled::Forwarded => report.forwarded += 1,
                Handled::NoCode => report.without_code += 1,
                Handled::FetchFailed => report.fetch_failed += 1,
                Handled::Unparsable => report.unparsable += 1,
            }
        }

        debug!(?report, "Cycle finished");
        Ok(report)
    }

    #[instrument(name = "InboxProcessor::process_message", skip(self, mailbox))]
    async fn process_message(&self, mailbox: &mut C::Mailbox, uid: u32) -> Result<Handled> {
        let raw = match mailbox.fetch(uid).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to fetch message, skipping");
                return Ok(Handled::FetchFailed);
            }
        };

        let message = match Message::parse(&raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to parse message, skipping");
                return Ok(Handled::Unparsable);
            }
        };

        let body = extract_body(&message);
        let Some(code) = find_otp(&body) else {
            debug!(body_len = body.len(), "No passcode in message");
            return Ok(Handled::NoCode);
        };

        let payload = format_notification(&code, message.subject());
        self.notifier.send(&payload, &self.destinations).await?;
        mailbox.mark_seen(uid).await?;

        info!(
            destinations = self.destinations.len(),
            "Forwarded passcode"
        );
        Ok(Handled::Forwarded)
    }
}

fn log_outcome(outcome: &Result<CycleReport>) {
    match outcome {
        Ok(report) if report.found > 0 => info!(
            found = report.found,
            forwarded = report.forwarded,
            without_code = report.without_code,
            fetch_failed = report.fetch_failed,
            unparsable = report.unparsable,
            "Cycle complete"
        ),
        Ok(_) => debug!("Nothing unseen"),
        Err(e) => error!(
            error = %e,
            category = %e.category(),
            retryable = e.is_retryable(),
            "Cycle failed"
        ),
    }
}

/// Builds the production collaborators from `config` and runs a single cycle.
///
/// Long-running callers should build an [`InboxProcessor`] once instead.
///
/// # Errors
///
/// See [`InboxProcessor::run_one_cycle`].
pub async fn run_one_cycle(config: &ForwarderConfig) -> Result<CycleReport> {
    InboxProcessor::from_config(config)?.run_one_cycle().await
}
