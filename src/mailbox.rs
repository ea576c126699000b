//! The mailbox seam used by the [`InboxProcessor`](crate::InboxProcessor).
//!
//! [`ImapConnector`](crate::ImapConnector) is the production implementation. Tests
//! plug in in-memory mailboxes.

use crate::error::Result;
use async_trait::async_trait;

/// Opens authenticated mailbox sessions, one per polling cycle.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    /// Session type handed out by [`connect`](Self::connect).
    type Mailbox: Mailbox;

    /// Connects, authenticates and selects the configured folder.
    ///
    /// # Errors
    ///
    /// Returns an error if any of those steps fails.
    async fn connect(&self) -> Result<Self::Mailbox>;
}

/// An open mailbox session with a folder selected.
#[async_trait]
pub trait Mailbox: Send {
    /// Returns the UIDs of unseen messages, optionally only those from `from`, in
    /// ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the search cannot be performed.
    async fn search_unseen(&mut self, from: Option<&str>) -> Result<Vec<u32>>;

    /// Returns the full raw message. Must not set the seen flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be fetched.
    async fn fetch(&mut self, uid: u32) -> Result<Vec<u8>>;

    /// Sets the seen flag on a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag cannot be stored.
    async fn mark_seen(&mut self, uid: u32) -> Result<()>;

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not acknowledge the logout.
    async fn logout(&mut self) -> Result<()>;
}
