//! IMAP implementation of the mailbox seam.
//!
//! [`ImapConnector`] opens a fresh TLS session per cycle, authenticates and selects
//! the configured folder. [`ImapMailbox`] bounds every command by the configured
//! [`TimeoutConfig`](crate::TimeoutConfig).

use crate::config::ImapConfig;
use crate::connection;
use crate::error::{Error, Result};
use crate::mailbox::{Mailbox, MailboxConnector};
use crate::session::{self, AuthConfig, ImapSession};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Opens [`ImapMailbox`] sessions from an [`ImapConfig`].
#[derive(Debug, Clone)]
pub struct ImapConnector {
    config: ImapConfig,
}

impl ImapConnector {
    /// Creates a connector; nothing is contacted until [`MailboxConnector::connect`].
    #[must_use]
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration in use.
    #[must_use]
    pub fn config(&self) -> &ImapConfig {
        &self.config
    }
}

#[async_trait]
impl MailboxConnector for ImapConnector {
    type Mailbox = ImapMailbox;

    #[instrument(
        name = "ImapConnector::connect",
        skip_all,
        fields(
            email = %self.config.email(),
            imap_host = %self.config.host,
            folder = %self.config.folder
        )
    )]
    async fn connect(&self) -> Result<ImapMailbox> {
        let config = &self.config;
        let target_addr = config.server_address();
        let timeouts = &config.timeouts;

        let tls_stream = tokio::time::timeout(
            timeouts.connect,
            connection::establish_tls_connection(&config.host, &target_addr),
        )
        .await
        .map_err(|_| Error::ConnectTimeout {
            target: target_addr.clone(),
            timeout: timeouts.connect,
        })??;

        debug!("TLS connection established");

        let auth_config = AuthConfig {
            email: config.email(),
            password: config.password(),
        };

        let mut session = tokio::time::timeout(
            timeouts.auth,
            session::authenticate(tls_stream, &auth_config),
        )
        .await
        .map_err(|_| Error::AuthTimeout {
            email: config.email().to_string(),
            timeout: timeouts.auth,
        })??;

        debug!("Authenticated");

        let selected = tokio::time::timeout(
            timeouts.select,
            session::select_mailbox(&mut session, &config.folder),
        )
        .await
        .map_err(|_| Error::SelectTimeout {
            mailbox: config.folder.clone(),
            timeout: timeouts.select,
        })
        .and_then(|result| result);

        let mut mailbox = ImapMailbox {
            session: Box::new(session),
            config: config.clone(),
        };

        if let Err(e) = selected {
            // Authenticated but unusable; release the session before reporting
            if let Err(logout_err) = mailbox.logout().await {
                debug!(error = %logout_err, "Logout after failed select also failed");
            }
            return Err(e);
        }

        debug!("Selected folder");

        Ok(mailbox)
    }
}

/// An authenticated IMAP session with the configured folder selected.
pub struct ImapMailbox {
    session: Box<ImapSession>,
    config: ImapConfig,
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn search_unseen(&mut self, from: Option<&str>) -> Result<Vec<u32>> {
        let timeout = self.config.timeouts.search;

        tokio::time::timeout(timeout, session::search_unseen(&mut self.session, from))
            .await
            .map_err(|_| Error::SearchTimeout { timeout })?
    }

    async fn fetch(&mut self, uid: u32) -> Result<Vec<u8>> {
        let timeout = self.config.timeouts.fetch;

        tokio::time::timeout(timeout, session::fetch_message(&mut self.session, uid))
            .await
            .map_err(|_| Error::FetchTimeout { uid, timeout })?
    }

    async fn mark_seen(&mut self, uid: u32) -> Result<()> {
        let timeout = self.config.timeouts.store;

        tokio::time::timeout(timeout, session::mark_seen(&mut self.session, uid))
            .await
            .map_err(|_| Error::StoreTimeout { uid, timeout })?
    }

    async fn logout(&mut self) -> Result<()> {
        let timeout = self.config.timeouts.logout;

        tokio::time::timeout(timeout, session::logout(&mut self.session))
            .await
            .map_err(|_| Error::LogoutTimeout { timeout })?
    }
}

impl std::fmt::Debug for ImapMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapMailbox")
            .field("email", &self.config.email())
            .field("imap_host", &self.config.host)
            .field("folder", &self.config.folder)
            .finish_non_exhaustive()
    }
}
