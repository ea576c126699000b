//! Internal IMAP session management.
//!
//! This module wraps async-imap operations with proper error handling.

use crate::connection::TlsStream;
use crate::error::{Error, Result};
use async_imap::Session;
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, instrument};

/// Type alias for IMAP session over TLS.
pub(crate) type ImapSession = Session<TlsStream>;

/// Authentication configuration for IMAP.
pub(crate) struct AuthConfig<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Authenticates to IMAP server and returns a session.
#[instrument(
    name = "session::authenticate",
    skip_all,
    fields(email = %config.email)
)]
pub(crate) async fn authenticate(
    tls_stream: TlsStream,
    config: &AuthConfig<'_>,
) -> Result<ImapSession> {
    let client = async_imap::Client::new(tls_stream);

    debug!("Authenticating to IMAP server");

    client
        .login(config.email, config.password)
        .await
        .map_err(|e| Error::ImapLogin {
            email: config.email.to_string(),
            source: e.0,
        })
}

/// Selects the folder to watch.
#[instrument(name = "session::select", skip(session), fields(mailbox = %mailbox))]
pub(crate) async fn select_mailbox(session: &mut ImapSession, mailbox: &str) -> Result<()> {
    debug!("Selecting mailbox");

    session
        .select(mailbox)
        .await
        .map_err(|source| Error::SelectMailbox {
            mailbox: mailbox.to_string(),
            source,
        })?;

    Ok(())
}

/// Builds the `UID SEARCH` criteria for unseen mail, optionally from one sender.
pub(crate) fn unseen_query(from: Option<&str>) -> String {
    match from {
        Some(sender) => format!("UNSEEN FROM {}", quote(sender)),
        None => "UNSEEN".to_string(),
    }
}

/// Renders `value` as an IMAP quoted string.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Searches the selected folder for unseen messages and returns their UIDs ascending.
#[instrument(name = "session::search_unseen", skip(session))]
pub(crate) async fn search_unseen(session: &mut ImapSession, from: Option<&str>) -> Result<Vec<u32>> {
    let query = unseen_query(from);

    let uids = session
        .uid_search(&query)
        .await
        .map_err(|source| Error::ImapSearch { source })?;

    // The server's order is lost in the set; UIDs ascend with arrival
    let mut uids: Vec<u32> = uids.into_iter().collect();
    uids.sort_unstable();

    debug!(uid_count = uids.len(), "Found unseen messages");

    Ok(uids)
}

/// Fetches one full message without touching its flags.
#[instrument(name = "session::fetch", skip(session))]
pub(crate) async fn fetch_message(session: &mut ImapSession, uid: u32) -> Result<Vec<u8>> {
    let uid_set = uid.to_string();

    let mut stream = session
        .uid_fetch(&uid_set, "BODY.PEEK[]")
        .await
        .map_err(|source| Error::ImapFetch { uid, source })?
        .boxed();

    let mut body = None;
    while let Some(fetched) = stream.next().await {
        let fetched = fetched.map_err(|source| Error::ImapFetch { uid, source })?;
        if body.is_none() {
            body = fetched.body().map(<[u8]>::to_vec);
        }
    }

    let body = body.ok_or(Error::MissingBody { uid })?;
    debug!(size = body.len(), "Fetched message");
    Ok(body)
}

/// Adds the `\Seen` flag to one message.
#[instrument(name = "session::mark_seen", skip(session))]
pub(crate) async fn mark_seen(session: &mut ImapSession, uid: u32) -> Result<()> {
    let uid_set = uid.to_string();

    let updates: Vec<_> = session
        .uid_store(&uid_set, "+FLAGS (\\Seen)")
        .await
        .map_err(|source| Error::ImapStore { uid, source })?
        .try_collect()
        .await
        .map_err(|source| Error::ImapStore { uid, source })?;

    debug!(updates = updates.len(), "Marked message seen");
    Ok(())
}

/// Logs out from IMAP session.
#[instrument(name = "session::logout", skip(session))]
pub(crate) async fn logout(session: &mut ImapSession) -> Result<()> {
    debug!("Logging out");

    session
        .logout()
        .await
        .map_err(|source| Error::ImapLogout { source })?;

    Ok(())
}
