//! Configuration for the forwarder.
//!
//! Configuration is built once at startup and handed to the
//! [`InboxProcessor`](crate::InboxProcessor). Use the builders for programmatic
//! setup, or [`ForwarderConfig::from_env`] for the environment variables the binary
//! reads:
//!
//! ```
//! use otp_forwarder::{ImapConfig, TelegramConfig};
//!
//! let imap = ImapConfig::builder()
//!     .email("user@gmail.com")
//!     .password("app-password")
//!     .build()
//!     .expect("valid config");
//! assert_eq!(imap.server_address(), "imap.gmail.com:993");
//!
//! let telegram = TelegramConfig::builder()
//!     .bot_token("123:abc")
//!     .chat_id("42")
//!     .build()
//!     .expect("valid config");
//! assert_eq!(telegram.chat_ids, ["42"]);
//! ```

use crate::error::{Error, Result};
use email_address::EmailAddress;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Default IMAP host.
pub const DEFAULT_IMAP_HOST: &str = "imap.gmail.com";
/// Default IMAP port (IMAPS).
pub const DEFAULT_IMAP_PORT: u16 = 993;
/// Default mailbox folder.
pub const DEFAULT_FOLDER: &str = "INBOX";
/// Default Telegram Bot API base URL.
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
/// Default pause between polling cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Environment variable names read by [`ForwarderConfig::from_env`].
pub mod env {
    /// IMAP login address (required).
    pub const GMAIL_USER: &str = "GMAIL_USER";
    /// IMAP password or app password (required).
    pub const GMAIL_APP_PASSWORD: &str = "GMAIL_APP_PASSWORD";
    /// IMAP host.
    pub const IMAP_HOST: &str = "IMAP_HOST";
    /// IMAP port.
    pub const IMAP_PORT: &str = "IMAP_PORT";
    /// Mailbox folder to watch.
    pub const IMAP_FOLDER: &str = "IMAP_FOLDER";
    /// Only forward mail from this sender.
    pub const BANK_FROM: &str = "BANK_FROM";
    /// Seconds between cycles.
    pub const POLL_SECONDS: &str = "POLL_SECONDS";
    /// Telegram bot token (required).
    pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
    /// Comma separated Telegram chat ids (required).
    pub const TELEGRAM_CHAT_IDS: &str = "TELEGRAM_CHAT_IDS";
}

// ─────────────────────────────────────────────────────────────────────────────
// IMAP
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for connecting to an IMAP server.
///
/// Create using [`ImapConfig::builder()`].
///
/// Note: The `password` field is stored as a [`SecretString`] to prevent
/// accidental logging of sensitive credentials.
#[derive(Clone)]
pub struct ImapConfig {
    email: EmailAddress,
    password: SecretString,
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port.
    pub port: u16,
    /// Folder searched for unseen mail.
    pub folder: String,
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
}

impl std::fmt::Debug for ImapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConfig")
            .field("email", &self.email.as_str())
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("folder", &self.folder)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl ImapConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ImapConfigBuilder {
        ImapConfigBuilder::default()
    }

    /// Returns the login address as a string slice.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the password.
    ///
    /// Only pass this to authentication; never log it.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Returns the full IMAP server address as "host:port".
    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Timeouts applied to each mailbox operation.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing the TCP/TLS connection.
    pub connect: Duration,
    /// Timeout for IMAP authentication.
    pub auth: Duration,
    /// Timeout for selecting the folder.
    pub select: Duration,
    /// Timeout for the unseen search.
    pub search: Duration,
    /// Timeout for fetching one message.
    pub fetch: Duration,
    /// Timeout for setting the seen flag.
    pub store: Duration,
    /// Timeout for logout.
    pub logout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            auth: Duration::from_secs(30),
            select: Duration::from_secs(10),
            search: Duration::from_secs(10),
            fetch: Duration::from_secs(30),
            store: Duration::from_secs(10),
            logout: Duration::from_secs(5),
        }
    }
}

fn validate_email(email: &str) -> Result<EmailAddress> {
    EmailAddress::parse_with_options(email, email_address::Options::default()).map_err(|_| {
        Error::InvalidEmailFormat {
            email: email.to_string(),
        }
    })
}

/// Builder for [`ImapConfig`].
#[derive(Debug, Default)]
pub struct ImapConfigBuilder {
    email: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    folder: Option<String>,
    timeouts: Option<TimeoutConfig>,
}

impl ImapConfigBuilder {
    /// Sets the login address (required).
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the password (required).
    ///
    /// For Gmail, use an app-specific password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the IMAP server hostname. Default is `imap.gmail.com`.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the IMAP server port. Default is 993.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the folder to watch. Default is `INBOX`.
    #[must_use]
    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or empty, or the login is not
    /// a valid address.
    pub fn build(self) -> Result<ImapConfig> {
        let email_raw = self
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| Error::InvalidConfig {
                message: "email is required".into(),
            })?;
        let email = validate_email(email_raw.trim())?;

        let password = self
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::InvalidConfig {
                message: "password is required".into(),
            })?;

        let host = self.host.unwrap_or_else(|| DEFAULT_IMAP_HOST.to_string());
        if host.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "IMAP host must not be empty".into(),
            });
        }

        let folder = self.folder.unwrap_or_else(|| DEFAULT_FOLDER.to_string());
        if folder.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "folder must not be empty".into(),
            });
        }

        Ok(ImapConfig {
            email,
            password: SecretString::from(password),
            host: host.trim().to_string(),
            port: self.port.unwrap_or(DEFAULT_IMAP_PORT),
            folder,
            timeouts: self.timeouts.unwrap_or_default(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Telegram
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Telegram notifier.
#[derive(Clone)]
pub struct TelegramConfig {
    bot_token: SecretString,
    /// Chats every passcode is sent to, in order. Never empty.
    pub chat_ids: Vec<String>,
    /// Bot API base URL, without trailing slash.
    pub api_base: String,
    /// Timeout for each `sendMessage` request.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("chat_ids", &self.chat_ids)
            .field("api_base", &self.api_base)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl TelegramConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> TelegramConfigBuilder {
        TelegramConfigBuilder::default()
    }

    /// Returns the bot token. Never log it.
    #[must_use]
    pub fn bot_token(&self) -> &str {
        self.bot_token.expose_secret()
    }
}

/// Builder for [`TelegramConfig`].
#[derive(Debug, Default)]
pub struct TelegramConfigBuilder {
    bot_token: Option<String>,
    chat_ids: Vec<String>,
    api_base: Option<String>,
    request_timeout: Option<Duration>,
}

impl TelegramConfigBuilder {
    /// Sets the bot token (required).
    #[must_use]
    pub fn bot_token(mut self, token: impl Into<String>) -> Self {
        self.bot_token = Some(token.into());
        self
    }

    /// Adds one destination chat.
    #[must_use]
    pub fn chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_ids.push(chat_id.into());
        self
    }

    /// Adds several destination chats.
    #[must_use]
    pub fn chat_ids<I, S>(mut self, chat_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chat_ids.extend(chat_ids.into_iter().map(Into::into));
        self
    }

    /// Overrides the Bot API base URL.
    #[must_use]
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Sets the per-request timeout. Default is 15 seconds.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    ///
    /// Chat ids are trimmed and blank entries dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is missing or no chat id remains.
    pub fn build(self) -> Result<TelegramConfig> {
        let bot_token = self
            .bot_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidConfig {
                message: "bot token is required".into(),
            })?;

        let chat_ids: Vec<String> = self
            .chat_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if chat_ids.is_empty() {
            return Err(Error::InvalidConfig {
                message: "at least one chat id is required".into(),
            });
        }

        let api_base = self
            .api_base
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(TelegramConfig {
            bot_token: SecretString::from(bot_token),
            chat_ids,
            api_base,
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(15)),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Forwarder
// ─────────────────────────────────────────────────────────────────────────────

/// Everything one forwarding process needs.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Mailbox settings.
    pub imap: ImapConfig,
    /// Notification settings.
    pub telegram: TelegramConfig,
    /// Only unseen mail from this sender is considered. `None` considers all unseen mail.
    pub sender_filter: Option<String>,
    /// Pause between polling cycles.
    pub poll_interval: Duration,
}

impl ForwarderConfig {
    /// Bundles the parts into a config, with the default poll interval.
    #[must_use]
    pub fn new(imap: ImapConfig, telegram: TelegramConfig) -> Self {
        Self {
            imap,
            telegram,
            sender_filter: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the sender filter; blank values clear it.
    #[must_use]
    pub fn with_sender_filter(mut self, sender: Option<impl Into<String>>) -> Self {
        self.sender_filter = sender
            .map(|s| {
                let s: String = s.into();
                s.trim().to_string()
            })
            .filter(|s| !s.is_empty());
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Loads the configuration from process environment variables.
    ///
    /// Call [`dotenvy::dotenv`] first to pick up a `.env` file; it never overrides
    /// variables that are already set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSetting`] for a missing or empty required variable and
    /// [`Error::InvalidConfig`] for a value that cannot be used.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    ///
    /// See the [`env`] module for the variable names.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            optional(name).ok_or_else(|| Error::MissingSetting {
                name: name.to_string(),
            })
        };

        let mut imap = ImapConfig::builder()
            .email(required(env::GMAIL_USER)?)
            .password(required(env::GMAIL_APP_PASSWORD)?);
        if let Some(host) = optional(env::IMAP_HOST) {
            imap = imap.host(host);
        }
        if let Some(port) = optional(env::IMAP_PORT) {
            imap = imap.port(parse_number(env::IMAP_PORT, &port)?);
        }
        if let Some(folder) = optional(env::IMAP_FOLDER) {
            imap = imap.folder(folder);
        }

        let chat_ids = required(env::TELEGRAM_CHAT_IDS)?;
        let telegram = TelegramConfig::builder()
            .bot_token(required(env::TELEGRAM_BOT_TOKEN)?)
            .chat_ids(chat_ids.split(','))
            .build()
            .map_err(|_| Error::InvalidConfig {
                message: format!("{} is empty", env::TELEGRAM_CHAT_IDS),
            })?;

        let poll_interval = match optional(env::POLL_SECONDS) {
            Some(secs) => Duration::from_secs(parse_number(env::POLL_SECONDS, &secs)?),
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self::new(imap.build()?, telegram)
            .with_sender_filter(optional(env::BANK_FROM))
            .with_poll_interval(poll_interval))
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidConfig {
        message: format!("{name} must be a non-negative integer, got '{value}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn imap() -> ImapConfig {
        ImapConfig::builder()
            .email("user@example.com")
            .password("secret")
            .build()
            .unwrap()
    }

    fn telegram() -> TelegramConfig {
        TelegramConfig::builder()
            .bot_token("123:token")
            .chat_id("42")
            .build()
            .unwrap()
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        (env::GMAIL_USER, "user@gmail.com"),
        (env::GMAIL_APP_PASSWORD, "app-password"),
        (env::TELEGRAM_BOT_TOKEN, "123:token"),
        (env::TELEGRAM_CHAT_IDS, "42, -100200 ,"),
    ];

    #[test]
    fn test_imap_builder_defaults() {
        let config = imap();
        assert_eq!(config.email(), "user@example.com");
        assert_eq!(config.password(), "secret");
        assert_eq!(config.host, "imap.gmail.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.folder, "INBOX");
        assert_eq!(config.server_address(), "imap.gmail.com:993");
    }

    #[test]
    fn test_imap_builder_full() {
        let config = ImapConfig::builder()
            .email("user@example.com")
            .password("secret")
            .host("mail.example.com")
            .port(1993)
            .folder("Banking")
            .connect_timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(config.server_address(), "mail.example.com:1993");
        assert_eq!(config.folder, "Banking");
        assert_eq!(config.timeouts.connect, Duration::from_secs(60));
        assert_eq!(config.timeouts.fetch, Duration::from_secs(30));
    }

    #[test]
    fn test_imap_builder_rejects_missing_or_invalid() {
        assert!(ImapConfig::builder().password("secret").build().is_err());
        assert!(ImapConfig::builder().email("user@example.com").build().is_err());
        assert!(ImapConfig::builder()
            .email("user@example.com")
            .password("")
            .build()
            .is_err());

        let err = ImapConfig::builder()
            .email("invalid-email")
            .password("secret")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEmailFormat { .. }));

        assert!(ImapConfig::builder()
            .email("user@example.com")
            .password("secret")
            .folder(" ")
            .build()
            .is_err());
    }

    #[test]
    fn test_secrets_not_in_debug() {
        let imap = ImapConfig::builder()
            .email("user@example.com")
            .password("super-secret-password")
            .build()
            .unwrap();
        let telegram = TelegramConfig::builder()
            .bot_token("999:super-secret-token")
            .chat_id("1")
            .build()
            .unwrap();

        let debug_str = format!("{:?}", ForwarderConfig::new(imap, telegram));
        assert!(!debug_str.contains("super-secret-password"));
        assert!(!debug_str.contains("super-secret-token"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_telegram_builder_cleans_chat_ids() {
        let config = TelegramConfig::builder()
            .bot_token(" 123:token ")
            .chat_ids([" 42 ", "", "  ", "-100200"])
            .api_base("http://localhost:8081/")
            .build()
            .unwrap();

        assert_eq!(config.bot_token(), "123:token");
        assert_eq!(config.chat_ids, ["42", "-100200"]);
        assert_eq!(config.api_base, "http://localhost:8081");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_telegram_builder_requires_token_and_chat() {
        assert!(TelegramConfig::builder().chat_id("42").build().is_err());
        assert!(TelegramConfig::builder().bot_token("t").build().is_err());
        assert!(TelegramConfig::builder()
            .bot_token("t")
            .chat_ids([" ", ""])
            .build()
            .is_err());
    }

    #[test]
    fn test_sender_filter_blank_is_none() {
        let config = ForwarderConfig::new(imap(), telegram()).with_sender_filter(Some("  "));
        assert_eq!(config.sender_filter, None);

        let config = ForwarderConfig::new(imap(), telegram())
            .with_sender_filter(Some(" alerts@bank.example "));
        assert_eq!(config.sender_filter.as_deref(), Some("alerts@bank.example"));
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = ForwarderConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.imap.email(), "user@gmail.com");
        assert_eq!(config.imap.host, DEFAULT_IMAP_HOST);
        assert_eq!(config.imap.folder, DEFAULT_FOLDER);
        assert_eq!(config.telegram.chat_ids, ["42", "-100200"]);
        assert_eq!(config.sender_filter, None);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_from_lookup_optional_values() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            (env::IMAP_HOST, "imap.example.com"),
            (env::IMAP_PORT, "1993"),
            (env::IMAP_FOLDER, "Bank"),
            (env::BANK_FROM, "noreply@bank.example"),
            (env::POLL_SECONDS, "60"),
        ]);
        let config = ForwarderConfig::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.imap.server_address(), "imap.example.com:1993");
        assert_eq!(config.imap.folder, "Bank");
        assert_eq!(config.sender_filter.as_deref(), Some("noreply@bank.example"));
        assert_eq!(config.poll_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_from_lookup_missing_required() {
        for (missing, _) in REQUIRED {
            let vars: Vec<_> = REQUIRED
                .iter()
                .copied()
                .filter(|(name, _)| *name != missing)
                .collect();
            let err = ForwarderConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(
                matches!(&err, Error::MissingSetting { name } if name == missing),
                "expected {missing} to be reported, got {err}"
            );
        }
    }

    #[test]
    fn test_from_lookup_empty_counts_as_missing() {
        let mut vars = REQUIRED.to_vec();
        vars.retain(|(name, _)| *name != env::GMAIL_USER);
        vars.push((env::GMAIL_USER, ""));
        let err = ForwarderConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, Error::MissingSetting { .. }));
    }

    #[test]
    fn test_from_lookup_chat_ids_only_commas() {
        let mut vars = REQUIRED.to_vec();
        vars.retain(|(name, _)| *name != env::TELEGRAM_CHAT_IDS);
        vars.push((env::TELEGRAM_CHAT_IDS, " , ,"));
        let err = ForwarderConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_CHAT_IDS is empty"));
    }

    #[test]
    fn test_from_lookup_bad_numbers() {
        for (name, value) in [(env::POLL_SECONDS, "soon"), (env::IMAP_PORT, "99999")] {
            let mut vars = REQUIRED.to_vec();
            vars.push((name, value));
            let err = ForwarderConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, Error::InvalidConfig { .. }), "{name}: {err}");
        }
    }
}
