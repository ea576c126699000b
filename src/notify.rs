//! Notification rendering and the delivery seam.
//!
//! [`format_notification`] turns a passcode and a subject into a [`NotificationPayload`]
//! that is safe to send as HTML rich text. [`Notifier`] is the trait the
//! [`InboxProcessor`](crate::InboxProcessor) delivers through;
//! [`TelegramNotifier`](crate::telegram::TelegramNotifier) is the production
//! implementation.
//!
//! ```
//! use otp_forwarder::notify::format_notification;
//! use otp_forwarder::otp::OtpCode;
//!
//! let code = OtpCode::parse("123456").unwrap();
//! let payload = format_notification(&code, "Alert <Bank>");
//! assert_eq!(payload.as_str(), "<code>123456</code>\n\nAlert &lt;Bank&gt;");
//! ```

use crate::error::Result;
use crate::otp::OtpCode;
use async_trait::async_trait;
use std::fmt;

/// A rendered notification, ready to hand to a [`Notifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload(String);

impl NotificationPayload {
    /// Returns the rendered text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders `code` in monospace, a blank line, then the escaped `subject`.
#[must_use]
pub fn format_notification(code: &OtpCode, subject: &str) -> NotificationPayload {
    NotificationPayload(format!(
        "<code>{}</code>\n\n{}",
        code.as_str(),
        escape_html(subject)
    ))
}

/// Escapes the characters that carry meaning in HTML text and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Delivers rendered notifications.
///
/// Implementations send to each destination in order and fail on the first
/// destination that does not accept the message.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `payload` to every destination.
    ///
    /// # Errors
    ///
    /// Returns an error as soon as one destination rejects the message or cannot be
    /// reached.
    async fn send(&self, payload: &NotificationPayload, destinations: &[String]) -> Result<()>;

    /// Returns a short name for logging.
    fn description(&self) -> &str;
}
